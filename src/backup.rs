//! Online backup of an active database
//!
//! Backups run through the engine's administrative procedures. Four
//! procedure variants cover the two independent choices: whether the backup
//! waits for in-flight transactions, and whether log archive mode is enabled
//! (with or without deleting previously archived logs). The resulting backup
//! can later seed a new resource through the config's restore modes.

use std::path::Path;

use crate::constants::{
   SYSPROC_BACKUP_DB, SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE,
   SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE_NOWAIT, SYSPROC_BACKUP_DB_NOWAIT,
};
use crate::engine::ProcedureParam;
use crate::error::Error;
use crate::resource::EmbeddedDerbyResource;
use crate::Result;

impl EmbeddedDerbyResource {
   /// Backs up the live database into `backup_dir` (the engine writes a
   /// database-named subdirectory inside it).
   ///
   /// `wait_for_transactions` selects the blocking procedure variant;
   /// `enable_archive_logging` switches the database into log archive mode
   /// as part of the backup, and `delete_archived_logs` additionally removes
   /// logs archived before this backup (only meaningful with archive
   /// logging). The resource must be active.
   pub fn backup_live_database(
      &self,
      backup_dir: &Path,
      wait_for_transactions: bool,
      enable_archive_logging: bool,
      delete_archived_logs: bool,
   ) -> Result<()> {
      self.ensure_active("backup_live_database")?;
      if backup_dir.as_os_str().is_empty() {
         return Err(Error::InvalidArgument {
            name: "backup directory",
         });
      }

      let call = match (enable_archive_logging, wait_for_transactions) {
         (false, true) => SYSPROC_BACKUP_DB,
         (false, false) => SYSPROC_BACKUP_DB_NOWAIT,
         (true, true) => SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE,
         (true, false) => SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE_NOWAIT,
      };

      let dir = backup_dir.display().to_string();
      let mut params = vec![ProcedureParam::Text(&dir)];
      if enable_archive_logging {
         params.push(ProcedureParam::SmallInt(i16::from(delete_archived_logs)));
      }

      tracing::debug!(procedure = call, backup_dir = %dir, "backing up live database");
      let mut conn = self.open_connection()?;
      let result = conn.call_procedure(call, &params);
      if let Err(e) = conn.close() {
         tracing::warn!(error = %e, "closing backup connection failed");
      }
      result?;
      Ok(())
   }
}

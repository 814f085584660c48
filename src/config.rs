//! Configuration for embedded Derby resources

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::{RestoreMode, SubProtocol};
use crate::Result;

/// Engine error log routing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorLoggingMode {
   /// No special config; the engine writes to `derby.log` in the system home.
   #[default]
   Default,
   /// No logging; routes the error stream to a discard target.
   Null,
}

/// Where the database lives. Selecting a location replaces the previous one
/// wholesale, so fields owned by another sub-protocol can never leak through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum DatabaseLocation {
   Memory { name: String },
   Directory { path: String, skip_create: bool },
   Jar { archive_file: String, db_path: String },
   Classpath { db_path: String },
}

/// How the database is created or restored from a backup copy. The log
/// device only exists on the roll-forward variant, which is the only mode
/// that requires one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreSpec {
   /// Restore from a full backup, replacing any same-named database
   RestoreFrom {
      /// Location of the database backup
      backup_dir: PathBuf,
   },
   /// Create a new database from a backup; errors if one already exists
   CreateFrom {
      /// Location of the database backup
      backup_dir: PathBuf,
   },
   /// Restore from a backup and roll forward through archived logs
   RollForwardRecoveryFrom {
      /// Location of the database backup
      backup_dir: PathBuf,
      /// Location of the archived transaction logs
      log_device: PathBuf,
   },
}

impl RestoreSpec {
   /// The restore mode this spec selects.
   pub fn mode(&self) -> RestoreMode {
      match self {
         RestoreSpec::RestoreFrom { .. } => RestoreMode::RestoreFrom,
         RestoreSpec::CreateFrom { .. } => RestoreMode::CreateFrom,
         RestoreSpec::RollForwardRecoveryFrom { .. } => RestoreMode::RollForwardRecoveryFrom,
      }
   }

   /// The backup location to create or restore from.
   pub fn backup_dir(&self) -> &Path {
      match self {
         RestoreSpec::RestoreFrom { backup_dir }
         | RestoreSpec::CreateFrom { backup_dir }
         | RestoreSpec::RollForwardRecoveryFrom { backup_dir, .. } => backup_dir,
      }
   }

   /// The archived-log device, present exactly when the mode requires one.
   pub fn log_device(&self) -> Option<&Path> {
      match self {
         RestoreSpec::RollForwardRecoveryFrom { log_device, .. } => Some(log_device),
         _ => None,
      }
   }
}

/// Configuration consumed by [`EmbeddedDerbyResource`](crate::EmbeddedDerbyResource).
///
/// Built with `Default::default()` and then customized through the fluent
/// `use_*` / `restore_*` mutators. Location-selecting and restore-selecting
/// calls are mutually exclusive within their group: the most recent call
/// wins and fully replaces the previous selection. Validation happens before
/// any mutation, so a rejected call leaves the config unchanged.
///
/// # Examples
///
/// ```
/// use derby_fixture::DerbyResourceConfig;
///
/// // In-memory database with a generated unique name
/// let config = DerbyResourceConfig::default();
///
/// // On-disk database restored from a backup, with a post-init script
/// let mut config = DerbyResourceConfig::default();
/// config
///    .use_database_in_directory_at("databases/sample", false)?
///    .restore_database_from("backups/sample")?
///    .add_post_init_script("file:scripts/seed.sql")?;
/// # Ok::<(), derby_fixture::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerbyResourceConfig {
   location: DatabaseLocation,
   restore: Option<RestoreSpec>,
   error_logging_mode: ErrorLoggingMode,
   post_init_scripts: Vec<String>,
}

impl Default for DerbyResourceConfig {
   /// In-memory database with a freshly generated unique name, default
   /// error logging, no restore mode and no post-init scripts.
   fn default() -> Self {
      Self {
         location: DatabaseLocation::Memory {
            name: Self::generated_database_path(),
         },
         restore: None,
         error_logging_mode: ErrorLoggingMode::default(),
         post_init_scripts: Vec::new(),
      }
   }
}

impl DerbyResourceConfig {
   /// Returns a fresh unique database path name (a random UUID string).
   pub fn generated_database_path() -> String {
      Uuid::new_v4().to_string()
   }

   /// Use an in-memory database with a generated unique name.
   pub fn use_in_memory_database(&mut self) -> &mut Self {
      self.location = DatabaseLocation::Memory {
         name: Self::generated_database_path(),
      };
      self
   }

   /// Use an in-memory database with the given name.
   pub fn use_in_memory_database_named(&mut self, name: impl Into<String>) -> Result<&mut Self> {
      let name = name.into();
      require_non_empty(&name, "database name")?;
      self.location = DatabaseLocation::Memory { name };
      Ok(self)
   }

   /// Use the `directory:` sub-protocol with a generated directory name,
   /// resolved by the engine relative to the system home.
   pub fn use_database_in_directory(&mut self) -> &mut Self {
      self.location = DatabaseLocation::Directory {
         path: Self::generated_database_path(),
         skip_create: false,
      };
      self
   }

   /// Use the `directory:` sub-protocol with the database at the given
   /// relative or absolute path. When `skip_create` is true the database is
   /// opened without the `create=true` attribute.
   pub fn use_database_in_directory_at(
      &mut self,
      path: impl Into<String>,
      skip_create: bool,
   ) -> Result<&mut Self> {
      let path = path.into();
      require_non_empty(&path, "database path")?;
      self.location = DatabaseLocation::Directory { path, skip_create };
      Ok(self)
   }

   /// Use the `jar:` sub-protocol for a read-only database at `db_path`
   /// inside the archive at `archive_file`.
   pub fn use_jar_sub_protocol(
      &mut self,
      archive_file: impl Into<String>,
      db_path: impl Into<String>,
   ) -> Result<&mut Self> {
      let archive_file = archive_file.into();
      let db_path = db_path.into();
      require_non_empty(&archive_file, "jar database path")?;
      require_non_empty(&db_path, "database path")?;
      self.location = DatabaseLocation::Jar {
         archive_file,
         db_path,
      };
      Ok(self)
   }

   /// Use the `classpath:` sub-protocol for a read-only database at the
   /// given in-classpath path.
   pub fn use_classpath_sub_protocol(&mut self, db_path: impl Into<String>) -> Result<&mut Self> {
      let db_path = db_path.into();
      require_non_empty(&db_path, "database path")?;
      self.location = DatabaseLocation::Classpath { db_path };
      Ok(self)
   }

   /// Restore the database from a full backup at `backup_dir`, replacing any
   /// existing database with the same name.
   pub fn restore_database_from(&mut self, backup_dir: impl Into<PathBuf>) -> Result<&mut Self> {
      let backup_dir = backup_dir.into();
      require_non_empty_path(&backup_dir, "database backup directory")?;
      self.restore = Some(RestoreSpec::RestoreFrom { backup_dir });
      Ok(self)
   }

   /// Create a new database from the backup at `backup_dir`. The engine
   /// fails if a database with the same name already exists.
   pub fn create_database_from(&mut self, backup_dir: impl Into<PathBuf>) -> Result<&mut Self> {
      let backup_dir = backup_dir.into();
      require_non_empty_path(&backup_dir, "database backup directory")?;
      self.restore = Some(RestoreSpec::CreateFrom { backup_dir });
      Ok(self)
   }

   /// Restore the database with roll-forward recovery, replaying archived
   /// logs from `log_device` on top of the backup at `backup_dir`.
   pub fn recover_database_from(
      &mut self,
      backup_dir: impl Into<PathBuf>,
      log_device: impl Into<PathBuf>,
   ) -> Result<&mut Self> {
      let backup_dir = backup_dir.into();
      let log_device = log_device.into();
      require_non_empty_path(&backup_dir, "database backup directory")?;
      require_non_empty_path(&log_device, "recovery log device")?;
      self.restore = Some(RestoreSpec::RollForwardRecoveryFrom {
         backup_dir,
         log_device,
      });
      Ok(self)
   }

   /// Route the engine error stream to a discard target.
   pub fn use_dev_null_error_logging(&mut self) -> &mut Self {
      self.error_logging_mode = ErrorLoggingMode::Null;
      self
   }

   /// Let the engine write its error stream to the default `derby.log`.
   pub fn use_default_error_logging(&mut self) -> &mut Self {
      self.error_logging_mode = ErrorLoggingMode::Default;
      self
   }

   /// Append a post-init script locator. Scripts run in insertion order
   /// against the freshly started database.
   pub fn add_post_init_script(&mut self, script: impl Into<String>) -> Result<&mut Self> {
      let script = script.into();
      require_non_empty(&script, "post init script")?;
      self.post_init_scripts.push(script);
      Ok(self)
   }

   /// The selected JDBC sub-protocol.
   pub fn sub_protocol(&self) -> SubProtocol {
      match self.location {
         DatabaseLocation::Memory { .. } => SubProtocol::Memory,
         DatabaseLocation::Directory { .. } => SubProtocol::Directory,
         DatabaseLocation::Jar { .. } => SubProtocol::Jar,
         DatabaseLocation::Classpath { .. } => SubProtocol::Classpath,
      }
   }

   /// The database name or path. Its meaning depends on the sub-protocol:
   /// database name for memory, directory path for directory, in-archive
   /// path for jar and classpath.
   pub fn database_path(&self) -> &str {
      match &self.location {
         DatabaseLocation::Memory { name } => name,
         DatabaseLocation::Directory { path, .. } => path,
         DatabaseLocation::Jar { db_path, .. } => db_path,
         DatabaseLocation::Classpath { db_path } => db_path,
      }
   }

   /// The archive file path, only present for the `jar:` sub-protocol.
   pub fn jar_file(&self) -> Option<&str> {
      match &self.location {
         DatabaseLocation::Jar { archive_file, .. } => Some(archive_file),
         _ => None,
      }
   }

   /// Whether the `create=true` attribute is skipped for a directory
   /// database.
   pub fn directory_skip_create(&self) -> bool {
      matches!(
         self.location,
         DatabaseLocation::Directory {
            skip_create: true,
            ..
         }
      )
   }

   /// The configured backup/restore spec, if any.
   pub fn restore(&self) -> Option<&RestoreSpec> {
      self.restore.as_ref()
   }

   /// The configured error logging mode.
   pub fn error_logging_mode(&self) -> ErrorLoggingMode {
      self.error_logging_mode
   }

   /// Post-init script locators, in execution order.
   pub fn post_init_scripts(&self) -> &[String] {
      &self.post_init_scripts
   }
}

fn require_non_empty(value: &str, name: &'static str) -> Result<()> {
   if value.trim().is_empty() {
      return Err(Error::InvalidArgument { name });
   }
   Ok(())
}

fn require_non_empty_path(value: &Path, name: &'static str) -> Result<()> {
   if value.as_os_str().is_empty() {
      return Err(Error::InvalidArgument { name });
   }
   Ok(())
}

//! Derby JDBC sub-protocols and backup/restore modes

use serde::{Deserialize, Serialize};

use crate::constants::DERBY_JDBC_URL_PREFIX;

/// Embedded Derby JDBC sub-protocols supported by this fixture.
///
/// Each variant selects a storage backend addressing scheme and owns the two
/// derived prefix strings used to assemble connection URLs and datasource
/// database names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubProtocol {
   /// In-memory database
   Memory,
   /// Database in a directory on disk
   Directory,
   /// Read-only database inside an archive file
   Jar,
   /// Read-only database resolved from the classpath
   Classpath,
}

impl SubProtocol {
   /// The short protocol code used inside connection URLs.
   pub const fn code(self) -> &'static str {
      match self {
         SubProtocol::Memory => "memory",
         SubProtocol::Directory => "directory",
         SubProtocol::Jar => "jar",
         SubProtocol::Classpath => "classpath",
      }
   }

   /// JDBC connection string prefix, of the form `jdbc:derby:<code>:`.
   pub fn jdbc_connection_prefix(self) -> String {
      format!("{}{}:", DERBY_JDBC_URL_PREFIX, self.code())
   }

   /// Database name prefix (`<code>:`) as required to set up a datasource
   /// for the database. Does not include the `jdbc:derby:` prefix.
   pub fn datasource_database_name_prefix(self) -> String {
      format!("{}:", self.code())
   }
}

/// Modes for creating or restoring a database from a backup copy.
///
/// Each variant owns the URL attribute key appended to the create URL, and
/// knows whether it requires an archived-log device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestoreMode {
   /// Restore a database from a backup copy, replacing any existing database
   /// with the same name
   RestoreFrom,
   /// Create a new database from a backup copy; fails if the database
   /// already exists
   CreateFrom,
   /// Restore from a backup and replay archived transaction logs
   RollForwardRecoveryFrom,
}

impl RestoreMode {
   /// The attribute key appended to the create connection URL.
   pub const fn url_attribute(self) -> &'static str {
      match self {
         RestoreMode::RestoreFrom => "restoreFrom",
         RestoreMode::CreateFrom => "createFrom",
         RestoreMode::RollForwardRecoveryFrom => "rollForwardRecoveryFrom",
      }
   }

   /// Whether this mode requires a `logDevice` path for archived logs.
   pub const fn requires_log_device(self) -> bool {
      matches!(self, RestoreMode::RollForwardRecoveryFrom)
   }
}

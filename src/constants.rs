//! Derby connection URL and property string constants

/// JDBC URL prefix shared by every embedded Derby connection string.
pub const DERBY_JDBC_URL_PREFIX: &str = "jdbc:derby:";

/// Name of the engine properties file written into the system home directory.
pub const DERBY_PROPERTIES_FILE: &str = "derby.properties";

/// Process-wide property naming the engine's system home directory.
pub const PROP_DERBY_SYSTEM_HOME: &str = "derby.system.home";

/// Property routing the engine error stream to a named discard target.
pub const PROP_DERBY_STREAM_ERROR_FIELD: &str = "derby.stream.error.field";

/// Property routing the engine error stream to a file.
pub const PROP_DERBY_STREAM_ERROR_FILE: &str = "derby.stream.error.file";

/// Identifier for the discard ("/dev/null") error stream target.
pub const DEV_NULL_FIELD_ID: &str = "derby_fixture::DEV_NULL";

/// Default engine error log file name, relative to the system home.
pub const DEFAULT_ERROR_LOG_FILE: &str = "derby.log";

/// Separator between the database location and a URL attribute.
pub const URL_ATTR_SEPARATOR: char = ';';

/// Key/value separator inside a URL attribute.
pub const URL_ATTR_EQUAL: char = '=';

/// Attribute requesting database creation.
pub const URL_ATTR_CREATE: &str = ";create=true";

/// Attribute requesting database shutdown.
pub const URL_ATTR_SHUTDOWN: &str = ";shutdown=true";

/// Attribute requesting an in-memory database be dropped.
pub const URL_ATTR_DROP: &str = ";drop=true";

/// Attribute key naming the archived-log device for roll-forward recovery.
pub const URL_ATTR_LOG_DEVICE: &str = "logDevice";

/// Online backup, waiting for running transactions.
pub const SYSPROC_BACKUP_DB: &str = "CALL SYSCS_UTIL.SYSCS_BACKUP_DATABASE(?)";

/// Online backup without waiting for running transactions.
pub const SYSPROC_BACKUP_DB_NOWAIT: &str = "CALL SYSCS_UTIL.SYSCS_BACKUP_DATABASE_NOWAIT(?)";

/// Online backup enabling log archive mode, waiting for transactions.
pub const SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE: &str =
   "CALL SYSCS_UTIL.SYSCS_BACKUP_DATABASE_AND_ENABLE_LOG_ARCHIVE_MODE(?, ?)";

/// Online backup enabling log archive mode without waiting for transactions.
pub const SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE_NOWAIT: &str =
   "CALL SYSCS_UTIL.SYSCS_BACKUP_DATABASE_AND_ENABLE_LOG_ARCHIVE_MODE_NOWAIT(?, ?)";

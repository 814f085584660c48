//! In-process double of the embedded engine's instance management
//!
//! [`SimulatedEngine`] implements the engine seam faithfully enough to
//! exercise every lifecycle path of the fixture without linking a real
//! database: it parses the full connection URL grammar, enforces
//! create/duplicate/not-found semantics, signals shutdown completion via an
//! error the way the real engine's shutdown protocol does, resolves
//! directory databases against the process-wide system home property, and
//! implements the online backup procedures plus restoreFrom / createFrom /
//! roll-forward recovery by copying an applied-statement log.
//!
//! It deliberately implements no SQL. Statements are validated by their
//! leading verb and recorded; queries succeed without producing rows. Jar
//! archives are exploded-archive directories; classpath databases resolve
//! against roots registered with [`SimulatedEngine::register_classpath_root`].

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::{
   DERBY_JDBC_URL_PREFIX, PROP_DERBY_SYSTEM_HOME, SYSPROC_BACKUP_DB,
   SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE, SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE_NOWAIT,
   SYSPROC_BACKUP_DB_NOWAIT,
};
use crate::env::{Environment, SystemProperties};

use super::{EmbeddedEngine, EngineConnection, EngineError, EngineErrorKind, ProcedureParam};

const SERVICE_FILE: &str = "service.properties";
const STATEMENTS_FILE: &str = "statements.sql";
const LOG_DIR: &str = "log";
const ARCHIVED_LOG_FILE: &str = "archived.sql";
const ARCHIVE_MODE_MARKER: &str = "log_archive_mode";

#[derive(Debug, Default, Clone)]
struct MemoryDatabase {
   statements: Vec<String>,
   archive_logging: bool,
}

#[derive(Debug, Default)]
struct EngineState {
   memory_dbs: HashMap<String, MemoryDatabase>,
   /// Archived statement logs for memory databases, keyed by
   /// `memory:<name>`; directory databases archive to disk instead.
   memory_archived: HashMap<String, Vec<String>>,
   classpath_roots: Vec<PathBuf>,
   procedure_calls: Vec<String>,
}

/// Simulated embedded engine. One value is one "process-wide" engine
/// instance; clone the [`Arc`] it lives in to share it between a resource
/// and test assertions.
pub struct SimulatedEngine {
   env: Arc<dyn Environment>,
   state: Arc<Mutex<EngineState>>,
}

impl Default for SimulatedEngine {
   fn default() -> Self {
      Self::new()
   }
}

impl SimulatedEngine {
   /// Creates an engine observing the shared [`SystemProperties`].
   pub fn new() -> Self {
      Self::with_environment(Arc::new(SystemProperties))
   }

   /// Creates an engine observing the given environment. Hand the same
   /// environment to the resource to keep a test isolated.
   pub fn with_environment(env: Arc<dyn Environment>) -> Self {
      Self {
         env,
         state: Arc::new(Mutex::new(EngineState::default())),
      }
   }

   /// Registers a directory that `classpath:` databases resolve against.
   pub fn register_classpath_root(&self, root: impl Into<PathBuf>) {
      self.lock().classpath_roots.push(root.into());
   }

   /// Statements applied to an in-memory database, if it exists.
   pub fn memory_database_statements(&self, name: &str) -> Option<Vec<String>> {
      self.lock().memory_dbs.get(name).map(|db| db.statements.clone())
   }

   /// Whether an in-memory database currently exists.
   pub fn has_memory_database(&self, name: &str) -> bool {
      self.lock().memory_dbs.contains_key(name)
   }

   /// Statements applied to an on-disk directory database.
   pub fn directory_database_statements(dir: &Path) -> std::io::Result<Vec<String>> {
      read_statements(dir)
   }

   /// Administrative procedure call texts seen so far, in order.
   pub fn procedure_calls(&self) -> Vec<String> {
      self.lock().procedure_calls.clone()
   }

   fn lock(&self) -> MutexGuard<'_, EngineState> {
      lock_state(&self.state)
   }

   fn system_home(&self) -> PathBuf {
      self
         .env
         .get(PROP_DERBY_SYSTEM_HOME)
         .map(PathBuf::from)
         .unwrap_or_else(|| PathBuf::from("."))
   }

   fn resolve_directory(&self, path: &str) -> PathBuf {
      let path = PathBuf::from(path);
      if path.is_absolute() {
         path
      } else {
         self.system_home().join(path)
      }
   }

   fn connection(&self, handle: Handle) -> Box<dyn EngineConnection> {
      Box::new(SimulatedConnection {
         state: Arc::clone(&self.state),
         handle,
         closed: false,
      })
   }

   fn connect_memory(
      &self,
      name: String,
      attrs: Attributes,
   ) -> Result<Box<dyn EngineConnection>, EngineError> {
      let mut state = self.lock();
      let exists = state.memory_dbs.contains_key(&name);

      if attrs.drop || attrs.shutdown {
         if !exists {
            return Err(not_found("memory", &name));
         }
         if attrs.drop {
            state.memory_dbs.remove(&name);
         }
         return Err(shutdown_signal(&format!("memory:{name}")));
      }

      if let Some(restore) = &attrs.restore {
         if restore.mode == RestoreKind::CreateFrom && exists {
            return Err(already_exists("memory", &name));
         }
         let mut statements = load_backup(&restore.backup_dir)?;
         if restore.mode == RestoreKind::RollForward {
            statements.extend(replay_logs(&state, restore)?);
         }
         state.memory_dbs.insert(
            name.clone(),
            MemoryDatabase {
               statements,
               archive_logging: false,
            },
         );
      } else if attrs.create {
         if exists {
            return Err(already_exists("memory", &name));
         }
         state.memory_dbs.insert(name.clone(), MemoryDatabase::default());
      } else if !exists {
         return Err(not_found("memory", &name));
      }

      drop(state);
      Ok(self.connection(Handle::Memory { name }))
   }

   fn connect_directory(
      &self,
      dir: PathBuf,
      attrs: Attributes,
   ) -> Result<Box<dyn EngineConnection>, EngineError> {
      let exists = dir.join(SERVICE_FILE).exists();

      if attrs.drop {
         return Err(EngineError::new(
            EngineErrorKind::InvalidUrl,
            "drop=true is only supported for in-memory databases",
         ));
      }
      if attrs.shutdown {
         if !exists {
            return Err(not_found("directory", &dir.display().to_string()));
         }
         return Err(shutdown_signal(&format!("directory:{}", dir.display())));
      }

      if let Some(restore) = &attrs.restore {
         if restore.mode == RestoreKind::CreateFrom && exists {
            return Err(already_exists("directory", &dir.display().to_string()));
         }
         let mut statements = load_backup(&restore.backup_dir)?;
         if restore.mode == RestoreKind::RollForward {
            statements.extend(replay_logs(&self.lock(), restore)?);
         }
         materialize_directory_db(&dir, &statements).map_err(io_error)?;
      } else if attrs.create {
         if exists {
            return Err(already_exists("directory", &dir.display().to_string()));
         }
         materialize_directory_db(&dir, &[]).map_err(io_error)?;
      } else if !exists {
         return Err(not_found("directory", &dir.display().to_string()));
      }

      Ok(self.connection(Handle::Directory { dir }))
   }

   fn connect_read_only(
      &self,
      db_dir: PathBuf,
      location: &str,
      attrs: &Attributes,
   ) -> Result<Box<dyn EngineConnection>, EngineError> {
      if attrs.create || attrs.drop || attrs.restore.is_some() {
         return Err(EngineError::new(
            EngineErrorKind::ReadOnly,
            format!("database '{location}' is read-only"),
         ));
      }
      if !db_dir.join(SERVICE_FILE).exists() {
         return Err(EngineError::new(
            EngineErrorKind::DatabaseNotFound,
            format!("database '{location}' not found"),
         ));
      }
      if attrs.shutdown {
         return Err(shutdown_signal(location));
      }
      Ok(self.connection(Handle::ReadOnly))
   }
}

impl EmbeddedEngine for SimulatedEngine {
   fn boot(&self) -> Result<(), EngineError> {
      Ok(())
   }

   fn connect(&self, url: &str) -> Result<Box<dyn EngineConnection>, EngineError> {
      let (location, attrs) = parse_url(url)?;

      match location {
         Location::System => {
            if attrs.shutdown {
               self.lock().memory_dbs.clear();
               return Err(shutdown_signal("system"));
            }
            Err(EngineError::new(
               EngineErrorKind::InvalidUrl,
               "connection URL does not name a database",
            ))
         }
         Location::Memory(name) => self.connect_memory(name, attrs),
         Location::Directory(path) => {
            let dir = self.resolve_directory(&path);
            self.connect_directory(dir, attrs)
         }
         Location::Jar { archive, db_path } => {
            let db_dir = archive.join(db_path.trim_start_matches('/'));
            let location = format!("jar:({}){}", archive.display(), db_path);
            self.connect_read_only(db_dir, &location, &attrs)
         }
         Location::Classpath(db_path) => {
            let trimmed = db_path.trim_start_matches('/').to_string();
            let roots = self.lock().classpath_roots.clone();
            let found = roots
               .iter()
               .map(|root| root.join(&trimmed))
               .find(|candidate| candidate.join(SERVICE_FILE).exists());
            match found {
               Some(db_dir) => {
                  self.connect_read_only(db_dir, &format!("classpath:{db_path}"), &attrs)
               }
               None => Err(EngineError::new(
                  EngineErrorKind::DatabaseNotFound,
                  format!("database 'classpath:{db_path}' not found"),
               )),
            }
         }
      }
   }
}

#[derive(Debug)]
enum Handle {
   Memory { name: String },
   Directory { dir: PathBuf },
   ReadOnly,
}

#[derive(Debug)]
struct SimulatedConnection {
   state: Arc<Mutex<EngineState>>,
   handle: Handle,
   closed: bool,
}

impl SimulatedConnection {
   fn ensure_open(&self) -> Result<(), EngineError> {
      if self.closed {
         return Err(EngineError::new(
            EngineErrorKind::StatementFailed,
            "connection is closed",
         ));
      }
      Ok(())
   }

   fn backup(&mut self, backup_dir: &Path) -> Result<(), EngineError> {
      let (segment, statements) = match &self.handle {
         Handle::Memory { name } => {
            let segment = name.rsplit('/').next().unwrap_or(name.as_str()).to_string();
            let statements = lock_state(&self.state)
               .memory_dbs
               .get(name)
               .map(|db| db.statements.clone())
               .ok_or_else(|| not_found("memory", name))?;
            (segment, statements)
         }
         Handle::Directory { dir } => {
            let segment = dir
               .file_name()
               .map(|segment| segment.to_string_lossy().into_owned())
               .unwrap_or_default();
            (segment, read_statements(dir).map_err(io_error)?)
         }
         Handle::ReadOnly => {
            return Err(EngineError::new(
               EngineErrorKind::ProcedureFailed,
               "cannot back up a read-only database",
            ));
         }
      };

      let target = backup_dir.join(segment);
      materialize_directory_db(&target, &statements).map_err(|e| {
         EngineError::new(
            EngineErrorKind::ProcedureFailed,
            format!("backup to '{}' failed: {e}", backup_dir.display()),
         )
      })
   }

   fn enable_archive_logging(&mut self, delete_archived_logs: bool) -> Result<(), EngineError> {
      match &self.handle {
         Handle::Memory { name } => {
            let mut state = lock_state(&self.state);
            let key = format!("memory:{name}");
            if delete_archived_logs {
               state.memory_archived.remove(&key);
            }
            state.memory_archived.entry(key).or_default();
            if let Some(db) = state.memory_dbs.get_mut(name) {
               db.archive_logging = true;
            }
            Ok(())
         }
         Handle::Directory { dir } => {
            let log_dir = dir.join(LOG_DIR);
            fs::create_dir_all(&log_dir).map_err(io_error)?;
            if delete_archived_logs {
               let archived = log_dir.join(ARCHIVED_LOG_FILE);
               if archived.exists() {
                  fs::remove_file(&archived).map_err(io_error)?;
               }
            }
            fs::write(dir.join(ARCHIVE_MODE_MARKER), b"enabled\n").map_err(io_error)?;
            Ok(())
         }
         Handle::ReadOnly => Err(EngineError::new(
            EngineErrorKind::ProcedureFailed,
            "cannot enable log archiving on a read-only database",
         )),
      }
   }

   fn record(&mut self, statement: &str) -> Result<(), EngineError> {
      let statement = statement.replace('\n', " ");
      match &self.handle {
         Handle::Memory { name } => {
            let mut state = lock_state(&self.state);
            let archive = {
               let db = state
                  .memory_dbs
                  .get_mut(name)
                  .ok_or_else(|| not_found("memory", name))?;
               db.statements.push(statement.clone());
               db.archive_logging
            };
            if archive {
               state
                  .memory_archived
                  .entry(format!("memory:{name}"))
                  .or_default()
                  .push(statement);
            }
            Ok(())
         }
         Handle::Directory { dir } => {
            let mut statements = read_statements(dir).map_err(io_error)?;
            statements.push(statement.clone());
            write_statements(dir, &statements).map_err(io_error)?;
            if dir.join(ARCHIVE_MODE_MARKER).exists() {
               let log_dir = dir.join(LOG_DIR);
               fs::create_dir_all(&log_dir).map_err(io_error)?;
               let mut file = fs::OpenOptions::new()
                  .create(true)
                  .append(true)
                  .open(log_dir.join(ARCHIVED_LOG_FILE))
                  .map_err(io_error)?;
               writeln!(file, "{statement}").map_err(io_error)?;
            }
            Ok(())
         }
         Handle::ReadOnly => Err(EngineError::new(
            EngineErrorKind::ReadOnly,
            "database is read-only",
         )),
      }
   }
}

impl EngineConnection for SimulatedConnection {
   fn execute(&mut self, sql: &str) -> Result<(), EngineError> {
      self.ensure_open()?;
      let trimmed = sql.trim();
      if trimmed.is_empty() || trimmed.starts_with("--") {
         return Ok(());
      }
      let verb = trimmed
         .split_whitespace()
         .next()
         .unwrap_or_default()
         .to_ascii_uppercase();
      match verb.as_str() {
         // Queries succeed without producing rows; the double has no storage
         "SELECT" | "VALUES" => Ok(()),
         "CREATE" | "INSERT" | "UPDATE" | "DELETE" | "DROP" | "ALTER" | "SET" | "GRANT"
         | "REVOKE" | "TRUNCATE" | "RENAME" | "LOCK" => self.record(trimmed),
         _ => Err(EngineError::new(
            EngineErrorKind::StatementFailed,
            format!("syntax error: unknown statement '{verb}'"),
         )),
      }
   }

   fn call_procedure(
      &mut self,
      call: &str,
      params: &[ProcedureParam<'_>],
   ) -> Result<(), EngineError> {
      self.ensure_open()?;
      lock_state(&self.state).procedure_calls.push(call.to_string());

      let (archive, expected_params) = match call {
         SYSPROC_BACKUP_DB | SYSPROC_BACKUP_DB_NOWAIT => (false, 1),
         SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE | SYSPROC_BACKUP_DB_ENABLE_LOG_ARCHIVE_NOWAIT => {
            (true, 2)
         }
         _ => {
            return Err(EngineError::new(
               EngineErrorKind::ProcedureFailed,
               format!("unknown procedure: {call}"),
            ));
         }
      };
      if params.len() != expected_params {
         return Err(EngineError::new(
            EngineErrorKind::ProcedureFailed,
            format!(
               "procedure expects {expected_params} parameter(s), got {}",
               params.len()
            ),
         ));
      }
      let ProcedureParam::Text(backup_dir) = params[0] else {
         return Err(EngineError::new(
            EngineErrorKind::ProcedureFailed,
            "first backup parameter must be the target directory",
         ));
      };

      if archive {
         let ProcedureParam::SmallInt(delete_flag) = params[1] else {
            return Err(EngineError::new(
               EngineErrorKind::ProcedureFailed,
               "second backup parameter must be a smallint flag",
            ));
         };
         self.enable_archive_logging(delete_flag != 0)?;
      }
      self.backup(Path::new(backup_dir))
   }

   fn close(&mut self) -> Result<(), EngineError> {
      self.closed = true;
      Ok(())
   }
}

fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
   state.lock().expect("engine state lock poisoned")
}

/// Locates archived statements for roll-forward recovery: first as an
/// on-disk log device directory, then as a memory-database log key.
fn replay_logs(state: &EngineState, restore: &RestoreAttrs) -> Result<Vec<String>, EngineError> {
   let Some(log_device) = &restore.log_device else {
      return Err(EngineError::new(
         EngineErrorKind::RestoreFailed,
         "roll-forward recovery requires a logDevice attribute",
      ));
   };

   let archived_file = log_device.join(ARCHIVED_LOG_FILE);
   if archived_file.is_file() {
      let contents = fs::read_to_string(&archived_file).map_err(io_error)?;
      return Ok(contents.lines().map(str::to_string).collect());
   }

   let key = log_device.display().to_string();
   if let Some(statements) = state.memory_archived.get(&key) {
      return Ok(statements.clone());
   }

   Err(EngineError::new(
      EngineErrorKind::RestoreFailed,
      format!("recovery log device '{}' not found", log_device.display()),
   ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreKind {
   RestoreFrom,
   CreateFrom,
   RollForward,
}

#[derive(Debug)]
struct RestoreAttrs {
   mode: RestoreKind,
   backup_dir: PathBuf,
   log_device: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Attributes {
   create: bool,
   shutdown: bool,
   drop: bool,
   restore: Option<RestoreAttrs>,
}

enum Location {
   System,
   Memory(String),
   Directory(String),
   Jar { archive: PathBuf, db_path: String },
   Classpath(String),
}

fn parse_url(url: &str) -> Result<(Location, Attributes), EngineError> {
   let Some(rest) = url.strip_prefix(DERBY_JDBC_URL_PREFIX) else {
      return Err(EngineError::new(
         EngineErrorKind::InvalidUrl,
         format!("URL must start with '{DERBY_JDBC_URL_PREFIX}': {url}"),
      ));
   };

   let (location_part, attr_part) = match rest.find(';') {
      Some(index) => (&rest[..index], &rest[index + 1..]),
      None => (rest, ""),
   };

   let mut attrs = Attributes::default();
   let mut restore_mode = None;
   let mut backup_dir = None;
   let mut log_device = None;

   for pair in attr_part.split(';').filter(|pair| !pair.is_empty()) {
      let Some((key, value)) = pair.split_once('=') else {
         return Err(EngineError::new(
            EngineErrorKind::InvalidUrl,
            format!("malformed URL attribute '{pair}'"),
         ));
      };
      match key {
         "create" => attrs.create = value == "true",
         "shutdown" => attrs.shutdown = value == "true",
         "drop" => attrs.drop = value == "true",
         "restoreFrom" => {
            restore_mode = Some(RestoreKind::RestoreFrom);
            backup_dir = Some(PathBuf::from(value));
         }
         "createFrom" => {
            restore_mode = Some(RestoreKind::CreateFrom);
            backup_dir = Some(PathBuf::from(value));
         }
         "rollForwardRecoveryFrom" => {
            restore_mode = Some(RestoreKind::RollForward);
            backup_dir = Some(PathBuf::from(value));
         }
         "logDevice" => log_device = Some(PathBuf::from(value)),
         _ => {
            return Err(EngineError::new(
               EngineErrorKind::InvalidUrl,
               format!("unrecognized URL attribute '{key}'"),
            ));
         }
      }
   }

   if let (Some(mode), Some(backup_dir)) = (restore_mode, backup_dir) {
      attrs.restore = Some(RestoreAttrs {
         mode,
         backup_dir,
         log_device,
      });
   }

   let location = if location_part.is_empty() {
      Location::System
   } else if let Some(name) = location_part.strip_prefix("memory:") {
      Location::Memory(name.to_string())
   } else if let Some(path) = location_part.strip_prefix("directory:") {
      Location::Directory(path.to_string())
   } else if let Some(jar) = location_part.strip_prefix("jar:") {
      let Some(inner) = jar.strip_prefix('(') else {
         return Err(jar_location_error(location_part));
      };
      let Some(archive_end) = inner.find(')') else {
         return Err(jar_location_error(location_part));
      };
      Location::Jar {
         archive: PathBuf::from(&inner[..archive_end]),
         db_path: inner[archive_end + 1..].to_string(),
      }
   } else if let Some(path) = location_part.strip_prefix("classpath:") {
      Location::Classpath(path.to_string())
   } else {
      // Bare paths address directory databases, matching the engine default
      Location::Directory(location_part.to_string())
   };

   Ok((location, attrs))
}

fn jar_location_error(location: &str) -> EngineError {
   EngineError::new(
      EngineErrorKind::InvalidUrl,
      format!("jar location must be of the form (archive)path: {location}"),
   )
}

fn materialize_directory_db(dir: &Path, statements: &[String]) -> std::io::Result<()> {
   fs::create_dir_all(dir)?;
   fs::write(dir.join(SERVICE_FILE), b"# derby-fixture simulated database\n")?;
   write_statements(dir, statements)
}

fn write_statements(dir: &Path, statements: &[String]) -> std::io::Result<()> {
   let mut contents = statements.join("\n");
   if !contents.is_empty() {
      contents.push('\n');
   }
   fs::write(dir.join(STATEMENTS_FILE), contents)
}

fn read_statements(dir: &Path) -> std::io::Result<Vec<String>> {
   let contents = fs::read_to_string(dir.join(STATEMENTS_FILE))?;
   Ok(contents.lines().map(str::to_string).collect())
}

fn load_backup(backup_dir: &Path) -> Result<Vec<String>, EngineError> {
   if !backup_dir.join(SERVICE_FILE).exists() {
      return Err(EngineError::new(
         EngineErrorKind::RestoreFailed,
         format!("backup '{}' not found", backup_dir.display()),
      ));
   }
   read_statements(backup_dir).map_err(io_error)
}

fn not_found(protocol: &str, name: &str) -> EngineError {
   EngineError::new(
      EngineErrorKind::DatabaseNotFound,
      format!("database '{protocol}:{name}' not found"),
   )
}

fn already_exists(protocol: &str, name: &str) -> EngineError {
   EngineError::new(
      EngineErrorKind::DatabaseExists,
      format!("database '{protocol}:{name}' already exists"),
   )
}

fn shutdown_signal(location: &str) -> EngineError {
   EngineError::new(
      EngineErrorKind::ShutdownComplete,
      format!("database '{location}' shutdown"),
   )
}

fn io_error(e: std::io::Error) -> EngineError {
   EngineError::new(EngineErrorKind::Io, e.to_string())
}

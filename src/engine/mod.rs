//! Embedded engine seam
//!
//! The fixture drives the engine exclusively through connection URLs and
//! callable procedures, so the whole engine fits behind two small traits.
//! A real embedded engine binding implements them; [`simulated`] provides an
//! in-process double of the instance-management surface for tests.

pub mod simulated;

use thiserror::Error;

/// Classifies engine failures well enough for the fixture's control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
   /// The connection URL did not match the engine's URL grammar
   InvalidUrl,
   /// The addressed database does not exist and no create attribute was given
   DatabaseNotFound,
   /// A create or createFrom attribute addressed an existing database
   DatabaseExists,
   /// Writes were attempted against a read-only (jar/classpath) database
   ReadOnly,
   /// The engine's shutdown protocol signals completion via an error by
   /// design; this kind marks that expected signal
   ShutdownComplete,
   /// A SQL statement was rejected
   StatementFailed,
   /// An administrative procedure call failed
   ProcedureFailed,
   /// A restore/createFrom/roll-forward attribute referenced a bad backup
   /// or log device
   RestoreFailed,
   /// Driver bootstrap failure
   DriverUnavailable,
   /// Filesystem failure underneath the engine
   Io,
}

/// Error raised by an embedded engine, tagged with a SQL-state-like kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
   kind: EngineErrorKind,
   message: String,
}

impl EngineError {
   /// Creates an engine error of the given kind.
   pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
      Self {
         kind,
         message: message.into(),
      }
   }

   /// The failure classification.
   pub fn kind(&self) -> EngineErrorKind {
      self.kind
   }

   /// Whether this error is the engine's expected shutdown-complete signal.
   pub fn is_shutdown_signal(&self) -> bool {
      self.kind == EngineErrorKind::ShutdownComplete
   }
}

/// Parameter passed to an administrative procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureParam<'a> {
   /// A string parameter (e.g. the backup target directory)
   Text(&'a str),
   /// A small integer parameter (e.g. a boolean passed as 0/1)
   SmallInt(i16),
}

/// A live connection to one database instance.
pub trait EngineConnection: Send + std::fmt::Debug {
   /// Executes a single SQL statement.
   fn execute(&mut self, sql: &str) -> Result<(), EngineError>;

   /// Invokes an administrative procedure (a `CALL ...` statement with
   /// positional parameters).
   fn call_procedure(
      &mut self,
      call: &str,
      params: &[ProcedureParam<'_>],
   ) -> Result<(), EngineError>;

   /// Releases the connection.
   fn close(&mut self) -> Result<(), EngineError>;
}

/// An embedded database engine, addressed through connection URLs.
pub trait EmbeddedEngine: Send + Sync {
   /// Loads and initializes the engine driver. Called once per resource
   /// start, before the first connection attempt; repeat calls are no-ops.
   fn boot(&self) -> Result<(), EngineError>;

   /// Opens a connection for the given URL, honoring the URL's create,
   /// restore, shutdown and drop attributes.
   fn connect(&self, url: &str) -> Result<Box<dyn EngineConnection>, EngineError>;
}

/// Shuts down the whole engine system (every open database) and swallows
/// the expected shutdown signal. Useful in teardown paths where a secondary
/// error must not mask the primary failure.
pub fn shutdown_engine_system_quietly(engine: &dyn EmbeddedEngine) {
   match engine.connect("jdbc:derby:;shutdown=true") {
      Ok(mut conn) => {
         // The engine is expected to signal system shutdown via an error
         tracing::debug!("engine system shutdown did not raise the expected signal");
         let _ = conn.close();
      }
      Err(e) if e.is_shutdown_signal() => {}
      Err(e) => tracing::debug!(error = %e, "engine system shutdown reported an error"),
   }
}

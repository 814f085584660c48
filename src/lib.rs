//! Disposable embedded Derby-style databases for tests.
//!
//! The crate manages one database per [`EmbeddedDerbyResource`] through a
//! strict Inactive -> Active -> Inactive lifecycle: starting creates (or
//! restores from backup) the database under a managed system home, closing
//! shuts it down and restores any process-wide state it overrode. The
//! database location is selected through one of four connection-URL
//! sub-protocols (`memory:`, `directory:`, `jar:`, `classpath:`), and live
//! databases can be backed up online through the engine's administrative
//! procedures.
//!
//! The engine itself sits behind the [`engine::EmbeddedEngine`] trait. The
//! bundled [`SimulatedEngine`] implements the engine's instance-management
//! surface in-process, so lifecycle, URL and backup/restore behavior can be
//! exercised without an external database.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use derby_fixture::{
//!    DerbyResourceConfig, EmbeddedDerbyResource, EngineConnection as _, SimulatedEngine,
//! };
//!
//! let engine = Arc::new(SimulatedEngine::new());
//!
//! let mut config = DerbyResourceConfig::default();
//! config.use_in_memory_database_named("testdb")?;
//!
//! let mut resource = EmbeddedDerbyResource::builder(engine)
//!    .config(config)
//!    .build();
//! resource.start()?;
//!
//! let mut conn = resource.open_connection()?;
//! conn.execute("CREATE TABLE contacts (id INT, email VARCHAR(64))")?;
//! conn.close()?;
//!
//! resource.close();
//! # Ok::<(), derby_fixture::Error>(())
//! ```

mod backup;
mod config;
pub mod constants;
mod datasource;
pub mod engine;
mod env;
mod error;
mod protocol;
mod resource;
mod script;
pub mod url;

pub use config::{DerbyResourceConfig, ErrorLoggingMode, RestoreSpec};
pub use datasource::{DataSourceKind, EmbeddedDataSource};
pub use engine::simulated::SimulatedEngine;
pub use engine::{EmbeddedEngine, EngineConnection, EngineError, EngineErrorKind};
pub use env::{Environment, MemoryEnvironment, SystemProperties};
pub use error::Error;
pub use protocol::{RestoreMode, SubProtocol};
pub use resource::{EmbeddedDerbyResource, EmbeddedDerbyResourceBuilder};
pub use script::ScriptRunner;

/// Convenience alias for `Result<T, derby_fixture::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

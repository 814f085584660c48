//! Embedded Derby resource lifecycle
//!
//! [`EmbeddedDerbyResource`] owns one database instance through a strict
//! Inactive -> Active -> Inactive lifecycle. Starting materializes the
//! system home directory, saves and overrides the process-wide system home
//! property, writes the engine properties file, boots the driver, opens the
//! database with the create/restore URL and runs any configured post-init
//! scripts. Closing shuts the database down (dropping it for the in-memory
//! sub-protocol), restores the saved system home property and returns the
//! resource to inactive. Closing never raises; teardown paths must not mask
//! a primary test failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tempfile::TempDir;

use crate::config::{DerbyResourceConfig, ErrorLoggingMode};
use crate::constants::{
   DEFAULT_ERROR_LOG_FILE, DERBY_PROPERTIES_FILE, DEV_NULL_FIELD_ID, PROP_DERBY_STREAM_ERROR_FIELD,
   PROP_DERBY_STREAM_ERROR_FILE, PROP_DERBY_SYSTEM_HOME,
};
use crate::datasource::EmbeddedDataSource;
use crate::engine::{EmbeddedEngine, EngineConnection};
use crate::env::{Environment, SystemProperties};
use crate::error::Error;
use crate::script::ScriptRunner;
use crate::url;
use crate::Result;

/// Builder for [`EmbeddedDerbyResource`]. Everything except the engine has
/// a default: a fresh default config, the shared process-wide environment,
/// a temporary system home created at start, and no script resource roots.
pub struct EmbeddedDerbyResourceBuilder {
   config: DerbyResourceConfig,
   engine: Arc<dyn EmbeddedEngine>,
   env: Arc<dyn Environment>,
   system_home: Option<PathBuf>,
   script_resource_roots: Vec<PathBuf>,
}

impl EmbeddedDerbyResourceBuilder {
   /// Uses the given resource configuration.
   pub fn config(mut self, config: DerbyResourceConfig) -> Self {
      self.config = config;
      self
   }

   /// Observes process-wide properties through the given environment instead
   /// of the shared [`SystemProperties`] map.
   pub fn environment(mut self, env: Arc<dyn Environment>) -> Self {
      self.env = env;
      self
   }

   /// Uses the given directory as the engine system home instead of a
   /// temporary directory. The directory is created at start if missing and
   /// is not removed at close.
   pub fn system_home(mut self, home: impl Into<PathBuf>) -> Self {
      self.system_home = Some(home.into());
      self
   }

   /// Adds a directory that `classpath:` post-init script locators resolve
   /// against.
   pub fn script_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
      self.script_resource_roots.push(root.into());
      self
   }

   /// Builds the resource in the inactive state.
   pub fn build(self) -> EmbeddedDerbyResource {
      let jdbc_url = url::build_jdbc_url(&self.config);
      EmbeddedDerbyResource {
         config: self.config,
         engine: self.engine,
         env: self.env,
         jdbc_url,
         provided_home: self.system_home,
         script_resource_roots: self.script_resource_roots,
         temp_home: None,
         system_home: None,
         saved_home: None,
         active: false,
         data_source: OnceLock::new(),
         pool_data_source: OnceLock::new(),
         xa_data_source: OnceLock::new(),
      }
   }
}

/// A disposable embedded Derby database with a managed lifecycle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use derby_fixture::{DerbyResourceConfig, EmbeddedDerbyResource, SimulatedEngine};
///
/// let engine = Arc::new(SimulatedEngine::new());
/// let mut resource = EmbeddedDerbyResource::builder(engine)
///    .config(DerbyResourceConfig::default())
///    .build();
///
/// resource.start()?;
/// assert!(resource.jdbc_url()?.starts_with("jdbc:derby:memory:"));
/// resource.close();
/// # Ok::<(), derby_fixture::Error>(())
/// ```
pub struct EmbeddedDerbyResource {
   config: DerbyResourceConfig,
   engine: Arc<dyn EmbeddedEngine>,
   env: Arc<dyn Environment>,
   jdbc_url: String,
   provided_home: Option<PathBuf>,
   script_resource_roots: Vec<PathBuf>,
   /// Guard keeping a temporary system home alive until drop
   temp_home: Option<TempDir>,
   /// Resolved system home, present from the first start onwards
   system_home: Option<PathBuf>,
   /// System home property value observed at start, restored at close
   saved_home: Option<String>,
   active: bool,
   pub(crate) data_source: OnceLock<Arc<EmbeddedDataSource>>,
   pub(crate) pool_data_source: OnceLock<Arc<EmbeddedDataSource>>,
   pub(crate) xa_data_source: OnceLock<Arc<EmbeddedDataSource>>,
}

impl EmbeddedDerbyResource {
   /// Starts building a resource around the given engine.
   pub fn builder(engine: Arc<dyn EmbeddedEngine>) -> EmbeddedDerbyResourceBuilder {
      EmbeddedDerbyResourceBuilder {
         config: DerbyResourceConfig::default(),
         engine,
         env: Arc::new(SystemProperties),
         system_home: None,
         script_resource_roots: Vec::new(),
      }
   }

   /// Starts the resource: creates the system home, points the engine at
   /// it, boots the driver and opens (creating or restoring) the database.
   ///
   /// Starting an already active resource is a no-op. A failure before the
   /// database opens restores the saved system home property and leaves the
   /// resource inactive; a post-init script failure leaves the resource
   /// active so the caller can inspect and close it.
   pub fn start(&mut self) -> Result<()> {
      if self.active {
         tracing::debug!(url = %self.jdbc_url, "resource already active");
         return Ok(());
      }

      let home = self.materialize_system_home()?;
      fs::create_dir_all(&home)?;

      self.saved_home = self.env.get(PROP_DERBY_SYSTEM_HOME);
      self.env.set(PROP_DERBY_SYSTEM_HOME, &home.display().to_string());

      if let Err(e) = self.open_database(&home) {
         self.restore_home_property();
         return Err(e);
      }
      self.active = true;
      tracing::debug!(url = %self.jdbc_url, home = %home.display(), "resource started");

      self.run_post_init_scripts(&home)
   }

   fn open_database(&mut self, home: &Path) -> Result<()> {
      self.write_properties_file(home)?;
      self.engine.boot().map_err(Error::DriverInit)?;

      let create_url = url::build_create_url(&self.config, &self.jdbc_url);
      let mut conn = self.engine.connect(&create_url)?;
      conn.close()?;
      Ok(())
   }

   fn write_properties_file(&self, home: &Path) -> Result<()> {
      let contents = match self.config.error_logging_mode() {
         ErrorLoggingMode::Null => {
            format!("{PROP_DERBY_STREAM_ERROR_FIELD}={DEV_NULL_FIELD_ID}\n")
         }
         ErrorLoggingMode::Default => {
            format!("{PROP_DERBY_STREAM_ERROR_FILE}={DEFAULT_ERROR_LOG_FILE}\n")
         }
      };
      fs::write(home.join(DERBY_PROPERTIES_FILE), contents)?;
      Ok(())
   }

   fn run_post_init_scripts(&mut self, home: &Path) -> Result<()> {
      if self.config.post_init_scripts().is_empty() {
         return Ok(());
      }

      let mut conn = self.engine.connect(&self.jdbc_url)?;
      let result = self.execute_scripts(conn.as_mut(), home);
      if let Err(e) = conn.close() {
         tracing::warn!(error = %e, "closing post-init connection failed");
      }
      result
   }

   fn execute_scripts(&self, conn: &mut dyn EngineConnection, home: &Path) -> Result<()> {
      for (index, script) in self.config.post_init_scripts().iter().enumerate() {
         let log_file = home.join(format!("post-init-{index}-{}.log", sanitize(script)));
         let mut runner = ScriptRunner::new();
         runner.log_to(&log_file);
         for root in &self.script_resource_roots {
            runner.add_resource_root(root.clone());
         }

         match runner.run(conn, script) {
            Ok(0) => {}
            Ok(errors) => {
               return Err(Error::InitScript {
                  script: script.clone(),
                  detail: format!("{errors} statement(s) failed"),
                  log_file: Some(log_file),
               });
            }
            Err(e) => {
               return Err(Error::InitScript {
                  script: script.clone(),
                  detail: e.to_string(),
                  log_file: None,
               });
            }
         }
      }
      Ok(())
   }

   /// Closes the resource: shuts the database down (dropping in-memory
   /// databases), restores the saved system home property and marks the
   /// resource inactive. Never raises; failures are logged and swallowed.
   /// Closing an inactive resource is a no-op.
   pub fn close(&mut self) {
      if !self.active {
         return;
      }

      let shutdown_url = url::build_shutdown_url(&self.config, &self.jdbc_url);
      match self.engine.connect(&shutdown_url) {
         // Shutdown completion is reported through an error by protocol
         Err(e) if e.is_shutdown_signal() => {
            tracing::debug!(url = %shutdown_url, "database shut down");
         }
         Err(e) => {
            tracing::warn!(url = %shutdown_url, error = %e, "database shutdown reported an error");
         }
         Ok(mut conn) => {
            tracing::warn!(url = %shutdown_url, "shutdown did not raise the expected signal");
            if let Err(e) = conn.close() {
               tracing::warn!(error = %e, "closing shutdown connection failed");
            }
         }
      }

      self.restore_home_property();
      self.active = false;
   }

   /// Whether the resource is currently active.
   pub fn is_active(&self) -> bool {
      self.active
   }

   /// The resource configuration.
   pub fn config(&self) -> &DerbyResourceConfig {
      &self.config
   }

   /// The connection URL of the managed database. Only available while the
   /// resource is active.
   pub fn jdbc_url(&self) -> Result<&str> {
      self.ensure_active("jdbc_url")?;
      Ok(&self.jdbc_url)
   }

   /// The engine system home directory. Only available while the resource
   /// is active.
   pub fn derby_system_home(&self) -> Result<&Path> {
      self.ensure_active("derby_system_home")?;
      // system_home is resolved before the resource can become active
      match &self.system_home {
         Some(home) => Ok(home),
         None => Err(Error::NotActive {
            operation: "derby_system_home",
         }),
      }
   }

   /// Opens a fresh connection to the managed database. Only available
   /// while the resource is active; the caller owns closing the connection.
   pub fn open_connection(&self) -> Result<Box<dyn EngineConnection>> {
      self.ensure_active("open_connection")?;
      Ok(self.engine.connect(&self.jdbc_url)?)
   }

   pub(crate) fn engine(&self) -> &Arc<dyn EmbeddedEngine> {
      &self.engine
   }

   pub(crate) fn ensure_active(&self, operation: &'static str) -> Result<()> {
      if !self.active {
         return Err(Error::NotActive { operation });
      }
      Ok(())
   }

   fn materialize_system_home(&mut self) -> Result<PathBuf> {
      if let Some(home) = &self.system_home {
         return Ok(home.clone());
      }

      let home = match &self.provided_home {
         Some(home) => home.clone(),
         None => {
            let temp = tempfile::Builder::new().prefix("derby-fixture-").tempdir()?;
            let home = temp.path().to_path_buf();
            self.temp_home = Some(temp);
            home
         }
      };
      self.system_home = Some(home.clone());
      Ok(home)
   }

   fn restore_home_property(&mut self) {
      match self.saved_home.take() {
         Some(previous) if !previous.is_empty() => {
            self.env.set(PROP_DERBY_SYSTEM_HOME, &previous);
         }
         _ => self.env.clear(PROP_DERBY_SYSTEM_HOME),
      }
   }
}

impl Drop for EmbeddedDerbyResource {
   fn drop(&mut self) {
      self.close();
   }
}

/// Reduces a script locator to a filesystem-safe log file stem.
fn sanitize(locator: &str) -> String {
   locator
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
      .collect()
}

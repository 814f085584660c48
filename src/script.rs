//! SQL script execution against a freshly started database
//!
//! Scripts are addressed by locator strings: a `file:` prefix or a bare
//! filesystem path reads from disk, and a `classpath:` prefix resolves the
//! remainder against resource roots registered on the runner. Remote `http:`
//! and `https:` locators are rejected.
//!
//! Statement failures do not abort the run; the runner executes every
//! statement, records each outcome in an optional log file, and reports the
//! failure count to the caller.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::engine::EngineConnection;
use crate::Result;

/// Runs `;`-separated SQL scripts over an open engine connection.
#[derive(Debug, Default)]
pub struct ScriptRunner {
   resource_roots: Vec<PathBuf>,
   log_file: Option<PathBuf>,
}

impl ScriptRunner {
   /// Creates a runner with no resource roots and no outcome log.
   pub fn new() -> Self {
      Self::default()
   }

   /// Adds a directory that `classpath:` locators resolve against, searched
   /// in registration order.
   pub fn add_resource_root(&mut self, root: impl Into<PathBuf>) -> &mut Self {
      self.resource_roots.push(root.into());
      self
   }

   /// Appends per-statement outcomes to the given file.
   pub fn log_to(&mut self, log_file: impl Into<PathBuf>) -> &mut Self {
      self.log_file = Some(log_file.into());
      self
   }

   /// Reads the script behind `locator` and executes its statements in
   /// order. Returns the number of failed statements; reading the script
   /// itself is the only fatal failure.
   pub fn run(&self, conn: &mut dyn EngineConnection, locator: &str) -> Result<usize> {
      let script = self.read_script(locator)?;
      let mut log = match &self.log_file {
         Some(path) => Some(
            fs::OpenOptions::new()
               .create(true)
               .append(true)
               .open(path)?,
         ),
         None => None,
      };

      let mut errors = 0;
      for statement in split_statements(&script) {
         match conn.execute(&statement) {
            Ok(()) => {
               if let Some(log) = &mut log {
                  writeln!(log, "OK: {statement}")?;
               }
            }
            Err(e) => {
               errors += 1;
               tracing::debug!(statement, error = %e, "script statement failed");
               if let Some(log) = &mut log {
                  writeln!(log, "ERROR: {statement} [{e}]")?;
               }
            }
         }
      }

      if let Some(log) = &mut log {
         writeln!(log, "DONE: {locator} ({errors} error(s))")?;
      }
      Ok(errors)
   }

   fn read_script(&self, locator: &str) -> Result<String> {
      if let Some(path) = locator.strip_prefix("file:") {
         return Ok(fs::read_to_string(path)?);
      }
      if let Some(path) = locator.strip_prefix("classpath:") {
         return self.read_from_resource_roots(path, locator);
      }
      if locator.starts_with("http:") || locator.starts_with("https:") {
         return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("remote script locators are not supported: {locator}"),
         )
         .into());
      }
      Ok(fs::read_to_string(locator)?)
   }

   fn read_from_resource_roots(&self, path: &str, locator: &str) -> Result<String> {
      let relative = Path::new(path.trim_start_matches('/'));
      for root in &self.resource_roots {
         let candidate = root.join(relative);
         if candidate.is_file() {
            return Ok(fs::read_to_string(candidate)?);
         }
      }
      Err(std::io::Error::new(
         std::io::ErrorKind::NotFound,
         format!("script not found in any resource root: {locator}"),
      )
      .into())
   }
}

/// Splits a script on `;`, dropping `--` line comments and blank chunks.
fn split_statements(script: &str) -> Vec<String> {
   script
      .split(';')
      .map(|chunk| {
         chunk
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect::<Vec<_>>()
            .join(" ")
      })
      .filter(|statement| !statement.is_empty())
      .collect()
}

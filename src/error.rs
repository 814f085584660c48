//! Error types for derby-fixture

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Errors that may occur when configuring or driving an embedded Derby resource
#[derive(Error, Debug)]
pub enum Error {
   /// A required configuration argument was missing or empty. The config is
   /// left untouched when this is raised.
   #[error("{name} is required and cannot be null or empty")]
   InvalidArgument {
      /// Human readable name of the offending argument
      name: &'static str,
   },

   /// An operation requiring an active resource was invoked while inactive
   #[error("embedded Derby resource is not active (attempted: {operation})")]
   NotActive {
      /// The operation that was attempted
      operation: &'static str,
   },

   /// IO error creating the system home, writing the properties file, or
   /// reading a post-init script. Standard library IO errors are converted
   /// to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// The embedded engine driver could not be loaded or initialized
   #[error("embedded driver initialization failed: {0}")]
   DriverInit(#[source] EngineError),

   /// Error from the embedded engine. Engine errors surfaced through
   /// connection attempts or administrative procedures are converted to
   /// this variant.
   #[error("engine error: {0}")]
   Engine(#[from] EngineError),

   /// A post-init script reported a non-zero error count or could not be
   /// read. The resource stays active when this is raised; callers must
   /// still close it.
   #[error("post-init script '{script}' failed: {detail}")]
   InitScript {
      /// Locator of the failing script
      script: String,
      /// Failure summary (error count or read failure)
      detail: String,
      /// Script execution log, when one was written
      log_file: Option<PathBuf>,
   },
}

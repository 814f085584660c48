//! Datasource handles for an active database
//!
//! A datasource addresses the database by name (sub-protocol prefix plus
//! location) rather than by full connection URL, mirroring how embedded
//! drivers configure plain, pooled and XA datasources. The three kinds
//! share one representation here; the kind tags which driver-side flavor a
//! handle stands for.

use std::sync::Arc;

use crate::constants::DERBY_JDBC_URL_PREFIX;
use crate::engine::{EmbeddedEngine, EngineConnection};
use crate::resource::EmbeddedDerbyResource;
use crate::url;
use crate::Result;

/// Which driver-side datasource flavor a handle stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
   /// A plain embedded datasource
   Plain,
   /// A connection-pooling datasource
   ConnectionPool,
   /// An XA (distributed transaction) datasource
   Xa,
}

/// A handle that opens connections to one database by name.
pub struct EmbeddedDataSource {
   database_name: String,
   kind: DataSourceKind,
   engine: Arc<dyn EmbeddedEngine>,
}

impl EmbeddedDataSource {
   /// The configured database name, including the sub-protocol prefix
   /// (e.g. `memory:testdb` or `jar:(dbs.jar)/products/sample`).
   pub fn database_name(&self) -> &str {
      &self.database_name
   }

   /// The datasource flavor.
   pub fn kind(&self) -> DataSourceKind {
      self.kind
   }

   /// Opens a connection to the named database. The caller owns closing it.
   pub fn connection(&self) -> Result<Box<dyn EngineConnection>> {
      let url = format!("{DERBY_JDBC_URL_PREFIX}{}", self.database_name);
      Ok(self.engine.connect(&url)?)
   }
}

impl EmbeddedDerbyResource {
   /// A plain datasource for the managed database. With `cached` the same
   /// handle is returned on every call; otherwise each call builds a fresh
   /// one. The resource must be active.
   pub fn data_source(&self, cached: bool) -> Result<Arc<EmbeddedDataSource>> {
      self.ensure_active("data_source")?;
      Ok(self.datasource_slot(DataSourceKind::Plain, cached))
   }

   /// A connection-pooling datasource for the managed database; see
   /// [`data_source`](Self::data_source) for caching semantics.
   pub fn connection_pool_data_source(&self, cached: bool) -> Result<Arc<EmbeddedDataSource>> {
      self.ensure_active("connection_pool_data_source")?;
      Ok(self.datasource_slot(DataSourceKind::ConnectionPool, cached))
   }

   /// An XA datasource for the managed database; see
   /// [`data_source`](Self::data_source) for caching semantics.
   pub fn xa_data_source(&self, cached: bool) -> Result<Arc<EmbeddedDataSource>> {
      self.ensure_active("xa_data_source")?;
      Ok(self.datasource_slot(DataSourceKind::Xa, cached))
   }

   fn datasource_slot(&self, kind: DataSourceKind, cached: bool) -> Arc<EmbeddedDataSource> {
      let build = || {
         Arc::new(EmbeddedDataSource {
            database_name: url::build_datasource_database_name(self.config()),
            kind,
            engine: Arc::clone(self.engine()),
         })
      };
      if !cached {
         return build();
      }
      let slot = match kind {
         DataSourceKind::Plain => &self.data_source,
         DataSourceKind::ConnectionPool => &self.pool_data_source,
         DataSourceKind::Xa => &self.xa_data_source,
      };
      Arc::clone(slot.get_or_init(build))
   }
}

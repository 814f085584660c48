//! Connection URL and datasource name construction
//!
//! Pure string assembly for each lifecycle phase. Nothing here can fail; a
//! config that would produce a malformed URL (for example a roll-forward
//! restore without a log device) is unrepresentable upstream in
//! [`DerbyResourceConfig`].

use crate::config::DerbyResourceConfig;
use crate::constants::{
   URL_ATTR_CREATE, URL_ATTR_DROP, URL_ATTR_EQUAL, URL_ATTR_LOG_DEVICE, URL_ATTR_SEPARATOR,
   URL_ATTR_SHUTDOWN,
};
use crate::protocol::SubProtocol;

/// Appends the database location suffix: `[ (archiveFile) ] + databasePath`.
fn append_db_location(target: &mut String, config: &DerbyResourceConfig) {
   if let Some(jar_file) = config.jar_file() {
      target.push('(');
      target.push_str(jar_file);
      target.push(')');
   }
   target.push_str(config.database_path());
}

/// Builds the stable "plain" connection URL for the configured database,
/// independent of create/shutdown attributes.
pub fn build_jdbc_url(config: &DerbyResourceConfig) -> String {
   let mut url = config.sub_protocol().jdbc_connection_prefix();
   append_db_location(&mut url, config);
   url
}

/// Builds the database name used to configure datasources: the datasource
/// prefix followed by the same location suffix as the connection URL.
pub fn build_datasource_database_name(config: &DerbyResourceConfig) -> String {
   let mut name = config.sub_protocol().datasource_database_name_prefix();
   append_db_location(&mut name, config);
   name
}

/// Builds the connection URL used to open or initialize the database.
///
/// Restore attributes take precedence over the create flag. Otherwise
/// `create=true` is appended for memory databases, and for directory
/// databases unless the config skips it; jar and classpath databases address
/// pre-existing read-only archives and never receive a create flag.
pub fn build_create_url(config: &DerbyResourceConfig, jdbc_url: &str) -> String {
   let mut url = jdbc_url.to_string();

   if let Some(restore) = config.restore() {
      url.push(URL_ATTR_SEPARATOR);
      url.push_str(restore.mode().url_attribute());
      url.push(URL_ATTR_EQUAL);
      url.push_str(&restore.backup_dir().display().to_string());

      if let Some(log_device) = restore.log_device() {
         url.push(URL_ATTR_SEPARATOR);
         url.push_str(URL_ATTR_LOG_DEVICE);
         url.push(URL_ATTR_EQUAL);
         url.push_str(&log_device.display().to_string());
      }
      return url;
   }

   let create = match config.sub_protocol() {
      SubProtocol::Memory => true,
      SubProtocol::Directory => !config.directory_skip_create(),
      SubProtocol::Jar | SubProtocol::Classpath => false,
   };
   if create {
      url.push_str(URL_ATTR_CREATE);
   }
   url
}

/// Builds the connection URL used to tear the database down. In-memory
/// databases are reclaimed by dropping them; every other sub-protocol gets a
/// plain shutdown.
pub fn build_shutdown_url(config: &DerbyResourceConfig, jdbc_url: &str) -> String {
   let attribute = match config.sub_protocol() {
      SubProtocol::Memory => URL_ATTR_DROP,
      _ => URL_ATTR_SHUTDOWN,
   };
   format!("{jdbc_url}{attribute}")
}

#[cfg(test)]
mod tests {
   use super::*;

   fn memory_config(name: &str) -> DerbyResourceConfig {
      let mut config = DerbyResourceConfig::default();
      config.use_in_memory_database_named(name).unwrap();
      config
   }

   #[test]
   fn plain_url_for_each_sub_protocol() {
      let config = memory_config("testdb");
      assert_eq!(build_jdbc_url(&config), "jdbc:derby:memory:testdb");

      let mut config = DerbyResourceConfig::default();
      config.use_database_in_directory_at("dbs/sample", false).unwrap();
      assert_eq!(build_jdbc_url(&config), "jdbc:derby:directory:dbs/sample");

      let mut config = DerbyResourceConfig::default();
      config.use_jar_sub_protocol("dbs.jar", "/products/sample").unwrap();
      assert_eq!(
         build_jdbc_url(&config),
         "jdbc:derby:jar:(dbs.jar)/products/sample"
      );

      let mut config = DerbyResourceConfig::default();
      config.use_classpath_sub_protocol("/products/sample").unwrap();
      assert_eq!(
         build_jdbc_url(&config),
         "jdbc:derby:classpath:/products/sample"
      );
   }

   #[test]
   fn datasource_name_uses_datasource_prefix() {
      let config = memory_config("testdb");
      assert_eq!(build_datasource_database_name(&config), "memory:testdb");

      let mut config = DerbyResourceConfig::default();
      config.use_jar_sub_protocol("dbs.jar", "/products/sample").unwrap();
      assert_eq!(
         build_datasource_database_name(&config),
         "jar:(dbs.jar)/products/sample"
      );
   }

   #[test]
   fn create_url_appends_create_flag_for_memory() {
      let config = memory_config("testdb");
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_create_url(&config, &url),
         "jdbc:derby:memory:testdb;create=true"
      );
   }

   #[test]
   fn create_url_respects_directory_skip_create() {
      let mut config = DerbyResourceConfig::default();
      config.use_database_in_directory_at("dbs/sample", false).unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_create_url(&config, &url),
         "jdbc:derby:directory:dbs/sample;create=true"
      );

      config.use_database_in_directory_at("dbs/sample", true).unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(build_create_url(&config, &url), "jdbc:derby:directory:dbs/sample");
   }

   #[test]
   fn read_only_protocols_never_get_a_create_flag() {
      let mut config = DerbyResourceConfig::default();
      config.use_jar_sub_protocol("dbs.jar", "/products/sample").unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(build_create_url(&config, &url), url);

      config.use_classpath_sub_protocol("/products/sample").unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(build_create_url(&config, &url), url);
   }

   #[test]
   fn restore_attributes_take_precedence_over_create() {
      let mut config = memory_config("testdb");
      config.create_database_from("backups/testdb").unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_create_url(&config, &url),
         "jdbc:derby:memory:testdb;createFrom=backups/testdb"
      );

      config.restore_database_from("backups/testdb").unwrap();
      assert_eq!(
         build_create_url(&config, &url),
         "jdbc:derby:memory:testdb;restoreFrom=backups/testdb"
      );
   }

   #[test]
   fn roll_forward_recovery_appends_log_device() {
      let mut config = DerbyResourceConfig::default();
      config
         .use_database_in_directory_at("dbs/sample", false)
         .unwrap()
         .recover_database_from("backups/sample", "backups/logs")
         .unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_create_url(&config, &url),
         "jdbc:derby:directory:dbs/sample;rollForwardRecoveryFrom=backups/sample;logDevice=backups/logs"
      );
   }

   #[test]
   fn shutdown_url_drops_memory_and_shuts_down_the_rest() {
      let config = memory_config("testdb");
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_shutdown_url(&config, &url),
         "jdbc:derby:memory:testdb;drop=true"
      );

      let mut config = DerbyResourceConfig::default();
      config.use_database_in_directory_at("dbs/sample", false).unwrap();
      let url = build_jdbc_url(&config);
      assert_eq!(
         build_shutdown_url(&config, &url),
         "jdbc:derby:directory:dbs/sample;shutdown=true"
      );
   }
}

//! Resource lifecycle integration tests
//!
//! Exercise the Inactive -> Active -> Inactive state machine end to end
//! against the simulated engine: starting, accessor gating, system home
//! property save/restore, the four sub-protocols and post-init scripts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use derby_fixture::engine::EngineErrorKind;
use derby_fixture::{
   DerbyResourceConfig, EmbeddedDerbyResource, Environment, Error,
   MemoryEnvironment, SimulatedEngine,
};

fn fixture() -> (Arc<SimulatedEngine>, Arc<MemoryEnvironment>) {
   let env = Arc::new(MemoryEnvironment::new());
   let engine = Arc::new(SimulatedEngine::with_environment(env.clone()));
   (engine, env)
}

fn build(
   engine: &Arc<SimulatedEngine>,
   env: &Arc<MemoryEnvironment>,
   config: DerbyResourceConfig,
) -> EmbeddedDerbyResource {
   EmbeddedDerbyResource::builder(engine.clone())
      .environment(env.clone())
      .config(config)
      .build()
}

#[test]
fn in_memory_database_happy_path() {
   let (engine, env) = fixture();
   let mut config = DerbyResourceConfig::default();
   config.use_in_memory_database_named("happy").unwrap();
   let mut resource = build(&engine, &env, config);

   assert!(!resource.is_active());
   resource.start().unwrap();
   assert!(resource.is_active());
   assert_eq!(resource.jdbc_url().unwrap(), "jdbc:derby:memory:happy");
   assert!(engine.has_memory_database("happy"));

   let home = resource.derby_system_home().unwrap().to_path_buf();
   assert!(home.is_dir());
   assert!(home.join("derby.properties").is_file());
   assert_eq!(
      env.get("derby.system.home"),
      Some(home.display().to_string())
   );

   let mut conn = resource.open_connection().unwrap();
   conn.execute("CREATE TABLE contacts (id INT, email VARCHAR(64))")
      .unwrap();
   conn.execute("INSERT INTO contacts VALUES (1, 'a@example.com')")
      .unwrap();
   conn.close().unwrap();

   resource.close();
   assert!(!resource.is_active());
   // In-memory databases are dropped at close
   assert!(!engine.has_memory_database("happy"));
}

#[test]
fn accessors_are_gated_on_the_active_state() {
   let (engine, env) = fixture();
   let mut resource = build(&engine, &env, DerbyResourceConfig::default());

   assert!(matches!(
      resource.jdbc_url(),
      Err(Error::NotActive {
         operation: "jdbc_url"
      })
   ));
   assert!(matches!(
      resource.derby_system_home(),
      Err(Error::NotActive { .. })
   ));

   resource.start().unwrap();
   assert!(resource.jdbc_url().is_ok());
   resource.close();

   assert!(matches!(resource.jdbc_url(), Err(Error::NotActive { .. })));
   assert!(matches!(
      resource.open_connection(),
      Err(Error::NotActive { .. })
   ));
}

#[test]
fn close_is_a_no_op_when_inactive_and_start_is_idempotent() {
   let (engine, env) = fixture();
   let mut resource = build(&engine, &env, DerbyResourceConfig::default());

   // Closing before the first start must not disturb anything
   resource.close();
   assert!(!resource.is_active());

   resource.start().unwrap();
   resource.start().unwrap();
   assert!(resource.is_active());
   resource.close();
   resource.close();
   assert!(!resource.is_active());
}

#[test]
fn system_home_property_is_saved_and_restored() {
   let (engine, env) = fixture();
   env.set("derby.system.home", "/srv/previous-home");

   let mut resource = build(&engine, &env, DerbyResourceConfig::default());
   resource.start().unwrap();
   let during = env.get("derby.system.home").unwrap();
   assert_ne!(during, "/srv/previous-home");

   resource.close();
   assert_eq!(
      env.get("derby.system.home"),
      Some("/srv/previous-home".to_string())
   );
}

#[test]
fn system_home_property_is_cleared_when_previously_unset() {
   let (engine, env) = fixture();
   assert_eq!(env.get("derby.system.home"), None);

   let mut resource = build(&engine, &env, DerbyResourceConfig::default());
   resource.start().unwrap();
   assert!(env.get("derby.system.home").is_some());

   resource.close();
   assert_eq!(env.get("derby.system.home"), None);
}

#[test]
fn directory_database_is_created_under_the_system_home() {
   let (engine, env) = fixture();
   let mut config = DerbyResourceConfig::default();
   config.use_database_in_directory().use_default_error_logging();
   let db_name = config.database_path().to_string();

   let mut resource = build(&engine, &env, config);
   resource.start().unwrap();

   let home = resource.derby_system_home().unwrap().to_path_buf();
   assert!(home.join(&db_name).join("service.properties").is_file());

   resource.close();
   // Directory databases survive shutdown on disk
   assert!(home.join(&db_name).join("service.properties").is_file());
}

#[test]
fn creating_over_an_existing_directory_database_fails() {
   let (engine, env) = fixture();
   let home = tempfile::tempdir().unwrap();

   let mut config = DerbyResourceConfig::default();
   config.use_database_in_directory_at("dup", false).unwrap();

   let mut first = EmbeddedDerbyResource::builder(engine.clone())
      .environment(env.clone())
      .config(config.clone())
      .system_home(home.path())
      .build();
   first.start().unwrap();
   first.close();

   let mut second = EmbeddedDerbyResource::builder(engine.clone())
      .environment(env.clone())
      .config(config.clone())
      .system_home(home.path())
      .build();
   match second.start() {
      Err(Error::Engine(e)) => assert_eq!(e.kind(), EngineErrorKind::DatabaseExists),
      other => panic!("expected a database-exists engine error, got {other:?}"),
   }
   assert!(!second.is_active());
   // The failed start must have restored the saved home property
   assert_eq!(env.get("derby.system.home"), None);

   // Skipping the create attribute opens the existing database instead
   config.use_database_in_directory_at("dup", true).unwrap();
   let mut third = EmbeddedDerbyResource::builder(engine)
      .environment(env)
      .config(config)
      .system_home(home.path())
      .build();
   third.start().unwrap();
   third.close();
}

#[test]
fn properties_file_reflects_the_error_logging_mode() {
   let (engine, env) = fixture();

   let mut config = DerbyResourceConfig::default();
   config.use_dev_null_error_logging();
   let mut resource = build(&engine, &env, config);
   resource.start().unwrap();
   let contents =
      fs::read_to_string(resource.derby_system_home().unwrap().join("derby.properties")).unwrap();
   assert_eq!(
      contents,
      "derby.stream.error.field=derby_fixture::DEV_NULL\n"
   );
   resource.close();

   let mut resource = build(&engine, &env, DerbyResourceConfig::default());
   resource.start().unwrap();
   let contents =
      fs::read_to_string(resource.derby_system_home().unwrap().join("derby.properties")).unwrap();
   assert_eq!(contents, "derby.stream.error.file=derby.log\n");
   resource.close();
}

#[test]
fn post_init_scripts_run_in_order_against_the_fresh_database() {
   let (engine, env) = fixture();
   let scripts = tempfile::tempdir().unwrap();
   let first = scripts.path().join("schema.sql");
   let second = scripts.path().join("seed.sql");
   fs::write(&first, "CREATE TABLE t (id INT);\n").unwrap();
   fs::write(&second, "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\n").unwrap();

   let mut config = DerbyResourceConfig::default();
   config
      .use_in_memory_database_named("seeded")
      .unwrap()
      .add_post_init_script(format!("file:{}", first.display()))
      .unwrap()
      .add_post_init_script(format!("file:{}", second.display()))
      .unwrap();

   let mut resource = build(&engine, &env, config);
   resource.start().unwrap();

   assert_eq!(
      engine.memory_database_statements("seeded").unwrap(),
      [
         "CREATE TABLE t (id INT)",
         "INSERT INTO t VALUES (1)",
         "INSERT INTO t VALUES (2)"
      ]
   );
   // Each script leaves an outcome log in the system home
   let home = resource.derby_system_home().unwrap();
   let logs: Vec<_> = fs::read_dir(home)
      .unwrap()
      .filter_map(|entry| entry.ok())
      .filter(|entry| {
         entry
            .file_name()
            .to_string_lossy()
            .starts_with("post-init-")
      })
      .collect();
   assert_eq!(logs.len(), 2);

   resource.close();
}

#[test]
fn failing_post_init_script_leaves_the_resource_active() {
   let (engine, env) = fixture();
   let scripts = tempfile::tempdir().unwrap();
   let bad = scripts.path().join("bad.sql");
   fs::write(&bad, "CREATE TABLE t (id INT);\nBOGUS STATEMENT;\n").unwrap();

   let mut config = DerbyResourceConfig::default();
   config
      .use_in_memory_database_named("partial")
      .unwrap()
      .add_post_init_script(format!("file:{}", bad.display()))
      .unwrap();

   let mut resource = build(&engine, &env, config);
   match resource.start() {
      Err(Error::InitScript {
         detail, log_file, ..
      }) => {
         assert_eq!(detail, "1 statement(s) failed");
         assert!(log_file.is_some_and(|log| log.is_file()));
      }
      other => panic!("expected an init-script error, got {other:?}"),
   }

   // The database is up and the valid statements were applied
   assert!(resource.is_active());
   assert_eq!(
      engine.memory_database_statements("partial").unwrap(),
      ["CREATE TABLE t (id INT)"]
   );
   resource.close();
   assert!(!engine.has_memory_database("partial"));
}

#[test]
fn missing_post_init_script_fails_without_an_outcome_log() {
   let (engine, env) = fixture();
   let mut config = DerbyResourceConfig::default();
   config
      .add_post_init_script("file:/definitely/not/here.sql")
      .unwrap();

   let mut resource = build(&engine, &env, config);
   match resource.start() {
      Err(Error::InitScript { log_file, .. }) => assert!(log_file.is_none()),
      other => panic!("expected an init-script error, got {other:?}"),
   }
   assert!(resource.is_active());
   resource.close();
}

#[test]
fn dropping_an_active_resource_closes_it() {
   let (engine, env) = fixture();
   env.set("derby.system.home", "/srv/previous-home");

   {
      let mut config = DerbyResourceConfig::default();
      config.use_in_memory_database_named("dropped").unwrap();
      let mut resource = build(&engine, &env, config);
      resource.start().unwrap();
      assert!(engine.has_memory_database("dropped"));
   }

   assert!(!engine.has_memory_database("dropped"));
   assert_eq!(
      env.get("derby.system.home"),
      Some("/srv/previous-home".to_string())
   );
}

#[test]
fn classpath_database_resolves_against_registered_roots() {
   let (engine, env) = fixture();
   let root = tempfile::tempdir().unwrap();
   let db_dir = root.path().join("dbs/sample");
   fs::create_dir_all(&db_dir).unwrap();
   fs::write(db_dir.join("service.properties"), "#\n").unwrap();
   fs::write(db_dir.join("statements.sql"), "").unwrap();
   engine.register_classpath_root(root.path());

   let mut config = DerbyResourceConfig::default();
   config.use_classpath_sub_protocol("/dbs/sample").unwrap();
   let mut resource = build(&engine, &env, config);
   resource.start().unwrap();
   assert_eq!(
      resource.jdbc_url().unwrap(),
      "jdbc:derby:classpath:/dbs/sample"
   );

   // Read-only sub-protocols reject writes
   let mut conn = resource.open_connection().unwrap();
   let err = conn.execute("INSERT INTO t VALUES (1)").unwrap_err();
   assert_eq!(err.kind(), EngineErrorKind::ReadOnly);
   conn.close().unwrap();
   resource.close();
}

#[test]
fn jar_database_is_opened_read_only_from_the_archive() {
   let (engine, env) = fixture();
   let archive = tempfile::tempdir().unwrap();
   let db_dir = archive.path().join("products/sample");
   fs::create_dir_all(&db_dir).unwrap();
   fs::write(db_dir.join("service.properties"), "#\n").unwrap();
   fs::write(db_dir.join("statements.sql"), "").unwrap();

   let mut config = DerbyResourceConfig::default();
   config
      .use_jar_sub_protocol(archive.path().display().to_string(), "/products/sample")
      .unwrap();
   let mut resource = build(&engine, &env, config);
   resource.start().unwrap();

   let expected = format!(
      "jdbc:derby:jar:({})/products/sample",
      archive.path().display()
   );
   assert_eq!(resource.jdbc_url().unwrap(), expected);
   resource.close();
}

#[test]
fn provided_system_home_is_used_verbatim_and_kept() {
   let (engine, env) = fixture();
   let parent = tempfile::tempdir().unwrap();
   let home = parent.path().join("derby-home");

   let mut resource = EmbeddedDerbyResource::builder(engine)
      .environment(env)
      .config(DerbyResourceConfig::default())
      .system_home(&home)
      .build();
   resource.start().unwrap();
   assert_eq!(resource.derby_system_home().unwrap(), Path::new(&home));
   resource.close();

   assert!(home.join("derby.properties").is_file());
}

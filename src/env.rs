//! Process-wide engine settings as an injected capability
//!
//! The embedded engine resolves its system home from a single process-wide
//! string property. Rather than touching a hidden ambient global, the
//! resource is handed an [`Environment`] at construction, so tests can
//! substitute an isolated in-memory map and assert save/restore behavior.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Get/set/clear access to process-wide engine settings.
pub trait Environment: Send + Sync {
   /// Returns the current value of a property, if set.
   fn get(&self, key: &str) -> Option<String>;

   /// Sets a property, replacing any previous value.
   fn set(&self, key: &str, value: &str);

   /// Removes a property.
   fn clear(&self, key: &str);
}

static SYSTEM_PROPERTIES: LazyLock<Mutex<HashMap<String, String>>> =
   LazyLock::new(|| Mutex::new(HashMap::new()));

/// The shared process-wide property map. This is the default environment and
/// the one a real embedded engine would observe; because it is global, tests
/// that run in parallel should prefer [`MemoryEnvironment`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProperties;

impl Environment for SystemProperties {
   fn get(&self, key: &str) -> Option<String> {
      SYSTEM_PROPERTIES
         .lock()
         .expect("system properties lock poisoned")
         .get(key)
         .cloned()
   }

   fn set(&self, key: &str, value: &str) {
      SYSTEM_PROPERTIES
         .lock()
         .expect("system properties lock poisoned")
         .insert(key.to_string(), value.to_string());
   }

   fn clear(&self, key: &str) {
      SYSTEM_PROPERTIES
         .lock()
         .expect("system properties lock poisoned")
         .remove(key);
   }
}

/// An isolated in-memory environment, one map per instance.
///
/// Share one instance (via `Arc`) between a resource and its engine to keep
/// a test completely independent of global process state.
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
   properties: Mutex<HashMap<String, String>>,
}

impl MemoryEnvironment {
   /// Creates an empty environment.
   pub fn new() -> Self {
      Self::default()
   }
}

impl Environment for MemoryEnvironment {
   fn get(&self, key: &str) -> Option<String> {
      self
         .properties
         .lock()
         .expect("environment lock poisoned")
         .get(key)
         .cloned()
   }

   fn set(&self, key: &str, value: &str) {
      self
         .properties
         .lock()
         .expect("environment lock poisoned")
         .insert(key.to_string(), value.to_string());
   }

   fn clear(&self, key: &str) {
      self
         .properties
         .lock()
         .expect("environment lock poisoned")
         .remove(key);
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn memory_environment_set_get_clear() {
      let env = MemoryEnvironment::new();
      assert_eq!(env.get("derby.system.home"), None);

      env.set("derby.system.home", "/tmp/derby");
      assert_eq!(env.get("derby.system.home"), Some("/tmp/derby".to_string()));

      env.set("derby.system.home", "/tmp/other");
      assert_eq!(env.get("derby.system.home"), Some("/tmp/other".to_string()));

      env.clear("derby.system.home");
      assert_eq!(env.get("derby.system.home"), None);
   }

   #[test]
   fn memory_environments_are_isolated() {
      let a = MemoryEnvironment::new();
      let b = MemoryEnvironment::new();
      a.set("key", "value");
      assert_eq!(b.get("key"), None);
   }

   #[test]
   fn system_properties_round_trip() {
      let env = SystemProperties;
      env.set("derby_fixture.test.prop", "x");
      assert_eq!(env.get("derby_fixture.test.prop"), Some("x".to_string()));
      env.clear("derby_fixture.test.prop");
      assert_eq!(env.get("derby_fixture.test.prop"), None);
   }
}

//! Instantiates registered Objects by type name (spec.md §4.6 step 2: a
//! Scene's Tree callback on `/objects/<name>/type` invokes the Factory).

use crate::object::Object;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub type Constructor = Arc<dyn Fn(&str) -> Arc<Object> + Send + Sync>;

/// A registry of object-type name → constructor. Each process (World or
/// Scene) builds its own Factory from the object types it knows how to
/// host; a Scene's rendering-capable types and World's headless ones may
/// differ.
#[derive(Clone, Default)]
pub struct Factory {
    constructors: HashMap<String, Constructor>,
}

impl Factory {
    pub fn new() -> Self {
        Factory::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(type_name.into(), constructor);
    }

    /// Builds an Object of `type_name` named `name`. Returns `None` if
    /// `type_name` is unregistered; per spec.md §4.6, the caller logs and
    /// leaves the branch empty rather than treating this as fatal.
    pub fn create(&self, type_name: &str, name: &str) -> Option<Arc<Object>> {
        match self.constructors.get(type_name) {
            Some(ctor) => Some(ctor(name)),
            None => {
                warn!("factory: no constructor registered for type '{type_name}'");
                None
            }
        }
    }

    pub fn known_types(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_registered_types_and_rejects_unknown_ones() {
        let mut factory = Factory::new();
        factory.register("generic", Arc::new(|name| Arc::new(Object::new(name, "generic"))));

        let obj = factory.create("generic", "a").expect("registered");
        assert_eq!(obj.name(), "a");
        assert!(factory.create("missing", "b").is_none());
    }
}

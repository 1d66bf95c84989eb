//! World: the controller Root (spec.md §4.6). Owns the master config, is
//! authoritative for savable state, and constructs each Scene's initial
//! object set once it connects over Link.

use crate::config;
use crate::root::Root;
use link::{Hub, Link};
use objects::{Factory, Object};
use serde_json::Value as Json;
use splash_sdk::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use util::error::{ErrExt, ErrorCode, SplashResult};
use util::thread::ShutdownFlag;

pub struct World {
    root: Arc<Root>,
}

impl World {
    pub fn new(name: impl Into<String>, factory: Factory, shutdown: ShutdownFlag) -> Arc<World> {
        Arc::new(World {
            root: Root::new(name, factory, shutdown),
        })
    }

    pub fn root(&self) -> &Arc<Root> {
        &self.root
    }

    pub fn attach_link(&self, hub: Arc<Hub>) -> Arc<Link> {
        self.root.attach_link(hub)
    }

    /// Registers `obj` (already configured by the caller) and replicates it
    /// into the Tree so every connected Scene can instantiate its
    /// counterpart (spec.md §4.6 steps 1 and 3).
    pub fn add_object(&self, obj: Arc<Object>) {
        self.root.create_and_replicate(obj);
        self.root.ship_tree_seeds();
    }

    /// Applies an attribute change to a registered Object and replicates it
    /// to every Scene through the Tree.
    pub fn set_attribute(&self, object_name: &str, key: &str, args: Vec<Value>) {
        if let Some(entry) = self.root.registry().get(object_name) {
            entry.object().set_attribute(key, args.clone());
            self.root.replicate_attribute(object_name, key, args);
            self.root.ship_tree_seeds();
        }
    }

    /// A Scene has finished its Link handshake: hand it the whole current
    /// object set (spec.md §4.6 "World ... constructs Scenes' initial
    /// object sets").
    pub fn welcome_scene(&self, scene_name: impl Into<String>) {
        self.root.connect_to(scene_name);
        self.root.ship_full_sync();
    }

    pub fn load_config(&self, path: impl AsRef<Path>) -> SplashResult<()> {
        let text = fs::read_to_string(path).splash_err(ErrorCode::Internal)?;
        let json: Json = serde_json::from_str(&text).splash_err(ErrorCode::InvalidPath)?;
        config::load(&self.root, self.root.factory(), &json)?;
        self.root.ship_tree_seeds();
        info!("world {}: configuration loaded", self.root.name());
        Ok(())
    }

    pub fn save_config(&self, path: impl AsRef<Path>) -> SplashResult<()> {
        let json = config::export(&self.root);
        let text = serde_json::to_string_pretty(&json).splash_err(ErrorCode::Internal)?;
        fs::write(path, text).splash_err(ErrorCode::Internal)?;
        Ok(())
    }

    pub fn run_tasks(&self) {
        self.root.run_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::thread::ShutdownFlag;

    #[test]
    fn add_object_registers_and_produces_replication_seeds() {
        let world = World::new("world", Factory::new(), ShutdownFlag::new());
        world.add_object(Arc::new(Object::new("cam1", "camera")));
        assert!(world.root().registry().get("cam1").is_some());
        assert!(world.root().tree().has_branch("/objects/cam1"));
    }

    #[test]
    fn save_then_load_config_round_trips_through_a_temp_file() {
        let world = World::new("world", Factory::new(), ShutdownFlag::new());
        world.add_object(Arc::new(Object::new("cam1", "camera")));
        world.set_attribute("cam1", "zoom", vec![Value::from_f64(1.5)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        world.save_config(&path).unwrap();

        let mut factory = Factory::new();
        factory.register("camera", Arc::new(|name| Arc::new(Object::new(name, "camera"))));
        let reloaded = World::new("world2", factory, ShutdownFlag::new());
        reloaded.load_config(&path).unwrap();

        let entry = reloaded.root().registry().get("cam1").expect("reloaded from disk");
        assert_eq!(entry.object().get_attribute("zoom", true, true), Some(vec![Value::from_f64(1.5)]));
    }
}

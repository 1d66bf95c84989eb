//! Scene: the renderer Root (spec.md §4.6). Instantiates Objects via the
//! Factory as World's Tree replicates them, and reports telemetry back to
//! World through its own outbound Tree seeds.

use crate::root::Root;
use link::{Hub, Link};
use objects::Factory;
use parking_lot::Mutex;
use splash_sdk::Value;
use std::sync::Arc;
use util::thread::ShutdownFlag;

pub struct Scene {
    root: Arc<Root>,
    master: Mutex<bool>,
}

impl Scene {
    pub fn new(name: impl Into<String>, factory: Factory, shutdown: ShutdownFlag) -> Arc<Scene> {
        let root = Root::new(name, factory, shutdown);
        root.install_object_lifecycle();
        Arc::new(Scene {
            root,
            master: Mutex::new(false),
        })
    }

    pub fn root(&self) -> &Arc<Root> {
        &self.root
    }

    pub fn attach_link(&self, hub: Arc<Hub>) -> Arc<Link> {
        self.root.attach_link(hub)
    }

    pub fn connect_to_world(&self, world_name: impl Into<String>) {
        self.root.connect_to(world_name);
    }

    pub fn set_master(&self, master: bool) {
        *self.master.lock() = master;
    }

    pub fn is_master(&self) -> bool {
        *self.master.lock()
    }

    /// Reports a per-frame timing sample back to World under this Scene's
    /// own telemetry branch (spec.md §4.6 "forwards telemetry attributes
    /// ... back to World"), then ships the seed immediately rather than
    /// waiting for the next batched flush.
    pub fn report_frame_time(&self, frame_ms: f64) {
        let branch = format!("/telemetry/{}", self.root.name());
        let path = format!("{branch}/frame_ms");
        if !self.root.tree().set_leaf(&path, Value::from_f64(frame_ms), None) {
            self.root.tree().create_branch(&branch);
            self.root.tree().create_leaf(&path, Value::from_f64(frame_ms));
        }
        self.root.ship_tree_seeds();
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
    fn master_flag_defaults_to_false_and_is_settable() {
        let scene = Scene::new("scene1", Factory::new(), ShutdownFlag::new());
        assert!(!scene.is_master());
        scene.set_master(true);
        assert!(scene.is_master());
    }

    #[test]
    fn report_frame_time_creates_then_updates_the_telemetry_leaf() {
        let scene = Scene::new("scene1", Factory::new(), ShutdownFlag::new());
        scene.report_frame_time(16.6);
        assert_eq!(scene.root().tree().get_leaf("/telemetry/scene1/frame_ms"), Some(Value::from_f64(16.6)));
        scene.report_frame_time(17.1);
        assert_eq!(scene.root().tree().get_leaf("/telemetry/scene1/frame_ms"), Some(Value::from_f64(17.1)));
    }
}

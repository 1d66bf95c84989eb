//! `node` — Root/World/Scene (spec.md §4.6), the Object Registry, JSON
//! configuration persistence (§6.4), and the `world`/`scene` CLI binaries.

pub mod config;
pub mod registry;
pub mod root;
pub mod scene;
pub mod world;

pub use registry::{BufferSink, RegisteredObject, Registry};
pub use root::{Root, BROADCAST_TARGET, TREE_SYNC_TARGET};
pub use scene::Scene;
pub use world::World;

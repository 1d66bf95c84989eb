//! The per-process Root (spec.md §4.6): owns the Object Registry, the Tree
//! replica, the Link endpoint, the task FIFO and the buffer-updated
//! condition. `World` and `Scene` are thin wrappers adding their respective
//! responsibilities on top.

use crate::registry::{Registry, RegisteredObject};
use link::{Hub, Link, LinkDispatch};
use objects::{BufferObject, BufferPayload, Factory, Object, SyncMode};
use parking_lot::{Condvar, Mutex};
use splash_sdk::{seed_list_from_bytes, seed_list_to_bytes, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trees::{BranchEvent, Tree};
use util::thread::ShutdownFlag;

/// Broadcasts an attribute set to every locally registered Object (spec.md §6.1).
pub const BROADCAST_TARGET: &str = "__ALL__";
/// Reserved Link buffer target Tree seed lists travel under, since a Tree
/// seed batch doesn't fit the `(target, attribute, values)` message shape
/// and is too structured to hand to an arbitrary BufferObject (spec.md
/// §4.4.2 "Transport ships the list").
pub const TREE_SYNC_TARGET: &str = "__tree__";

pub struct Root {
    object: Object,
    factory: Factory,
    registry: Registry,
    tree: Tree,
    link: Mutex<Option<Arc<Link>>>,
    tasks: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
    buffer_updated: Mutex<bool>,
    buffer_updated_condvar: Condvar,
    shutdown: ShutdownFlag,
}

impl Root {
    pub fn new(name: impl Into<String>, factory: Factory, shutdown: ShutdownFlag) -> Arc<Root> {
        let name = name.into();
        let tree = Tree::new(name.clone());
        tree.create_branch("/objects");
        Arc::new(Root {
            object: Object::new(name, "root"),
            factory,
            registry: Registry::new(),
            tree,
            link: Mutex::new(None),
            tasks: Mutex::new(VecDeque::new()),
            buffer_updated: Mutex::new(false),
            buffer_updated_condvar: Condvar::new(),
            shutdown,
        })
    }

    pub fn name(&self) -> &str {
        self.object.name()
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Reads and clears the latched error condition (spec.md §7: "only
    /// truly unrecoverable conditions ... after which the Root sets its
    /// 'error' flag and subsequent calls may read and clear it via
    /// `get_error`"). Delegates to the Tree's own latch, which is also
    /// where a StaleTimestamp seed application latches its warning, since
    /// both are the same class of condition surfacing through the same Root.
    pub fn get_error(&self) -> Option<String> {
        self.tree.get_error()
    }

    /// A Root must exist before the Link it owns can be built, since the
    /// Link is handed `self` as its dispatch target: two-phase construction
    /// mirrors `RootObject` binding its transport after its own constructor
    /// runs in the original engine.
    pub fn attach_link(self: &Arc<Self>, hub: Arc<Hub>) -> Arc<Link> {
        let link = Link::new(self.name().to_string(), hub, self.clone() as Arc<dyn LinkDispatch>, self.shutdown.clone());
        *self.link.lock() = Some(link.clone());
        link
    }

    pub fn link(&self) -> Option<Arc<Link>> {
        self.link.lock().clone()
    }

    pub fn connect_to(&self, peer: impl Into<String>) {
        if let Some(link) = self.link() {
            link.connect_to(peer);
        }
    }

    // --- task queue (spec.md §4.6 "add_task"/"run_tasks") -----------------

    pub fn add_task(&self, task: impl FnOnce() + Send + 'static) {
        self.tasks.lock().push_back(Box::new(task));
    }

    /// Drains and runs every queued task. Called once per Root main-loop tick.
    pub fn run_tasks(&self) {
        let drained: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in drained {
            task();
        }
    }

    // --- buffer-updated condition (spec.md §4.6 "wait_signal_buffer_updated") ---

    pub fn signal_buffer_updated(&self) {
        *self.buffer_updated.lock() = true;
        self.buffer_updated_condvar.notify_all();
    }

    pub fn wait_signal_buffer_updated(&self, timeout: Duration) -> bool {
        let mut fired = self.buffer_updated.lock();
        if *fired {
            *fired = false;
            return true;
        }
        let result = self.buffer_updated_condvar.wait_for(&mut fired, timeout);
        let woke_on_signal = *fired && !result.timed_out();
        *fired = false;
        woke_on_signal
    }

    // --- object registry ----------------------------------------------------

    pub fn register_object(&self, obj: Arc<Object>) {
        self.registry.register(RegisteredObject::Plain(obj));
    }

    pub fn register_buffer_object<P>(self: &Arc<Self>, buffer: Arc<BufferObject<P>>)
    where
        P: BufferPayload + 'static,
    {
        let root = self.clone();
        buffer.on_buffer_updated(Arc::new(move || root.signal_buffer_updated()));
        self.registry.register(RegisteredObject::Buffer(buffer));
    }

    pub fn unregister_object(&self, name: &str) {
        self.registry.unregister(name);
    }

    // --- Root.set (spec.md §4.6, §6.1) --------------------------------------

    /// `target == self.name()` applies to the Root's own Object; the
    /// broadcast name `__ALL__` applies to every registered Object; anything
    /// else is looked up and dispatched synchronously or via the task queue
    /// depending on the target Attribute's sync mode. Returns `false` for an
    /// unknown target.
    pub fn set(&self, target: &str, attribute: &str, values: Vec<Value>, async_call: bool) -> bool {
        if target == self.name() {
            self.object.set_attribute(attribute, values);
            return true;
        }
        if target == BROADCAST_TARGET {
            for entry in self.registry.all() {
                entry.object().set_attribute(attribute, values.clone());
            }
            return true;
        }
        let Some(entry) = self.registry.get(target) else {
            warn!("root {}: set on unknown target '{}'", self.name(), target);
            return false;
        };
        self.dispatch_to(entry, attribute, values, async_call);
        true
    }

    fn dispatch_to(&self, entry: RegisteredObject, attribute: &str, values: Vec<Value>, async_call: bool) {
        let force_sync = entry
            .object()
            .attribute(attribute)
            .map(|attr| attr.get_sync_mode() == SyncMode::ForceSync)
            .unwrap_or(false);
        if force_sync || !async_call {
            entry.object().set_attribute(attribute, values);
        } else {
            let attribute = attribute.to_string();
            self.add_task(move || {
                entry.object().set_attribute(&attribute, values);
            });
        }
    }

    fn apply_link_directive(&self, target: &str, attribute: &str, values: &[Value]) {
        let Some(peer_name) = values.first().map(Value::as_string) else {
            return;
        };
        let as_linkable = |entry: RegisteredObject| match entry {
            RegisteredObject::Plain(obj) => Some(obj),
            RegisteredObject::Buffer(_) => None,
        };
        let target_obj = self.registry.get(target).and_then(as_linkable);
        let peer_obj = self.registry.get(&peer_name).and_then(as_linkable);
        match (target_obj, peer_obj, attribute) {
            (Some(t), Some(p), "link_to") => {
                t.link_to(&p);
            }
            (Some(t), Some(p), _) => {
                t.unlink_from(&p);
            }
            _ => warn!(
                "root {}: {} referenced unknown or non-linkable object(s) ('{}', '{}')",
                self.name(),
                attribute,
                target,
                peer_name
            ),
        }
    }

    // --- object lifecycle replication, World side (spec.md §4.6 steps 1, 3) ---

    /// Registers `obj` and replicates it into the Tree: an `AddBranch` for
    /// its subtree, a `SetLeaf` for its type, and a `SetLeaf` per distant
    /// attribute already set on it. World calls this; a Scene replica never
    /// originates object creation.
    pub fn create_and_replicate(&self, obj: Arc<Object>) {
        let base = format!("/objects/{}", obj.name());
        self.tree.create_branch(&base);
        self.tree.create_leaf(&format!("{base}/type"), Value::from_string(obj.object_type()));
        self.tree.create_branch(&format!("{base}/attr"));
        for (key, args) in obj.distant_attributes() {
            self.tree.create_leaf(&format!("{base}/attr/{key}"), Value::from_list(args));
        }
        self.registry.register(RegisteredObject::Plain(obj));
    }

    /// Replicates a single attribute change on an already-registered Object
    /// (spec.md §4.6 step 3, ongoing updates rather than initial creation).
    pub fn replicate_attribute(&self, object_name: &str, key: &str, args: Vec<Value>) {
        let path = format!("/objects/{object_name}/attr/{key}");
        let value = Value::from_list(args);
        if !self.tree.set_leaf(&path, value.clone(), None) {
            self.tree.create_leaf(&path, value);
        }
    }

    // --- object lifecycle replication, Scene side (spec.md §4.6 steps 2, 4) ---

    /// Wires the cascading Tree callbacks a Scene replica needs: as each
    /// `/objects/<name>` branch appears, watch for its `type` leaf (invoke
    /// the Factory) and its `attr` branch (apply each attribute as it
    /// arrives). Registering a callback from inside another callback's fire
    /// is safe here because `process_queue` applies queued seeds in order on
    /// one thread, so a callback registered while processing seed N can
    /// still catch seed N+1 in the same batch.
    pub fn install_object_lifecycle(self: &Arc<Self>) {
        let root = self.clone();
        self.tree.on_branch_event(
            "/objects",
            BranchEvent::AddBranch,
            Arc::new(move |name| root.on_object_branch_added(name)),
        );
    }

    fn on_object_branch_added(self: &Arc<Self>, name: &str) {
        let base = format!("/objects/{name}");
        let name = name.to_string();

        let root_for_type = self.clone();
        let name_for_type = name.clone();
        self.tree.on_branch_event(
            &base,
            BranchEvent::AddLeaf,
            Arc::new(move |child| {
                if child == "type" {
                    root_for_type.on_object_type_known(&name_for_type);
                }
            }),
        );

        let root_for_attr = self.clone();
        self.tree.on_branch_event(
            &base,
            BranchEvent::AddBranch,
            Arc::new(move |child| {
                if child == "attr" {
                    root_for_attr.on_object_attr_branch_added(&name);
                }
            }),
        );
    }

    fn on_object_type_known(self: &Arc<Self>, name: &str) {
        let Some(type_value) = self.tree.get_leaf(&format!("/objects/{name}/type")) else {
            return;
        };
        let type_name = type_value.as_string();
        match self.factory.create(&type_name, name) {
            Some(obj) => {
                obj.set_remote_type(type_name);
                self.registry.register(RegisteredObject::Plain(obj));
            }
            None => warn!(
                "root {}: no factory constructor for type '{}', object '{}' left unregistered",
                self.name(),
                type_name,
                name
            ),
        }
    }

    fn on_object_attr_branch_added(self: &Arc<Self>, object_name: &str) {
        let base = format!("/objects/{object_name}/attr");
        let root = self.clone();
        let object_name = object_name.to_string();
        self.tree.on_branch_event(
            &base,
            BranchEvent::AddLeaf,
            Arc::new(move |key| root.on_attr_leaf_added(&object_name, key)),
        );
    }

    fn on_attr_leaf_added(self: &Arc<Self>, object_name: &str, key: &str) {
        let path = format!("/objects/{object_name}/attr/{key}");
        self.apply_attr_leaf(object_name, key, &path);

        let root = self.clone();
        let object_name = object_name.to_string();
        let key = key.to_string();
        let path_for_change = path.clone();
        self.tree.on_leaf_change(
            &path,
            Arc::new(move |_value, _ts| root.apply_attr_leaf(&object_name, &key, &path_for_change)),
        );
    }

    fn apply_attr_leaf(&self, object_name: &str, key: &str, path: &str) {
        let Some(value) = self.tree.get_leaf(path) else {
            return;
        };
        let Some(entry) = self.registry.get(object_name) else {
            warn!(
                "root {}: attribute '{}' arrived before object '{}' was registered",
                self.name(),
                key,
                object_name
            );
            return;
        };
        entry.object().set_attribute(key, value.into_list());
    }

    // --- Tree seeds over Link (spec.md §4.4.2, shipped as a buffer) ----------

    /// Drains this Tree's outbound seeds and, if any, ships them to every
    /// connected peer under `TREE_SYNC_TARGET`.
    pub fn ship_tree_seeds(&self) {
        let seeds = self.tree.get_seed_list();
        if seeds.is_empty() {
            return;
        }
        if let Some(link) = self.link() {
            link.send_buffer(TREE_SYNC_TARGET, seed_list_to_bytes(&seeds));
        }
    }

    /// Ships a full reconstruction of this Tree (spec.md §4.6 "constructs
    /// Scenes' initial object sets") instead of relying on already-drained
    /// incremental seeds. Safe to send to every connected peer: replaying
    /// the same AddBranch/AddLeaf/SetLeaf seeds on an already-synced Tree is
    /// idempotent (§8 scenario 1).
    pub fn ship_full_sync(&self) {
        let seeds = self.tree.full_sync_seeds();
        if let Some(link) = self.link() {
            link.send_buffer(TREE_SYNC_TARGET, seed_list_to_bytes(&seeds));
        }
    }
}

impl LinkDispatch for Root {
    fn dispatch_message(&self, _sender: &str, target: &str, attribute: &str, values: Vec<Value>, async_hint: bool) {
        if attribute == "link_to" || attribute == "unlink_from" {
            self.apply_link_directive(target, attribute, &values);
            return;
        }
        self.set(target, attribute, values, async_hint);
    }

    fn dispatch_buffer(&self, _sender: &str, target: &str, bytes: Vec<u8>) {
        if target == TREE_SYNC_TARGET {
            match seed_list_from_bytes(&bytes) {
                Ok(seeds) => {
                    self.tree.add_seeds_to_queue(seeds);
                    self.tree.process_queue(false);
                }
                Err(e) => {
                    // An undecodable Tree-sync buffer (including an
                    // unrecognized seed task tag) is exactly the "truly
                    // unrecoverable condition" spec.md §7 names: latch it
                    // onto the Tree's error flag rather than only logging it.
                    warn!("root {}: malformed tree sync buffer: {:?}", self.name(), e);
                    self.tree.set_error(format!("malformed tree sync buffer: {e:?}"));
                }
            }
            return;
        }
        match self.registry.get(target).and_then(|e| e.as_buffer_sink().cloned()) {
            Some(sink) => sink.stage(bytes),
            None => warn!("root {}: buffer for unknown or non-buffer target '{}' dropped", self.name(), target),
        }
    }
}

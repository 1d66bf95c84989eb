//! The synchronized Tree (spec.md §4.4): a rooted, named hierarchy of Branch
//! and Leaf nodes, replicated across processes via Seeds.

use crate::node::{Branch, Leaf, Node};
use crate::path;
use parking_lot::Mutex;
use splash_sdk::{now_ms, Seed, Task, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use util::reentrant_safe_mutex::ReentrantSafeMutex;
use uuid::Uuid;

pub type BranchCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type LeafCallback = Arc<dyn Fn(&Value, i64) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchEvent {
    AddBranch,
    AddLeaf,
    RemoveBranch,
    RemoveLeaf,
}

enum PendingCallback {
    Branch(BranchEvent, BranchCallback),
    Leaf(LeafCallback),
}

/// A pending (branch_event, callback) or leaf callback invocation snapshotted
/// while the structure lock was held, to be fired after it is released -
/// this is what keeps callbacks from re-entering the same lock (spec.md §5).
enum QueuedCall {
    Branch(BranchCallback, String),
    Leaf(LeafCallback, Value, i64),
}

/// A rooted, named hierarchy of Branch and Leaf nodes, replicated across
/// processes by exchanging Seeds.
pub struct Tree {
    uuid: Uuid,
    name: Mutex<String>,
    root: ReentrantSafeMutex<Branch>,
    /// Guards the outbound seed list generated by local mutations.
    outbound: Mutex<Vec<Seed>>,
    /// Guards the inbound task queue fed by `add_seeds_to_queue`.
    inbound: Mutex<Vec<Seed>>,
    branch_callbacks: Mutex<HashMap<Vec<String>, Vec<(BranchEvent, BranchCallback)>>>,
    leaf_callbacks: Mutex<HashMap<Vec<String>, Vec<LeafCallback>>>,
    pending_callbacks: Mutex<Vec<(Vec<String>, PendingCallback)>>,
    error: Mutex<Option<String>>,
}

impl Tree {
    pub fn new(name: impl Into<String>) -> Self {
        Tree {
            uuid: Uuid::new_v4(),
            name: Mutex::new(name.into()),
            root: ReentrantSafeMutex::new(Branch::new()),
            outbound: Mutex::new(Vec::new()),
            inbound: Mutex::new(Vec::new()),
            branch_callbacks: Mutex::new(HashMap::new()),
            leaf_callbacks: Mutex::new(HashMap::new()),
            pending_callbacks: Mutex::new(Vec::new()),
            error: Mutex::new(None),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock() = name.into();
    }

    pub fn get_error(&self) -> Option<String> {
        self.error.lock().take()
    }

    /// Latches a message for later retrieval via `get_error`, coalescing
    /// into the most recent occurrence (spec.md §7). Exposed so callers
    /// outside this Tree's own seed application (e.g. a Root rejecting a
    /// malformed inbound Tree-sync buffer) can latch onto the same flag.
    pub fn set_error(&self, message: impl Into<String>) {
        *self.error.lock() = Some(message.into());
    }

    fn push_seed(&self, task: Task, args: Vec<Value>, timestamp_ms: i64, silent: bool) {
        if silent {
            return;
        }
        self.outbound.lock().push(Seed::new(task, args, timestamp_ms, self.uuid));
    }

    // --- navigation -----------------------------------------------------

    fn navigate<'a>(root: &'a Branch, components: &[String]) -> Option<&'a Node> {
        let (first, rest) = components.split_first()?;
        let child = root.children.get(first)?;
        if rest.is_empty() {
            Some(child)
        } else {
            Self::navigate(child.as_branch()?, rest)
        }
    }

    fn navigate_mut<'a>(root: &'a mut Branch, components: &[String]) -> Option<&'a mut Node> {
        let (first, rest) = components.split_first()?;
        let child = root.children.get_mut(first)?;
        if rest.is_empty() {
            Some(child)
        } else {
            Self::navigate_mut(child.as_branch_mut()?, rest)
        }
    }

    /// Navigates to the parent branch of `components`, auto-creating any
    /// missing intermediate branches (spec.md §4.4.1 "parent path is
    /// auto-created (silently) if missing").
    fn navigate_parent_creating<'a>(root: &'a mut Branch, components: &[String]) -> Option<&'a mut Branch> {
        let mut current = root;
        for name in &components[..components.len().saturating_sub(1)] {
            let entry = current.children.entry(name.clone()).or_insert_with(|| Node::Branch(Branch::new()));
            current = entry.as_branch_mut()?;
        }
        Some(current)
    }

    pub fn has_branch(&self, path_str: &str) -> bool {
        let Ok(components) = path::parse(path_str) else {
            return false;
        };
        let root = self.root.lock();
        if components.is_empty() {
            return true;
        }
        Self::navigate(&root, &components).map(|n| n.is_branch()).unwrap_or(false)
    }

    pub fn has_leaf(&self, path_str: &str) -> bool {
        let Ok(components) = path::parse(path_str) else {
            return false;
        };
        let root = self.root.lock();
        Self::navigate(&root, &components).map(|n| !n.is_branch()).unwrap_or(false)
    }

    pub fn get_leaf(&self, path_str: &str) -> Option<Value> {
        let components = path::parse(path_str).ok()?;
        let root = self.root.lock();
        Self::navigate(&root, &components)?.as_leaf().map(|l| l.value.clone())
    }

    pub fn branch_names(&self, path_str: &str) -> Vec<String> {
        let Ok(components) = path::parse(path_str) else {
            return Vec::new();
        };
        let root = self.root.lock();
        if components.is_empty() {
            return root.branch_names();
        }
        Self::navigate(&root, &components).and_then(|n| n.as_branch()).map(|b| b.branch_names()).unwrap_or_default()
    }

    pub fn leaf_names(&self, path_str: &str) -> Vec<String> {
        let Ok(components) = path::parse(path_str) else {
            return Vec::new();
        };
        let root = self.root.lock();
        if components.is_empty() {
            return root.leaf_names();
        }
        Self::navigate(&root, &components).and_then(|n| n.as_branch()).map(|b| b.leaf_names()).unwrap_or_default()
    }

    // --- mutations --------------------------------------------------------

    pub fn create_branch(&self, path_str: &str) -> bool {
        self.create_branch_silent(path_str, false)
    }

    fn create_branch_silent(&self, path_str: &str, silent: bool) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("create_branch: {e}");
                return false;
            }
        };
        if components.is_empty() {
            return false; // the root branch always exists
        }
        let calls = {
            let mut root = self.root.lock();
            let Some((name, _)) = components.split_last() else {
                return false;
            };
            let Some(parent) = Self::navigate_parent_creating(&mut root, &components) else {
                return false;
            };
            if parent.children.contains_key(name) {
                return false;
            }
            parent.children.insert(name.clone(), Node::Branch(Branch::new()));
            self.push_seed(Task::AddBranch, vec![Value::from_string(path_str)], now_ms(), silent);
            self.collect_branch_calls(&components, BranchEvent::AddBranch, name)
        };
        self.fire(calls);
        self.retry_pending_callbacks();
        true
    }

    pub fn create_leaf(&self, path_str: &str, value: Value) -> bool {
        self.create_leaf_silent(path_str, value, silent_timestamp())
    }

    fn create_leaf_silent(&self, path_str: &str, value: Value, (silent, timestamp_ms): (bool, i64)) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("create_leaf: {e}");
                return false;
            }
        };
        let Some((name, _)) = components.split_last() else {
            return false; // cannot create a leaf at the root
        };
        let calls = {
            let mut root = self.root.lock();
            let Some(parent) = Self::navigate_parent_creating(&mut root, &components) else {
                return false;
            };
            if parent.children.contains_key(name) {
                return false;
            }
            parent.children.insert(name.clone(), Node::Leaf(Leaf::new(value.clone(), timestamp_ms)));
            self.push_seed(
                Task::AddLeaf,
                vec![Value::from_string(path_str), value.clone()],
                timestamp_ms,
                silent,
            );
            self.collect_branch_calls(&components, BranchEvent::AddLeaf, name)
        };
        self.fire(calls);
        self.retry_pending_callbacks();
        true
    }

    pub fn remove_branch(&self, path_str: &str, silent: bool) -> bool {
        self.remove(path_str, silent, true)
    }

    pub fn remove_leaf(&self, path_str: &str, silent: bool) -> bool {
        self.remove(path_str, silent, false)
    }

    fn remove(&self, path_str: &str, silent: bool, want_branch: bool) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("remove: {e}");
                return false;
            }
        };
        let Some((name, parent_components)) = components.split_last() else {
            return false;
        };
        let calls = {
            let mut root = self.root.lock();
            let parent = if parent_components.is_empty() {
                Some(&mut *root)
            } else {
                Self::navigate_mut(&mut root, parent_components).and_then(Node::as_branch_mut)
            };
            let Some(parent) = parent else {
                return false;
            };
            match parent.children.get(name) {
                Some(node) if node.is_branch() == want_branch => {}
                _ => return false,
            }
            parent.children.remove(name);
            let (task, event) = if want_branch {
                (Task::RemoveBranch, BranchEvent::RemoveBranch)
            } else {
                (Task::RemoveLeaf, BranchEvent::RemoveLeaf)
            };
            self.push_seed(task, vec![Value::from_string(path_str)], now_ms(), silent);
            self.remove_callbacks_under(&components);
            self.collect_branch_calls(&components, event, name)
        };
        self.fire(calls);
        true
    }

    pub fn rename_branch(&self, path_str: &str, new_name: &str) -> bool {
        self.rename(path_str, new_name, true)
    }

    pub fn rename_leaf(&self, path_str: &str, new_name: &str) -> bool {
        self.rename(path_str, new_name, false)
    }

    fn rename(&self, path_str: &str, new_name: &str, want_branch: bool) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("rename: {e}");
                return false;
            }
        };
        let Some((name, parent_components)) = components.split_last() else {
            return false;
        };
        {
            let mut root = self.root.lock();
            let parent = if parent_components.is_empty() {
                Some(&mut *root)
            } else {
                Self::navigate_mut(&mut root, parent_components).and_then(Node::as_branch_mut)
            };
            let Some(parent) = parent else { return false };
            if parent.children.contains_key(new_name) {
                return false; // name collision at target
            }
            match parent.children.get(name) {
                Some(node) if node.is_branch() == want_branch => {}
                _ => return false,
            }
            let node = parent.children.remove(name).unwrap();
            parent.children.insert(new_name.to_string(), node);
            let task = if want_branch { Task::RenameBranch } else { Task::RenameLeaf };
            self.push_seed(task, vec![Value::from_string(path_str), Value::from_string(new_name)], now_ms(), false);
        }
        true
    }

    /// Rejects the set if `timestamp_ms` is older than the leaf's current
    /// timestamp (spec.md §3 "Leaf timestamps are monotonic"). A successful
    /// call fires the leaf's callbacks with `(value, timestamp)`.
    pub fn set_leaf(&self, path_str: &str, value: Value, timestamp_ms: Option<i64>) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("set_leaf: {e}");
                return false;
            }
        };
        let ts = timestamp_ms.unwrap_or_else(now_ms);
        let (applied, calls) = {
            let mut root = self.root.lock();
            let Some(node) = Self::navigate_mut(&mut root, &components) else {
                return false;
            };
            let Some(leaf) = node.as_leaf_mut() else {
                return false;
            };
            if ts < leaf.timestamp_ms {
                (false, Vec::new())
            } else {
                leaf.value = value.clone();
                leaf.timestamp_ms = ts;
                self.push_seed(Task::SetLeaf, vec![Value::from_string(path_str), value.clone()], ts, false);
                let calls = self
                    .leaf_callbacks
                    .lock()
                    .get(&components)
                    .map(|cbs| cbs.iter().map(|cb| QueuedCall::Leaf(cb.clone(), value.clone(), ts)).collect())
                    .unwrap_or_default();
                (true, calls)
            }
        };
        if applied {
            self.fire(calls);
        }
        applied
    }

    /// Removes and returns the subtree at `path`, for transfer via `graft`.
    pub fn cut_branch(&self, path_str: &str) -> Option<Node> {
        self.cut(path_str, true)
    }

    pub fn cut_leaf(&self, path_str: &str) -> Option<Node> {
        self.cut(path_str, false)
    }

    fn cut(&self, path_str: &str, want_branch: bool) -> Option<Node> {
        let components = path::parse(path_str).ok()?;
        let (name, parent_components) = components.split_last()?;
        let mut root = self.root.lock();
        let parent = if parent_components.is_empty() {
            Some(&mut *root)
        } else {
            Self::navigate_mut(&mut root, parent_components).and_then(Node::as_branch_mut)
        }?;
        match parent.children.get(name) {
            Some(node) if node.is_branch() == want_branch => {}
            _ => return None,
        }
        let node = parent.children.remove(name)?;
        drop(root);
        self.push_seed(
            if want_branch { Task::RemoveBranch } else { Task::RemoveLeaf },
            vec![Value::from_string(path_str)],
            now_ms(),
            false,
        );
        Some(node)
    }

    /// Grafts `node` as a child named after the last component of `path`
    /// (spec.md §8 scenario 5: `graft("/b", subtree)` places it at
    /// `/b/branch`). Emits the AddBranch/AddLeaf/SetLeaf seeds necessary for
    /// a peer to reconstruct the subtree without ever seeing a "graft" task.
    pub fn graft(&self, path_str: &str, name: &str, node: Node) -> bool {
        let components = match path::parse(path_str) {
            Ok(c) => c,
            Err(e) => {
                warn!("graft: {e}");
                return false;
            }
        };
        {
            let mut root = self.root.lock();
            let parent = if components.is_empty() {
                Some(&mut *root)
            } else {
                Self::navigate_parent_creating(&mut root, &[components.clone(), vec![name.to_string()]].concat())
            };
            let Some(parent) = parent else { return false };
            if parent.children.contains_key(name) {
                return false;
            }
            parent.children.insert(name.to_string(), node.clone());
        }
        let mut full = components;
        full.push(name.to_string());
        self.emit_reconstruction_seeds(&full, &node);
        true
    }

    /// Reconstructs the Seeds needed to rebuild the whole tree from empty,
    /// without touching the outbound queue or any state. World uses this to
    /// bring a newly connected Scene fully in sync (spec.md §4.6
    /// "constructs Scenes' initial object sets") instead of relying on
    /// already-drained incremental seeds.
    pub fn full_sync_seeds(&self) -> Vec<Seed> {
        let root = self.root.lock();
        let mut seeds = Vec::new();
        for (name, child) in &root.children {
            Self::collect_reconstruction_seeds(&[name.clone()], child, self.uuid, &mut seeds);
        }
        seeds
    }

    fn collect_reconstruction_seeds(components: &[String], node: &Node, origin: Uuid, seeds: &mut Vec<Seed>) {
        let path_str = path::join(components);
        match node {
            Node::Branch(branch) => {
                seeds.push(Seed::new(Task::AddBranch, vec![Value::from_string(&path_str)], now_ms(), origin));
                for (name, child) in &branch.children {
                    let mut next = components.to_vec();
                    next.push(name.clone());
                    Self::collect_reconstruction_seeds(&next, child, origin, seeds);
                }
            }
            Node::Leaf(leaf) => {
                seeds.push(Seed::new(Task::AddLeaf, vec![Value::from_string(&path_str), leaf.value.clone()], leaf.timestamp_ms, origin));
                seeds.push(Seed::new(Task::SetLeaf, vec![Value::from_string(&path_str), leaf.value.clone()], leaf.timestamp_ms, origin));
            }
        }
    }

    fn emit_reconstruction_seeds(&self, components: &[String], node: &Node) {
        let path_str = path::join(components);
        match node {
            Node::Branch(branch) => {
                self.push_seed(Task::AddBranch, vec![Value::from_string(&path_str)], now_ms(), false);
                for (name, child) in &branch.children {
                    let mut child_components = components.to_vec();
                    child_components.push(name.clone());
                    self.emit_reconstruction_seeds(&child_components, child);
                }
            }
            Node::Leaf(leaf) => {
                self.push_seed(
                    Task::AddLeaf,
                    vec![Value::from_string(&path_str), leaf.value.clone()],
                    leaf.timestamp_ms,
                    false,
                );
                self.push_seed(
                    Task::SetLeaf,
                    vec![Value::from_string(&path_str), leaf.value.clone()],
                    leaf.timestamp_ms,
                    false,
                );
            }
        }
    }

    // --- callbacks ----------------------------------------------------------

    pub fn on_branch_event(&self, path_str: &str, event: BranchEvent, callback: BranchCallback) {
        let Ok(components) = path::parse(path_str) else {
            warn!("on_branch_event: invalid path {path_str}");
            return;
        };
        let exists = {
            let root = self.root.lock();
            components.is_empty() || Self::navigate(&root, &components).map(|n| n.is_branch()).unwrap_or(false)
        };
        if exists {
            self.branch_callbacks.lock().entry(components).or_default().push((event, callback));
        } else {
            self.pending_callbacks.lock().push((components, PendingCallback::Branch(event, callback)));
        }
    }

    pub fn on_leaf_change(&self, path_str: &str, callback: LeafCallback) {
        let Ok(components) = path::parse(path_str) else {
            warn!("on_leaf_change: invalid path {path_str}");
            return;
        };
        let exists = {
            let root = self.root.lock();
            Self::navigate(&root, &components).map(|n| !n.is_branch()).unwrap_or(false)
        };
        if exists {
            self.leaf_callbacks.lock().entry(components).or_default().push(callback);
        } else {
            self.pending_callbacks.lock().push((components, PendingCallback::Leaf(callback)));
        }
    }

    fn retry_pending_callbacks(&self) {
        let mut pending = self.pending_callbacks.lock();
        let root = self.root.lock();
        let mut still_pending = Vec::new();
        for (components, callback) in pending.drain(..) {
            let found = match &callback {
                PendingCallback::Branch(..) => components.is_empty() || Self::navigate(&root, &components).map(|n| n.is_branch()).unwrap_or(false),
                PendingCallback::Leaf(_) => Self::navigate(&root, &components).map(|n| !n.is_branch()).unwrap_or(false),
            };
            if found {
                match callback {
                    PendingCallback::Branch(event, cb) => {
                        self.branch_callbacks.lock().entry(components).or_default().push((event, cb));
                    }
                    PendingCallback::Leaf(cb) => {
                        self.leaf_callbacks.lock().entry(components).or_default().push(cb);
                    }
                }
            } else {
                still_pending.push((components, callback));
            }
        }
        *pending = still_pending;
    }

    fn remove_callbacks_under(&self, components: &[String]) {
        self.branch_callbacks.lock().retain(|path, _| !path.starts_with(components) || path == components);
        self.branch_callbacks.lock().remove(components);
        self.leaf_callbacks.lock().remove(components);
    }

    fn collect_branch_calls(&self, components: &[String], event: BranchEvent, child_name: &str) -> Vec<QueuedCall> {
        let Some(parent_components) = components.split_last().map(|(_, rest)| rest) else {
            return Vec::new();
        };
        self.branch_callbacks
            .lock()
            .get(parent_components)
            .map(|cbs| {
                cbs.iter()
                    .filter(|(ev, _)| *ev == event)
                    .map(|(_, cb)| QueuedCall::Branch(cb.clone(), child_name.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fire(&self, calls: Vec<QueuedCall>) {
        for call in calls {
            match call {
                QueuedCall::Branch(cb, name) => cb(&name),
                QueuedCall::Leaf(cb, value, ts) => cb(&value, ts),
            }
        }
    }

    // --- replication (spec.md §4.4.2) --------------------------------------

    /// Drains and returns the seeds accumulated since the last call.
    pub fn get_seed_list(&self) -> Vec<Seed> {
        std::mem::take(&mut *self.outbound.lock())
    }

    pub fn add_seeds_to_queue(&self, seeds: Vec<Seed>) {
        self.inbound.lock().extend(seeds);
    }

    /// Applies queued inbound seeds in timestamp order (ties broken by
    /// inbound list order, i.e. a stable sort), skipping any seed this Tree
    /// itself originated. If `propagate`, each applied seed is re-emitted
    /// into this Tree's own outbound list.
    pub fn process_queue(&self, propagate: bool) {
        let mut queue = std::mem::take(&mut *self.inbound.lock());
        queue.sort_by_key(|seed| seed.timestamp_ms); // stable: ties keep inbound order

        for seed in queue {
            if seed.origin == self.uuid {
                continue; // never replay our own seeds
            }
            self.apply_seed(&seed, propagate);
        }
        self.retry_pending_callbacks();
    }

    fn apply_seed(&self, seed: &Seed, propagate: bool) {
        let ok = match seed.task {
            Task::AddBranch => self.apply_add_branch(seed),
            Task::AddLeaf => self.apply_add_leaf(seed),
            Task::RemoveBranch => seed.args.first().map(|p| self.remove_branch(&p.as_string(), true)).unwrap_or(false),
            Task::RemoveLeaf => seed.args.first().map(|p| self.remove_leaf(&p.as_string(), true)).unwrap_or(false),
            Task::RenameBranch => self.apply_rename(seed, true),
            Task::RenameLeaf => self.apply_rename(seed, false),
            Task::SetLeaf => self.apply_set_leaf(seed),
        };
        if ok && propagate {
            self.outbound.lock().push(seed.clone());
        }
    }

    fn apply_add_branch(&self, seed: &Seed) -> bool {
        let Some(path) = seed.args.first() else { return false };
        self.create_branch_silent(&path.as_string(), true)
    }

    fn apply_add_leaf(&self, seed: &Seed) -> bool {
        let Some(path) = seed.args.first() else { return false };
        let value = seed.args.get(1).cloned().unwrap_or_else(Value::empty);
        self.create_leaf_silent(&path.as_string(), value, (true, seed.timestamp_ms))
    }

    fn apply_rename(&self, seed: &Seed, want_branch: bool) -> bool {
        let (Some(path), Some(new_name)) = (seed.args.first(), seed.args.get(1)) else {
            return false;
        };
        if want_branch {
            self.rename_branch(&path.as_string(), &new_name.as_string())
        } else {
            self.rename_leaf(&path.as_string(), &new_name.as_string())
        }
    }

    fn apply_set_leaf(&self, seed: &Seed) -> bool {
        let Some(path) = seed.args.first() else { return false };
        let value = seed.args.get(1).cloned().unwrap_or_else(Value::empty);
        let applied = self.set_leaf(&path.as_string(), value, Some(seed.timestamp_ms));
        if !applied {
            // StaleTimestamp is non-fatal (spec.md §9 Open Question, resolved
            // in DESIGN.md): processing continues, but the condition is
            // latched onto the Tree's visible error, coalescing into the
            // most recent such occurrence (§7 "Aggregated errors ...
            // coalesce into the most recent").
            warn!("stale timestamp for {}: dropping SetLeaf seed", path.as_string());
            self.set_error(format!("StaleTimestamp: {}", path.as_string()));
        }
        applied
    }
}

fn silent_timestamp() -> (bool, i64) {
    (false, now_ms())
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        *self.root.lock() == *other.root.lock()
    }
}

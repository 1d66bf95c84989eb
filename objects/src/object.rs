//! The base Object (spec.md §4.2): a named bag of Attributes plus a weak
//! link graph to other Objects, rendered in an order driven by
//! `RenderingPriority`.

use crate::attribute::Attribute;
use parking_lot::{Mutex, RwLock};
use splash_sdk::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Draw-order bucket a Scene sorts its registered Objects into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderingPriority {
    PreCamera,
    Camera,
    Filter,
    PostCamera,
    Window,
    PostWindow,
}

pub struct Object {
    name: String,
    object_type: String,
    remote_type: Mutex<Option<String>>,
    rendering_priority: Mutex<RenderingPriority>,
    attributes: RwLock<HashMap<String, Arc<Attribute>>>,
    linked: Mutex<Vec<Weak<Object>>>,
    dirty: AtomicBool,
}

impl Object {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            object_type: object_type.into(),
            remote_type: Mutex::new(None),
            rendering_priority: Mutex::new(RenderingPriority::PreCamera),
            attributes: RwLock::new(HashMap::new()),
            linked: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn remote_type(&self) -> Option<String> {
        self.remote_type.lock().clone()
    }

    pub fn set_remote_type(&self, remote_type: impl Into<String>) {
        *self.remote_type.lock() = Some(remote_type.into());
    }

    pub fn rendering_priority(&self) -> RenderingPriority {
        *self.rendering_priority.lock()
    }

    pub fn set_rendering_priority(&self, priority: RenderingPriority) {
        *self.rendering_priority.lock() = priority;
    }

    /// Registers `attr` under `name` if absent, overwriting a prior
    /// registration of the same name (the object's own constructor uses this
    /// to wire setter/getter-backed attributes; callers needing
    /// create-if-absent default storage should use `set_attribute`).
    pub fn register_attribute(&self, name: impl Into<String>, attr: Attribute) {
        self.attributes.write().insert(name.into(), Arc::new(attr));
    }

    /// Create-if-absent, dispatch to the Attribute. Returns whether a *new*
    /// Attribute was auto-created (not whether the call itself succeeded),
    /// so the Root knows when it must propagate the definition to peers.
    pub fn set_attribute(&self, name: &str, args: Vec<Value>) -> bool {
        let mut created = false;
        let attr = {
            if let Some(attr) = self.attributes.read().get(name) {
                attr.clone()
            } else {
                let mut attrs = self.attributes.write();
                attrs
                    .entry(name.to_string())
                    .or_insert_with(|| {
                        created = true;
                        Arc::new(Attribute::default_backed(Vec::new()))
                    })
                    .clone()
            }
        };
        if attr.call(&args) {
            self.dirty.store(true, Ordering::SeqCst);
        }
        created
    }

    pub fn get_attribute(&self, name: &str, include_distant: bool, include_non_savable: bool) -> Option<Vec<Value>> {
        let attr = self.attributes.read().get(name)?.clone();
        if !include_distant && attr.is_propagated() {
            return None;
        }
        if !include_non_savable && !attr.is_savable() {
            return None;
        }
        Some(attr.value())
    }

    pub fn attributes(&self) -> HashMap<String, Vec<Value>> {
        self.attributes.read().iter().map(|(k, v)| (k.clone(), v.value())).collect()
    }

    pub fn distant_attributes(&self) -> HashMap<String, Vec<Value>> {
        self.attributes
            .read()
            .iter()
            .filter(|(_, attr)| attr.is_propagated())
            .map(|(k, v)| (k.clone(), v.value()))
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<Arc<Attribute>> {
        self.attributes.read().get(name).cloned()
    }

    /// Adds a weak reference to `other`. Idempotent: a duplicate `link_to`
    /// returns `false` without adding a second entry. The linkee is notified
    /// through a `linked_from` attribute so the graph replicates as ordinary
    /// attribute messages.
    pub fn link_to(&self, other: &Arc<Object>) -> bool {
        let mut linked = self.linked.lock();
        if linked.iter().any(|w| w.upgrade().map(|o| Arc::ptr_eq(&o, other)).unwrap_or(false)) {
            return false;
        }
        linked.push(Arc::downgrade(other));
        drop(linked);
        other.set_attribute("linked_from", vec![Value::from_string(self.name.clone())]);
        true
    }

    pub fn unlink_from(&self, other: &Arc<Object>) -> bool {
        let mut linked = self.linked.lock();
        let before = linked.len();
        linked.retain(|w| w.upgrade().map(|o| !Arc::ptr_eq(&o, other)).unwrap_or(true));
        let removed = linked.len() != before;
        drop(linked);
        if removed {
            other.set_attribute("unlinked_from", vec![Value::from_string(self.name.clone())]);
        }
        removed
    }

    /// Strong snapshot of live links; expired weak references are elided
    /// (not removed from the underlying list until the next mutation).
    pub fn linked_objects(&self) -> Vec<Arc<Object>> {
        self.linked.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn was_updated(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_attribute_reports_creation_not_call_success() {
        let obj = Object::new("o", "generic");
        assert!(obj.set_attribute("foo", vec![Value::from_i64(1)]));
        assert!(!obj.set_attribute("foo", vec![Value::from_i64(2)]));
        assert_eq!(obj.get_attribute("foo", true, true), Some(vec![Value::from_i64(2)]));
    }

    #[test]
    fn set_attribute_marks_object_dirty() {
        let obj = Object::new("o", "generic");
        obj.clear_dirty();
        assert!(!obj.was_updated());
        obj.set_attribute("foo", vec![Value::from_i64(1)]);
        assert!(obj.was_updated());
    }

    #[test]
    fn distant_attributes_filters_by_propagate_flag() {
        let obj = Object::new("o", "generic");
        obj.register_attribute("visible", Attribute::default_backed(vec![Value::from_i64(1)]).propagated(true));
        obj.register_attribute("hidden", Attribute::default_backed(vec![Value::from_i64(2)]));
        let distant = obj.distant_attributes();
        assert!(distant.contains_key("visible"));
        assert!(!distant.contains_key("hidden"));
    }

    #[test]
    fn link_to_is_idempotent_and_notifies_the_peer() {
        let a = Arc::new(Object::new("a", "generic"));
        let b = Arc::new(Object::new("b", "generic"));
        assert!(a.link_to(&b));
        assert!(!a.link_to(&b));
        assert_eq!(a.linked_objects().len(), 1);
        assert_eq!(b.get_attribute("linked_from", true, true), Some(vec![Value::from_string("a")]));
    }

    #[test]
    fn unlink_from_removes_the_link() {
        let a = Arc::new(Object::new("a", "generic"));
        let b = Arc::new(Object::new("b", "generic"));
        a.link_to(&b);
        assert!(a.unlink_from(&b));
        assert!(a.linked_objects().is_empty());
    }
}

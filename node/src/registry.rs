//! The Object Registry (spec.md §5 "read/write locked"): strong ownership of
//! every Object a Root hosts. Grounds `basetypes.h`'s `RootObject::_objects`
//! map and its `dynamic_pointer_cast<BufferObject>` dispatch in
//! `setFromSerializedObject` — an enum stands in for the downcast since
//! Object and BufferObject aren't in the same inheritance chain here.

use objects::{BufferObject, BufferPayload, Object};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Anything a Root can route an inbound buffer to. Implemented for
/// `Arc<BufferObject<P>>` so the registry can hold buffer-carrying objects
/// of differing payload types behind one trait object.
pub trait BufferSink: Send + Sync {
    fn object(&self) -> &Object;
    fn stage(&self, bytes: Vec<u8>);
}

impl<P: BufferPayload + 'static> BufferSink for Arc<BufferObject<P>> {
    fn object(&self) -> &Object {
        BufferObject::object(self.as_ref())
    }

    fn stage(&self, bytes: Vec<u8>) {
        BufferObject::stage_serialized(self, bytes);
    }
}

#[derive(Clone)]
pub enum RegisteredObject {
    Plain(Arc<Object>),
    Buffer(Arc<dyn BufferSink>),
}

impl RegisteredObject {
    pub fn object(&self) -> &Object {
        match self {
            RegisteredObject::Plain(obj) => obj,
            RegisteredObject::Buffer(sink) => sink.object(),
        }
    }

    pub fn as_buffer_sink(&self) -> Option<&Arc<dyn BufferSink>> {
        match self {
            RegisteredObject::Buffer(sink) => Some(sink),
            RegisteredObject::Plain(_) => None,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, RegisteredObject>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&self, entry: RegisteredObject) {
        let name = entry.object().name().to_string();
        self.entries.write().insert(name, entry);
    }

    pub fn unregister(&self, name: &str) {
        self.entries.write().remove(name);
    }

    pub fn get(&self, name: &str) -> Option<RegisteredObject> {
        self.entries.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<RegisteredObject> {
        self.entries.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splash_sdk::Value;

    struct Bytes(Vec<u8>);
    impl BufferPayload for Bytes {
        fn serialize(&self) -> Vec<u8> {
            self.0.clone()
        }
        fn deserialize(&mut self, bytes: &[u8]) -> bool {
            self.0 = bytes.to_vec();
            true
        }
    }

    #[test]
    fn registers_and_looks_up_plain_objects() {
        let registry = Registry::new();
        registry.register(RegisteredObject::Plain(Arc::new(Object::new("cam1", "camera"))));
        assert!(registry.get("cam1").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["cam1".to_string()]);
    }

    #[test]
    fn buffer_objects_route_through_the_sink_trait() {
        let registry = Registry::new();
        let buf = BufferObject::new("img1", "image", Bytes(Vec::new()));
        registry.register(RegisteredObject::Buffer(buf.clone()));

        let entry = registry.get("img1").expect("registered");
        entry.as_buffer_sink().expect("is a buffer sink").stage(vec![1, 2, 3]);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(buf.serialize(), vec![1, 2, 3]);
        assert_eq!(entry.object().name(), "img1");
        let _ = Value::empty();
    }
}

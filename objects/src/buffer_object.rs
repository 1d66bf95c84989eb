//! BufferObject (spec.md §4.3): an Object additionally carrying a large,
//! opaque, out-of-band payload (image, mesh, audio block, ...) whose wire
//! format is specific to the concrete object type.

use crate::object::Object;
use parking_lot::{Mutex, RwLock};
use splash_sdk::now_ms;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// The object-type-specific payload a BufferObject stages and swaps in.
/// Implementations must not block for long inside `deserialize`: it runs on
/// a dedicated worker thread, never on the Tree-seed or Link threads.
pub trait BufferPayload: Send + Sync {
    fn serialize(&self) -> Vec<u8>;
    /// Applies `bytes`, returning whether they were valid for this payload.
    fn deserialize(&mut self, bytes: &[u8]) -> bool;
}

pub struct BufferObject<P: BufferPayload> {
    object: Object,
    payload: RwLock<P>,
    staged: Mutex<Option<Vec<u8>>>,
    /// CAS latch enforcing the single-writer-per-object invariant (spec.md
    /// §4.3): only one deserialize worker runs per BufferObject at a time.
    deserializing: AtomicBool,
    timestamp_ms: AtomicI64,
    updated: AtomicBool,
    on_update: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl<P: BufferPayload + 'static> BufferObject<P> {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>, payload: P) -> Arc<Self> {
        Arc::new(BufferObject {
            object: Object::new(name, object_type),
            payload: RwLock::new(payload),
            staged: Mutex::new(None),
            deserializing: AtomicBool::new(false),
            timestamp_ms: AtomicI64::new(-1),
            updated: AtomicBool::new(false),
            on_update: Mutex::new(None),
        })
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Registers the callback fired every time `update_timestamp` runs;
    /// the Root uses this to signal its buffer-updated condition.
    pub fn on_buffer_updated(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        *self.on_update.lock() = Some(callback);
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms.load(Ordering::SeqCst)
    }

    pub fn was_updated(&self) -> bool {
        self.updated.load(Ordering::SeqCst) || self.object.was_updated()
    }

    pub fn set_not_updated(&self) {
        self.object.clear_dirty();
        self.updated.store(false, Ordering::SeqCst);
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.payload.read().serialize()
    }

    /// Applies `bytes` synchronously and advances the timestamp on success.
    /// Used directly by tests and by `drain_staged`; callers racing with
    /// replication should prefer `stage_serialized`.
    pub fn deserialize(&self, bytes: &[u8]) -> bool {
        let ok = self.payload.write().deserialize(bytes);
        if ok {
            self.update_timestamp();
        }
        ok
    }

    /// Advances `timestamp_ms` to a monotonic source and signals the
    /// registered buffer-updated callback. Timestamp is strictly monotonic
    /// per object within a process (spec.md §5).
    pub fn update_timestamp(&self) {
        let now = now_ms();
        let mut current = self.timestamp_ms.load(Ordering::SeqCst);
        while now > current {
            match self.timestamp_ms.compare_exchange_weak(current, now, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.updated.store(true, Ordering::SeqCst);
        if let Some(cb) = self.on_update.lock().clone() {
            cb();
        }
    }

    /// Atomically swaps in a newly received blob and, if no deserialize is
    /// already running for this object, spawns a worker to apply it. If one
    /// is already running, the freshest staged blob is picked up when that
    /// worker loops back (buffers coalesce: an in-flight stale frame is
    /// simply replaced, never queued twice).
    pub fn stage_serialized(self: &Arc<Self>, bytes: Vec<u8>) {
        *self.staged.lock() = Some(bytes);
        if self.deserializing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            let this = Arc::clone(self);
            let name = this.object.name().to_string();
            util::thread::spawn_with_name(format!("deserialize-{name}"), move || this.drain_staged());
        }
    }

    fn drain_staged(self: &Arc<Self>) {
        loop {
            let Some(bytes) = self.staged.lock().take() else {
                self.deserializing.store(false, Ordering::SeqCst);
                // A concurrent `stage_serialized` may have set `staged`
                // between our `take` above finding it empty and this
                // `store(false)`, then lost the CAS race below because
                // `deserializing` was still `true` at that instant. Without
                // this re-check its buffer would be stranded: nothing left
                // running to drain it. Re-checking after the store closes
                // that window; worst case we spin once more for nothing.
                if self.staged.lock().is_none() {
                    return;
                }
                if self.deserializing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
                    return; // another call already won the re-race and owns draining now
                }
                continue;
            };
            if !self.deserialize(&bytes) {
                warn!("buffer object {}: deserialize rejected staged buffer", self.object.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Counter(Vec<u8>);

    impl BufferPayload for Counter {
        fn serialize(&self) -> Vec<u8> {
            self.0.clone()
        }

        fn deserialize(&mut self, bytes: &[u8]) -> bool {
            if bytes.is_empty() {
                return false;
            }
            self.0 = bytes.to_vec();
            true
        }
    }

    #[test]
    fn deserialize_rejects_empty_buffers() {
        let buf = BufferObject::new("b", "counter", Counter::default());
        assert!(!buf.deserialize(&[]));
        assert!(buf.deserialize(&[1, 2, 3]));
        assert_eq!(buf.serialize(), vec![1, 2, 3]);
    }

    #[test]
    fn update_timestamp_is_monotonic_and_fires_callback() {
        let buf = BufferObject::new("b", "counter", Counter::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        buf.on_buffer_updated(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        buf.update_timestamp();
        let first = buf.timestamp_ms();
        buf.update_timestamp();
        assert!(buf.timestamp_ms() >= first);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stage_serialized_eventually_applies_the_latest_buffer() {
        let buf = BufferObject::new("b", "counter", Counter::default());
        buf.stage_serialized(vec![1]);
        buf.stage_serialized(vec![1, 2]);
        buf.stage_serialized(vec![1, 2, 3]);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(buf.serialize(), vec![1, 2, 3]);
    }

    /// spec.md §8 scenario 3: concurrent `stage_serialized` calls never
    /// strand a buffer — every staged blob is eventually picked up by some
    /// drain worker, even when a caller's CAS attempt loses the race against
    /// a worker that is just about to finish.
    #[test]
    fn concurrent_stage_serialized_calls_never_strand_a_buffer() {
        let buf = BufferObject::new("b", "counter", Counter::default());
        let handles: Vec<_> = (1u8..=8)
            .map(|i| {
                let buf = buf.clone();
                thread::spawn(move || buf.stage_serialized(vec![i]))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut settled = false;
        for _ in 0..100 {
            if !buf.serialize().is_empty() {
                settled = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(settled, "a concurrently staged buffer was stranded");
    }
}

//! A named, type-checked functor (spec.md §4.1): the spine configuration,
//! remote control and persistence all funnel through.

use parking_lot::Mutex;
use splash_sdk::value::Type;
use splash_sdk::Value;
use std::sync::Arc;
use tracing::warn;

pub type Setter = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;
pub type Getter = Arc<dyn Fn() -> Vec<Value> + Send + Sync>;

/// Whether a remote update to this Attribute must be applied synchronously
/// by the Link's inbound worker, or may be queued on the Root's task FIFO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Async,
    ForceSync,
}

struct Inner {
    setter: Option<Setter>,
    getter: Option<Getter>,
    default_value: Vec<Value>,
    signature: Option<Vec<Type>>,
    locked: bool,
    description: String,
    savable: bool,
    propagate: bool,
    sync_mode: SyncMode,
}

/// An `Attribute` is either "default-backed" (no setter/getter; `call`
/// stores its argument list directly) or backed by a setter/getter pair
/// supplied by the owning Object.
pub struct Attribute {
    inner: Mutex<Inner>,
}

impl Attribute {
    pub fn default_backed(initial: Vec<Value>) -> Self {
        Attribute {
            inner: Mutex::new(Inner {
                setter: None,
                getter: None,
                default_value: initial,
                signature: None,
                locked: false,
                description: String::new(),
                savable: true,
                propagate: false,
                sync_mode: SyncMode::Async,
            }),
        }
    }

    pub fn with_functions(setter: Setter, getter: Option<Getter>, signature: Vec<Type>) -> Self {
        Attribute {
            inner: Mutex::new(Inner {
                setter: Some(setter),
                getter,
                default_value: Vec::new(),
                signature: Some(signature),
                locked: false,
                description: String::new(),
                savable: true,
                propagate: false,
                sync_mode: SyncMode::Async,
            }),
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.inner.get_mut().description = description.into();
        self
    }

    pub fn savable(mut self, savable: bool) -> Self {
        self.inner.get_mut().savable = savable;
        self
    }

    pub fn propagated(mut self, propagate: bool) -> Self {
        self.inner.get_mut().propagate = propagate;
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.inner.get_mut().sync_mode = mode;
        self
    }

    /// Validates and dispatches `args`. Returns `false` without effect if
    /// locked, or if the argument count/types don't match the signature.
    pub fn call(&self, args: &[Value]) -> bool {
        let mut inner = self.inner.lock();
        if inner.locked {
            return false;
        }
        if inner.setter.is_none() {
            if inner.signature.is_none() {
                inner.signature = Some(args.iter().map(|v| v.get_type()).collect());
            }
            inner.default_value = args.to_vec();
            return true;
        }
        if let Some(signature) = inner.signature.clone() {
            if args.len() < signature.len() {
                warn!("attribute call: expected at least {} args, got {}", signature.len(), args.len());
                return false;
            }
            for (arg, expected) in args.iter().zip(signature.iter()) {
                if !arg.is_convertible_to(*expected) {
                    warn!("attribute call: argument type mismatch, expected {:?}", expected);
                    return false;
                }
            }
        }
        let setter = inner.setter.clone().expect("checked above");
        drop(inner);
        setter(args)
    }

    /// Returns the current value: the stored default, or the getter's
    /// result if one is set.
    pub fn value(&self) -> Vec<Value> {
        let inner = self.inner.lock();
        if let Some(getter) = &inner.getter {
            let getter = getter.clone();
            drop(inner);
            getter()
        } else {
            inner.default_value.clone()
        }
    }

    /// Optionally sets `args` first, then marks the Attribute immutable.
    pub fn lock(&self, args: Option<Vec<Value>>) {
        if let Some(args) = args {
            self.call(&args);
        }
        self.inner.lock().locked = true;
    }

    pub fn unlock(&self) {
        self.inner.lock().locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    pub fn description(&self) -> String {
        self.inner.lock().description.clone()
    }

    pub fn is_savable(&self) -> bool {
        self.inner.lock().savable
    }

    pub fn is_propagated(&self) -> bool {
        self.inner.lock().propagate
    }

    pub fn get_sync_mode(&self) -> SyncMode {
        self.inner.lock().sync_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn default_backed_attribute_stores_and_returns_value() {
        let attr = Attribute::default_backed(vec![]);
        assert!(attr.call(&[Value::from_i64(42)]));
        assert_eq!(attr.value(), vec![Value::from_i64(42)]);
    }

    #[test]
    fn locked_attribute_rejects_calls() {
        let attr = Attribute::default_backed(vec![Value::from_i64(1)]);
        attr.lock(None);
        assert!(!attr.call(&[Value::from_i64(2)]));
        assert_eq!(attr.value(), vec![Value::from_i64(1)]);
        attr.unlock();
        assert!(attr.call(&[Value::from_i64(2)]));
    }

    #[test]
    fn lock_with_args_applies_them_before_locking() {
        let attr = Attribute::default_backed(vec![]);
        attr.lock(Some(vec![Value::from_i64(7)]));
        assert_eq!(attr.value(), vec![Value::from_i64(7)]);
        assert!(!attr.call(&[Value::from_i64(8)]));
    }

    #[test]
    fn setter_backed_attribute_rejects_short_arg_lists() {
        let stored = Arc::new(AtomicI64::new(0));
        let stored2 = stored.clone();
        let attr = Attribute::with_functions(
            Arc::new(move |args: &[Value]| {
                let Some(v) = args.first().and_then(|v| v.as_i64()) else {
                    return false;
                };
                stored2.store(v, Ordering::SeqCst);
                true
            }),
            None,
            vec![Type::Int],
        );
        assert!(!attr.call(&[]));
        assert!(attr.call(&[Value::from_i64(99)]));
        assert_eq!(stored.load(Ordering::SeqCst), 99);
    }
}

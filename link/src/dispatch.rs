//! The callback surface a Root implements so its Link can hand off inbound
//! traffic (spec.md §4.5 "On arrival: messages -> dispatch to Root.set(...);
//! buffers -> ... stage_serialized or Root.handle_serialized").

use splash_sdk::Value;

pub trait LinkDispatch: Send + Sync {
    /// `async_hint` is `true` for ordinary inbound messages (may be queued on
    /// the Root's task FIFO); the Root itself decides to instead apply
    /// synchronously when the target Attribute's sync mode demands it.
    fn dispatch_message(&self, sender: &str, target: &str, attribute: &str, values: Vec<Value>, async_hint: bool);

    /// `target` names a BufferObject if one is registered under that name;
    /// otherwise the Root's default is to log and drop (spec.md §4.5).
    fn dispatch_buffer(&self, sender: &str, target: &str, bytes: Vec<u8>);
}

//! The two payload shapes a Link moves (spec.md §4.5): small typed messages
//! routed through the Tree/Attribute machinery, and large opaque buffers
//! routed straight to a BufferObject.

use splash_sdk::Value;

#[derive(Clone, Debug)]
pub struct MessageEnvelope {
    pub sender: String,
    pub target: String,
    pub attribute: String,
    pub values: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct BufferEnvelope {
    pub sender: String,
    pub target: String,
    pub bytes: Vec<u8>,
}

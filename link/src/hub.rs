//! The delivery substrate Links address each other through. Spec.md §6.5
//! puts the real wire protocol (a "TCP-like substrate") out of scope; `Hub`
//! is the minimal in-process stand-in that still exercises every contract
//! in §4.5 (connect-before-peer-exists, ordered per-(sender,target)
//! delivery, ...).

use crate::envelope::{BufferEnvelope, MessageEnvelope};
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct PeerChannels {
    messages: Sender<MessageEnvelope>,
    buffers: Sender<BufferEnvelope>,
}

#[derive(Default)]
pub struct Hub {
    peers: Mutex<HashMap<String, PeerChannels>>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Hub::default())
    }

    pub(crate) fn register(&self, name: &str, messages: Sender<MessageEnvelope>, buffers: Sender<BufferEnvelope>) {
        self.peers.lock().insert(name.to_string(), PeerChannels { messages, buffers });
    }

    pub(crate) fn unregister(&self, name: &str) {
        self.peers.lock().remove(name);
    }

    /// Delivers `envelope` to `peer`'s message inbound queue. Returns
    /// `false` if `peer` isn't (yet, or any longer) registered.
    pub(crate) fn deliver_message(&self, peer: &str, envelope: MessageEnvelope) -> bool {
        self.peers.lock().get(peer).map(|p| p.messages.send(envelope).is_ok()).unwrap_or(false)
    }

    pub(crate) fn deliver_buffer(&self, peer: &str, envelope: BufferEnvelope) -> bool {
        self.peers.lock().get(peer).map(|p| p.buffers.send(envelope).is_ok()).unwrap_or(false)
    }
}

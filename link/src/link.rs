//! The Link transport (spec.md §4.5): delivers messages and buffers between
//! Roots, with per-(sender,target) ordering, request/response correlation,
//! and watermark-bounded, coalescing buffer delivery.

use crate::dispatch::LinkDispatch;
use crate::envelope::{BufferEnvelope, MessageEnvelope};
use crate::hub::Hub;
use crossbeam::channel::{unbounded, Receiver};
use futures_util_splash::latest_channel;
use parking_lot::{Condvar, Mutex};
use splash_sdk::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use util::thread::{spawn_with_name, ShutdownFlag};

/// Outbound buffer queue depth, across all (peer, target) pairs, above
/// which `send_buffer` blocks the caller (spec.md §4.5 "Backpressure").
const DEFAULT_HIGH_WATER: usize = 64;
const DEFAULT_LOW_WATER: usize = 16;

#[derive(Default)]
struct AnswerState {
    expected: Option<String>,
    received: Option<Vec<Value>>,
}

pub struct Link {
    name: String,
    hub: Arc<Hub>,
    dispatch: Arc<dyn LinkDispatch>,
    connected: Mutex<HashSet<String>>,
    buffer_senders: Mutex<HashMap<(String, String), latest_channel::Sender<Vec<u8>>>>,
    pending_buffers: Mutex<HashSet<(String, String)>>,
    water: Condvar,
    high_water: usize,
    low_water: usize,
    answer: Mutex<AnswerState>,
    answer_condvar: Condvar,
    shutdown: ShutdownFlag,
}

impl Link {
    pub fn new(name: impl Into<String>, hub: Arc<Hub>, dispatch: Arc<dyn LinkDispatch>, shutdown: ShutdownFlag) -> Arc<Self> {
        let name = name.into();
        let link = Arc::new(Link {
            name: name.clone(),
            hub: hub.clone(),
            dispatch,
            connected: Mutex::new(HashSet::new()),
            buffer_senders: Mutex::new(HashMap::new()),
            pending_buffers: Mutex::new(HashSet::new()),
            water: Condvar::new(),
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_LOW_WATER,
            answer: Mutex::new(AnswerState::default()),
            answer_condvar: Condvar::new(),
            shutdown,
        });

        let (msg_tx, msg_rx) = unbounded();
        let (buf_tx, buf_rx) = unbounded();
        hub.register(&name, msg_tx, buf_tx);

        let messages_link = link.clone();
        spawn_with_name(format!("link-{name}-messages"), move || messages_link.run_message_worker(msg_rx));
        let buffers_link = link.clone();
        spawn_with_name(format!("link-{name}-buffers"), move || buffers_link.run_buffer_worker(buf_rx));

        link
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares interest in `peer_name`. Safe to call before that peer has
    /// registered with the hub: delivery is attempted lazily, on send.
    pub fn connect_to(&self, peer_name: impl Into<String>) {
        self.connected.lock().insert(peer_name.into());
    }

    /// Broadcasts `(target, attribute, values)` to every connected peer.
    /// Returns `true` if at least one connected peer was reachable.
    pub fn send_message(&self, target: &str, attribute: &str, values: Vec<Value>) -> bool {
        let peers: Vec<String> = self.connected.lock().iter().cloned().collect();
        let mut delivered = false;
        for peer in peers {
            let envelope = MessageEnvelope {
                sender: self.name.clone(),
                target: target.to_string(),
                attribute: attribute.to_string(),
                values: values.clone(),
            };
            if self.hub.deliver_message(&peer, envelope) {
                delivered = true;
            } else {
                warn!("link {}: peer '{}' unreachable for message '{}'", self.name, peer, attribute);
            }
        }
        delivered
    }

    /// Relinquishes `bytes` to the transport: they are coalesced with any
    /// not-yet-delivered buffer for the same `(peer, target)` pair, so a
    /// stale frame never gets sent once a fresher one exists.
    pub fn send_buffer(self: &Arc<Self>, target: &str, bytes: Vec<u8>) -> bool {
        let peers: Vec<String> = self.connected.lock().iter().cloned().collect();
        if peers.is_empty() {
            return false;
        }
        for peer in &peers {
            self.enqueue_buffer(peer.clone(), target.to_string(), bytes.clone());
        }
        true
    }

    fn enqueue_buffer(self: &Arc<Self>, peer: String, target: String, bytes: Vec<u8>) {
        let key = (peer, target);
        {
            let mut pending = self.pending_buffers.lock();
            if pending.len() >= self.high_water && !pending.contains(&key) {
                self.water.wait_while(&mut pending, |p| p.len() > self.low_water);
            }
            pending.insert(key.clone());
        }
        self.water.notify_all();

        let mut senders = self.buffer_senders.lock();
        if let Some(tx) = senders.get(&key) {
            let _ = tx.send(bytes);
            return;
        }
        let (tx, rx) = latest_channel::channel();
        let _ = tx.send(bytes);
        senders.insert(key.clone(), tx);
        drop(senders);

        let link = self.clone();
        let worker_key = key;
        spawn_with_name(format!("link-buffer-{}-{}", worker_key.0, worker_key.1), move || {
            link.drain_buffer_worker(worker_key, rx)
        });
    }

    fn drain_buffer_worker(self: Arc<Self>, key: (String, String), mut rx: latest_channel::Receiver<Vec<u8>>) {
        use futures::StreamExt;
        loop {
            let Some(bytes) = futures::executor::block_on(rx.next()) else {
                break;
            };
            let envelope = BufferEnvelope {
                sender: self.name.clone(),
                target: key.1.clone(),
                bytes,
            };
            if !self.hub.deliver_buffer(&key.0, envelope) {
                warn!("link {}: peer '{}' unreachable for buffer delivery", self.name, key.0);
            }
            self.pending_buffers.lock().remove(&key);
            self.water.notify_all();
        }
    }

    fn run_message_worker(self: Arc<Self>, rx: Receiver<MessageEnvelope>) {
        while let Ok(envelope) = rx.recv() {
            if self.shutdown.is_set() {
                break;
            }
            if envelope.attribute == "answerMessage" {
                self.try_notify_answer(envelope.values);
                continue;
            }
            self.dispatch.dispatch_message(&envelope.sender, &envelope.target, &envelope.attribute, envelope.values, true);
        }
    }

    fn run_buffer_worker(self: Arc<Self>, rx: Receiver<BufferEnvelope>) {
        while let Ok(envelope) = rx.recv() {
            if self.shutdown.is_set() {
                break;
            }
            self.dispatch.dispatch_buffer(&envelope.sender, &envelope.target, envelope.bytes);
        }
    }

    fn try_notify_answer(&self, values: Vec<Value>) {
        let Some(first) = values.first() else { return };
        let mut state = self.answer.lock();
        if state.expected.as_deref() == Some(first.as_string().as_str()) {
            state.received = Some(values);
            self.answer_condvar.notify_all();
        }
    }

    /// Writes the message, then parks on the answer condvar until a
    /// matching `answerMessage` arrives or `timeout` elapses. Returns an
    /// empty list on timeout; no state is altered in that case.
    pub fn send_message_and_wait_for_answer(&self, target: &str, attribute: &str, values: Vec<Value>, timeout: Duration) -> Vec<Value> {
        {
            let mut state = self.answer.lock();
            state.expected = Some(attribute.to_string());
            state.received = None;
        }
        self.send_message(target, attribute, values);

        let mut state = self.answer.lock();
        let deadline = std::time::Instant::now() + timeout;
        while state.received.is_none() {
            let now = std::time::Instant::now();
            if now >= deadline {
                break;
            }
            let result = self.answer_condvar.wait_for(&mut state, deadline - now);
            if result.timed_out() {
                break;
            }
        }
        let answer = state.received.take();
        state.expected = None;
        answer.unwrap_or_default()
    }

    /// Blocks until every currently-pending coalesced buffer has been
    /// delivered, or `timeout` elapses.
    pub fn wait_for_buffers_sent(&self, timeout: Duration) -> bool {
        let mut pending = self.pending_buffers.lock();
        if pending.is_empty() {
            return true;
        }
        let result = self.water.wait_while_for(&mut pending, |p| !p.is_empty(), timeout);
        !result.timed_out()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.hub.unregister(&self.name);
    }
}

//! The Link transport (spec.md §4.5): message and buffer delivery between
//! Roots, built on an in-process `Hub` standing in for the real wire
//! protocol (out of scope per spec.md §6.5).

pub mod dispatch;
pub mod envelope;
pub mod hub;
pub mod link;

pub use dispatch::LinkDispatch;
pub use envelope::{BufferEnvelope, MessageEnvelope};
pub use hub::Hub;
pub use link::Link;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use splash_sdk::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use util::thread::ShutdownFlag;

    #[derive(Default)]
    struct RecordingDispatch {
        messages: Mutex<Vec<(String, String, String, Vec<Value>)>>,
        buffers: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl LinkDispatch for RecordingDispatch {
        fn dispatch_message(&self, sender: &str, target: &str, attribute: &str, values: Vec<Value>, _async_hint: bool) {
            self.messages.lock().push((sender.to_string(), target.to_string(), attribute.to_string(), values));
        }

        fn dispatch_buffer(&self, sender: &str, target: &str, bytes: Vec<u8>) {
            self.buffers.lock().push((sender.to_string(), target.to_string(), bytes));
        }
    }

    fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition never became true");
    }

    #[test]
    fn delivers_a_message_to_a_connected_peer() {
        let hub = Hub::new();
        let a_dispatch = Arc::new(RecordingDispatch::default());
        let b_dispatch = Arc::new(RecordingDispatch::default());
        let shutdown = ShutdownFlag::new();

        let a = Link::new("a", hub.clone(), a_dispatch.clone(), shutdown.clone());
        let b = Link::new("b", hub, b_dispatch.clone(), shutdown);
        a.connect_to("b");

        assert!(a.send_message("objects/cam", "zoom", vec![Value::from_f64(1.5)]));
        wait_until(|| !b_dispatch.messages.lock().is_empty());
        let received = b_dispatch.messages.lock().clone();
        assert_eq!(received[0].1, "objects/cam");
        assert_eq!(received[0].2, "zoom");
    }

    #[test]
    fn send_message_to_unconnected_peer_is_reported_unreachable() {
        let hub = Hub::new();
        let dispatch = Arc::new(RecordingDispatch::default());
        let shutdown = ShutdownFlag::new();
        let a = Link::new("a", hub, dispatch, shutdown);
        assert!(!a.send_message("x", "y", vec![]));
    }

    #[test]
    fn buffers_coalesce_to_the_latest_frame() {
        let hub = Hub::new();
        let a_dispatch = Arc::new(RecordingDispatch::default());
        let b_dispatch = Arc::new(RecordingDispatch::default());
        let shutdown = ShutdownFlag::new();

        let a = Link::new("a", hub.clone(), a_dispatch, shutdown.clone());
        let _b = Link::new("b", hub, b_dispatch.clone(), shutdown);
        a.connect_to("b");

        assert!(a.send_buffer("cam", vec![1]));
        assert!(a.send_buffer("cam", vec![1, 2]));
        assert!(a.send_buffer("cam", vec![1, 2, 3]));

        wait_until(|| !b_dispatch.buffers.lock().is_empty());
        assert!(a.wait_for_buffers_sent(Duration::from_secs(1)));
    }

    #[test]
    fn send_message_and_wait_for_answer_times_out_with_empty_result() {
        let hub = Hub::new();
        let dispatch = Arc::new(RecordingDispatch::default());
        let shutdown = ShutdownFlag::new();
        let a = Link::new("a", hub, dispatch, shutdown);
        let answer = a.send_message_and_wait_for_answer("x", "ping", vec![], Duration::from_millis(50));
        assert!(answer.is_empty());
    }

    struct Echo(Mutex<Option<Arc<Link>>>);
    impl LinkDispatch for Echo {
        fn dispatch_message(&self, sender: &str, _target: &str, attribute: &str, _values: Vec<Value>, _async_hint: bool) {
            if let Some(link) = self.0.lock().clone() {
                link.send_message(sender, "answerMessage", vec![Value::from_string(attribute), Value::from_i64(42)]);
            }
        }
        fn dispatch_buffer(&self, _sender: &str, _target: &str, _bytes: Vec<u8>) {}
    }

    #[test]
    fn send_message_and_wait_for_answer_wakes_on_matching_reply() {
        let hub = Hub::new();
        let a_dispatch = Arc::new(RecordingDispatch::default());
        let shutdown = ShutdownFlag::new();
        let a = Link::new("a", hub.clone(), a_dispatch, shutdown.clone());

        let echo = Arc::new(Echo(Mutex::new(None)));
        let b = Link::new("b", hub, echo.clone(), shutdown);
        *echo.0.lock() = Some(b.clone());

        a.connect_to("b");
        b.connect_to("a");

        let answer = a.send_message_and_wait_for_answer("scene1", "ping", vec![], Duration::from_secs(2));
        assert_eq!(answer, vec![Value::from_string("ping"), Value::from_i64(42)]);
    }
}

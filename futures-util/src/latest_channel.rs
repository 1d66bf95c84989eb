//! A channel bounded to size 1 that always remembers only the latest element.
//! Sending is always possible and replaces the most recently queued value
//! regardless of whether the receiver has processed it yet.
//!
//! This grounds two parts of spec.md: BufferObject coalescing (§4.5 "a newer
//! buffer arriving for the same target while the previous one is still
//! queued may replace it") and the Root's buffer-updated condition (§4.3/4.6,
//! used by `wait_signal_buffer_updated`).

use std::{
    fmt, result,
    sync::Arc,
    task::{Poll, Waker},
};

use futures::prelude::*;
use parking_lot::Mutex;
use stream::FusedStream;

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Mutex::new(LatestChannelInner::new()));
    (Sender(inner.clone()), Receiver(inner))
}

struct LatestChannelInner<T> {
    value: Option<T>,
    waker: Option<Waker>,
    sender_dropped: bool,
    receiver_dropped: bool,
}

impl<T> LatestChannelInner<T> {
    fn new() -> Self {
        Self {
            value: None,
            waker: None,
            sender_dropped: false,
            receiver_dropped: false,
        }
    }
}

pub struct Sender<T>(Arc<Mutex<LatestChannelInner<T>>>);

#[derive(Debug)]
pub struct ReceiverDropped;

impl fmt::Display for ReceiverDropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverDropped").finish()
    }
}

impl std::error::Error for ReceiverDropped {}

impl<T> Sender<T> {
    /// Replaces the currently queued value, if any. The only failure mode is
    /// the receiver having been dropped.
    pub fn send(&self, value: T) -> result::Result<(), ReceiverDropped> {
        let mut inner = self.0.lock();
        if inner.receiver_dropped {
            return Err(ReceiverDropped);
        }
        inner.value = Some(value);
        if let Some(waker) = inner.waker.take() {
            waker.wake();
        }
        Ok(())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.sender_dropped = true;
        if let Some(waker) = inner.waker.take() {
            waker.wake();
        }
    }
}

pub struct Receiver<T>(Arc<Mutex<LatestChannelInner<T>>>);

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.receiver_dropped = true;
        inner.value = None;
        inner.waker = None;
    }
}

impl<T> FusedStream for Receiver<T> {
    fn is_terminated(&self) -> bool {
        let inner = self.0.lock();
        inner.sender_dropped && inner.value.is_none()
    }
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let mut inner = self.0.lock();
        if inner.sender_dropped {
            Poll::Ready(inner.value.take())
        } else if let Some(value) = inner.value.take() {
            Poll::Ready(Some(value))
        } else {
            inner.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn later_send_coalesces_with_earlier_unread_value() {
        let (tx, mut rx) = channel::<u32>();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(rx.next().await, Some(2));
    }

    #[tokio::test]
    async fn ends_after_sender_drop_once_drained() {
        let (tx, mut rx) = channel::<u32>();
        tx.send(1).unwrap();
        drop(tx);
        assert_eq!(rx.next().await, Some(1));
        assert_eq!(rx.next().await, None);
    }
}

//! A dispatcher for oneshot sender/receiver pairs keyed by a correlation
//! token. This grounds `Link::send_message_and_wait_for_answer` (spec.md
//! §4.5): the Root registers a oneshot receiver under the attribute name it
//! expects an `answerMessage` for, and `notify` wakes it when the reply
//! arrives (or is never called, in which case the caller's timeout fires).

use fnv::FnvHashMap;
use futures::channel::oneshot;
use itertools::repeat_n;
use std::{fmt::Debug, hash::Hash};

#[derive(Debug)]
pub struct OneShotDispatcher<K: Eq + Hash + Debug, V> {
    items: FnvHashMap<K, Vec<oneshot::Sender<V>>>,
}

impl<K: Eq + Hash + Debug, V: Clone> Default for OneShotDispatcher<K, V> {
    fn default() -> Self {
        Self { items: Default::default() }
    }
}

impl<K: Eq + Hash + Debug, V: Clone> OneShotDispatcher<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sender with the dispatcher for a key `K`.
    pub fn register(&mut self, key: K, sender: oneshot::Sender<V>) {
        self.items.entry(key).or_default().push(sender)
    }

    /// Notifies all registered senders for the key `K`. Since these are
    /// oneshot dispatchers, they are all removed.
    pub fn notify(&mut self, key: K, value: V) {
        if let Some(senders) = self.items.remove(&key) {
            let values = repeat_n(value, senders.len());
            for (sender, value) in senders.into_iter().zip(values) {
                // a send failure just means the receiver end was dropped
                // (e.g. the caller already timed out) - not an error here.
                let _ = sender.send(value);
            }
        }
    }

    /// Removes all senders for which the receiver side has been dropped.
    pub fn gc(&mut self) {
        self.items.retain(|_, v| {
            v.retain(|sender| !sender.is_canceled());
            !v.is_empty()
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::OneShotDispatcher;
    use futures::{channel, future::join_all, join};

    #[tokio::test]
    async fn smoke() {
        let pairs = (0..10usize).map(|key| {
            let (s, r) = channel::oneshot::channel::<usize>();
            ((key, s), r)
        });
        let (senders, receivers): (Vec<_>, Vec<_>) = pairs.unzip();

        let mut dispatcher = OneShotDispatcher::new();
        let keys = senders.iter().map(|(key, _)| key).cloned().collect::<Vec<_>>();

        for (key, sender) in senders {
            dispatcher.register(key, sender);
        }

        let consumer = async {
            let results = join_all(receivers).await;
            let expected = keys.iter().cloned().map(Ok).collect::<Vec<_>>();
            assert_eq!(results, expected);
        };
        let producer = async {
            for key in keys {
                dispatcher.notify(key, key);
            }
        };
        join!(consumer, producer);
    }

    #[tokio::test]
    async fn notify_on_unregistered_key_is_a_no_op() {
        let mut dispatcher: OneShotDispatcher<&str, u8> = OneShotDispatcher::new();
        dispatcher.notify("getStatus", 1);
    }

    #[test]
    fn gc_drops_senders_whose_receiver_went_away() {
        let mut dispatcher = OneShotDispatcher::new();
        let (sender, receiver) = futures::channel::oneshot::channel::<u8>();
        dispatcher.register("k", sender);
        drop(receiver);
        dispatcher.gc();
        assert_eq!(dispatcher.keys().count(), 0);
    }
}

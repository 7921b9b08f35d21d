//! Change notification (spec §4.11 / §6.4): subscribers get told which
//! blocks were reverted and which were applied, in commit order, without
//! ever being dispatched to while the writer lock is held.
//!
//! Modeled on the teacher's `ChainTipChange`/broadcast pattern: a single
//! `tokio::sync::broadcast` channel, written to from `Engine::accept_block`
//! after it has released the write lock, read by however many
//! subscribers call [`Dispatcher::subscribe`].

use uplo_chain::ids::BlockID;

/// A monotonically increasing counter stamped on every notification, so a
/// subscriber that misses updates (a slow reader lagging past the
/// channel's ring buffer) can tell it needs to resync from the engine's
/// current state rather than trust a partial notification stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChangeId(pub u64);

/// One atomic change to the active chain: zero or more blocks reverted
/// (highest height first, the order they were actually reverted in),
/// followed by zero or more blocks applied (lowest height first). A
/// block accepted with no reorg has an empty `reverted` and a
/// single-element `applied`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainChange {
    pub id: ChangeId,
    pub reverted: Vec<BlockID>,
    pub applied: Vec<BlockID>,
}

/// A subscription handle. Dropping it unsubscribes; `recv` yields the
/// next change whenever the engine publishes one.
pub struct Subscription {
    receiver: tokio::sync::broadcast::Receiver<ChainChange>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChainChange> {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                // A slow subscriber skipped some changes; the next `recv`
                // call resumes at the oldest one still buffered rather
                // than erroring the caller out entirely.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Owns the broadcast channel and the next `ChangeId` to stamp. Lives on
/// [`crate::Engine`] behind no lock of its own — `publish` only needs
/// `&self`, so it can be called after the engine's write-transaction
/// mutex has already been dropped.
pub struct Dispatcher {
    sender: tokio::sync::broadcast::Sender<ChainChange>,
    next_id: std::sync::atomic::AtomicU64,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Dispatcher {
        let (sender, _receiver) = tokio::sync::broadcast::channel(capacity);
        Dispatcher {
            sender,
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publishes one change. Returns the stamped `ChangeId` regardless of
    /// whether any subscriber is currently listening — a send with no
    /// receivers is not an error, it just means nobody was watching.
    pub fn publish(&self, reverted: Vec<BlockID>, applied: Vec<BlockID>) -> ChangeId {
        let id = ChangeId(self.next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst));
        let _ = self.sender.send(ChainChange {
            id,
            reverted,
            applied,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_subscriber_sees_a_published_change() {
        let dispatcher = Dispatcher::new(16);
        let mut subscription = dispatcher.subscribe();
        let applied = vec![BlockID::from_bytes([1u8; 32])];
        dispatcher.publish(Vec::new(), applied.clone());

        let change = subscription.recv().await.unwrap();
        assert_eq!(change.applied, applied);
        assert!(change.reverted.is_empty());
    }

    #[test]
    fn publishing_with_no_subscribers_does_not_panic() {
        let dispatcher = Dispatcher::new(4);
        dispatcher.publish(Vec::new(), vec![BlockID::from_bytes([2u8; 32])]);
    }
}

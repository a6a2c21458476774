use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle id, used only for registry bookkeeping and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of handing one message to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Outbound queue full; this message is skipped for this subscriber
    Lagging,
    /// Connection gone
    Closed,
}

/// Sending half of a subscriber connection.
///
/// Messages go into a bounded queue drained by the connection's writer task,
/// so handing a message over never waits on the network.
pub struct Subscriber {
    id: SubscriberId,
    peer: Option<SocketAddr>,
    tx: mpsc::Sender<Message>,
    /// Consecutive samples skipped on a full queue
    skipped: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber and the receiving end its writer drains.
    pub fn new(peer: Option<SocketAddr>, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
        (
            Arc::new(Self {
                id,
                peer,
                tx,
                skipped: AtomicU64::new(0),
            }),
            rx,
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Push without waiting. A success after a lagging run logs the recovery
    /// and resets the skip count.
    pub fn try_deliver(&self, message: &Message) -> Delivery {
        match self.tx.try_send(message.clone()) {
            Ok(()) => {
                let missed = self.skipped.swap(0, Ordering::Relaxed);
                if missed > 0 {
                    tracing::info!(subscriber = %self.id, missed, "Subscriber caught up");
                }
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                Delivery::Lagging
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Samples skipped since this subscriber last accepted one
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

/// Per-tick fan-out counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub lagging: usize,
    pub removed: usize,
}

/// Thread-safe set of live subscribers
#[derive(Default)]
pub struct ConnectionRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning the new total
    pub fn add(&self, subscriber: Arc<Subscriber>) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.insert(subscriber.id(), subscriber);
        subscribers.len()
    }

    /// Deregister; false if it was already gone
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.subscribers.write().remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Point-in-time copy of the membership; the lock is released on return
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Offer `message` to every subscriber in a snapshot, evicting closed ones.
    ///
    /// Each delivery is a non-blocking queue push, so a stalled or dead
    /// subscriber costs the others nothing beyond the attempt.
    pub fn broadcast(&self, message: &Message) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();

        for subscriber in self.snapshot() {
            match subscriber.try_deliver(message) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Lagging => {
                    report.lagging += 1;
                    let skipped = subscriber.skipped();
                    if skipped == 1 {
                        tracing::warn!(
                            subscriber = %subscriber.id(),
                            peer = ?subscriber.peer(),
                            "Subscriber queue full, skipping samples"
                        );
                    } else {
                        tracing::debug!(subscriber = %subscriber.id(), skipped, "Subscriber still lagging");
                    }
                }
                Delivery::Closed => dead.push((subscriber.id(), subscriber.peer())),
            }
        }

        for (id, peer) in dead {
            if self.remove(id) {
                report.removed += 1;
                tracing::info!(
                    subscriber = %id,
                    ?peer,
                    remaining = self.len(),
                    "Removed closed subscriber"
                );
            }
        }

        report
    }
}

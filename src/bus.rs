use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender},
};

/// Identifies one mounted feed so it can ignore its own broadcasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeedId(u64);

impl FeedId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A change the user made to one notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedMutation {
    MarkRead(String),
    Delete(String),
    Demote(String),
}

impl FeedMutation {
    pub fn id(&self) -> &str {
        match self {
            FeedMutation::MarkRead(id) | FeedMutation::Delete(id) | FeedMutation::Demote(id) => id,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            FeedMutation::MarkRead(_) => "mark as read",
            FeedMutation::Delete(_) => "delete",
            FeedMutation::Demote(_) => "show less like this",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BusEvent {
    pub origin: FeedId,
    pub mutation: FeedMutation,
}

/// Fan-out channel keeping every mounted feed in agreement about
/// read/deleted/demoted notifications.
#[derive(Clone, Default)]
pub struct MutationBus {
    subscribers: Arc<Mutex<Vec<Sender<BusEvent>>>>,
}

impl MutationBus {
    pub fn subscribe(&self) -> Receiver<BusEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: BusEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Unmounted feeds dropped their receiver.
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

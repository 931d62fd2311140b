use tokio::sync::watch;

use crate::types::GameSnapshot;

/// Holds the single latest authoritative snapshot. Every push from the server
/// replaces the whole value; consumers read, they never merge or mutate.
#[derive(Clone)]
pub struct SnapshotCache {
    tx: watch::Sender<Option<GameSnapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, snapshot: GameSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn latest(&self) -> Option<GameSnapshot> {
        self.tx.borrow().clone()
    }

    /// Subscribe for change notifications. The receiver wakes on every
    /// publish, including ones that replace the snapshot with an equal value.
    pub fn subscribe(&self) -> watch::Receiver<Option<GameSnapshot>> {
        self.tx.subscribe()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Synchronization state of one symbol's order book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No book has been created for the symbol
    Uninitialized,
    /// Book exists but has no snapshot yet; deltas are being cached
    Syncing,
    /// Snapshot applied, deltas are applied live
    Synced,
    /// Book was dropped after a sequence gap; the next watch starts over
    OutOfSync,
}

impl SyncStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }

    /// Whether a snapshot is still required before the book can be served
    pub fn needs_snapshot(&self) -> bool {
        !self.is_ready()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId {
    tid: u64,
}

impl TransactionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let tid = COUNTER.fetch_add(1, Ordering::SeqCst);
        TransactionId { tid }
    }

    pub fn get_tid(&self) -> u64 {
        self.tid
    }

    /// Reconstructs a `TransactionId` from a raw value, e.g. when decoding
    /// one back out of a WAL record. Never allocates a fresh id.
    pub fn from_raw(tid: u64) -> Self {
        TransactionId { tid }
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_transaction_id_increments() {
        let tid1 = TransactionId::new();
        let tid2 = TransactionId::new();
        assert_ne!(tid1, tid2);
    }

    #[test]
    fn test_transaction_id_get_tid() {
        // COUNTER is process-wide and shared with every other test's
        // TransactionId::new() calls, so only relative ordering is stable
        // under a parallel test harness, not absolute values.
        let tid1 = TransactionId::new();
        let tid2 = TransactionId::new();
        assert_eq!(tid2.get_tid(), tid1.get_tid() + 1);
    }
}

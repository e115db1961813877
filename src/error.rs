use thiserror::Error;

/// Unified error type for the storage and transaction core.
///
/// Propagation follows the layering in the design doc: `HeapPage` errors
/// bubble to `HeapFile`, which bubbles to `BufferPool`, which exposes them
/// to operators. Only `TransactionAborted` requires transaction-wide
/// cleanup (the caller must call `transaction_complete(tid, false)`).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("schema mismatch or invalid internal state: {0}")]
    Schema(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transaction aborted")]
    TransactionAborted,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no empty slot on page")]
    NotEnoughSpace,

    #[error("no evictable page in buffer pool")]
    NoEvictable,
}

pub type DbResult<T> = Result<T, DbError>;

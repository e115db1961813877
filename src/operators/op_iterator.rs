use crate::error::DbResult;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// The iterator-model capability every query operator implements: open
/// under a transaction, pull tuples one at a time, rewind to the start
/// without reopening, and close to release any resources held early.
pub trait OpIterator {
    fn open(&mut self, tid: TransactionId) -> DbResult<()>;
    fn has_next(&mut self) -> DbResult<bool>;
    fn next(&mut self) -> DbResult<Option<Tuple>>;
    fn rewind(&mut self) -> DbResult<()>;
    fn close(&mut self);
    fn tuple_desc(&self) -> &TupleDesc;
}

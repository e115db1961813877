use crate::error::DbResult;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

use super::expr::Expr;
use super::op_iterator::OpIterator;

/// Passes through only the child's tuples that satisfy `predicate`. Keeps
/// a one-tuple lookahead buffer so `has_next` can peek past non-matching
/// tuples without losing one.
pub struct Filter {
    predicate: Expr,
    child: Box<dyn OpIterator + Send>,
    peeked: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Expr, child: Box<dyn OpIterator + Send>) -> Self {
        Filter {
            predicate,
            child,
            peeked: None,
        }
    }

    fn advance(&mut self) -> DbResult<()> {
        while self.peeked.is_none() {
            match self.child.next()? {
                Some(t) => {
                    if self.predicate.eval(self.child.tuple_desc(), &t) {
                        self.peeked = Some(t);
                    }
                }
                None => break,
            }
        }
        Ok(())
    }
}

impl OpIterator for Filter {
    fn open(&mut self, tid: TransactionId) -> DbResult<()> {
        self.peeked = None;
        self.child.open(tid)
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.advance()?;
        Ok(self.peeked.is_some())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        self.advance()?;
        Ok(self.peeked.take())
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.peeked = None;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.peeked = None;
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }
}

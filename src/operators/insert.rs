use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::error::DbResult;
use crate::fields::{FieldVal, IntField};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::types::Type;

use super::op_iterator::OpIterator;

/// Inserts every tuple the child produces into `table_id`, then yields a
/// single summary tuple holding the number of rows inserted.
pub struct Insert {
    table_id: i64,
    bp: Arc<BufferPool>,
    child: Box<dyn OpIterator + Send>,
    out_td: TupleDesc,
    result: Option<Tuple>,
    tid: Option<TransactionId>,
}

impl Insert {
    pub fn new(table_id: i64, bp: Arc<BufferPool>, child: Box<dyn OpIterator + Send>) -> Self {
        Insert {
            table_id,
            bp,
            child,
            out_td: TupleDesc::named(vec![Type::Int], vec!["count".into()]),
            result: None,
            tid: None,
        }
    }
}

impl OpIterator for Insert {
    fn open(&mut self, tid: TransactionId) -> DbResult<()> {
        self.tid = Some(tid);
        self.child.open(tid)?;
        let mut count = 0i32;
        while let Some(t) = self.child.next()? {
            self.bp.insert_tuple(tid, self.table_id, t)?;
            count += 1;
        }
        self.result = Some(Tuple::new(
            vec![FieldVal::IntField(IntField::new(count))],
            &self.out_td,
        ));
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self.result.is_some())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.result.take())
    }

    fn rewind(&mut self) -> DbResult<()> {
        let tid = self.tid.ok_or_else(|| {
            crate::error::DbError::InvalidState("insert used before open".into())
        })?;
        self.child.rewind()?;
        self.open(tid)
    }

    fn close(&mut self) {
        self.child.close();
        self.result = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.out_td
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::page_id::{PageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

use super::op_iterator::OpIterator;

/// Reads every tuple of one table, in slot order, page by page, through
/// the buffer pool under `READ_ONLY`.
pub struct SeqScan {
    heap_file: Arc<HeapFile>,
    bp: Arc<BufferPool>,
    tid: Option<TransactionId>,
    page_no: usize,
    buffer: VecDeque<Tuple>,
}

impl SeqScan {
    pub fn new(heap_file: Arc<HeapFile>, bp: Arc<BufferPool>) -> Self {
        SeqScan {
            heap_file,
            bp,
            tid: None,
            page_no: 0,
            buffer: VecDeque::new(),
        }
    }

    fn fill_buffer(&mut self) -> DbResult<bool> {
        let tid = self
            .tid
            .ok_or_else(|| DbError::InvalidState("seq_scan used before open".into()))?;
        let num_pages = self.heap_file.num_pages()?;
        while self.buffer.is_empty() && self.page_no < num_pages {
            let pid = PageId::new(self.heap_file.id(), self.page_no);
            let page_arc = self.bp.get_page(tid, pid, Permission::ReadOnly)?;
            let page = page_arc.read().unwrap();
            self.buffer.extend(page.iter().cloned());
            self.page_no += 1;
        }
        Ok(!self.buffer.is_empty())
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self, tid: TransactionId) -> DbResult<()> {
        self.tid = Some(tid);
        self.page_no = 0;
        self.buffer.clear();
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        self.fill_buffer()
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.buffer.is_empty() && !self.fill_buffer()? {
            return Ok(None);
        }
        Ok(self.buffer.pop_front())
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.page_no = 0;
        self.buffer.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.tid = None;
        self.buffer.clear();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.heap_file.tuple_desc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::fields::{FieldVal, IntField};
    use crate::log_file::LogFile;
    use crate::types::Type;
    use tempfile::tempdir;

    #[test]
    fn scans_in_slot_order_and_rewinds() {
        let dir = tempdir().unwrap();
        let log = Arc::new(LogFile::open(dir.path().join("wal.log")).unwrap());
        let catalog = Arc::new(Catalog::new());
        let cfg = Config {
            page_size: 64,
            ..Config::default()
        };
        let bp = Arc::new(BufferPool::new(cfg, catalog.clone(), log));
        let td = TupleDesc::named(vec![Type::Int], vec!["id".into()]);
        let table_id = catalog.add_table(dir.path().join("t.dat"), td.clone(), None, 64).unwrap();
        let heap_file = catalog.heap_file(table_id).unwrap();

        let setup_tid = TransactionId::new();
        for v in [10, 20, 30] {
            heap_file
                .insert_tuple(setup_tid, Tuple::new(vec![FieldVal::IntField(IntField::new(v))], &td), &bp)
                .unwrap();
        }
        bp.transaction_complete(setup_tid, true).unwrap();

        let mut scan = SeqScan::new(heap_file, bp);
        let tid = TransactionId::new();
        scan.open(tid).unwrap();
        let mut seen = vec![];
        while let Some(t) = scan.next().unwrap() {
            seen.push(t.get_field(0).unwrap().clone().into_int().unwrap().get_value());
        }
        assert_eq!(seen, vec![10, 20, 30]);

        scan.rewind().unwrap();
        assert!(scan.has_next().unwrap());
        scan.close();
    }
}

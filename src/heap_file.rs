use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::heap_page::HeapPage;
use crate::page_id::{PageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// A table stored as a sequence of `HeapPage`s backed by one regular file.
/// `read_page`/`write_page` are the only methods that touch disk directly;
/// everything else (`insert_tuple`, `delete_tuple`, `iter`) goes through a
/// `BufferPool` so that locking and caching stay centralized there.
pub struct HeapFile {
    file: Mutex<File>,
    td: TupleDesc,
    id: i64,
    page_size: usize,
}

impl HeapFile {
    pub fn new(file: File, td: TupleDesc, id: i64, page_size: usize) -> Self {
        HeapFile {
            file: Mutex::new(file),
            td,
            id,
            page_size,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads exactly one page's worth of bytes at `pid`'s offset,
    /// zero-filling any bytes past the current end of file.
    pub fn read_page(&self, pid: &PageId) -> DbResult<HeapPage> {
        if pid.table_id() != self.id {
            return Err(DbError::NotFound(format!(
                "page {:?} does not belong to this table",
                pid
            )));
        }
        let offset = (pid.page_number() * self.page_size) as u64;
        let mut data = vec![0u8; self.page_size];
        let mut file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        if offset < len {
            file.seek(SeekFrom::Start(offset))?;
            let readable = ((len - offset).min(self.page_size as u64)) as usize;
            file.read_exact(&mut data[..readable])?;
        }
        drop(file);
        HeapPage::new(*pid, data, self.td.clone(), self.page_size)
    }

    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let pid = page.id();
        let data = page.serialize();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_number() * self.page_size) as u64))?;
        file.write_all(&data)?;
        Ok(())
    }

    pub fn num_pages(&self) -> DbResult<usize> {
        let file = self.file.lock().unwrap();
        Ok(file.metadata()?.len() as usize / self.page_size)
    }

    /// Scans existing pages for room via the buffer pool; if none has a
    /// free slot, synthesizes a new empty page, inserts into it, and
    /// writes it straight to disk to extend the file. Returns the ids of
    /// pages touched (always a single page). The caller (`BufferPool`) is
    /// responsible for marking any page still resident in its cache dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        mut tuple: Tuple,
        bp: &BufferPool,
    ) -> DbResult<Vec<PageId>> {
        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let pid = PageId::new(self.id, page_no);
            let page_arc = bp.get_page(tid, pid, Permission::ReadWrite)?;
            let mut page = page_arc.write().unwrap();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                return Ok(vec![pid]);
            }
            // give the tuple back for the next iteration
            tuple = Tuple::new(tuple.fields().to_vec(), tuple.tuple_desc());
        }
        let pid = PageId::new(self.id, num_pages);
        let mut page = HeapPage::empty(pid, self.td.clone(), self.page_size)?;
        page.insert_tuple(tuple)?;
        self.write_page(&page)?;
        log::debug!("heap_file {}: extended to {} pages on insert", self.id, num_pages + 1);
        Ok(vec![pid])
    }

    /// Deletes through the buffer pool; returns the page touched so the
    /// caller can mark it dirty.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        bp: &BufferPool,
    ) -> DbResult<PageId> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::NotFound("tuple has no record id".into()))?;
        let pid = rid.page_id();
        let page_arc = bp.get_page(tid, pid, Permission::ReadWrite)?;
        let mut page = page_arc.write().unwrap();
        page.delete_tuple(tuple)?;
        Ok(pid)
    }

    /// A lazy, restartable iterator over every tuple in the file, reading
    /// pages through `bp` under `READ_ONLY`.
    pub fn iter<'a>(&'a self, tid: TransactionId, bp: &'a BufferPool) -> HeapFileIterator<'a> {
        HeapFileIterator {
            heap_file: self,
            bp,
            tid,
            page_no: 0,
            buffer: VecDeque::new(),
        }
    }
}

pub struct HeapFileIterator<'a> {
    heap_file: &'a HeapFile,
    bp: &'a BufferPool,
    tid: TransactionId,
    page_no: usize,
    buffer: VecDeque<Tuple>,
}

impl<'a> HeapFileIterator<'a> {
    pub fn rewind(&mut self) {
        self.page_no = 0;
        self.buffer.clear();
    }

    fn fill_buffer(&mut self) -> DbResult<bool> {
        let num_pages = self.heap_file.num_pages()?;
        while self.buffer.is_empty() && self.page_no < num_pages {
            let pid = PageId::new(self.heap_file.id, self.page_no);
            let page_arc = self.bp.get_page(self.tid, pid, Permission::ReadOnly)?;
            let page = page_arc.read().unwrap();
            self.buffer.extend(page.iter().cloned());
            self.page_no += 1;
        }
        Ok(!self.buffer.is_empty())
    }
}

impl<'a> Iterator for HeapFileIterator<'a> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            match self.fill_buffer() {
                Ok(false) => return None,
                Ok(true) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

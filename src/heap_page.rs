use crate::error::{DbError, DbResult};
use crate::page_id::PageId;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// A fixed-size slotted page: a header bitmap of occupied slots followed
/// by `num_slots` fixed-width tuple bodies, padded to `page_size` bytes.
/// Bit 7 of header byte 0 is slot 0 (big-endian bit order within a byte).
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    td: TupleDesc,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    num_slots: usize,
    before_image: Vec<u8>,
    dirtied_by: Option<TransactionId>,
}

// Equality is structural (pid, schema, header, tuple contents) and
// deliberately ignores the before-image and dirty flag: the round-trip
// property `HeapPage::new(pid, p.serialize()) == p` only talks about the
// logical page contents, and a freshly-constructed page's before-image is
// whatever bytes it was built from, not a re-derivation of `p`'s history.
impl PartialEq for HeapPage {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
            && self.td == other.td
            && self.header == other.header
            && self.tuples == other.tuples
    }
}
impl Eq for HeapPage {}

impl HeapPage {
    pub fn num_slots_for(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    pub fn header_size_for(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    pub fn new(pid: PageId, data: Vec<u8>, td: TupleDesc, page_size: usize) -> DbResult<Self> {
        if data.len() != page_size {
            return Err(DbError::Schema(format!(
                "page data length {} does not match page size {}",
                data.len(),
                page_size
            )));
        }
        let tuple_size = td.tuple_size();
        let num_slots = Self::num_slots_for(page_size, tuple_size);
        let header_size = Self::header_size_for(num_slots);
        let header = data[..header_size].to_vec();

        let mut tuples = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            if Self::get_slot(&header, i) {
                let start = header_size + i * tuple_size;
                let end = start + tuple_size;
                tuples.push(Some(Tuple::deserialize(&data[start..end], &td)?));
            } else {
                tuples.push(None);
            }
        }

        Ok(HeapPage {
            pid,
            td,
            page_size,
            header,
            tuples,
            num_slots,
            before_image: data,
            dirtied_by: None,
        })
    }

    /// An all-zero page of the given schema and page size (no tuples).
    pub fn empty(pid: PageId, td: TupleDesc, page_size: usize) -> DbResult<Self> {
        Self::new(pid, vec![0u8; page_size], td, page_size)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    /// Reconstructs the page as it looked when it was loaded (or when
    /// `set_before_image` was last called), for undo-on-abort.
    pub fn before_image(&self) -> HeapPage {
        // self.before_image was captured from a page of this exact schema
        // and size, so reparsing it cannot fail.
        Self::new(self.pid, self.before_image.clone(), self.td.clone(), self.page_size)
            .expect("before-image bytes are always a valid page of this schema")
    }

    /// Snapshots the current serialized bytes as the new before-image.
    /// Called on commit, after the page's changes have been made durable.
    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }

    pub fn before_image_bytes(&self) -> &[u8] {
        &self.before_image
    }

    pub fn serialize(&self) -> Vec<u8> {
        let tuple_size = self.td.tuple_size();
        let mut data = self.header.clone();
        for slot in &self.tuples {
            match slot {
                Some(t) => data.extend(t.serialize()),
                None => data.extend(std::iter::repeat(0u8).take(tuple_size)),
            }
        }
        data.resize(self.page_size, 0);
        data
    }

    fn get_slot(header: &[u8], i: usize) -> bool {
        let idx = i / 8;
        let bit = i % 8;
        if idx >= header.len() {
            return false;
        }
        let mask = 1u8 << (7 - bit);
        header[idx] & mask != 0
    }

    fn set_slot(header: &mut [u8], i: usize, value: bool) {
        let idx = i / 8;
        let bit = i % 8;
        let mask = 1u8 << (7 - bit);
        if value {
            header[idx] |= mask;
        } else {
            header[idx] &= !mask;
        }
    }

    pub fn get_tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|t| t.as_ref())
    }

    /// Inserts into the lowest-index empty slot and stamps the tuple's
    /// record id. Fails with `NotEnoughSpace` if the page is full.
    pub fn insert_tuple(&mut self, mut t: Tuple) -> DbResult<()> {
        if t.tuple_desc() != &self.td {
            return Err(DbError::Schema(
                "tuple schema does not match page schema".into(),
            ));
        }
        let slot = (0..self.num_slots)
            .find(|&i| !Self::get_slot(&self.header, i))
            .ok_or(DbError::NotEnoughSpace)?;
        t.set_record_id(crate::tuple::RecordId::new(self.pid, slot));
        Self::set_slot(&mut self.header, slot, true);
        self.tuples[slot] = Some(t);
        Ok(())
    }

    /// Deletes a tuple that must reference this page, an occupied slot,
    /// and contents matching what is stored there.
    pub fn delete_tuple(&mut self, t: &mut Tuple) -> DbResult<()> {
        let rid = t
            .record_id()
            .ok_or_else(|| DbError::NotFound("tuple has no record id".into()))?;
        if rid.page_id() != self.pid || rid.slot() >= self.num_slots {
            return Err(DbError::NotFound("tuple not on this page".into()));
        }
        let matches = self.tuples[rid.slot()]
            .as_ref()
            .is_some_and(|stored| stored.fields() == t.fields());
        if !matches {
            return Err(DbError::NotFound("tuple not on this page".into()));
        }
        self.tuples[rid.slot()] = None;
        Self::set_slot(&mut self.header, rid.slot(), false);
        t.clear_record_id();
        Ok(())
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots)
            .filter(|&i| !Self::get_slot(&self.header, i))
            .count()
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = if dirty { Some(tid) } else { None };
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn iter(&self) -> HeapPageIterator<'_> {
        HeapPageIterator {
            page: self,
            index: 0,
        }
    }
}

pub struct HeapPageIterator<'a> {
    page: &'a HeapPage,
    index: usize,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.page.num_slots {
            let i = self.index;
            self.index += 1;
            if let Some(t) = &self.page.tuples[i] {
                return Some(t);
            }
        }
        None
    }
}

use crate::error::{DbError, DbResult};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

use super::op_iterator::OpIterator;

/// Projects each child tuple down to a named subset of its fields,
/// preserving the requested order.
pub struct Project {
    field_names: Vec<String>,
    out_td: TupleDesc,
    indices: Vec<usize>,
    child: Box<dyn OpIterator + Send>,
}

impl Project {
    pub fn new(field_names: Vec<String>, child: Box<dyn OpIterator + Send>) -> DbResult<Self> {
        let child_td = child.tuple_desc();
        let mut indices = Vec::with_capacity(field_names.len());
        let mut types = Vec::with_capacity(field_names.len());
        for name in &field_names {
            let i = child_td
                .name_to_index(name)
                .ok_or_else(|| DbError::Schema(format!("unknown field in projection: {}", name)))?;
            indices.push(i);
            types.push(child_td.field_type(i).unwrap().clone());
        }
        let out_td = TupleDesc::named(types, field_names.clone());
        Ok(Project {
            field_names,
            out_td,
            indices,
            child,
        })
    }

    fn project(&self, t: &Tuple) -> Tuple {
        let fields = self
            .indices
            .iter()
            .map(|&i| t.get_field(i).unwrap().clone())
            .collect();
        Tuple::new(fields, &self.out_td)
    }
}

impl OpIterator for Project {
    fn open(&mut self, tid: TransactionId) -> DbResult<()> {
        self.child.open(tid)
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.child.has_next()
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.child.next()?.map(|t| self.project(&t)))
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.out_td
    }
}

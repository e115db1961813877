use std::fmt::{Display, Formatter};

use crate::fields::FieldVal;
use crate::page_id::PageId;
use crate::types::Type;

/// Identity of a stored tuple: the page it lives on and its slot index.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct RecordId {
    pid: PageId,
    slot: usize,
}

impl RecordId {
    pub fn new(pid: PageId, slot: usize) -> Self {
        RecordId { pid, slot }
    }

    pub fn page_id(&self) -> PageId {
        self.pid
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// An ordered sequence of (Type, optional name) describing a tuple's
/// schema. Per the data model, equality compares only the type sequence —
/// two schemas with the same types but different field names are equal.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    types: Vec<Type>,
    names: Vec<Option<String>>,
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}
impl Eq for TupleDesc {}

impl TupleDesc {
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Self {
        assert!(!types.is_empty(), "TupleDesc requires at least one field");
        assert_eq!(types.len(), names.len());
        TupleDesc { types, names }
    }

    /// Convenience constructor for schemas where every field is named.
    pub fn named(types: Vec<Type>, names: Vec<String>) -> Self {
        TupleDesc::new(types, names.into_iter().map(Some).collect())
    }

    /// Concatenates two schemas: `merge(a, b)` has `a`'s fields followed by
    /// `b`'s. Associative in the sense that
    /// `merge(merge(a,b),c) == merge(a,merge(b,c))` field-sequence-wise.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut types = a.types.clone();
        types.extend(b.types.clone());
        let mut names = a.names.clone();
        names.extend(b.names.clone());
        TupleDesc { types, names }
    }

    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.names.get(i).and_then(|n| n.as_deref())
    }

    pub fn name_to_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.as_deref() == Some(name))
    }

    pub fn field_type(&self, i: usize) -> Option<&Type> {
        self.types.get(i)
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    /// Tuple body size in bytes: the sum of each field's encoded length.
    pub fn tuple_size(&self) -> usize {
        self.types.iter().map(Type::get_len).sum()
    }
}

/// A row: an ordered sequence of field values matching some `TupleDesc`'s
/// arity, plus an optional back-pointer to where it is stored on disk. The
/// back-pointer is a weak relation used only for lookup, never ownership.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Tuple {
    fields: Vec<FieldVal>,
    td: TupleDesc,
    rid: Option<RecordId>,
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            let name = self.td.field_name(i).unwrap_or("?");
            match field {
                FieldVal::IntField(int_field) => {
                    s.push_str(&format!("{}: {}", name, int_field.get_value()))
                }
                FieldVal::StringField(string_field) => {
                    s.push_str(&format!("{}: {}", name, string_field.get_value()))
                }
            }
            if i != self.fields.len() - 1 {
                s.push_str(", ");
            }
        }
        write!(f, "{{{}}}", s)
    }
}

impl Tuple {
    pub fn new(fields: Vec<FieldVal>, td: &TupleDesc) -> Self {
        Tuple {
            fields,
            td: td.clone(),
            rid: None,
        }
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }

    pub fn clear_record_id(&mut self) {
        self.rid = None;
    }

    pub fn get_field(&self, i: usize) -> Option<&FieldVal> {
        self.fields.get(i)
    }

    pub fn set_field(&mut self, i: usize, field: FieldVal) {
        self.fields[i] = field;
    }

    pub fn fields(&self) -> &[FieldVal] {
        &self.fields
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![];
        for field in self.fields.iter() {
            bytes.extend(field.serialize());
        }
        bytes
    }

    pub fn deserialize(bytes: &[u8], td: &TupleDesc) -> crate::error::DbResult<Self> {
        let mut offset = 0;
        let mut fields = vec![];
        for t in td.types().iter() {
            let field = t.parse(&bytes[offset..])?;
            offset += t.get_len();
            fields.push(field);
        }
        Ok(Tuple::new(fields, td))
    }
}

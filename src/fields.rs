use crate::types::Type;

/// Tagged variant over the supported field types. Values are immutable
/// after construction and hashable, per the data model.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum FieldVal {
    IntField(IntField),
    StringField(StringField),
}

impl FieldVal {
    pub fn into_int(self) -> Option<IntField> {
        match self {
            FieldVal::IntField(int_field) => Some(int_field),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<StringField> {
        match self {
            FieldVal::StringField(string_field) => Some(string_field),
            _ => None,
        }
    }

    pub fn get_type(&self) -> Type {
        match self {
            FieldVal::IntField(f) => f.get_type(),
            FieldVal::StringField(f) => f.get_type(),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            FieldVal::IntField(f) => f.serialize(),
            FieldVal::StringField(f) => f.serialize(),
        }
    }
}

pub trait Field {
    fn get_type(&self) -> Type;
    fn serialize(&self) -> Vec<u8>;
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct IntField {
    value: i32,
}

impl IntField {
    pub fn new(value: i32) -> Self {
        IntField { value }
    }

    pub fn get_value(&self) -> i32 {
        self.value
    }
}

impl Field for IntField {
    fn get_type(&self) -> Type {
        Type::Int
    }

    fn serialize(&self) -> Vec<u8> {
        self.value.to_be_bytes().to_vec()
    }
}

/// A UTF-8 string bounded at `bound` bytes. Values longer than `bound` are
/// truncated (on byte boundaries, falling back to lossy UTF-8 decoding) at
/// construction time so every `StringField` is always encodable.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct StringField {
    value: String,
    bound: usize,
}

impl StringField {
    pub fn new(value: String, bound: usize) -> Self {
        let value = if value.len() > bound {
            String::from_utf8_lossy(&value.as_bytes()[..bound]).into_owned()
        } else {
            value
        };
        StringField { value, bound }
    }

    pub fn get_value(&self) -> String {
        self.value.clone()
    }

    pub fn get_bound(&self) -> usize {
        self.bound
    }
}

impl Field for StringField {
    fn get_type(&self) -> Type {
        Type::Str(self.bound)
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![0; self.bound + 4];
        let str_bytes = self.value.as_bytes();
        bytes[0..4].copy_from_slice(&(str_bytes.len() as u32).to_be_bytes());
        bytes[4..4 + str_bytes.len()].copy_from_slice(str_bytes);
        bytes
    }
}

use crate::error::{DbError, DbResult};
use crate::fields::{Field, FieldVal, IntField, StringField};

/// The closed set of field types: a 4-byte big-endian signed integer, or a
/// length-prefixed, zero-padded UTF-8 string bounded at `n` bytes.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Type {
    Int,
    Str(usize),
}

impl Type {
    // Encoded length in bytes: 4 for Int, 4 + n for Str(n).
    pub fn get_len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::Str(n) => 4 + n,
        }
    }

    // Parses exactly get_len() bytes off the front of bytes.
    pub fn parse(&self, bytes: &[u8]) -> DbResult<FieldVal> {
        match self {
            Type::Int => {
                if bytes.len() < 4 {
                    return Err(DbError::Schema("short buffer for int field".into()));
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&bytes[..4]);
                Ok(FieldVal::IntField(IntField::new(i32::from_be_bytes(buf))))
            }
            Type::Str(n) => {
                if bytes.len() < 4 + n {
                    return Err(DbError::Schema("short buffer for string field".into()));
                }
                let mut len_buf = [0u8; 4];
                len_buf.copy_from_slice(&bytes[..4]);
                let len = u32::from_be_bytes(len_buf) as usize;
                if len > *n {
                    return Err(DbError::Schema("string field length exceeds bound".into()));
                }
                let str_bytes = &bytes[4..4 + len];
                let value = String::from_utf8(str_bytes.to_vec())
                    .map_err(|e| DbError::Schema(e.to_string()))?;
                Ok(FieldVal::StringField(StringField::new(value, *n)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips() {
        let f = IntField::new(-7);
        let bytes = f.serialize();
        let parsed = Type::Int.parse(&bytes).unwrap();
        assert_eq!(parsed, FieldVal::IntField(IntField::new(-7)));
    }

    #[test]
    fn string_round_trips() {
        let f = StringField::new("hi".to_string(), 10);
        let bytes = f.serialize();
        assert_eq!(bytes.len(), Type::Str(10).get_len());
        let parsed = Type::Str(10).parse(&bytes).unwrap();
        assert_eq!(
            parsed,
            FieldVal::StringField(StringField::new("hi".to_string(), 10))
        );
    }
}

use crate::fields::FieldVal;
use crate::tuple::{Tuple, TupleDesc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
}

impl CompareOp {
    fn holds(self, field: &FieldVal, literal: &FieldVal) -> bool {
        match (field, literal) {
            (FieldVal::IntField(a), FieldVal::IntField(b)) => {
                let (a, b) = (a.get_value(), b.get_value());
                match self {
                    CompareOp::Equals => a == b,
                    CompareOp::NotEquals => a != b,
                    CompareOp::LessThan => a < b,
                    CompareOp::GreaterThan => a > b,
                }
            }
            (FieldVal::StringField(a), FieldVal::StringField(b)) => {
                let (a, b) = (a.get_value(), b.get_value());
                match self {
                    CompareOp::Equals => a == b,
                    CompareOp::NotEquals => a != b,
                    CompareOp::LessThan => a < b,
                    CompareOp::GreaterThan => a > b,
                }
            }
            _ => false,
        }
    }
}

/// A single-field predicate: `field_name <op> literal`, evaluated against
/// a tuple's schema-resolved field index.
#[derive(Debug, Clone)]
pub struct Expr {
    field_name: String,
    op: CompareOp,
    literal: FieldVal,
}

impl Expr {
    pub fn new(field_name: impl Into<String>, op: CompareOp, literal: FieldVal) -> Self {
        Expr {
            field_name: field_name.into(),
            op,
            literal,
        }
    }

    /// Evaluates the predicate against `tuple`. A tuple whose schema
    /// lacks the named field never satisfies the predicate.
    pub fn eval(&self, td: &TupleDesc, tuple: &Tuple) -> bool {
        match td.name_to_index(&self.field_name) {
            Some(i) => tuple
                .get_field(i)
                .is_some_and(|f| self.op.holds(f, &self.literal)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::IntField;
    use crate::types::Type;

    #[test]
    fn equals_matches_only_equal_values() {
        let td = TupleDesc::named(vec![Type::Int], vec!["age".into()]);
        let tuple = Tuple::new(vec![FieldVal::IntField(IntField::new(30))], &td);
        let eq = Expr::new("age", CompareOp::Equals, FieldVal::IntField(IntField::new(30)));
        let gt = Expr::new("age", CompareOp::GreaterThan, FieldVal::IntField(IntField::new(30)));
        assert!(eq.eval(&td, &tuple));
        assert!(!gt.eval(&td, &tuple));
    }

    #[test]
    fn unknown_field_never_matches() {
        let td = TupleDesc::named(vec![Type::Int], vec!["age".into()]);
        let tuple = Tuple::new(vec![FieldVal::IntField(IntField::new(30))], &td);
        let expr = Expr::new("missing", CompareOp::Equals, FieldVal::IntField(IntField::new(30)));
        assert!(!expr.eval(&td, &tuple));
    }
}

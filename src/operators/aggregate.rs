use std::collections::HashMap;

use crate::error::{DbError, DbResult};
use crate::fields::{FieldVal, IntField};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::types::Type;

use super::op_iterator::OpIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Default, Clone, Copy)]
struct Acc {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl Acc {
    fn add(&mut self, v: i32) {
        self.count += 1;
        self.sum += v as i64;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn result(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Count => self.count as i32,
            AggregateOp::Sum => self.sum as i32,
            AggregateOp::Avg => {
                if self.count == 0 {
                    0
                } else {
                    (self.sum / self.count) as i32
                }
            }
            AggregateOp::Min => self.min.unwrap_or(0),
            AggregateOp::Max => self.max.unwrap_or(0),
        }
    }
}

/// Groups the child's tuples by an optional field and reduces the
/// aggregate field within each group with `op`. With no group field,
/// produces a single output row.
pub struct HashAggregate {
    group_field: Option<String>,
    agg_field: String,
    op: AggregateOp,
    child: Box<dyn OpIterator + Send>,
    out_td: TupleDesc,
    results: Option<std::vec::IntoIter<Tuple>>,
}

impl HashAggregate {
    pub fn new(
        group_field: Option<String>,
        agg_field: impl Into<String>,
        op: AggregateOp,
        child: Box<dyn OpIterator + Send>,
    ) -> DbResult<Self> {
        let agg_field = agg_field.into();
        let child_td = child.tuple_desc();
        if child_td.name_to_index(&agg_field).is_none() {
            return Err(DbError::Schema(format!(
                "unknown aggregate field: {}",
                agg_field
            )));
        }
        let out_td = match &group_field {
            Some(g) => {
                let gt = child_td
                    .field_type(child_td.name_to_index(g).ok_or_else(|| {
                        DbError::Schema(format!("unknown group field: {}", g))
                    })?)
                    .unwrap()
                    .clone();
                TupleDesc::named(vec![gt, Type::Int], vec![g.clone(), "aggregate".into()])
            }
            None => TupleDesc::named(vec![Type::Int], vec!["aggregate".into()]),
        };
        Ok(HashAggregate {
            group_field,
            agg_field,
            op,
            child,
            out_td,
            results: None,
        })
    }

    fn compute(&mut self) -> DbResult<Vec<Tuple>> {
        let child_td = self.child.tuple_desc().clone();
        let agg_idx = child_td.name_to_index(&self.agg_field).unwrap();
        let group_idx = self
            .group_field
            .as_ref()
            .map(|g| child_td.name_to_index(g).unwrap());

        let mut groups: HashMap<Option<FieldVal>, Acc> = HashMap::new();
        let mut group_order: Vec<Option<FieldVal>> = Vec::new();
        while let Some(t) = self.child.next()? {
            let value = match t.get_field(agg_idx).cloned() {
                Some(FieldVal::IntField(f)) => f.get_value(),
                _ => continue,
            };
            let key = group_idx.and_then(|i| t.get_field(i).cloned());
            if !groups.contains_key(&key) {
                group_order.push(key.clone());
            }
            groups.entry(key).or_default().add(value);
        }

        let mut out = Vec::with_capacity(group_order.len().max(1));
        if group_order.is_empty() && self.group_field.is_none() {
            let acc = Acc::default();
            out.push(Tuple::new(
                vec![FieldVal::IntField(IntField::new(acc.result(self.op)))],
                &self.out_td,
            ));
            return Ok(out);
        }
        for key in group_order {
            let acc = groups.get(&key).copied().unwrap_or_default();
            let mut fields = Vec::with_capacity(2);
            if let Some(k) = key {
                fields.push(k);
            }
            fields.push(FieldVal::IntField(IntField::new(acc.result(self.op))));
            out.push(Tuple::new(fields, &self.out_td));
        }
        Ok(out)
    }
}

impl OpIterator for HashAggregate {
    fn open(&mut self, tid: TransactionId) -> DbResult<()> {
        self.child.open(tid)?;
        let results = self.compute()?;
        self.results = Some(results.into_iter());
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self
            .results
            .as_ref()
            .is_some_and(|it| it.as_slice().first().is_some()))
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.results.as_mut().and_then(|it| it.next()))
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.child.rewind()?;
        let results = self.compute()?;
        self.results = Some(results.into_iter());
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.out_td
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, StringField};

    struct VecScan {
        td: TupleDesc,
        data: Vec<Tuple>,
        idx: usize,
    }
    impl OpIterator for VecScan {
        fn open(&mut self, _tid: TransactionId) -> DbResult<()> {
            self.idx = 0;
            Ok(())
        }
        fn has_next(&mut self) -> DbResult<bool> {
            Ok(self.idx < self.data.len())
        }
        fn next(&mut self) -> DbResult<Option<Tuple>> {
            if self.idx < self.data.len() {
                let t = self.data[self.idx].clone();
                self.idx += 1;
                Ok(Some(t))
            } else {
                Ok(None)
            }
        }
        fn rewind(&mut self) -> DbResult<()> {
            self.idx = 0;
            Ok(())
        }
        fn close(&mut self) {}
        fn tuple_desc(&self) -> &TupleDesc {
            &self.td
        }
    }

    fn rows() -> (TupleDesc, Vec<Tuple>) {
        let td = TupleDesc::named(
            vec![Type::Str(10), Type::Int],
            vec!["dept".into(), "salary".into()],
        );
        let data = vec![
            Tuple::new(
                vec![
                    FieldVal::StringField(StringField::new("eng".into(), 10)),
                    FieldVal::IntField(IntField::new(100)),
                ],
                &td,
            ),
            Tuple::new(
                vec![
                    FieldVal::StringField(StringField::new("eng".into(), 10)),
                    FieldVal::IntField(IntField::new(200)),
                ],
                &td,
            ),
            Tuple::new(
                vec![
                    FieldVal::StringField(StringField::new("sales".into(), 10)),
                    FieldVal::IntField(IntField::new(50)),
                ],
                &td,
            ),
        ];
        (td, data)
    }

    #[test]
    fn sums_grouped_by_field() {
        let (td, data) = rows();
        let scan = VecScan { td, data, idx: 0 };
        let mut agg = HashAggregate::new(Some("dept".into()), "salary", AggregateOp::Sum, Box::new(scan)).unwrap();
        agg.open(TransactionId::new()).unwrap();
        let mut out = HashMap::new();
        while let Some(t) = agg.next().unwrap() {
            let dept = t.get_field(0).unwrap().clone().into_string().unwrap().get_value();
            let sum = t.get_field(1).unwrap().clone().into_int().unwrap().get_value();
            out.insert(dept, sum);
        }
        assert_eq!(out.get("eng"), Some(&300));
        assert_eq!(out.get("sales"), Some(&50));
    }

    #[test]
    fn ungrouped_count_returns_single_row() {
        let (td, data) = rows();
        let scan = VecScan { td, data, idx: 0 };
        let mut agg = HashAggregate::new(None, "salary", AggregateOp::Count, Box::new(scan)).unwrap();
        agg.open(TransactionId::new()).unwrap();
        let t = agg.next().unwrap().unwrap();
        assert_eq!(t.get_field(0).unwrap().clone().into_int().unwrap().get_value(), 3);
        assert!(agg.next().unwrap().is_none());
    }
}

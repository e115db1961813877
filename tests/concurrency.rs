use std::sync::Arc;
use std::thread;
use std::time::Duration;

use heapcore::config::Config;
use heapcore::database::Database;
use heapcore::error::DbError;
use heapcore::fields::{FieldVal, IntField, StringField};
use heapcore::operators::{CompareOp, Expr, Filter, OpIterator, Project, SeqScan};
use heapcore::transaction::TransactionId;
use heapcore::tuple::{Tuple, TupleDesc};
use heapcore::types::Type;
use tempfile::tempdir;

fn small_db(page_size: usize, buffer_pool_pages: usize) -> (Database, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let cfg = Config {
        page_size,
        buffer_pool_pages,
        lock_wait_unit: Duration::from_millis(300),
        lock_wait_max_rounds: 3,
    };
    let db = Database::open(dir.path(), cfg).unwrap();
    (db, dir)
}

fn employee_td() -> TupleDesc {
    TupleDesc::named(vec![Type::Int, Type::Str(12)], vec!["id".into(), "name".into()])
}

fn employee(id: i32, name: &str, td: &TupleDesc) -> Tuple {
    Tuple::new(
        vec![
            FieldVal::IntField(IntField::new(id)),
            FieldVal::StringField(StringField::new(name.to_string(), 12)),
        ],
        td,
    )
}

/// Scans, filters, and projects a table the way independent query
/// operators are meant to be composed: SeqScan feeds Filter feeds Project.
#[test]
fn scan_filter_project_compose_through_the_buffer_pool() {
    let (db, dir) = small_db(512, 10);
    let td = employee_td();
    let table_id = db
        .catalog()
        .add_table(dir.path().join("employees.dat"), td.clone(), Some("employees".into()), 512)
        .unwrap();
    let heap_file = db.catalog().heap_file(table_id).unwrap();

    let setup = TransactionId::new();
    for (id, name) in [(0, "Alice"), (1, "Bob"), (2, "Carol")] {
        db.buffer_pool()
            .insert_tuple(setup, table_id, employee(id, name, &td))
            .unwrap();
    }
    db.buffer_pool().transaction_complete(setup, true).unwrap();

    let scan = SeqScan::new(heap_file, db.buffer_pool().clone());
    let filter = Filter::new(
        Expr::new("id", CompareOp::GreaterThan, FieldVal::IntField(IntField::new(0))),
        Box::new(scan),
    );
    let mut project = Project::new(vec!["name".into()], Box::new(filter)).unwrap();

    let tid = TransactionId::new();
    project.open(tid).unwrap();
    let mut names = vec![];
    while let Some(t) = project.next().unwrap() {
        names.push(t.get_field(0).unwrap().clone().into_string().unwrap().get_value());
    }
    project.close();
    db.buffer_pool().transaction_complete(tid, true).unwrap();

    assert_eq!(names, vec!["Bob", "Carol"]);
}

/// Ten threads scanning the same table concurrently should each see every
/// committed row; none should observe a torn or partial read.
#[test]
fn concurrent_reads_of_a_committed_table_are_consistent() {
    let (db, dir) = small_db(512, 50);
    let td = employee_td();
    let table_id = db
        .catalog()
        .add_table(dir.path().join("products.dat"), td.clone(), Some("products".into()), 512)
        .unwrap();

    let setup = TransactionId::new();
    for id in 0..8 {
        db.buffer_pool()
            .insert_tuple(setup, table_id, employee(id, &format!("item{}", id), &td))
            .unwrap();
    }
    db.buffer_pool().transaction_complete(setup, true).unwrap();

    let db = Arc::new(db);
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let db = db.clone();
            let heap_file = db.catalog().heap_file(table_id).unwrap();
            thread::spawn(move || {
                let tid = TransactionId::new();
                let mut scan = SeqScan::new(heap_file, db.buffer_pool().clone());
                scan.open(tid).unwrap();
                let mut count = 0;
                while scan.next().unwrap().is_some() {
                    count += 1;
                }
                scan.close();
                db.buffer_pool().transaction_complete(tid, true).unwrap();
                count
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 8);
    }
}

/// A transaction that starts later and wants the same exclusive page lock
/// blocks until the holder commits, then proceeds without aborting: a
/// single contended resource is not a cycle.
#[test]
fn later_transaction_waits_for_lock_then_succeeds() {
    let (db, dir) = small_db(256, 10);
    let td = employee_td();
    let table_id = db
        .catalog()
        .add_table(dir.path().join("accounts.dat"), td.clone(), Some("accounts".into()), 256)
        .unwrap();

    // seed the table's first page so the locking below goes through the
    // buffer pool rather than the file-extension fast path, which bypasses
    // locking entirely (see HeapFile::insert_tuple).
    let seed = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(seed, table_id, employee(-1, "seed", &td))
        .unwrap();
    db.buffer_pool().transaction_complete(seed, true).unwrap();

    let db = Arc::new(db);

    let t0 = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(t0, table_id, employee(0, "first", &td))
        .unwrap();

    let db2 = db.clone();
    let td2 = td.clone();
    let waiter = thread::spawn(move || {
        let t1 = TransactionId::new();
        db2.buffer_pool()
            .insert_tuple(t1, table_id, employee(1, "second", &td2))
            .unwrap();
        db2.buffer_pool().transaction_complete(t1, true).unwrap();
    });

    thread::sleep(Duration::from_millis(100));
    db.buffer_pool().transaction_complete(t0, true).unwrap();
    waiter.join().unwrap();

    let heap_file = db.catalog().heap_file(table_id).unwrap();
    let scan_tid = TransactionId::new();
    let values: Vec<i32> = heap_file
        .iter(scan_tid, db.buffer_pool())
        .map(|r| r.unwrap().get_field(0).unwrap().clone().into_int().unwrap().get_value())
        .collect();
    db.buffer_pool().transaction_complete(scan_tid, true).unwrap();
    assert_eq!(values, vec![-1, 0, 1]);
}

/// Two transactions that acquire exclusive locks on two pages in opposite
/// order form a wait-for cycle; the lock manager must detect it and abort
/// one side rather than hang.
#[test]
fn cross_table_lock_cycle_aborts_one_side() {
    let (db, dir) = small_db(128, 10);
    let td = employee_td();
    let table_a = db
        .catalog()
        .add_table(dir.path().join("a.dat"), td.clone(), Some("a".into()), 128)
        .unwrap();
    let table_b = db
        .catalog()
        .add_table(dir.path().join("b.dat"), td.clone(), Some("b".into()), 128)
        .unwrap();

    // seed both tables' first page so both sides lock through the buffer
    // pool instead of the lock-free file-extension fast path.
    for id in [table_a, table_b] {
        let seed = TransactionId::new();
        db.buffer_pool().insert_tuple(seed, id, employee(-1, "seed", &td)).unwrap();
        db.buffer_pool().transaction_complete(seed, true).unwrap();
    }

    let db = Arc::new(db);

    let run = |first: i64, second: i64, td: TupleDesc, db: Arc<Database>| {
        move || -> Result<(), DbError> {
            let tid = TransactionId::new();
            db.buffer_pool().insert_tuple(tid, first, employee(0, "x", &td))?;
            thread::sleep(Duration::from_millis(150));
            let result = db.buffer_pool().insert_tuple(tid, second, employee(1, "y", &td));
            match result {
                Ok(()) => {
                    db.buffer_pool().transaction_complete(tid, true)?;
                    Ok(())
                }
                Err(e) => {
                    db.buffer_pool().transaction_complete(tid, false).ok();
                    Err(e)
                }
            }
        }
    };

    let h1 = thread::spawn(run(table_a, table_b, td.clone(), db.clone()));
    let h2 = thread::spawn(run(table_b, table_a, td.clone(), db.clone()));

    let r1 = h1.join().unwrap();
    let r2 = h2.join().unwrap();
    // exactly one side must have been aborted for a deadlock to resolve
    assert_ne!(r1.is_ok(), r2.is_ok());
    assert!(matches!(r1, Ok(()) | Err(DbError::TransactionAborted)));
    assert!(matches!(r2, Ok(()) | Err(DbError::TransactionAborted)));
}

/// Concurrent writers to disjoint tables never contend and both commit.
#[test]
fn concurrent_writes_to_different_tables_do_not_contend() {
    let (db, dir) = small_db(512, 50);
    let td = employee_td();
    let table1 = db
        .catalog()
        .add_table(dir.path().join("t1.dat"), td.clone(), Some("t1".into()), 512)
        .unwrap();
    let table2 = db
        .catalog()
        .add_table(dir.path().join("t2.dat"), td.clone(), Some("t2".into()), 512)
        .unwrap();
    let db = Arc::new(db);

    let handles: Vec<_> = [table1, table2]
        .into_iter()
        .map(|table_id| {
            let db = db.clone();
            let td = td.clone();
            thread::spawn(move || {
                let tid = TransactionId::new();
                for i in 0..10 {
                    db.buffer_pool()
                        .insert_tuple(tid, table_id, employee(i, "row", &td))
                        .unwrap();
                }
                db.buffer_pool().transaction_complete(tid, true).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for table_id in [table1, table2] {
        let heap_file = db.catalog().heap_file(table_id).unwrap();
        let tid = TransactionId::new();
        let count = heap_file.iter(tid, db.buffer_pool()).count();
        db.buffer_pool().transaction_complete(tid, true).unwrap();
        assert_eq!(count, 10);
    }
}

/// Rows written by an aborted transaction never become visible, even after
/// the page that held them gets evicted and reloaded from disk.
#[test]
fn aborted_writes_stay_invisible_after_eviction() {
    let (db, dir) = small_db(128, 1);
    let td = employee_td();
    let table_id = db
        .catalog()
        .add_table(dir.path().join("recovery.dat"), td.clone(), Some("recovery".into()), 128)
        .unwrap();
    let other_id = db
        .catalog()
        .add_table(dir.path().join("other.dat"), td.clone(), Some("other".into()), 128)
        .unwrap();

    let committed = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(committed, table_id, employee(0, "kept", &td))
        .unwrap();
    db.buffer_pool().transaction_complete(committed, true).unwrap();

    let aborted = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(aborted, table_id, employee(1, "lost", &td))
        .unwrap();
    db.buffer_pool().transaction_complete(aborted, false).unwrap();

    // seed the other table directly on disk (its first write bypasses the
    // cache entirely), then touch it a second time so that insert goes
    // through get_page and, with a one-page pool, evicts recovery.dat's
    // cached page.
    let seed_other = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(seed_other, other_id, employee(0, "unrelated", &td))
        .unwrap();
    db.buffer_pool().transaction_complete(seed_other, true).unwrap();

    let evict_tid = TransactionId::new();
    db.buffer_pool()
        .insert_tuple(evict_tid, other_id, employee(1, "unrelated2", &td))
        .unwrap();
    db.buffer_pool().transaction_complete(evict_tid, true).unwrap();

    let heap_file = db.catalog().heap_file(table_id).unwrap();
    let scan_tid = TransactionId::new();
    let names: Vec<String> = heap_file
        .iter(scan_tid, db.buffer_pool())
        .map(|r| r.unwrap().get_field(1).unwrap().clone().into_string().unwrap().get_value())
        .collect();
    db.buffer_pool().transaction_complete(scan_tid, true).unwrap();
    assert_eq!(names, vec!["kept"]);
}

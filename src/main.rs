use std::thread;
use std::time::Duration;

use heapcore::config::Config;
use heapcore::database;
use heapcore::error::DbError;
use heapcore::fields::{FieldVal, IntField, StringField};
use heapcore::operators::{OpIterator, SeqScan};
use heapcore::transaction::TransactionId;
use heapcore::tuple::Tuple;

fn main() {
    env_logger::init();

    let data_dir = std::env::current_dir().unwrap().join("data");
    let db = database::init_global(&data_dir, Config::default()).expect("failed to open database");

    let schema_path = std::env::current_dir().unwrap().join("schemas.txt");
    if schema_path.exists() {
        db.catalog()
            .load_schema(&schema_path, db.config().page_size)
            .expect("failed to load schemas.txt");
    } else {
        db.catalog()
            .add_table(
                data_dir.join("employees.dat"),
                heapcore::tuple::TupleDesc::named(
                    vec![heapcore::types::Type::Int, heapcore::types::Type::Str(20)],
                    vec!["id".into(), "name".into()],
                ),
                Some("employees".into()),
                db.config().page_size,
            )
            .expect("failed to create employees table");
    }

    let heap_file = db.catalog().table_by_name("employees").expect("employees table missing");
    let table_id = heap_file.id();
    let td = heap_file.tuple_desc().clone();
    println!("table id: {}", table_id);

    // Insert 3 tuples from each of 3 concurrent threads, retrying on abort.
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let bp = db.buffer_pool().clone();
            let td = td.clone();
            thread::spawn(move || loop {
                let tid = TransactionId::new();
                let name = format!("Alice_{}", tid.get_tid());
                let attempt = (0..3).try_for_each(|i| {
                    bp.insert_tuple(
                        tid,
                        table_id,
                        Tuple::new(
                            vec![
                                FieldVal::IntField(IntField::new(i)),
                                FieldVal::StringField(StringField::new(name.clone(), 20)),
                            ],
                            &td,
                        ),
                    )
                });
                match attempt {
                    Ok(()) => {
                        bp.transaction_complete(tid, true).unwrap();
                        println!("thread {:?} committed", thread::current().id());
                        break;
                    }
                    Err(DbError::TransactionAborted) => {
                        bp.transaction_complete(tid, false).ok();
                        println!("thread {:?} aborted, retrying", thread::current().id());
                        thread::sleep(Duration::from_millis(50));
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut scan = SeqScan::new(heap_file, db.buffer_pool().clone());
    let tid = TransactionId::new();
    scan.open(tid).unwrap();
    let mut count = 0;
    while let Some(t) = scan.next().unwrap() {
        println!("tuple: {}", t);
        count += 1;
    }
    scan.close();
    db.buffer_pool().transaction_complete(tid, true).unwrap();
    println!("tuple count: {}", count);
}

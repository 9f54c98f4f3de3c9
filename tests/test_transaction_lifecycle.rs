mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{collect_rows, insert_people, person, Fixture};
use heapdb::{Error, LockMode};

#[test]
fn test_transaction_lifecycle() {
    let fx = Fixture::new(4);
    let heap = fx.people("people");

    let tid = fx.pool.begin_transaction();
    assert_eq!(fx.pool.active_transactions(), vec![tid]);
    insert_people(&heap, tid, &[("sam", 25)]);
    fx.pool.commit_transaction(tid).unwrap();
    assert!(fx.pool.active_transactions().is_empty());

    // A finished transaction can no longer be used
    assert!(matches!(
        heap.insert_row(person("sam", 1), tid),
        Err(Error::IllegalTransaction(_))
    ));
    assert!(matches!(
        fx.pool.commit_transaction(tid),
        Err(Error::IllegalTransaction(_))
    ));
    fx.pool.abort_transaction(tid).unwrap();

    let rollback = fx.pool.begin_transaction();
    assert!(rollback > tid);
    insert_people(&heap, rollback, &[("george jones", 999)]);
    fx.pool.abort_transaction(rollback).unwrap();

    let reader = fx.pool.begin_transaction();
    assert_eq!(collect_rows(&*heap, reader), vec![person("sam", 25)]);
}

#[test]
fn test_readers_share_pages() {
    let fx = Fixture::new(4);
    let heap = fx.people("people");
    let setup = fx.pool.begin_transaction();
    insert_people(&heap, setup, &[("sam", 25)]);
    fx.pool.commit_transaction(setup).unwrap();

    let t1 = fx.pool.begin_transaction();
    let t2 = fx.pool.begin_transaction();
    assert_eq!(collect_rows(&*heap, t1).len(), 1);
    assert_eq!(collect_rows(&*heap, t2).len(), 1);

    // Neither can write while the other reads
    fx.pool.commit_transaction(t2).unwrap();
    insert_people(&heap, t1, &[("george jones", 999)]);
    fx.pool.commit_transaction(t1).unwrap();
}

#[test]
fn test_writer_blocks_reader_until_commit() {
    let fx = Fixture::new(4);
    let heap = fx.people("people");
    let setup = fx.pool.begin_transaction();
    insert_people(&heap, setup, &[("sam", 25)]);
    fx.pool.commit_transaction(setup).unwrap();

    let writer = fx.pool.begin_transaction();
    insert_people(&heap, writer, &[("george jones", 999)]);

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let heap = Arc::clone(&heap);
        let pool = Arc::clone(&fx.pool);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let tid = pool.begin_transaction();
            let rows = collect_rows(&*heap, tid);
            done.store(true, Ordering::SeqCst);
            pool.commit_transaction(tid).unwrap();
            rows
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(!done.load(Ordering::SeqCst), "reader saw uncommitted page");

    fx.pool.commit_transaction(writer).unwrap();
    let rows = reader.join().unwrap();
    assert_eq!(rows, vec![person("sam", 25), person("george jones", 999)]);
}

#[test]
fn test_deadlock_aborts_one_transaction() {
    let fx = Fixture::new(4);
    let a = fx.people("a");
    let b = fx.people("b");

    let setup = fx.pool.begin_transaction();
    insert_people(&a, setup, &[("sam", 25)]);
    insert_people(&b, setup, &[("sam", 25)]);
    fx.pool.commit_transaction(setup).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let spawn = |first: Arc<heapdb::HeapFile>, second: Arc<heapdb::HeapFile>| {
        let pool = Arc::clone(&fx.pool);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let tid = pool.begin_transaction();
            pool.get_page(&first, 0, tid, LockMode::Write).unwrap();
            barrier.wait();
            let result = pool.get_page(&second, 0, tid, LockMode::Write).map(|_| ());
            if result.is_ok() {
                pool.commit_transaction(tid).unwrap();
            }
            result
        })
    };

    let t1 = spawn(Arc::clone(&a), Arc::clone(&b));
    let t2 = spawn(Arc::clone(&b), Arc::clone(&a));
    let results = [t1.join().unwrap(), t2.join().unwrap()];

    let deadlocks = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Deadlock(_))))
        .count();
    assert_eq!(deadlocks, 1, "{:?}", results);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(fx.pool.active_transactions().is_empty());
}

#[test]
fn test_abort_leaves_other_transactions_alone() {
    let fx = Fixture::new(4);
    let a = fx.people("a");
    let b = fx.people("b");

    let t1 = fx.pool.begin_transaction();
    let t2 = fx.pool.begin_transaction();
    insert_people(&a, t1, &[("sam", 25)]);
    insert_people(&b, t2, &[("george jones", 999)]);

    fx.pool.abort_transaction(t1).unwrap();
    assert_eq!(collect_rows(&*b, t2), vec![person("george jones", 999)]);
    fx.pool.commit_transaction(t2).unwrap();

    let reader = fx.pool.begin_transaction();
    assert!(collect_rows(&*a, reader).is_empty());
    assert_eq!(collect_rows(&*b, reader), vec![person("george jones", 999)]);
    assert_eq!(b.read_page(0).unwrap().used_slots(), 1);
    assert_eq!(a.read_page(0).unwrap().used_slots(), 0);
}

#[test]
fn test_abort_wakes_blocked_transaction() {
    let fx = Fixture::new(4);
    let heap = fx.people("people");
    let writer = fx.pool.begin_transaction();
    insert_people(&heap, writer, &[("sam", 25)]);

    let blocked = fx.pool.begin_transaction();
    let waiter = {
        let heap = Arc::clone(&heap);
        let pool = Arc::clone(&fx.pool);
        thread::spawn(move || pool.get_page(&heap, 0, blocked, LockMode::Read).map(|_| ()))
    };

    thread::sleep(Duration::from_millis(100));
    fx.pool.abort_transaction(blocked).unwrap();
    let result = waiter.join().unwrap();
    assert!(matches!(result, Err(Error::IllegalTransaction(_))), "{:?}", result);

    // The writer is unaffected
    fx.pool.commit_transaction(writer).unwrap();
    assert_eq!(fx.pool.active_transactions(), Vec::new());
}

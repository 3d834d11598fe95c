//! Heap engine behavior through the `table_*` entry points.


use std::time::Duration;

use tableam::datum::Value;
use tableam::heap::HeapError;
use tableam::tableam::{
    AmError, InsertOptions, LockOutcome, LockTupleMode, LockWaitPolicy, ScanKey, TupleField, TupleFieldValue,
    TupleSlot, VacuumVerdict, table_abort_speculative, table_delete, table_fetch, table_finish_speculative,
    table_get_latest_tid, table_insert, table_lock_tuple, table_multi_insert, table_satisfies_vacuum,
    table_scan_begin, table_scan_end, table_scan_getnext_slot, table_scan_rescan, table_scan_set_limits,
    table_tuple_field, table_update,
};
use test_support::{engine, items, row, visible_rows};

#[tokio::test]
async fn test_insert_visibility_follows_commit() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let observer = engine.begin("observer");
    let before = observer.snapshot();

    let mut writer = engine.begin("writer");
    let mut slot = TupleSlot::new(row(1, "a"));
    let tid = table_insert(&rel, &mut slot, writer.txid(), writer.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(slot.tid, Some(tid));

    // not yet committed
    assert!(visible_rows(&rel, observer.snapshot()).await.is_empty());
    // own insert is invisible to the inserting command, visible to the next
    assert!(visible_rows(&rel, writer.snapshot()).await.is_empty());
    writer.next_command();
    assert_eq!(visible_rows(&rel, writer.snapshot()).await, vec![row(1, "a")]);

    engine.commit(&writer).unwrap();
    assert!(visible_rows(&rel, before).await.is_empty());
    assert_eq!(visible_rows(&rel, observer.snapshot()).await, vec![row(1, "a")]);
}

#[tokio::test]
async fn test_aborted_insert_never_visible() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let writer = engine.begin("writer");
    let mut slot = TupleSlot::new(row(1, "a"));
    let tid = table_insert(&rel, &mut slot, writer.txid(), writer.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    engine.abort(&writer).unwrap();

    let reader = engine.begin("reader");
    assert!(visible_rows(&rel, reader.snapshot()).await.is_empty());
    let fetched = table_fetch(&rel, tid, &reader.snapshot(), false).await.unwrap();
    assert!(fetched.tuple.is_none());
}

#[tokio::test]
async fn test_delete_and_aborted_delete() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let setup = engine.begin("setup");
    let mut a = TupleSlot::new(row(1, "a"));
    let mut b = TupleSlot::new(row(2, "b"));
    let ta = table_insert(&rel, &mut a, setup.txid(), setup.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    let tb = table_insert(&rel, &mut b, setup.txid(), setup.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    engine.commit(&setup).unwrap();

    let aborted = engine.begin("aborted");
    let result = table_delete(&rel, tb, aborted.txid(), aborted.cid(), None, true).await.unwrap();
    assert_eq!(result.outcome, LockOutcome::Acquired);
    engine.abort(&aborted).unwrap();

    let deleter = engine.begin("deleter");
    let old_snapshot = deleter.snapshot();
    let result = table_delete(&rel, ta, deleter.txid(), deleter.cid(), None, true).await.unwrap();
    assert_eq!(result.outcome, LockOutcome::Acquired);
    assert!(result.failure.is_none());
    engine.commit(&deleter).unwrap();

    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(2, "b")]);
    // a snapshot from before the delete committed still sees both rows
    assert_eq!(visible_rows(&rel, old_snapshot).await.len(), 2);

    // deleting again reports the committed delete
    let again = table_delete(&rel, ta, reader.txid(), reader.cid(), None, true).await.unwrap();
    assert_eq!(again.outcome, LockOutcome::UpdatedByOther);
    assert!(again.failure.unwrap().is_deleted(ta));
}

#[tokio::test]
async fn test_lock_then_update_in_same_transaction() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let setup = engine.begin("setup");
    let mut slot = TupleSlot::new(row(1, "a"));
    let tid = table_insert(&rel, &mut slot, setup.txid(), setup.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    engine.commit(&setup).unwrap();

    let tx = engine.begin("tx");
    let locked = table_lock_tuple(&rel, tid, tx.txid(), tx.cid(), LockTupleMode::Exclusive, LockWaitPolicy::Block)
        .await
        .unwrap();
    assert_eq!(locked.outcome, LockOutcome::Acquired);
    assert!(locked.tuple.is_some());

    let mut new = TupleSlot::new(row(1, "b"));
    let result = table_update(&rel, tid, &mut new, tx.txid(), tx.cid(), None, true).await.unwrap();
    assert_eq!(result.outcome, LockOutcome::Acquired);
    assert_eq!(result.lock_mode, LockTupleMode::NoKeyExclusive);
    assert_eq!(new.tid, result.new_tid);
    engine.commit(&tx).unwrap();

    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(1, "b")]);
}

#[tokio::test]
async fn test_update_chain_is_followed() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let setup = engine.begin("setup");
    let mut slot = TupleSlot::new(row(1, "a"));
    let t1 = table_insert(&rel, &mut slot, setup.txid(), setup.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    engine.commit(&setup).unwrap();

    let mut tids = vec![t1];
    for val in ["b", "c"] {
        let tx = engine.begin("tx");
        let mut new = TupleSlot::new(row(1, val));
        let last = *tids.last().unwrap();
        let result = table_update(&rel, last, &mut new, tx.txid(), tx.cid(), None, true).await.unwrap();
        tids.push(result.new_tid.unwrap());
        engine.commit(&tx).unwrap();
    }

    let reader = engine.begin("reader");
    let snapshot = reader.snapshot();
    assert_eq!(table_get_latest_tid(&rel, t1, &snapshot).await.unwrap(), Some(tids[2]));

    let fetched = table_fetch(&rel, t1, &snapshot, true).await.unwrap();
    let tuple = fetched.tuple.unwrap();
    assert!(fetched.pin.is_some());
    assert_eq!(
        table_tuple_field(&rel, &tuple, TupleField::CurrentTid).unwrap(),
        TupleFieldValue::Tid(tids[2])
    );
    assert_eq!(
        table_satisfies_vacuum(&rel, &tuple, engine.tx_manager().oldest_xmin()).unwrap(),
        VacuumVerdict::Live
    );
}

#[tokio::test]
async fn test_speculative_insert_without_callback_is_completed_by_caller() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let writer = engine.begin("writer");
    let observer = engine.begin("observer");
    let dirty = engine.tx_manager().dirty_snapshot(observer.txid());

    let mut slot = TupleSlot::new(row(1, "conflicting"));
    let rejected = table_insert(&rel, &mut slot, writer.txid(), writer.cid(), InsertOptions::speculative(5), None)
        .await
        .unwrap();
    assert!(!slot.speculative_conflict);
    assert_eq!(visible_rows(&rel, dirty.clone()).await, vec![row(1, "conflicting")]);

    table_abort_speculative(&rel, rejected).await.unwrap();
    assert!(visible_rows(&rel, dirty.clone()).await.is_empty());

    let mut slot = TupleSlot::new(row(2, "kept"));
    let kept = table_insert(&rel, &mut slot, writer.txid(), writer.cid(), InsertOptions::speculative(6), None)
        .await
        .unwrap();
    table_finish_speculative(&rel, kept, 6).await.unwrap();
    engine.commit(&writer).unwrap();

    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(2, "kept")]);
}

#[tokio::test]
async fn test_update_that_does_not_fit_moves_to_new_page() {
    let engine = engine();
    let (rel, _) = items(&engine).await;
    let wide = |id: i32, fill: char| row(id, &fill.to_string().repeat(1024));

    let setup = engine.begin("setup");
    let mut tids = Vec::new();
    for id in 0..7 {
        let mut slot = TupleSlot::new(wide(id, 'a'));
        let tid = table_insert(&rel, &mut slot, setup.txid(), setup.cid(), InsertOptions::default(), None)
            .await
            .unwrap();
        tids.push(tid);
    }
    engine.commit(&setup).unwrap();
    assert!(tids.iter().all(|t| t.page_id == tids[0].page_id));
    let old = tids[3];

    let a = engine.begin("a");
    let mut new = TupleSlot::new(wide(3, 'b'));
    let moved = table_update(&rel, old, &mut new, a.txid(), a.cid(), None, true).await.unwrap();
    assert_eq!(moved.outcome, LockOutcome::Acquired);
    assert!(!moved.hot);
    let new_tid = moved.new_tid.unwrap();
    assert_ne!(new_tid.page_id, old.page_id);

    let b = engine.begin("b");
    let mut attempt = TupleSlot::new(wide(3, 'c'));
    let blocked = table_update(&rel, old, &mut attempt, b.txid(), b.cid(), None, false).await.unwrap();
    assert_eq!(blocked.outcome, LockOutcome::WouldBlock);

    engine.commit(&a).unwrap();
    let refused = table_update(&rel, old, &mut attempt, b.txid(), b.cid(), None, false).await.unwrap();
    assert_eq!(refused.outcome, LockOutcome::UpdatedByOther);
    let failure = refused.failure.unwrap();
    assert_eq!(failure.ctid, new_tid);
    assert_eq!(failure.xmax, a.txid());
    engine.abort(&b).unwrap();

    let reader = engine.begin("reader");
    let snapshot = reader.snapshot();
    let fetched = table_fetch(&rel, old, &snapshot, false).await.unwrap();
    let tuple = fetched.tuple.unwrap();
    assert_eq!(
        table_tuple_field(&rel, &tuple, TupleField::CurrentTid).unwrap(),
        TupleFieldValue::Tid(new_tid)
    );
    assert_eq!(table_get_latest_tid(&rel, old, &snapshot).await.unwrap(), Some(new_tid));

    let rows = visible_rows(&rel, snapshot).await;
    assert_eq!(rows.len(), 7);
    assert!(rows.contains(&wide(3, 'b')));
    assert!(!rows.contains(&wide(3, 'a')));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nonblocking_lock_reports_would_block() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let setup = engine.begin("setup");
    let mut slot = TupleSlot::new(row(1, "a"));
    let tid = table_insert(&rel, &mut slot, setup.txid(), setup.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    engine.commit(&setup).unwrap();

    let holder = engine.begin("holder");
    let held = table_lock_tuple(&rel, tid, holder.txid(), holder.cid(), LockTupleMode::Exclusive, LockWaitPolicy::Block)
        .await
        .unwrap();
    assert_eq!(held.outcome, LockOutcome::Acquired);

    let other = engine.begin("other");
    let attempt = tokio::time::timeout(
        Duration::from_secs(5),
        table_lock_tuple(&rel, tid, other.txid(), other.cid(), LockTupleMode::Exclusive, LockWaitPolicy::Skip),
    )
    .await
    .expect("a non-blocking lock must not wait")
    .unwrap();
    assert_eq!(attempt.outcome, LockOutcome::WouldBlock);
    assert_eq!(attempt.failure.unwrap().xmax, holder.txid());

    let err = table_lock_tuple(&rel, tid, other.txid(), other.cid(), LockTupleMode::Share, LockWaitPolicy::Error)
        .await
        .unwrap_err();
    assert!(matches!(err, AmError::Heap(HeapError::LockNotAvailable { .. })));

    // update without waiting is refused the same way
    let mut new = TupleSlot::new(row(1, "b"));
    let result = table_update(&rel, tid, &mut new, other.txid(), other.cid(), None, false).await.unwrap();
    assert_eq!(result.outcome, LockOutcome::WouldBlock);

    // key share does not conflict with a no-key lock, but does with exclusive
    engine.commit(&holder).unwrap();
    let third = engine.begin("third");
    let ks = table_lock_tuple(&rel, tid, third.txid(), third.cid(), LockTupleMode::KeyShare, LockWaitPolicy::Skip)
        .await
        .unwrap();
    assert_eq!(ks.outcome, LockOutcome::Acquired);
    let nk = table_lock_tuple(&rel, tid, other.txid(), other.cid(), LockTupleMode::NoKeyExclusive, LockWaitPolicy::Skip)
        .await
        .unwrap();
    assert_eq!(nk.outcome, LockOutcome::Acquired);
}

#[tokio::test]
async fn test_multi_insert_and_keyed_scan() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let tx = engine.begin("tx");
    let mut slots: Vec<_> = (0..200).map(|i| TupleSlot::new(row(i, &format!("value-{i:04}")))).collect();
    let tids = table_multi_insert(&rel, &mut slots, tx.txid(), tx.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(tids.len(), 200);
    assert!(slots.iter().zip(&tids).all(|(s, t)| s.tid == Some(*t)));
    engine.commit(&tx).unwrap();

    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await.len(), 200);

    let key = ScanKey::eq(0, Value::Int32(123));
    let mut scan = table_scan_begin(&rel, reader.snapshot(), vec![key]).await.unwrap();
    let mut slot = TupleSlot::default();
    assert!(table_scan_getnext_slot(&rel, &mut scan, &mut slot).await.unwrap());
    assert_eq!(slot.values(), row(123, "value-0123").as_slice());
    assert!(!table_scan_getnext_slot(&rel, &mut scan, &mut slot).await.unwrap());

    // page limits: the first page alone holds some but not all rows
    table_scan_rescan(&rel, &mut scan, Some(Vec::new())).unwrap();
    table_scan_set_limits(&rel, &mut scan, 0, Some(1)).unwrap();
    let mut first_page = 0;
    while table_scan_getnext_slot(&rel, &mut scan, &mut slot).await.unwrap() {
        first_page += 1;
    }
    assert!(first_page > 0 && first_page <= 200);
    table_scan_set_limits(&rel, &mut scan, 1_000, None).unwrap();
    assert!(!table_scan_getnext_slot(&rel, &mut scan, &mut slot).await.unwrap());
    table_scan_end(&rel, scan).unwrap();

    let speculative = table_multi_insert(
        &rel,
        &mut [TupleSlot::new(row(1000, "x"))],
        tx.txid(),
        tx.cid(),
        InsertOptions::speculative(1),
        None,
    )
    .await;
    assert!(matches!(speculative, Err(AmError::Heap(HeapError::SpeculativeMultiInsert))));
}

#[tokio::test]
async fn test_vacuum_verdicts_track_writers() {
    let engine = engine();
    let (rel, _) = items(&engine).await;
    let tx_manager = engine.tx_manager().clone();

    // keeps the horizon below every later writer
    let old = engine.begin("old");
    let observer = engine.begin("observer");

    let writer = engine.begin("writer");
    let mut slot = TupleSlot::new(row(1, "a"));
    let tid = table_insert(&rel, &mut slot, writer.txid(), writer.cid(), InsertOptions::default(), None)
        .await
        .unwrap();

    let verdict = |snapshot: tableam::tx::Snapshot| {
        let rel = &rel;
        let tx_manager = tx_manager.clone();
        async move {
            let fetched = table_fetch(rel, tid, &snapshot, false).await.unwrap();
            table_satisfies_vacuum(rel, &fetched.tuple.unwrap(), tx_manager.oldest_xmin()).unwrap()
        }
    };

    assert_eq!(verdict(observer.dirty_snapshot()).await, VacuumVerdict::InsertInProgress);
    engine.commit(&writer).unwrap();
    assert_eq!(verdict(observer.snapshot()).await, VacuumVerdict::Live);

    let deleter = engine.begin("deleter");
    let before_delete = observer.snapshot();
    table_delete(&rel, tid, deleter.txid(), deleter.cid(), None, true).await.unwrap();
    assert_eq!(verdict(before_delete.clone()).await, VacuumVerdict::DeleteInProgress);

    engine.commit(&deleter).unwrap();
    assert_eq!(verdict(before_delete.clone()).await, VacuumVerdict::RecentlyDead);

    engine.abort(&old).unwrap();
    engine.abort(&observer).unwrap();
    assert_eq!(verdict(before_delete).await, VacuumVerdict::Dead);
}

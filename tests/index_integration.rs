//! Index maintenance: heap-only updates, unique checks and speculative
//! insertion.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tableam::catalog::{IndexColumn, IndexRelation, Relation};
use tableam::datum::Value;
use tableam::index::{IndexAccess, IndexError, MemoryIndex};
use tableam::replication::{ReplicationError, exec_simple_relation_insert, exec_simple_relation_update};
use tableam::tableam::{
    AmError, IndexInserter, InsertOptions, TupleId, TupleSlot, table_fetch, table_insert, table_multi_insert,
};
use test_support::{engine, items, row, visible_rows};

/// Counts callback invocations and otherwise does nothing.
#[derive(Default)]
struct CountingInserter {
    calls: AtomicUsize,
}

#[async_trait]
impl IndexInserter for CountingInserter {
    async fn insert_index_entries(
        &self,
        _rel: &Relation,
        _tid: TupleId,
        _values: &[Value],
        _speculative: bool,
    ) -> Result<bool, AmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

#[tokio::test]
async fn test_insert_invokes_callback_once_per_row() {
    let engine = engine();
    let (rel, _) = items(&engine).await;
    let counter = CountingInserter::default();

    let tx = engine.begin("tx");
    let mut slot = TupleSlot::new(row(1, "a"));
    table_insert(&rel, &mut slot, tx.txid(), tx.cid(), InsertOptions::default(), Some(&counter))
        .await
        .unwrap();
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let mut slots = vec![TupleSlot::new(row(2, "b")), TupleSlot::new(row(3, "c"))];
    table_multi_insert(&rel, &mut slots, tx.txid(), tx.cid(), InsertOptions::default(), Some(&counter))
        .await
        .unwrap();
    assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_hot_update_adds_no_index_entries() {
    let engine = engine();
    let by_val = Arc::new(MemoryIndex::new());
    let (rel, pkey) = items(&engine).await;
    let rel = rel.with_index(IndexRelation::new("items_val_idx", &[1], by_val.clone()));

    let mut state = engine.begin("tx");
    let mut slot = TupleSlot::new(vec![Value::Int32(1), Value::Null]);
    exec_simple_relation_insert(&state, &rel, &mut slot).await.unwrap();
    assert_eq!((pkey.len(), by_val.len()), (1, 1));
    state.next_command();

    // NULL to NULL leaves every indexed column as it was
    let mut new = TupleSlot::new(vec![Value::Int32(1), Value::Null]);
    let hot_tid = exec_simple_relation_update(&state, &rel, &slot, &mut new).await.unwrap().unwrap();
    assert_eq!((pkey.len(), by_val.len()), (1, 1));
    state.next_command();

    // changing an indexed column needs entries in every index
    let mut newer = TupleSlot::new(row(1, "x"));
    let cold_tid = exec_simple_relation_update(&state, &rel, &new, &mut newer).await.unwrap().unwrap();
    assert_ne!(hot_tid, cold_tid);
    assert_eq!((pkey.len(), by_val.len()), (2, 2));
    assert_eq!(by_val.equality_scan(&[Value::Text("x".into())]).unwrap(), vec![cold_tid]);
    engine.commit(&state).unwrap();

    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(1, "x")]);
}

#[tokio::test]
async fn test_duplicate_key_is_rejected() {
    let engine = engine();
    let (rel, pkey) = items(&engine).await;

    let first = engine.begin("first");
    exec_simple_relation_insert(&first, &rel, &mut TupleSlot::new(row(1, "a")))
        .await
        .unwrap();
    engine.commit(&first).unwrap();

    let second = engine.begin("second");
    let err = exec_simple_relation_insert(&second, &rel, &mut TupleSlot::new(row(1, "b")))
        .await
        .unwrap_err();
    match &err {
        ReplicationError::Am(AmError::Index(IndexError::UniqueViolation { index, key })) => {
            assert_eq!(index, "items_pkey");
            assert_eq!(key, "(id)=(1)");
        }
        other => panic!("expected a unique violation, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "duplicate key value violates unique constraint \"items_pkey\""
    );
    assert_eq!(pkey.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unique_check_waits_for_running_inserter() {
    let engine = Arc::new(engine());
    let (rel, pkey) = items(&engine).await;
    let rel = Arc::new(rel);

    let a = engine.begin("a");
    exec_simple_relation_insert(&a, &rel, &mut TupleSlot::new(row(1, "a")))
        .await
        .unwrap();

    let b = engine.begin("b");
    let task = {
        let rel = rel.clone();
        let b = b.clone();
        tokio::spawn(async move {
            let mut slot = TupleSlot::new(row(1, "b"));
            exec_simple_relation_insert(&b, &rel, &mut slot).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished(), "b must wait for a to finish");

    engine.abort(&a).unwrap();
    let tid = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(tid.is_some());
    engine.commit(&b).unwrap();

    // the aborted entry stays behind and is filtered by visibility
    assert_eq!(pkey.len(), 2);
    let reader = engine.begin("reader");
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(1, "b")]);
}

#[tokio::test]
async fn test_speculative_conflict_leaves_dead_tuple() {
    let engine = engine();
    let (rel, _) = items(&engine).await;

    let first = engine.begin("first");
    exec_simple_relation_insert(&first, &rel, &mut TupleSlot::new(row(1, "a")))
        .await
        .unwrap();
    engine.commit(&first).unwrap();

    let tx = engine.begin("tx");
    let indexer = tx.index_inserter();
    let mut slot = TupleSlot::new(row(1, "dup"));
    let tid = table_insert(&rel, &mut slot, tx.txid(), tx.cid(), InsertOptions::speculative(7), Some(&indexer))
        .await
        .unwrap();
    assert!(slot.speculative_conflict);
    // nobody sees it, not even a dirty snapshot
    let fetched = table_fetch(&rel, tid, &tx.dirty_snapshot(), false).await.unwrap();
    assert!(fetched.tuple.is_none());

    let mut fresh = TupleSlot::new(row(2, "b"));
    let tid = table_insert(&rel, &mut fresh, tx.txid(), tx.cid(), InsertOptions::speculative(8), Some(&indexer))
        .await
        .unwrap();
    assert!(!fresh.speculative_conflict);
    engine.commit(&tx).unwrap();

    let reader = engine.begin("reader");
    assert!(table_fetch(&rel, tid, &reader.snapshot(), false).await.unwrap().tuple.is_some());
    assert_eq!(visible_rows(&rel, reader.snapshot()).await, vec![row(1, "a"), row(2, "b")]);
}

#[tokio::test]
async fn test_expression_index_cannot_be_maintained() {
    let engine = engine();
    let (rel, _) = items(&engine).await;
    let rel = rel.with_index(IndexRelation {
        name: "items_lower_val".to_string(),
        columns: vec![IndexColumn::Expression("lower(val)".to_string())],
        unique: false,
        primary: false,
        access: Arc::new(MemoryIndex::new()),
    });

    let mut tx = engine.begin("tx");
    let err = exec_simple_relation_insert(&tx, &rel, &mut TupleSlot::new(row(1, "A")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReplicationError::Am(AmError::Index(IndexError::ExpressionColumn { ref index })) if index == "items_lower_val"
    ));

    // an update cannot skip the expression index by staying heap-only
    let mut stored = TupleSlot::new(row(2, "B"));
    table_insert(&rel, &mut stored, tx.txid(), tx.cid(), InsertOptions::default(), None)
        .await
        .unwrap();
    tx.next_command();
    let mut new = TupleSlot::new(row(2, "C"));
    let err = exec_simple_relation_update(&tx, &rel, &stored, &mut new).await.unwrap_err();
    assert!(matches!(
        err,
        ReplicationError::Am(AmError::Index(IndexError::ExpressionColumn { ref index })) if index == "items_lower_val"
    ));
}

//! Integration tests for the page service under the heap engine.

use std::sync::Arc;

use tableam::storage::{BufferPool, BufferPoolError, MemoryStorage, PAGE_SIZE, PageId, Storage};

/// Concurrent readers of one page all see its contents.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_read_access() {
    let storage = MemoryStorage::new();
    let page_id = storage.allocate_page().await.unwrap();

    let mut buf = vec![0u8; PAGE_SIZE];
    buf[0] = 42;
    storage.write_page(page_id, &buf).await.unwrap();

    let pool = Arc::new(BufferPool::new(storage, 4));

    let mut handles = vec![];
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                let guard = pool.fetch_page(page_id).await.unwrap();
                assert_eq!(guard.data()[0], 42);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(pool.pin_count(page_id), Some(0));
    assert_eq!(pool.resident_pages(), 1);
}

/// Writers on one page are serialized by its exclusive latch.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_serialize() {
    let pool = Arc::new(BufferPool::new(MemoryStorage::new(), 4));
    let page_id = pool.new_page().await.unwrap().page_id();

    let mut handles = vec![];
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let mut guard = pool.fetch_page_mut(page_id).await.unwrap();
                let n = u32::from_le_bytes(guard.data()[..4].try_into().unwrap());
                guard.data_mut()[..4].copy_from_slice(&(n + 1).to_le_bytes());
                guard.mark_dirty();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let guard = pool.fetch_page(page_id).await.unwrap();
    assert_eq!(u32::from_le_bytes(guard.data()[..4].try_into().unwrap()), 400);
}

/// The pool never evicts: loading past capacity fails.
#[tokio::test]
async fn test_no_free_frames_error() {
    let storage = MemoryStorage::new();
    for _ in 0..4 {
        storage.allocate_page().await.unwrap();
    }
    let pool = BufferPool::new(storage, 3);

    for i in 0..3 {
        drop(pool.fetch_page(PageId::new(i)).await.unwrap());
    }
    let result = pool.fetch_page(PageId::new(3)).await;
    assert!(matches!(result, Err(BufferPoolError::NoFreeFrames { capacity: 3 })));
    assert!(matches!(
        pool.new_page().await,
        Err(BufferPoolError::NoFreeFrames { .. })
    ));
}

/// Flushed pages reach storage; a pool over the same pages reads them back.
#[tokio::test]
async fn test_flush_all_writes_dirty_pages() {
    let pool = BufferPool::new(MemoryStorage::new(), 8);

    let mut pages = Vec::new();
    for i in 0..5u8 {
        let mut guard = pool.new_page().await.unwrap();
        guard.data_mut()[0] = i;
        guard.data_mut()[1] = i.wrapping_mul(2);
        pages.push(guard.page_id());
    }
    assert!(pages.iter().all(|p| pool.is_dirty(*p) == Some(true)));

    pool.flush_all().await.unwrap();
    assert!(pages.iter().all(|p| pool.is_dirty(*p) == Some(false)));

    for (i, page_id) in pages.into_iter().enumerate() {
        let mut buf = vec![0u8; PAGE_SIZE];
        pool.storage().read_page(page_id, &mut buf).await.unwrap();
        assert_eq!(buf[0], i as u8, "page {} byte 0 mismatch", i);
        assert_eq!(buf[1], (i as u8).wrapping_mul(2), "page {} byte 1 mismatch", i);
    }
}

/// A pin kept after unlatching holds the page until dropped.
#[tokio::test]
async fn test_unlatched_pin_keeps_page_pinned() {
    let pool = BufferPool::new(MemoryStorage::new(), 2);
    let page_id = pool.new_page().await.unwrap().page_id();

    let pin = pool.fetch_page(page_id).await.unwrap().unlatch();
    assert_eq!(pool.pin_count(page_id), Some(1));

    // the latch is free even though the pin is held
    drop(pool.fetch_page_mut(page_id).await.unwrap());
    assert_eq!(pool.pin_count(page_id), Some(1));

    drop(pin);
    assert_eq!(pool.pin_count(page_id), Some(0));
}

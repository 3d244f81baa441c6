//! EventStore interface tests.
//!
//! These tests verify the contract of the EventStore trait.
//! Each storage implementation should run these tests.
//!
//! The log is global, so every test works relative to the store's
//! `last_sequence` when it starts and never assumes an empty store.

use futures::future::join_all;
use serde_json::json;

use eventrelay::event::{Event, Sequence};
use eventrelay::storage::EventStore;

/// Create a test event with a unique marker in its payload.
pub fn make_event(event_type: &str, marker: u64) -> Event {
    let data = json!({"marker": marker, "nested": {"list": [1, 2, 3], "flag": true}});
    match data {
        serde_json::Value::Object(map) => Event::new(event_type, map),
        _ => unreachable!(),
    }
}

// =============================================================================
// EventStore::append tests
// =============================================================================

pub async fn test_append_returns_next_sequence<S: EventStore + ?Sized>(store: &S) {
    let base = store.last_sequence().await.expect("last_sequence should succeed");

    let first = store
        .append(make_event("Created", 1))
        .await
        .expect("append should succeed");
    let second = store
        .append(make_event("Updated", 2))
        .await
        .expect("append should succeed");

    assert_eq!(first, base + 1, "first append gets base + 1");
    assert_eq!(second, base + 2, "sequences increase by exactly one");
    assert_eq!(store.last_sequence().await.unwrap(), base + 2);
}

pub async fn test_concurrent_appends_get_unique_sequences<S: EventStore + ?Sized>(store: &S) {
    let base = store.last_sequence().await.unwrap();

    let appends = (0..10).map(|i| store.append(make_event("Concurrent", i)));
    let mut sequences: Vec<Sequence> = join_all(appends)
        .await
        .into_iter()
        .map(|r| r.expect("append should succeed"))
        .collect();
    sequences.sort_unstable();

    let expected: Vec<Sequence> = (base + 1..=base + 10).collect();
    assert_eq!(sequences, expected, "no gaps and no duplicates");
}

// =============================================================================
// EventStore::read_all tests
// =============================================================================

pub async fn test_read_all_is_contiguous_from_one<S: EventStore + ?Sized>(store: &S) {
    store.append(make_event("Anything", 0)).await.unwrap();

    let events = store.read_all().await.expect("read_all should succeed");
    assert!(!events.is_empty());
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, i as Sequence + 1, "sequence at index {}", i);
    }
    assert_eq!(
        events.last().map(|e| e.sequence),
        Some(store.last_sequence().await.unwrap())
    );
}

pub async fn test_read_all_preserves_append_order<S: EventStore + ?Sized>(store: &S) {
    let base = store.last_sequence().await.unwrap();
    for marker in [30, 10, 20] {
        store.append(make_event("Ordered", marker)).await.unwrap();
    }

    let events = store.read_all().await.unwrap();
    let markers: Vec<_> = events
        .iter()
        .filter(|e| e.sequence > base)
        .map(|e| e.event.data["marker"].as_u64().unwrap())
        .collect();
    assert_eq!(markers, vec![30, 10, 20]);
}

pub async fn test_read_all_preserves_event_data<S: EventStore + ?Sized>(store: &S) {
    let event = make_event("Detailed", 99);
    let sequence = store.append(event.clone()).await.unwrap();

    let events = store.read_all().await.unwrap();
    let stored = events
        .iter()
        .find(|e| e.sequence == sequence)
        .expect("appended event should be readable");
    assert_eq!(stored.event, event, "type and data survive storage");
}

// =============================================================================
// EventStore::read_after tests
// =============================================================================

pub async fn test_read_after_returns_suffix<S: EventStore + ?Sized>(store: &S) {
    let base = store.last_sequence().await.unwrap();
    for marker in 0..3 {
        store.append(make_event("Suffix", marker)).await.unwrap();
    }

    let suffix = store.read_after(base).await.unwrap();
    let sequences: Vec<_> = suffix.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![base + 1, base + 2, base + 3]);

    let tail = store.read_after(base + 2).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].sequence, base + 3);
}

pub async fn test_read_after_end_is_empty<S: EventStore + ?Sized>(store: &S) {
    let last = store.last_sequence().await.unwrap();
    assert!(store.read_after(last).await.unwrap().is_empty());
    assert!(store.read_after(last + 100).await.unwrap().is_empty());
}

pub async fn test_read_after_zero_equals_read_all<S: EventStore + ?Sized>(store: &S) {
    store.append(make_event("Whole", 0)).await.unwrap();
    let all = store.read_all().await.unwrap();
    let after_zero = store.read_after(0).await.unwrap();
    assert_eq!(all, after_zero);
}

/// Run every EventStore contract test against `$store` (a `&impl EventStore`).
#[macro_export]
macro_rules! run_event_store_tests {
    ($store:expr) => {
        use $crate::storage::event_store_tests::*;

        // append tests
        test_append_returns_next_sequence($store).await;
        println!("  test_append_returns_next_sequence: PASSED");

        test_concurrent_appends_get_unique_sequences($store).await;
        println!("  test_concurrent_appends_get_unique_sequences: PASSED");

        // read_all tests
        test_read_all_is_contiguous_from_one($store).await;
        println!("  test_read_all_is_contiguous_from_one: PASSED");

        test_read_all_preserves_append_order($store).await;
        println!("  test_read_all_preserves_append_order: PASSED");

        test_read_all_preserves_event_data($store).await;
        println!("  test_read_all_preserves_event_data: PASSED");

        // read_after tests
        test_read_after_returns_suffix($store).await;
        println!("  test_read_after_returns_suffix: PASSED");

        test_read_after_end_is_empty($store).await;
        println!("  test_read_after_end_is_empty: PASSED");

        test_read_after_zero_equals_read_all($store).await;
        println!("  test_read_after_zero_equals_read_all: PASSED");
    };
}

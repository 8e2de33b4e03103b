// tests/fanout_test.rs
// Bounded-concurrency fan-out (spec 4.4 "Fan-out concurrency").

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use threadloom::sync::fanout::run_bounded;

#[tokio::test]
async fn runs_every_item_exactly_once() {
    let items: Vec<u32> = (0..50).collect();
    let results = run_bounded(items.clone(), 8, |i| async move { i * 2 }).await;

    let mut sorted = results;
    sorted.sort_unstable();
    let expected: Vec<u32> = items.iter().map(|i| i * 2).collect();
    assert_eq!(sorted, expected);
}

#[tokio::test]
async fn never_exceeds_the_configured_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));
    let concurrency = 4;

    let items: Vec<u32> = (0..40).collect();
    run_bounded(items, concurrency, {
        let in_flight = in_flight.clone();
        let max_observed = max_observed.clone();
        move |_| {
            let in_flight = in_flight.clone();
            let max_observed = max_observed.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_observed.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    })
    .await;

    assert!(max_observed.load(Ordering::SeqCst) <= concurrency);
}

#[tokio::test]
async fn zero_concurrency_is_treated_as_one() {
    let items = vec![1, 2, 3];
    let results = run_bounded(items, 0, |i| async move { i }).await;
    let mut sorted = results;
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2, 3]);
}

#[tokio::test]
async fn empty_input_yields_empty_output() {
    let items: Vec<u32> = Vec::new();
    let results = run_bounded(items, 4, |i| async move { i }).await;
    assert!(results.is_empty());
}

// src/sync/fanout.rs
// Bounded-concurrency fan-out helper (spec 4.4 "Fan-out concurrency",
// spec 9 "Cooperative tasks over channels"). Channel-level and
// thread-level fetches use distinct concurrency limits so a channel task
// that itself spawns thread sub-tasks never competes with itself on the
// same limit.

use futures::stream::{self, StreamExt};
use std::future::Future;

pub async fn run_bounded<T, F, Fut, O>(items: Vec<T>, concurrency: usize, f: F) -> Vec<O>
where
    T: Send,
    F: Fn(T) -> Fut,
    Fut: Future<Output = O> + Send,
    O: Send,
{
    let concurrency = concurrency.max(1);
    stream::iter(items)
        .map(f)
        .buffer_unordered(concurrency)
        .collect()
        .await
}

// tests/sync_runner_test.rs
// Sync Orchestrator fan-out collaborators (spec 4.4), exercised against the
// fake chat fetcher (spec 9: "Dependency injection") rather than a live
// chat service or database.

mod common;

use std::collections::HashMap;

use common::ts;
use threadloom::fetch::fake::FakeChatFetcher;
use threadloom::fetch::{ChatFetcher, FetchedContainer, FetchedMessage};

fn msg(id: &str, channel_id: &str, thread_id: Option<&str>, minute: i64) -> FetchedMessage {
    FetchedMessage {
        message_id: id.to_string(),
        guild_id: "g1".to_string(),
        channel_id: channel_id.to_string(),
        thread_id: thread_id.map(str::to_string),
        author_id: Some("author".to_string()),
        content_md: None,
        content_plain: Some(format!("content {id}")),
        created_at: ts(minute),
        edited_at: None,
        jump_link: None,
        is_top_level: thread_id.is_none(),
    }
}

#[tokio::test]
async fn full_sync_returns_every_preloaded_message() {
    let containers = vec![FetchedContainer {
        id: "c1".to_string(),
        is_thread: false,
        parent_channel_id: None,
        name: Some("general".to_string()),
        archived: false,
    }];
    let mut messages = HashMap::new();
    messages.insert(
        "c1".to_string(),
        vec![msg("1", "c1", None, 0), msg("2", "c1", None, 1), msg("3", "c1", None, 2)],
    );

    let fetcher = FakeChatFetcher::new(containers.clone(), messages);

    let discovered = fetcher.fetch_containers("g1").await.unwrap();
    assert_eq!(discovered.len(), 1);

    let fetched = fetcher.fetch_messages(&containers[0], "g1", None).await.unwrap();
    assert_eq!(fetched.len(), 3);
}

#[tokio::test]
async fn delta_sync_only_returns_messages_after_the_cursor() {
    let mut messages = HashMap::new();
    messages.insert(
        "c1".to_string(),
        vec![msg("1", "c1", None, 0), msg("2", "c1", None, 5), msg("3", "c1", None, 10)],
    );
    let fetcher = FakeChatFetcher::new(Vec::new(), messages);

    let since = ts(5);
    let container = FetchedContainer {
        id: "c1".to_string(),
        is_thread: false,
        parent_channel_id: None,
        name: None,
        archived: false,
    };
    let fetched = fetcher.fetch_messages(&container, "g1", Some(since)).await.unwrap();

    let ids: Vec<&str> = fetched.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["3"]);
}

#[tokio::test]
async fn unknown_container_id_yields_an_empty_list_rather_than_an_error() {
    let fetcher = FakeChatFetcher::new(Vec::new(), HashMap::new());
    let container = FetchedContainer {
        id: "missing".to_string(),
        is_thread: false,
        parent_channel_id: None,
        name: None,
        archived: false,
    };
    let fetched = fetcher.fetch_messages(&container, "g1", None).await.unwrap();
    assert!(fetched.is_empty());
}

// tests/retrieval_test.rs
// Prompt assembly (spec 4.6 step 5) exercised end to end over real
// `MessageWindow` rows, independent of the vector RPC or a live model.

mod common;

use common::ts;
use threadloom::retrieval::prompt;
use threadloom::store::models::MessageWindow;

fn window(id: &str, seq: i64, text: &str) -> MessageWindow {
    MessageWindow {
        window_id: id.to_string(),
        guild_id: "g1".to_string(),
        category_id: None,
        channel_id: "c1".to_string(),
        thread_id: None,
        date: ts(0).date_naive(),
        window_seq: seq,
        message_ids: vec![format!("m{seq}")],
        start_at: ts(seq),
        end_at: ts(seq + 1),
        token_est: Some(12),
        text: Some(text.to_string()),
    }
}

#[tokio::test]
async fn prompt_includes_query_user_and_numbered_context() {
    let w1 = window("w1", 1, "alice: let's ship on friday");
    let w2 = window("w2", 2, "bob: sounds good");
    let windows = vec![&w1, &w2];

    let prompt = prompt::build(&windows, "user-42", "when are we shipping?");

    assert!(prompt.contains("[#1]"));
    assert!(prompt.contains("[#2]"));
    assert!(prompt.contains("alice: let's ship on friday"));
    assert!(prompt.contains("bob: sounds good"));
    assert!(prompt.contains("user-42"));
    assert!(prompt.contains("when are we shipping?"));
}

#[tokio::test]
async fn prompt_with_no_context_windows_still_includes_the_question() {
    let windows: Vec<&MessageWindow> = Vec::new();
    let prompt = prompt::build(&windows, "user-1", "anything interesting?");

    assert!(prompt.contains("anything interesting?"));
    assert!(prompt.contains("user-1"));
}

#[tokio::test]
async fn missing_window_text_renders_as_empty_rather_than_panicking() {
    let mut w = window("w1", 1, "");
    w.text = None;
    let windows = vec![&w];

    let prompt = prompt::build(&windows, "user-1", "q");
    assert!(prompt.contains("[#1]"));
}

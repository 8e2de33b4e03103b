// src/retrieval/prompt.rs
// Prompt assembly for the generative model (spec 4.6 step 5).

use crate::store::models::MessageWindow;

const INSTRUCTION: &str = "あなたはこのコミュニティのアシスタントです。提供された会話の文脈だけを根拠に、日本語で簡潔に回答してください。根拠となる文脈がある場合は [#n] の形式で出典を示してください。文脈に答えがない場合は、分からないと正直に答えてください。";

pub fn build(selected: &[&MessageWindow], user_id: &str, query: &str) -> String {
    let context_block = selected
        .iter()
        .enumerate()
        .map(|(i, w)| {
            format!(
                "[#{}] ({} – {})\n{}",
                i + 1,
                w.start_at.to_rfc3339(),
                w.end_at.to_rfc3339(),
                w.text.clone().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{INSTRUCTION}\n\n--- context ---\n{context_block}\n\n--- question (user: {user_id}) ---\n{query}"
    )
}

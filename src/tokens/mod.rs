// src/tokens/mod.rs
// Token Counter (spec 4.1): a local zero-I/O estimate, a precise remote
// count with retry/fallback, binary-search truncation, and a budget guard.

pub mod precise;

use crate::config::chunking::TokenConfig;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::debug;

pub use precise::{NoopPreciseCounter, PreciseTokenCounter};

static BPE: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary must be embedded"));

/// Break characters the truncator snaps backward to, in priority order of
/// "closest to the cut point wins" (spec 4.1).
const BREAK_CHARS: &[char] = &['\n', '。', '、', '.', ',', ' ', '}', ']', ')'];
const BREAK_SEARCH_WINDOW: usize = 100;

/// Local, zero-I/O lower-bound token estimate via byte-pair-encoding of a
/// standard subword vocabulary.
pub fn estimate(text: &str) -> usize {
    BPE.encode_ordinary(text).len()
}

/// Result of `TokenCounter::ensure_within_limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsureResult {
    pub text: String,
    pub tokens: usize,
    pub truncated: bool,
}

/// Binds the local estimate to a remote precise counter and the configured
/// token budget. Failures from the remote counter never surface — they
/// degrade to the local estimate (spec 4.1: "Errors are never surfaced").
pub struct TokenCounter {
    precise: Arc<dyn PreciseTokenCounter>,
    config: TokenConfig,
}

impl TokenCounter {
    pub fn new(precise: Arc<dyn PreciseTokenCounter>, config: TokenConfig) -> Self {
        Self { precise, config }
    }

    pub fn estimate(&self, text: &str) -> usize {
        estimate(text)
    }

    /// Calls the remote count-tokens endpoint; on exhaustion of retries
    /// falls back to the local estimate.
    pub async fn count_precisely(&self, text: &str) -> usize {
        match self.precise.count(text).await {
            Ok(n) => n,
            Err(e) => {
                debug!("precise token count failed, falling back to estimate: {e}");
                estimate(text)
            }
        }
    }

    /// Binary-searches the largest prefix (by char boundary) whose precise
    /// token count is <= limit, then snaps backward to the nearest break
    /// character within the last 100 chars so we don't cut mid-word.
    pub async fn truncate(&self, text: &str, limit: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return String::new();
        }

        let full_count = self.count_precisely(text).await;
        if full_count <= limit {
            return text.to_string();
        }

        let mut lo = 0usize;
        let mut hi = chars.len();
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let candidate: String = chars[..mid].iter().collect();
            let count = self.count_precisely(&candidate).await;
            if count <= limit {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        let cut = lo;
        let window_start = cut.saturating_sub(BREAK_SEARCH_WINDOW);
        let snapped = chars[window_start..cut]
            .iter()
            .rposition(|c| BREAK_CHARS.contains(c))
            .map(|offset| window_start + offset + 1)
            .unwrap_or(cut);

        chars[..snapped].iter().collect()
    }

    /// If the cheap estimate already fits within budget, return unchanged.
    /// Otherwise count precisely; if still over budget, truncate.
    pub async fn ensure_within_limit(&self, text: &str) -> EnsureResult {
        let budget = self.config.max_tokens.saturating_sub(self.config.safety_margin);

        let est = estimate(text);
        if est <= budget {
            return EnsureResult {
                text: text.to_string(),
                tokens: est,
                truncated: false,
            };
        }

        let precise = self.count_precisely(text).await;
        if precise <= budget {
            return EnsureResult {
                text: text.to_string(),
                tokens: precise,
                truncated: false,
            };
        }

        let truncated = self.truncate(text, budget).await;
        let tokens = self.count_precisely(&truncated).await;
        EnsureResult {
            text: truncated,
            tokens,
            truncated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_deterministic_and_nonzero_for_nonempty_text() {
        let a = estimate("hello world, this is a test sentence.");
        let b = estimate("hello world, this is a test sentence.");
        assert_eq!(a, b);
        assert!(a > 0);
        assert_eq!(estimate(""), 0);
    }

    #[tokio::test]
    async fn ensure_within_limit_leaves_short_text_untouched() {
        let counter = TokenCounter::new(
            Arc::new(NoopPreciseCounter),
            TokenConfig {
                max_tokens: 2048,
                safety_margin: 128,
            },
        );
        let result = counter.ensure_within_limit("a short message").await;
        assert!(!result.truncated);
        assert_eq!(result.text, "a short message");
    }

    #[tokio::test]
    async fn truncate_snaps_to_break_character_and_marks_truncated() {
        let counter = TokenCounter::new(
            Arc::new(NoopPreciseCounter),
            TokenConfig {
                max_tokens: 100,
                safety_margin: 0,
            },
        );
        let long_text = "word ".repeat(2000);
        let result = counter.ensure_within_limit(&long_text).await;
        assert!(result.truncated);
        assert!(result.tokens <= 100);
        let last = result.text.chars().last().unwrap();
        assert!(
            BREAK_CHARS.contains(&last) || result.text.len() < long_text.len(),
            "expected truncation to have shortened the text"
        );
    }
}

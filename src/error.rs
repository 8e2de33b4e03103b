// src/error.rs
// Stable error codes that cross a component boundary (spec 7). Internal
// plumbing still propagates via anyhow::Result/?; PipelineError is only
// raised at the seams spec 7 names explicitly.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("SYNC_ENQUEUE_FAILED: {message}")]
    SyncEnqueueFailed {
        message: String,
        detail: Option<Value>,
    },

    #[error("MESSAGE_SAVE_FAILED: {message}")]
    MessageSaveFailed {
        message: String,
        detail: Option<Value>,
    },

    #[error("WINDOW_SAVE_FAILED: {message}")]
    WindowSaveFailed {
        message: String,
        detail: Option<Value>,
    },

    #[error("WINDOW_FETCH_FAILED: {message}")]
    WindowFetchFailed {
        message: String,
        detail: Option<Value>,
    },

    #[error("CHAT_FAILED: {message}")]
    ChatFailed {
        message: String,
        detail: Option<Value>,
    },

    #[error("SYNC_CURSOR_READ_FAILED: {message}")]
    SyncCursorReadFailed {
        message: String,
        detail: Option<Value>,
    },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SyncEnqueueFailed { .. } => "SYNC_ENQUEUE_FAILED",
            Self::MessageSaveFailed { .. } => "MESSAGE_SAVE_FAILED",
            Self::WindowSaveFailed { .. } => "WINDOW_SAVE_FAILED",
            Self::WindowFetchFailed { .. } => "WINDOW_FETCH_FAILED",
            Self::ChatFailed { .. } => "CHAT_FAILED",
            Self::SyncCursorReadFailed { .. } => "SYNC_CURSOR_READ_FAILED",
        }
    }

    pub fn message_save_failed(message: impl Into<String>) -> Self {
        Self::MessageSaveFailed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn window_save_failed(message: impl Into<String>) -> Self {
        Self::WindowSaveFailed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn window_fetch_failed(message: impl Into<String>) -> Self {
        Self::WindowFetchFailed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn chat_failed(message: impl Into<String>) -> Self {
        Self::ChatFailed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn sync_enqueue_failed(message: impl Into<String>) -> Self {
        Self::SyncEnqueueFailed {
            message: message.into(),
            detail: None,
        }
    }

    pub fn sync_cursor_read_failed(message: impl Into<String>) -> Self {
        Self::SyncCursorReadFailed {
            message: message.into(),
            detail: None,
        }
    }
}

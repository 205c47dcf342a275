use crate::error::{RelayError, Result};
use crate::models::CompletionResponse;

/// Number of forwarded tokens after which leading blank lines are no longer dropped
const SUPPRESSION_WINDOW: usize = 2;

/// Decode a `data:` payload and return the first choice's text fragment
pub fn extract_token(payload: &str) -> Result<String> {
    let completion: CompletionResponse = serde_json::from_str(payload).map_err(|e| {
        RelayError::FramingError(format!(
            "Invalid completion payload: {} - payload was: {}",
            e, payload
        ))
    })?;

    completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| RelayError::FramingError("Completion payload has no choices".to_string()))
}

/// True when the token is non-empty and made of line breaks only
pub fn is_pure_newline(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c == '\n' || c == '\r')
}

/// Drops the one or two blank-line tokens the upstream emits before real
/// content. Owned by a single relay session.
#[derive(Debug, Default)]
pub struct TokenFilter {
    accepted: usize,
    seen_content: bool,
}

impl TokenFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the token if it should be forwarded.
    ///
    /// Suppressed tokens do not advance the counter, so any run of leading
    /// blank tokens is dropped until something substantive arrives.
    pub fn accept(&mut self, token: String) -> Option<String> {
        if self.in_window() && is_pure_newline(&token) {
            tracing::debug!(len = token.len(), "Suppressing leading blank token");
            return None;
        }

        self.accepted += 1;
        if token.chars().any(|c| c != '\n' && c != '\r') {
            self.seen_content = true;
        }
        Some(token)
    }

    fn in_window(&self) -> bool {
        self.accepted < SUPPRESSION_WINDOW && !self.seen_content
    }

    /// Tokens forwarded so far
    pub fn accepted(&self) -> usize {
        self.accepted
    }
}

//! Code buffer assembled from matched tokens

use serde::{Deserialize, Serialize};

/// Characters after which a token is appended without a separating space
const BLOCK_OPENERS: [char; 2] = ['{', '['];

/// Accumulated code, seeded with the level's starter code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBuffer {
    text: String,
}

impl CodeBuffer {
    pub fn new(starter: &str) -> Self {
        Self {
            text: starter.to_string(),
        }
    }

    /// Append a token using the spacing rule
    pub fn push_token(&mut self, token: &str) {
        let glue = match self.text.chars().last() {
            None => false,
            Some(c) if c.is_whitespace() => false,
            Some(c) if BLOCK_OPENERS.contains(&c) => false,
            Some(_) => true,
        };
        if glue {
            self.text.push(' ');
        }
        self.text.push_str(token);
    }

    /// Replace the whole buffer (manual edits before resubmitting)
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

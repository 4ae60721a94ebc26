use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_CONTENT_CHARS: usize = 2000;

/// Text payload of a comment or chat message. Validated non-empty and
/// bounded at construction so invalid payloads never reach the applier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content(String);

impl Content {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("Content cannot be empty".to_string());
        }
        if trimmed.chars().count() > MAX_CONTENT_CHARS {
            return Err(format!(
                "Content exceeds {MAX_CONTENT_CHARS} characters"
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Content> for String {
    fn from(content: Content) -> Self {
        content.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_content() {
        assert!(Content::new("").is_err());
        assert!(Content::new("   \n").is_err());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let content = Content::new("  hello  ").unwrap();
        assert_eq!(content.as_str(), "hello");
    }

    #[test]
    fn rejects_oversized_content() {
        let long = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(Content::new(long).is_err());
    }
}

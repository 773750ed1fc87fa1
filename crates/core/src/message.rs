//! Message roles, content validation and session title derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a user message, in characters, after trimming.
pub const MAX_CONTENT_LENGTH: usize = 4_000;

/// Maximum length of a derived session title, in characters (ellipsis excluded).
pub const MAX_TITLE_LENGTH: usize = 50;

/// Suffix appended to a title that was truncated.
pub const TITLE_ELLIPSIS: &str = "...";

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate user message content and return the trimmed text to store.
///
/// Content must be non-empty after trimming whitespace and at most
/// [`MAX_CONTENT_LENGTH`] characters long.
pub fn validate_content(content: &str) -> Result<&str, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Message content cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_CONTENT_LENGTH {
        return Err(format!(
            "Message content exceeds maximum length of {MAX_CONTENT_LENGTH} characters"
        ));
    }
    Ok(trimmed)
}

/// Derive a session title from the first user message.
///
/// Whitespace runs (including newlines) collapse to a single space; the result
/// keeps at most [`MAX_TITLE_LENGTH`] characters and gets [`TITLE_ELLIPSIS`]
/// appended when something was cut. Truncation is by `char`, never mid code point.
pub fn derive_title(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_TITLE_LENGTH {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(MAX_TITLE_LENGTH).collect();
    let kept = title.trim_end().len();
    title.truncate(kept);
    title.push_str(TITLE_ELLIPSIS);
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert!(validate_content("").is_err());
        assert!(validate_content("   \n\t ").is_err());
    }

    #[test]
    fn content_is_trimmed() {
        assert_eq!(validate_content("  oi \n").unwrap(), "oi");
    }

    #[test]
    fn overlong_content_is_rejected() {
        let long = "a".repeat(MAX_CONTENT_LENGTH + 1);
        assert!(validate_content(&long).is_err());
        let exact = "é".repeat(MAX_CONTENT_LENGTH);
        assert!(validate_content(&exact).is_ok());
    }

    #[test]
    fn short_title_is_kept_verbatim() {
        assert_eq!(
            derive_title("Qual meu saldo de férias?"),
            "Qual meu saldo de férias?"
        );
    }

    #[test]
    fn title_collapses_whitespace() {
        assert_eq!(derive_title("  Qual\n meu   saldo? "), "Qual meu saldo?");
    }

    #[test]
    fn long_title_is_truncated_on_char_boundary() {
        let content = "ç".repeat(80);
        let title = derive_title(&content);
        assert!(title.ends_with(TITLE_ELLIPSIS));
        assert_eq!(
            title.trim_end_matches(TITLE_ELLIPSIS).chars().count(),
            MAX_TITLE_LENGTH
        );
    }

    #[test]
    fn truncated_title_drops_trailing_space_before_ellipsis() {
        // 49 chars, a space at position 50, then more text.
        let content = format!("{} {}", "a".repeat(49), "b".repeat(10));
        assert_eq!(derive_title(&content), format!("{}...", "a".repeat(49)));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("system"), None);
    }
}

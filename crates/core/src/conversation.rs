//! Per-session conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One turn of history: what the user said and how the assistant replied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exchange {
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Replies that should not be remembered as conversational context — the
/// fallback strings emitted when a backend fails (§4.6 step 6).
pub fn is_trivial_reply(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("done.")
        || trimmed.eq_ignore_ascii_case("done")
        || trimmed == "I wasn't able to complete that request. Please try again."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_replies_are_detected() {
        assert!(is_trivial_reply("Done."));
        assert!(is_trivial_reply("  "));
        assert!(is_trivial_reply(
            "I wasn't able to complete that request. Please try again."
        ));
        assert!(!is_trivial_reply("It is 3 PM."));
    }
}

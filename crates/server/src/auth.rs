//! Connection authorization (§1, §3 "Connection", §4.8 `AwaitAuth`).
//!
//! Unlike the HTTP bearer-header middleware this is grounded on, our wire
//! protocol carries credentials in the first `auth` message rather than a
//! request header, so the check runs once per connection instead of once
//! per request. The comparison itself follows the same constant-time
//! technique.

use std::sync::atomic::{AtomicBool, Ordering};

use voice_agent_config::AuthConfig;

static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    Rejected(&'static str),
}

/// Checks the `auth` message's api key, and the connection's `Origin`
/// header if the server has an allowlist configured. `origin` is `None`
/// when the client sent no `Origin` header at all (non-browser clients).
pub fn check_auth(config: &AuthConfig, origin: Option<&str>, api_key: &str) -> AuthOutcome {
    if !config.enabled {
        if !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!("connection authentication is disabled; accepting all connections");
        }
        return AuthOutcome::Accepted;
    }

    let expected = match config.api_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => return AuthOutcome::Rejected("server has no api key configured"),
    };

    if !constant_time_compare(api_key.as_bytes(), expected.as_bytes()) {
        return AuthOutcome::Rejected("invalid api key");
    }

    if !config.allowed_origins.is_empty() {
        let allowed = origin
            .map(|o| config.allowed_origins.iter().any(|allowed| allowed == o))
            .unwrap_or(false);
        if !allowed {
            return AuthOutcome::Rejected("origin not allowed");
        }
    }

    AuthOutcome::Accepted
}

/// XOR-accumulating comparison: every byte pair is visited regardless of
/// mismatches found so far, so timing doesn't leak how many bytes matched.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, api_key: Option<&str>, origins: &[&str]) -> AuthConfig {
        AuthConfig {
            enabled,
            api_key: api_key.map(String::from),
            allowed_origins: origins.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn disabled_auth_accepts_anything() {
        let cfg = config(false, None, &[]);
        assert_eq!(check_auth(&cfg, None, "whatever"), AuthOutcome::Accepted);
    }

    #[test]
    fn correct_key_is_accepted() {
        let cfg = config(true, Some("secret"), &[]);
        assert_eq!(check_auth(&cfg, None, "secret"), AuthOutcome::Accepted);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let cfg = config(true, Some("secret"), &[]);
        assert!(matches!(check_auth(&cfg, None, "nope"), AuthOutcome::Rejected(_)));
    }

    #[test]
    fn origin_allowlist_is_enforced() {
        let cfg = config(true, Some("secret"), &["https://example.com"]);
        assert_eq!(
            check_auth(&cfg, Some("https://example.com"), "secret"),
            AuthOutcome::Accepted
        );
        assert!(matches!(
            check_auth(&cfg, Some("https://evil.example"), "secret"),
            AuthOutcome::Rejected(_)
        ));
    }

    #[test]
    fn constant_time_compare_matches_equal_slices() {
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
    }
}

//! Log Redaction Layer
//!
//! Scrubs ledger tokens, bearer credentials, and API keys from strings prior
//! to logging. Proxy error pages occasionally echo request headers back.

use once_cell::sync::Lazy;
use regex::Regex;

static NOTION_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:secret|ntn)_[A-Za-z0-9]{20,}").unwrap());
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"sk-[a-zA-Z0-9]{20,}").unwrap());
static HEADER_ECHO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)("?(?:x-api-key|x-vercel-protection-bypass|cookie)"?\s*[:=]\s*"?)[^"\s,;}]+"#)
        .unwrap()
});

/// Longest body excerpt that goes into a log line or error message.
pub const MAX_LOGGED_BODY_CHARS: usize = 512;

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = NOTION_TOKEN_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    let redacted = API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    HEADER_ECHO_RE
        .replace_all(&redacted, "${1}[REDACTED]")
        .into_owned()
}

/// Redact and cut a response body down to a loggable excerpt.
pub fn truncate_for_log(body: &str) -> String {
    let redacted = redact_sensitive_data(body);
    if redacted.chars().count() <= MAX_LOGGED_BODY_CHARS {
        return redacted;
    }
    let mut cut: String = redacted.chars().take(MAX_LOGGED_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_tokens() {
        let raw = "auth with secret_AbCdEfGhIjKlMnOpQrStUv and Bearer eyJhbGciOiJIUzI1NiJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("secret_AbCdEfGhIjKlMnOpQrStUv"));
        assert!(!clean.contains("eyJhbGciOiJIUzI1NiJ9"));
    }

    #[test]
    fn redacts_echoed_headers() {
        let raw = r#"{"x-api-key":"abc123","cookie": "_vercel_jwt=xyz"}"#;
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("abc123"));
        assert!(!clean.contains("xyz"));
        assert!(clean.contains("x-api-key"));
    }

    #[test]
    fn truncates_long_bodies() {
        let body = "<html>".repeat(200);
        let cut = truncate_for_log(&body);
        assert_eq!(cut.chars().count(), MAX_LOGGED_BODY_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_for_log("short"), "short");
    }
}

//! Fallback classifier for proxy bodies that are not JSON.
//!
//! The proxy sits behind a hosting gateway that answers with HTML login
//! walls or bare "Redirecting..." pages instead of the JSON envelope. Rules
//! are checked in order; the first hit decides.

use fundsync_core::ExtractionErrorKind;

struct Rule {
    kind: ExtractionErrorKind,
    matches: fn(&str) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        kind: ExtractionErrorKind::Gateway,
        matches: looks_like_html,
    },
    Rule {
        kind: ExtractionErrorKind::UnexpectedRedirect,
        matches: looks_like_redirect,
    },
];

fn looks_like_html(body: &str) -> bool {
    body.to_ascii_lowercase().contains("<!doctype") || body.contains("<html")
}

fn looks_like_redirect(body: &str) -> bool {
    body.contains("Redirecting")
}

/// Classify a body that failed to parse as the JSON envelope.
pub fn classify_unparsed_body(body: &str) -> ExtractionErrorKind {
    RULES
        .iter()
        .find(|rule| (rule.matches)(body))
        .map(|rule| rule.kind)
        .unwrap_or(ExtractionErrorKind::Malformed)
}

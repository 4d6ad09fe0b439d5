//! Wire protocol of the extraction proxy.
//!
//! A call is a two-state exchange: the `Initial` POST may be answered with a
//! `307` carrying `Location` and `Set-Cookie`, in which case exactly one
//! `Redirected` POST follows. Whatever the redirected hop returns is final.

use fundsync_core::{ExtractedBatch, ExtractionError, ExtractionErrorKind};
use fundsync_logging::truncate_for_log;
use serde::Deserialize;
use serde_json::Value;

use crate::classify::classify_unparsed_body;

/// Status the proxy's gateway uses to bounce a request to a session-bound URL.
pub const REDIRECT_STATUS: u16 = 307;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    Initial,
    Redirected,
}

impl Hop {
    pub fn label(self) -> &'static str {
        match self {
            Hop::Initial => "initial request",
            Hop::Redirected => "redirected request",
        }
    }
}

/// Everything the protocol needs from one HTTP response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub location: Option<String>,
    /// `Set-Cookie` values folded into a request `cookie` header.
    pub cookie_header: Option<String>,
    pub body: String,
}

impl ProxyResponse {
    /// Location to follow, if this response asks for the redirect hop.
    pub fn redirect_target(&self) -> Option<&str> {
        if self.status == REDIRECT_STATUS {
            self.location.as_deref()
        } else {
            None
        }
    }
}

/// Fold `Set-Cookie` values into a `cookie` request header: the `name=value`
/// part of each, joined by `"; "`. Attributes (`Path`, `Expires`, ...) are dropped.
pub fn cookie_header<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let pairs: Vec<&str> = set_cookies
        .into_iter()
        .map(|c| c.split(';').next().unwrap_or("").trim())
        .filter(|pair| !pair.is_empty())
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

fn error_text(error: Option<Value>) -> Option<String> {
    match error? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Turn a final response into a batch or a typed error.
pub fn interpret(hop: Hop, response: &ProxyResponse) -> Result<ExtractedBatch, ExtractionError> {
    let status = response.status;

    let envelope: Envelope = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let kind = classify_unparsed_body(&response.body);
            return Err(ExtractionError::new(
                kind,
                format!(
                    "{} returned a non-JSON body ({e}): {}",
                    hop.label(),
                    truncate_for_log(&response.body)
                ),
            )
            .with_status(status));
        }
    };

    if !(200..300).contains(&status) {
        let message = error_text(envelope.error)
            .unwrap_or_else(|| truncate_for_log(&response.body));
        return Err(ExtractionError::new(ExtractionErrorKind::Proxy, message).with_status(status));
    }

    if !envelope.success {
        let message = error_text(envelope.error)
            .unwrap_or_else(|| "proxy reported failure without a message".to_string());
        return Err(ExtractionError::new(ExtractionErrorKind::Rejected, message).with_status(status));
    }

    let data = envelope.data.ok_or_else(|| {
        ExtractionError::new(ExtractionErrorKind::Schema, "response has no data").with_status(status)
    })?;

    serde_json::from_value(data).map_err(|e| {
        ExtractionError::new(ExtractionErrorKind::Schema, format!("data does not match batch schema: {e}"))
            .with_status(status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ProxyResponse {
        ProxyResponse {
            status,
            location: None,
            cookie_header: None,
            body: body.to_string(),
        }
    }

    #[test]
    fn folds_set_cookie_values() {
        let header = cookie_header([
            "_vercel_jwt=abc; Path=/; HttpOnly",
            "session=42; Max-Age=60",
        ]);
        assert_eq!(header.as_deref(), Some("_vercel_jwt=abc; session=42"));
        assert_eq!(cookie_header(Vec::<&str>::new()), None);
    }

    #[test]
    fn redirect_target_only_for_307_with_location() {
        let mut r = response(307, "");
        assert_eq!(r.redirect_target(), None);
        r.location = Some("/next".into());
        assert_eq!(r.redirect_target(), Some("/next"));
        r.status = 302;
        assert_eq!(r.redirect_target(), None);
    }

    #[test]
    fn parses_successful_envelope() {
        let body = r#"{"success":true,"data":{"rawText":"t","date":"2025年3月9日","funds":[{"name":"A","amount":"1.5"}]}}"#;
        let batch = interpret(Hop::Initial, &response(200, body)).unwrap();
        assert_eq!(batch.raw_text, "t");
        assert_eq!(batch.date.as_deref(), Some("2025年3月9日"));
        assert_eq!(batch.funds[0].amount.parse(), 1.5);
    }

    #[test]
    fn proxy_error_carries_status_and_message() {
        let err = interpret(Hop::Initial, &response(401, r#"{"success":false,"error":"bad key"}"#))
            .unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Proxy);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "bad key");
    }

    #[test]
    fn success_false_on_200_is_rejected() {
        let err = interpret(Hop::Redirected, &response(200, r#"{"success":false,"error":"no text found"}"#))
            .unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Rejected);
        assert_eq!(err.message, "no text found");
    }

    #[test]
    fn schema_violation_is_typed() {
        let err = interpret(Hop::Initial, &response(200, r#"{"success":true,"data":{"funds":{}}}"#))
            .unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Schema);

        let err = interpret(Hop::Initial, &response(200, r#"{"success":true}"#)).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Schema);
    }

    #[test]
    fn non_json_bodies_are_classified() {
        let err = interpret(Hop::Redirected, &response(200, "<!DOCTYPE html><html></html>")).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::Gateway);
        assert!(err.message.starts_with("redirected request"));

        let err = interpret(Hop::Initial, &response(308, "Redirecting...")).unwrap_err();
        assert_eq!(err.kind, ExtractionErrorKind::UnexpectedRedirect);
        assert_eq!(err.status, Some(308));
    }
}

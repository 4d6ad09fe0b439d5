use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client};
use tracing::{debug, info, warn};
use url::Url;

use fundsync_config::ExtractionConfig;
use fundsync_core::{ExtractedBatch, ExtractionError, ExtractionErrorKind, StatementExtractor};

use crate::protocol::{cookie_header, interpret, Hop, ProxyResponse};

/// Multipart field carrying the statement image.
pub const IMAGE_FIELD: &str = "image";
pub const IMAGE_FILE_NAME: &str = "image.jpg";
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Client for the OCR/LLM extraction proxy.
///
/// Redirects are handled by the protocol, never by the HTTP stack: the
/// gateway's 307 requires re-posting the multipart body together with the
/// cookies it hands out.
pub struct ExtractionClient {
    http: Client,
    endpoint: Url,
    headers: HeaderMap,
    timeout: Duration,
    redirect_timeout: Duration,
}

impl ExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let base = Url::parse(&config.proxy_url)
            .with_context(|| format!("Invalid extraction proxy URL: {}", config.proxy_url))?;
        let endpoint = base
            .join(&config.ocr_path)
            .with_context(|| format!("Invalid OCR path: {}", config.ocr_path))?;

        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build extraction HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            headers: forwarded_headers(config)?,
            timeout: Duration::from_secs(config.timeout_secs),
            redirect_timeout: Duration::from_secs(config.redirect_timeout_secs),
        })
    }

    /// Override both hop deadlines.
    pub fn with_timeouts(mut self, initial: Duration, redirected: Duration) -> Self {
        self.timeout = initial;
        self.redirect_timeout = redirected;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn deadline(&self, hop: Hop) -> Duration {
        match hop {
            Hop::Initial => self.timeout,
            Hop::Redirected => self.redirect_timeout,
        }
    }

    /// Run the full exchange: initial POST, at most one redirected POST.
    pub async fn extract_batch(&self, image: &Bytes) -> Result<ExtractedBatch, ExtractionError> {
        let start = Instant::now();
        info!(bytes = image.len(), endpoint = %self.endpoint, "Sending statement to extraction proxy");

        let first = self.post(Hop::Initial, self.endpoint.clone(), image, None).await?;

        let (hop, last) = match first.redirect_target() {
            Some(location) => {
                let target = self.endpoint.join(location).map_err(|e| {
                    ExtractionError::new(
                        ExtractionErrorKind::Malformed,
                        format!("redirect location '{location}' is not a valid URL: {e}"),
                    )
                    .with_status(first.status)
                })?;
                info!(
                    target = %target,
                    carries_cookies = first.cookie_header.is_some(),
                    "Proxy redirected; re-sending statement"
                );
                let second = self
                    .post(Hop::Redirected, target, image, first.cookie_header.as_deref())
                    .await?;
                (Hop::Redirected, second)
            }
            None => (Hop::Initial, first),
        };

        let result = interpret(hop, &last);
        match &result {
            Ok(batch) => info!(
                funds = batch.funds.len(),
                hop = hop.label(),
                latency_ms = start.elapsed().as_millis() as u64,
                "Extraction completed"
            ),
            Err(e) => warn!(
                kind = %e.kind,
                status = ?e.status,
                hop = hop.label(),
                error = %e,
                "Extraction failed"
            ),
        }
        result
    }

    /// One POST with a freshly built multipart body, bounded by the hop's deadline.
    ///
    /// On expiry the exchange future is dropped, which aborts the in-flight
    /// request and closes its connection.
    async fn post(
        &self,
        hop: Hop,
        url: Url,
        image: &Bytes,
        cookie: Option<&str>,
    ) -> Result<ProxyResponse, ExtractionError> {
        let mut request = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .multipart(image_form(image)?);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }

        let deadline = self.deadline(hop);
        debug!(hop = hop.label(), deadline_ms = deadline.as_millis() as u64, "Posting to proxy");

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let cookie_header = cookie_header(
                response
                    .headers()
                    .get_all(SET_COOKIE)
                    .iter()
                    .filter_map(|v| v.to_str().ok()),
            );
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(ProxyResponse {
                status,
                location,
                cookie_header,
                body,
            })
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ExtractionError::new(
                if e.is_timeout() {
                    ExtractionErrorKind::Timeout
                } else {
                    ExtractionErrorKind::Connect
                },
                format!("{} failed: {e}", hop.label()),
            )),
            Err(_) => Err(ExtractionError::new(
                ExtractionErrorKind::Timeout,
                format!("{} aborted after {}ms", hop.label(), deadline.as_millis()),
            )),
        }
    }
}

#[async_trait]
impl StatementExtractor for ExtractionClient {
    async fn extract(&self, image: Bytes) -> Result<ExtractedBatch, ExtractionError> {
        self.extract_batch(&image).await
    }
}

/// Build the single-part multipart body. Bodies are single-use, so every hop
/// calls this again.
fn image_form(image: &Bytes) -> Result<Form, ExtractionError> {
    let part = Part::bytes(image.to_vec())
        .file_name(IMAGE_FILE_NAME)
        .mime_str(IMAGE_CONTENT_TYPE)
        .map_err(|e| {
            ExtractionError::new(
                ExtractionErrorKind::Connect,
                format!("failed to build multipart body: {e}"),
            )
        })?;
    Ok(Form::new().part(IMAGE_FIELD, part))
}

/// Opaque credentials forwarded on every hop.
fn forwarded_headers(config: &ExtractionConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        headers.insert("x-api-key", HeaderValue::from_str(key).context("Invalid API key header value")?);
    }
    if let Some(secret) = config.bypass_secret.as_deref().filter(|s| !s.is_empty()) {
        headers.insert(
            "x-vercel-protection-bypass",
            HeaderValue::from_str(secret).context("Invalid bypass secret header value")?,
        );
        headers.insert("x-vercel-set-bypass-cookie", HeaderValue::from_static("true"));
    }

    for (name, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid extra header name: {name}"))?;
        // The multipart encoder owns the body framing headers.
        if name == CONTENT_TYPE || name == CONTENT_LENGTH {
            warn!(header = %name, "Ignoring configured body framing header");
            continue;
        }
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for extra header {name}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

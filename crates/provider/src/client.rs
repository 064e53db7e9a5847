use crate::error::{ErrorKind, Result};
use crate::outcome::{RATE_LIMIT_RESET_HEADER, RawResponse, ResultOutcome, SubmitOutcome};
use crate::ScanProvider;
use async_trait::async_trait;
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_API_KEY_HEADER: &str = "API-Key";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Who may see a submitted scan on the provider's side.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[display("public")]
    Public,
    #[default]
    #[display("unlisted")]
    Unlisted,
    #[display("private")]
    Private,
}

/// Connection settings for [`UrlScanClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub api_key: String,
    pub api_key_header: String,
    pub visibility: Visibility,
    pub timeout: Duration,
}
impl ClientOptions {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            visibility: Visibility::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
    visibility: Visibility,
}

/// HTTP client for a urlscan.io-style provider.
///
/// - `POST {base}/scan` submits a URL.
/// - `GET {base}/result/{id}` fetches the result of a submitted scan.
///
/// The API key is sent with every request in the configured header.
#[derive(Debug, Clone)]
pub struct UrlScanClient {
    client: Client,
    base_url: Url,
    visibility: Visibility,
}

impl UrlScanClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let mut base_url = Url::parse(&options.base_url).or_raise(|| ErrorKind::Client("base URL"))?;
        if base_url.cannot_be_a_base() {
            exn::bail!(ErrorKind::Client("base URL"));
        }
        // Url::join() replaces the last path segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let header_name =
            HeaderName::from_bytes(options.api_key_header.as_bytes()).or_raise(|| ErrorKind::Client("API key header"))?;
        let mut header_value = HeaderValue::from_str(&options.api_key).or_raise(|| ErrorKind::Client("API key"))?;
        header_value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(header_name, header_value);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .or_raise(|| ErrorKind::Client("HTTP client"))?;
        Ok(Self {
            client,
            base_url,
            visibility: options.visibility,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).or_raise(|| ErrorKind::Client("endpoint URL"))
    }

    async fn send(request: RequestBuilder) -> Result<RawResponse> {
        let response = request.send().await.or_raise(|| ErrorKind::Transport)?;
        let status = response.status().as_u16();
        let rate_limit_reset = response
            .headers()
            .get(RATE_LIMIT_RESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.or_raise(|| ErrorKind::Transport)?.to_vec();
        Ok(RawResponse {
            status,
            rate_limit_reset,
            body,
        })
    }
}

#[async_trait]
impl ScanProvider for UrlScanClient {
    #[instrument(level = "debug", skip(self))]
    async fn submit(&self, url: &str) -> Result<SubmitOutcome> {
        let request = self.client.post(self.endpoint("scan")?).json(&SubmitRequest {
            url,
            visibility: self.visibility,
        });
        let raw = Self::send(request).await?;
        let status = raw.status;
        let outcome = raw.into_submit_outcome();
        tracing::info!(url, status, outcome = ?outcome, "Submitted scan request");
        Ok(outcome)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_result(&self, external_id: &str) -> Result<ResultOutcome> {
        let mut endpoint = self.endpoint("result")?;
        endpoint
            .path_segments_mut()
            .ok()
            .ok_or_raise(|| ErrorKind::Client("endpoint URL"))?
            .push(external_id);
        let raw = Self::send(self.client.get(endpoint)).await?;
        let status = raw.status;
        let outcome = raw.into_result_outcome();
        tracing::info!(external_id, status, outcome = ?outcome, "Retrieved scan result");
        Ok(outcome)
    }
}

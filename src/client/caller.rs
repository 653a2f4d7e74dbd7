//! Resilient Caller: one logical upstream GET with credential rotation, bounded
//! retries and boundary validation of the body.

use crate::client::validator::{ResponseShape, UpstreamPayload, ValidatedResponse};
use crate::context::SourceContext;
use crate::resilience::{CredentialPool, RetryConfig};
use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use std::fmt;
use tracing::{debug, warn};
use url::Url;

/// Query parameter value; upstreams take both strings and numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

/// A logical request: endpoint, parameters and expected response shape
#[derive(Debug, Clone)]
pub struct ApiRequest {
    url: Url,
    params: Vec<(String, String)>,
    shape: Option<ResponseShape>,
    authenticated: bool,
}

impl ApiRequest {
    /// Request for an absolute URL
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::invalid_input("url", format!("invalid URL '{url}': {e}")))?;
        Ok(Self {
            url,
            params: Vec::new(),
            shape: None,
            authenticated: true,
        })
    }

    /// Request for `path` below `base`, e.g. `("https://api.jamendo.com/v3.0", "/tracks")`
    pub fn endpoint(base: &str, path: &str) -> Result<Self> {
        Self::get(&format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    /// Add a query parameter; a later value for the same key replaces the earlier one
    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        let value = value.into().to_string();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
        self
    }

    /// Expected body shape; the caller's default applies otherwise
    #[must_use]
    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Send without a credential
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    #[must_use]
    pub fn has_param(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// Full URL with request parameters, without credentials
    #[must_use]
    pub fn display_url(&self) -> String {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        url.to_string()
    }
}

/// Why an attempt did not produce a usable body
enum AttemptFailure {
    Transport(reqwest::Error),
    Status(StatusCode),
    Application(String),
}

/// Decision taken on a successfully received body
enum Decoded<T> {
    Done(T),
    Retry(String),
    Fail(Error),
}

/// Issues GET requests for one adapter.
///
/// Holds only immutable configuration; the credential cursor lives in the
/// [`SourceContext`] passed to each call.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    name: &'static str,
    client: Client,
    credentials: CredentialPool,
    retry: RetryConfig,
    fixed_params: Vec<(String, String)>,
    default_shape: ResponseShape,
}

impl ResilientCaller {
    #[must_use]
    pub fn new(
        name: &'static str,
        client: Client,
        credentials: CredentialPool,
        retry: RetryConfig,
    ) -> Self {
        Self {
            name,
            client,
            credentials,
            retry,
            fixed_params: Vec::new(),
            default_shape: ResponseShape::default(),
        }
    }

    /// Parameters sent with every request unless the request sets the same key
    #[must_use]
    pub fn with_fixed_params(mut self, params: &[(&str, ParamValue)]) -> Self {
        self.fixed_params = params
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.to_string()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_default_shape(mut self, shape: ResponseShape) -> Self {
        self.default_shape = shape;
        self
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.credentials.is_empty()
    }

    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch and validate a JSON body
    pub async fn get_json(
        &self,
        request: &ApiRequest,
        ctx: &mut SourceContext,
    ) -> Result<ValidatedResponse> {
        let shape = request.shape.as_ref().unwrap_or(&self.default_shape);
        let context = self.name;

        self.execute(request, ctx, |text| match UpstreamPayload::classify(text, shape) {
            UpstreamPayload::Results { body, results } => {
                Decoded::Done(ValidatedResponse { body, results })
            }
            UpstreamPayload::Empty { body } => {
                debug!("{} returned no results", context);
                Decoded::Done(ValidatedResponse {
                    body,
                    results: Vec::new(),
                })
            }
            UpstreamPayload::ApplicationError(message) => Decoded::Retry(message),
            UpstreamPayload::Malformed(message) => Decoded::Fail(Error::InvalidResponse {
                context: context.to_string(),
                message,
            }),
        })
        .await
    }

    /// Fetch a body verbatim, for pages without a JSON API
    pub async fn fetch_text(&self, request: &ApiRequest, ctx: &mut SourceContext) -> Result<String> {
        self.execute(request, ctx, |text| Decoded::Done(text.to_string()))
            .await
    }

    async fn execute<T, F>(
        &self,
        request: &ApiRequest,
        ctx: &mut SourceContext,
        decode: F,
    ) -> Result<T>
    where
        F: Fn(&str) -> Decoded<T> + Send + Sync,
        T: Send,
    {
        let rotating = request.authenticated && self.credentials.can_rotate();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let cursor = ctx.credential_cursor();
            debug!(
                "{} attempt {}/{}: GET {}",
                self.name,
                attempt,
                self.retry.max_attempts,
                request.display_url()
            );

            let failure = match self.build(request, cursor).send().await {
                Err(e) => AttemptFailure::Transport(e),
                Ok(response) if response.status().is_success() => match response.text().await {
                    Err(e) => AttemptFailure::Transport(e),
                    Ok(text) => match decode(&text) {
                        Decoded::Done(value) => return Ok(value),
                        Decoded::Fail(e) => return Err(e),
                        Decoded::Retry(message) => AttemptFailure::Application(message),
                    },
                },
                Ok(response) => AttemptFailure::Status(response.status()),
            };

            let has_budget = self.retry.has_budget(attempt);

            match failure {
                AttemptFailure::Status(status)
                    if is_credential_status(status) && rotating && has_budget =>
                {
                    let next = self.credentials.next_index(cursor);
                    ctx.set_credential_cursor(next);
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        "{} returned {}, rotating to credential {} and retrying in {:?}",
                        self.name,
                        status.as_u16(),
                        next,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptFailure::Status(status) if has_budget => {
                    let delay = self.retry.fixed_delay();
                    warn!(
                        "{} returned {}, retrying in {:?}",
                        self.name,
                        status.as_u16(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptFailure::Status(status) => {
                    warn!("{} request failed after {} attempts", self.name, attempt);
                    return Err(Error::RequestFailed {
                        status: status.as_u16(),
                        status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    });
                }
                AttemptFailure::Application(message) if has_budget => {
                    if rotating {
                        ctx.set_credential_cursor(self.credentials.next_index(cursor));
                    }
                    let delay = self.retry.fixed_delay();
                    warn!("{} API error: {}, retrying in {:?}", self.name, message, delay);
                    tokio::time::sleep(delay).await;
                }
                AttemptFailure::Application(message) => return Err(Error::ApiError(message)),
                AttemptFailure::Transport(e) if has_budget => {
                    let delay = self.retry.fixed_delay();
                    warn!("{} transport error: {}, retrying in {:?}", self.name, e, delay);
                    tokio::time::sleep(delay).await;
                }
                AttemptFailure::Transport(e) => return Err(Error::Http(e)),
            }
        }
    }

    fn build(&self, request: &ApiRequest, cursor: usize) -> reqwest::RequestBuilder {
        let mut query: Vec<(&str, &str)> = self
            .fixed_params
            .iter()
            .filter(|(k, _)| !request.has_param(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.extend(request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let builder = self.client.get(request.url.clone()).query(&query);
        if request.authenticated {
            self.credentials.apply(builder, cursor)
        } else {
            builder
        }
    }
}

/// Statuses that a different credential may cure
fn is_credential_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 403 | 429)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_replaces_existing_key() {
        let request = ApiRequest::endpoint("https://api.example.com/v3.0/", "/tracks")
            .unwrap()
            .param("limit", 20u32)
            .param("search", "jazz")
            .param("limit", 5u32);

        assert_eq!(
            request.display_url(),
            "https://api.example.com/v3.0/tracks?limit=5&search=jazz"
        );
        assert!(request.has_param("search"));
        assert!(!request.has_param("offset"));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            ApiRequest::get("not a url"),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_credential_statuses() {
        assert!(is_credential_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_credential_status(StatusCode::UNAUTHORIZED));
        assert!(is_credential_status(StatusCode::FORBIDDEN));
        assert!(!is_credential_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}

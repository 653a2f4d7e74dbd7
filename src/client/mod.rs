pub mod caller;
pub mod html;
pub mod pager;
pub mod providers;
pub mod records;
pub mod validator;

pub use caller::{ApiRequest, ParamValue, ResilientCaller};
pub use pager::{PagedQuery, Pager};
pub use records::{
    AuthorLink, ChannelDetails, ChannelRecord, CollectionRecord, ContentItem, Link, MediaRecord,
    Page, PlaylistDetails, StreamDescriptor, StreamKind, Thumbnail,
};
pub use validator::{FailureProbe, ResponseShape, UpstreamPayload, ValidatedResponse};

use crate::config::HttpConfig;
use crate::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// HTTP client configuration shared by every adapter
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for HttpClientConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            max_redirects: 10,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl HttpClientConfig {
    /// Build the underlying `reqwest` client
    pub fn build(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .gzip(true)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| Error::invalid_input("http", format!("Failed to create HTTP client: {e}")))
    }
}

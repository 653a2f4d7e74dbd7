use reqwest::RequestBuilder;

/// Where a credential is attached to an outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialPlacement {
    /// Appended as a query parameter, e.g. `client_id=...`
    Query(String),
    /// Sent as a header value with an optional prefix, e.g. `Authorization: Bearer ...`
    Header { name: String, prefix: String },
}

/// Ordered set of interchangeable credentials.
///
/// The pool itself is immutable; which member is current is tracked by a cursor
/// owned by the caller's session, and advanced with [`CredentialPool::next_index`].
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<String>,
    placement: CredentialPlacement,
}

impl CredentialPool {
    #[must_use]
    pub fn new(credentials: Vec<String>, placement: CredentialPlacement) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .filter(|c| !c.trim().is_empty())
                .collect(),
            placement,
        }
    }

    /// Pool with no credentials; requests go out unauthenticated
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            credentials: Vec::new(),
            placement: CredentialPlacement::Query(String::new()),
        }
    }

    #[must_use]
    pub fn bearer(token: Option<String>) -> Self {
        Self::new(
            token.into_iter().collect(),
            CredentialPlacement::Header {
                name: "Authorization".to_string(),
                prefix: "Bearer ".to_string(),
            },
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Whether rotating can ever yield a different credential
    #[must_use]
    pub fn can_rotate(&self) -> bool {
        self.credentials.len() > 1
    }

    /// Credential at `cursor`, wrapping modulo pool size
    #[must_use]
    pub fn get(&self, cursor: usize) -> Option<&str> {
        if self.credentials.is_empty() {
            return None;
        }
        self.credentials
            .get(cursor % self.credentials.len())
            .map(String::as_str)
    }

    /// Index that follows `cursor`; pure, the caller stores the result
    #[must_use]
    pub fn next_index(&self, cursor: usize) -> usize {
        if self.credentials.is_empty() {
            0
        } else {
            (cursor + 1) % self.credentials.len()
        }
    }

    /// Attach the credential at `cursor` to a request
    pub fn apply(&self, request: RequestBuilder, cursor: usize) -> RequestBuilder {
        let Some(credential) = self.get(cursor) else {
            return request;
        };

        match &self.placement {
            CredentialPlacement::Query(name) => request.query(&[(name.as_str(), credential)]),
            CredentialPlacement::Header { name, prefix } => {
                request.header(name.as_str(), format!("{prefix}{credential}"))
            }
        }
    }
}

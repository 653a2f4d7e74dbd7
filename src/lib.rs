pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod mapping;
pub mod resilience;

pub use client::providers::{
    build_source, ArchiveSource, JamendoSource, MediaSource, PageRequest, PlutoSource,
    SearchKind, SearchQuery, SourceKind, SunoSource,
};
pub use client::{
    ApiRequest, AuthorLink, ChannelDetails, ChannelRecord, CollectionRecord, ContentItem,
    HttpClientConfig, Link, MediaRecord, PagedQuery, Page, Pager, PlaylistDetails,
    ResilientCaller, StreamDescriptor, StreamKind, Thumbnail,
};
pub use config::{Config, ConfigOverrides, ContentMode};
pub use context::SourceContext;
pub use error::{Error, ErrorCategory, Result};
pub use mapping::MissingTimestamp;
pub use resilience::{CredentialPlacement, CredentialPool, RetryConfig};

pub mod credentials;
pub mod retry;

pub use credentials::{CredentialPlacement, CredentialPool};
pub use retry::RetryConfig;

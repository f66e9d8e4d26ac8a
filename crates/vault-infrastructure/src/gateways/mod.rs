//! HTTP clients for the external collaborators

pub mod http_notifier;
pub mod http_identity;

pub use http_notifier::HttpNotifier;
pub use http_identity::HttpIdentityProvider;

use std::time::Duration;

use vault_core::error::DomainError;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, DomainError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|e| DomainError::GatewayError(format!("failed to build HTTP client: {}", e)))
}

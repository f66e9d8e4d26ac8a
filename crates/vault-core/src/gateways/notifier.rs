//! Messaging gateway trait (port)

use async_trait::async_trait;

use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), DomainError>;
}

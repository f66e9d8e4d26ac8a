//! Gateway traits for external collaborators (ports)

pub mod artifact_producer;
pub mod notifier;
pub mod identity_provider;

pub use artifact_producer::BackupArtifactProducer;
pub use notifier::Notifier;
pub use identity_provider::{AdminCredentials, IdentityProvider};

#[cfg(any(test, feature = "mocks"))]
pub use artifact_producer::MockBackupArtifactProducer;
#[cfg(any(test, feature = "mocks"))]
pub use notifier::MockNotifier;
#[cfg(any(test, feature = "mocks"))]
pub use identity_provider::MockIdentityProvider;

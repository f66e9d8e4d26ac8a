//! Tenant onboarding: provisioning, identity realm, operator notice

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::notifications::OperatorNotifier;
use super::provisioning::TenantProvisioner;
use crate::domain::{NewTenant, Tenant};
use crate::error::DomainError;
use crate::gateways::{AdminCredentials, IdentityProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingResult {
    pub tenant: Tenant,
    pub credentials: Option<AdminCredentials>,
    /// Set when the tenant was committed but the identity provider failed.
    pub identity_error: Option<String>,
}

pub struct TenantOnboarding {
    provisioner: Arc<TenantProvisioner>,
    identity: Option<Arc<dyn IdentityProvider>>,
    notifications: OperatorNotifier,
}

impl TenantOnboarding {
    pub fn new(
        provisioner: Arc<TenantProvisioner>,
        identity: Option<Arc<dyn IdentityProvider>>,
        notifications: OperatorNotifier,
    ) -> Self {
        Self {
            provisioner,
            identity,
            notifications,
        }
    }

    /// Provision the tenant, then ask the identity provider for a realm.
    ///
    /// Provisioning errors are returned as-is. Once the tenant is committed it stays, and an
    /// identity failure only shows up in `identity_error`.
    pub async fn onboard_tenant(&self, request: NewTenant) -> Result<OnboardingResult, DomainError> {
        let tenant = self.provisioner.create_tenant(request).await?;

        let Some(identity) = &self.identity else {
            return Ok(OnboardingResult {
                tenant,
                credentials: None,
                identity_error: None,
            });
        };

        match identity.create_realm(&tenant).await {
            Ok(credentials) => {
                info!(tenant_id = %tenant.id, realm = %credentials.realm, "Identity realm created");
                Ok(OnboardingResult {
                    tenant,
                    credentials: Some(credentials),
                    identity_error: None,
                })
            }
            Err(e) => {
                warn!(tenant_id = %tenant.id, "Identity realm creation failed: {}", e);
                self.notifications
                    .notify(&format!(
                        "Tenant '{}' created but identity setup failed: {}",
                        tenant.name, e
                    ))
                    .await;
                Ok(OnboardingResult {
                    tenant,
                    credentials: None,
                    identity_error: Some(e.to_string()),
                })
            }
        }
    }
}

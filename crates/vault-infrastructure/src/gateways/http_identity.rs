use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use vault_core::domain::Tenant;
use vault_core::error::DomainError;
use vault_core::gateways::{AdminCredentials, IdentityProvider};
use vault_shared::config::IdentitySettings;

use super::build_client;

#[derive(Debug, Serialize)]
struct RealmRequest<'a> {
    tenant_id: Uuid,
    tenant_name: &'a str,
    realm: &'a str,
}

/// Identity provider client: `POST {base_url}/realms`, answering with admin credentials.
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, DomainError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &IdentitySettings) -> Result<Option<Self>, DomainError> {
        settings
            .base_url
            .as_deref()
            .map(|url| Self::new(url, settings.timeout_secs))
            .transpose()
    }

    async fn create(&self, tenant: &Tenant) -> anyhow::Result<AdminCredentials> {
        let url = format!("{}/realms", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RealmRequest {
                tenant_id: tenant.id,
                tenant_name: &tenant.name,
                realm: &tenant.schema_prefix,
            })
            .send()
            .await
            .with_context(|| format!("failed to reach identity provider at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("identity provider returned {}: {}", status, body);
        }

        response
            .json::<AdminCredentials>()
            .await
            .context("identity provider sent an unreadable credentials payload")
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn create_realm(&self, tenant: &Tenant) -> Result<AdminCredentials, DomainError> {
        match self.create(tenant).await {
            Ok(credentials) => {
                debug!(tenant_id = %tenant.id, realm = %credentials.realm, "Realm request accepted");
                Ok(credentials)
            }
            Err(e) => {
                warn!(tenant_id = %tenant.id, "Identity realm creation failed: {:#}", e);
                Err(DomainError::GatewayError(format!("{:#}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_core::domain::{IsolationLevel, NewTenant, ResourceLimits};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tenant() -> Tenant {
        Tenant::new(NewTenant {
            name: "AcmeCorp".into(),
            module: "platform".into(),
            resource_limits: ResourceLimits::default(),
            isolation_level: IsolationLevel::Schema,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_realm_returns_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "realm": "acme",
                "client_id": "acme-admin",
                "admin_username": "admin",
                "admin_password": "generated"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpIdentityProvider::new(server.uri(), 5).unwrap();
        let credentials = provider.create_realm(&tenant()).await.unwrap();
        assert_eq!(credentials.realm, "acme");
        assert_eq!(credentials.admin_username, "admin");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let provider = HttpIdentityProvider::new(server.uri(), 5).unwrap();
        let err = provider.create_realm(&tenant()).await.unwrap_err();
        assert_eq!(err.code(), "GATEWAY_ERROR");
    }

    #[tokio::test]
    async fn test_conflict_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/realms"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let provider = HttpIdentityProvider::new(server.uri(), 5).unwrap();
        let err = provider.create_realm(&tenant()).await.unwrap_err();
        assert!(matches!(err, DomainError::GatewayError(ref m) if m.contains("409")));
    }
}

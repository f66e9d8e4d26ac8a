use std::sync::Arc;

use vault_core::repositories::ModuleConnector;
use vault_core::services::{
    BackupEngine, ModuleManager, QuotaEnforcer, RetentionSweeper, TenantOnboarding, TenantRegistry,
};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub onboarding: Arc<TenantOnboarding>,
    pub registry: Arc<TenantRegistry>,
    pub quota: Arc<QuotaEnforcer>,
    pub backups: Arc<BackupEngine>,
    pub retention: Arc<RetentionSweeper>,
    pub modules: Arc<ModuleManager>,
    pub connector: Arc<dyn ModuleConnector>,
    pub catalog_module: String,
    /// When set, every `/api` request must carry it in `X-Admin-Key`.
    pub admin_api_key: Option<String>,
}

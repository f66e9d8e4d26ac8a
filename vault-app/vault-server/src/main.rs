use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use vault_api::{build_router, AppState};
use vault_core::gateways::IdentityProvider;
use vault_core::services::{
    BackupEngine, BackupPolicy, MigrationRunner, ModuleManager, OperatorNotifier, QuotaEnforcer,
    RetentionSweeper, Scheduler, TenantOnboarding, TenantProvisioner, TenantRegistry,
    UsageCollector,
};
use vault_infrastructure::{
    HttpIdentityProvider, HttpNotifier, PgArtifactProducer, PgBackupRepository, PgMigrationStore,
    PgTenantRepository, PgUsageRepository, PoolRegistry, CORE_MIGRATIONS,
};
use vault_shared::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (.env, config/default.toml, config/{APP_ENV}.toml, environment)
    let config = AppConfig::load().context("failed to load configuration")?;

    // 2. Telemetry; the guard flushes the file writer on exit
    let _log_guard = vault_shared::telemetry::init_telemetry(&config.logging)?;

    info!(
        env = %config.app.env,
        modules = ?config.database.modules,
        catalog = %config.database.catalog_module,
        "Tenant vault starting"
    );

    // 3. Pools and migrations for the fixed module set
    let pools = Arc::new(PoolRegistry::new(config.database.clone()));
    let catalog = pools
        .catalog()
        .await
        .context("catalog module database is unreachable")?;

    let tenants = Arc::new(PgTenantRepository::new(catalog.clone()));
    let usage = Arc::new(PgUsageRepository::new(catalog.clone()));
    let backups = Arc::new(PgBackupRepository::new(catalog));

    let runner = Arc::new(MigrationRunner::new(
        Arc::new(PgMigrationStore::new(pools.clone())),
        CORE_MIGRATIONS.to_vec(),
    ));
    let modules = Arc::new(ModuleManager::new(pools.clone(), runner, backups.clone()));

    for outcome in modules.initialize_all_modules().await {
        match (&outcome.initialization, &outcome.error) {
            (Some(init), _) if init.migrations.succeeded() => info!(
                module = %outcome.module,
                applied = init.migrations.applied_count(),
                "Module ready"
            ),
            (Some(init), _) => warn!(
                module = %outcome.module,
                error = ?init.migrations.error,
                "Module connected with failed migrations"
            ),
            (None, error) => {
                if outcome.module == config.database.catalog_module {
                    anyhow::bail!(
                        "catalog module failed to initialize: {}",
                        error.as_deref().unwrap_or("unknown error")
                    );
                }
                warn!(module = %outcome.module, ?error, "Module unavailable at startup");
            }
        }
    }

    // 4. External collaborators
    let notifications = match HttpNotifier::from_settings(&config.notifications)? {
        Some(notifier) => OperatorNotifier::new(
            Arc::new(notifier),
            config.notifications.operator_recipient.clone(),
        ),
        None => {
            info!("No messaging gateway configured, operator notifications disabled");
            OperatorNotifier::disabled()
        }
    };
    let identity: Option<Arc<dyn IdentityProvider>> =
        match HttpIdentityProvider::from_settings(&config.identity)? {
            Some(provider) => Some(Arc::new(provider)),
            None => None,
        };

    // 5. Services
    let provisioner = Arc::new(TenantProvisioner::new(
        tenants.clone(),
        config.database.modules.clone(),
        notifications.clone(),
    ));
    let onboarding = Arc::new(TenantOnboarding::new(
        provisioner,
        identity,
        notifications.clone(),
    ));
    let registry = Arc::new(TenantRegistry::new(tenants.clone(), usage.clone()));
    let quota = Arc::new(QuotaEnforcer::new(tenants.clone(), usage));
    let engine = Arc::new(BackupEngine::new(
        backups.clone(),
        tenants.clone(),
        Arc::new(PgArtifactProducer::new(pools.clone())),
        notifications,
        BackupPolicy::from_settings(&config.backup),
    ));
    let retention = Arc::new(RetentionSweeper::new(backups));
    let collector = Arc::new(UsageCollector::new(tenants, registry.clone()));

    let recovered = engine.recover_interrupted_jobs().await?;
    if recovered > 0 {
        warn!(recovered, "Jobs left running by a previous process were marked failed");
    }

    // 6. Background scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(Scheduler::new(
        engine.clone(),
        retention.clone(),
        collector,
        config.scheduler.clone(),
    ));
    let background = scheduler.spawn(shutdown_rx);

    // 7. HTTP surface
    let state = AppState {
        onboarding,
        registry,
        quota,
        backups: engine,
        retention,
        modules,
        connector: pools.clone(),
        catalog_module: config.database.catalog_module.clone(),
        admin_api_key: config.app.admin_api_key.clone(),
    };
    if state.admin_api_key.is_none() {
        warn!("app.admin_api_key is not set; the admin API is unauthenticated");
    }
    let app = build_router(state);

    let host: std::net::IpAddr = config.app.host.parse().context("invalid app.host")?;
    let addr = SocketAddr::from((host, config.app.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Stop the scheduler loops whether the server drained or failed
    let _ = shutdown_tx.send(true);

    // 8. Drain background work, then release connections
    for handle in background {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    pools.close_all().await;
    info!("Tenant vault stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

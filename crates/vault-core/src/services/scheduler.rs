// ============================================================================
// Vault Core - Background Scheduler
// File: crates/vault-core/src/services/scheduler.rs
// ============================================================================
//! Fires scheduled backups, the retention sweep and the usage collector

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;
use vault_shared::config::SchedulerSettings;

use super::backup_engine::BackupEngine;
use super::retention::RetentionSweeper;
use super::usage_collector::UsageCollector;
use crate::domain::BackupJob;
use crate::error::DomainError;

pub struct Scheduler {
    engine: Arc<BackupEngine>,
    sweeper: Arc<RetentionSweeper>,
    collector: Arc<UsageCollector>,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(
        engine: Arc<BackupEngine>,
        sweeper: Arc<RetentionSweeper>,
        collector: Arc<UsageCollector>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            engine,
            sweeper,
            collector,
            settings,
        }
    }

    /// Execute every active config whose schedule fires in `(since, now]`.
    ///
    /// Different configs run concurrently; a config already running is rejected by the engine.
    pub async fn run_due_backups(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, Result<BackupJob, DomainError>)>, DomainError> {
        let configs = self.engine.list_backup_configs(true).await?;

        let due: Vec<Uuid> = configs
            .iter()
            .filter(|config| match config.parsed_schedule() {
                Ok(schedule) => schedule.is_due(since, now),
                Err(e) => {
                    warn!(config_id = %config.id, "Skipping config with bad schedule: {}", e);
                    false
                }
            })
            .map(|config| config.id)
            .collect();

        let runs = join_all(due.iter().map(|id| async move {
            let outcome = self.engine.execute_backup_job(id).await;
            if let Err(e) = &outcome {
                error!(config_id = %id, "Scheduled backup failed: {}", e);
            }
            (*id, outcome)
        }))
        .await;

        Ok(runs)
    }

    /// Start the background loops. Each stops once `shutdown` flips to `true`.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        if !self.settings.enabled {
            info!("Background scheduler disabled");
            return Vec::new();
        }

        info!(
            tick_seconds = self.settings.tick_seconds,
            retention_interval_secs = self.settings.retention_interval_secs,
            usage_collect_interval_secs = self.settings.usage_collect_interval_secs,
            "Starting background scheduler"
        );

        vec![
            tokio::spawn(self.clone().backup_loop(shutdown.clone())),
            tokio::spawn(self.clone().retention_loop(shutdown.clone())),
            tokio::spawn(self.usage_loop(shutdown)),
        ]
    }

    async fn backup_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.settings.tick_seconds.max(1)));
        let mut last_tick = Utc::now();
        // Jobs can outlive a tick; they run here so shutdown can wait for them.
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let since = last_tick;
                    last_tick = now;
                    self.schedule_tick(&mut in_flight, since, now);
                }
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = finished {
                        error!("Scheduled backup task panicked: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        Self::drain(in_flight).await;
        info!("Backup schedule loop stopped");
    }

    fn schedule_tick(self: &Arc<Self>, in_flight: &mut JoinSet<()>, since: DateTime<Utc>, now: DateTime<Utc>) {
        let this = self.clone();
        in_flight.spawn(async move {
            if let Err(e) = this.run_due_backups(since, now).await {
                error!("Backup schedule tick failed: {}", e);
            }
        });
    }

    /// Wait for in-flight scheduled jobs. Each is bounded by the engine's job timeout.
    async fn drain(mut in_flight: JoinSet<()>) {
        if !in_flight.is_empty() {
            info!(tasks = in_flight.len(), "Waiting for scheduled backups to finish");
        }
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!("Scheduled backup task panicked: {}", e);
            }
        }
    }

    async fn retention_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.retention_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweeper.cleanup_old_backups().await {
                        error!("Retention sweep failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Retention loop stopped");
    }

    async fn usage_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(
            self.settings.usage_collect_interval_secs.max(1),
        ));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.collector.collect_once().await {
                        error!("Usage collection failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Usage collector loop stopped");
    }
}

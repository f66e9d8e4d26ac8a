// ============================================================================
// Vault Core - Tenant Usage
// File: crates/vault-core/src/domain/usage.rs
// Description: Daily usage rows, live stats and limit evaluation
// ============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tenant::{ResourceLimits, Tenant};
use crate::error::DomainError;

/// One usage event reported by the surrounding application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub api_calls: i64,
    #[serde(default)]
    pub storage_used_mb: f64,
    #[serde(default)]
    pub active_users: i64,
    #[serde(default)]
    pub bandwidth_mb: f64,
}

impl UsageDelta {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.api_calls < 0 || self.active_users < 0 {
            return Err(DomainError::ValidationError(
                "usage counters must not be negative".into(),
            ));
        }
        for size in [self.storage_used_mb, self.bandwidth_mb] {
            if !size.is_finite() || size < 0.0 {
                return Err(DomainError::ValidationError(
                    "usage sizes must be finite and not negative".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Usage row keyed by `(tenant_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUsage {
    pub tenant_id: Uuid,
    pub date: NaiveDate,
    pub api_calls: i64,
    pub storage_used_mb: f64,
    pub active_users: i64,
    pub bandwidth_mb: f64,
    pub updated_at: DateTime<Utc>,
}

impl TenantUsage {
    pub fn empty(tenant_id: Uuid, date: NaiveDate) -> Self {
        Self {
            tenant_id,
            date,
            api_calls: 0,
            storage_used_mb: 0.0,
            active_users: 0,
            bandwidth_mb: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// Fold a delta into the row.
    ///
    /// `api_calls` and `bandwidth_mb` are counters and add up. `storage_used_mb` and
    /// `active_users` are gauges: the row keeps the highest reading of the day.
    pub fn apply(&mut self, delta: &UsageDelta) {
        self.api_calls += delta.api_calls;
        self.bandwidth_mb += delta.bandwidth_mb;
        self.storage_used_mb = self.storage_used_mb.max(delta.storage_used_mb);
        self.active_users = self.active_users.max(delta.active_users);
        self.updated_at = Utc::now();
    }
}

/// Values derived live from a tenant's isolated tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantStats {
    pub total_users: i64,
    pub active_sessions: i64,
    /// Distinct users holding an unexpired, unrevoked session.
    pub active_users: i64,
    pub data_rows: i64,
    pub storage_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub total_users: i64,
    pub active_sessions: i64,
    pub storage_mb: f64,
    pub api_calls_today: i64,
    pub bandwidth_mb_today: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitCheck {
    pub tenant_id: Uuid,
    pub within_limits: bool,
    pub exceeded: Vec<String>,
    pub usage: UsageSnapshot,
    pub limits: ResourceLimits,
}

impl LimitCheck {
    /// Compare live stats plus today's usage row against the tenant's limits.
    ///
    /// Storage takes the larger of the measured schema size and the reported gauge.
    pub fn evaluate(tenant: &Tenant, stats: &TenantStats, today: Option<&TenantUsage>) -> Self {
        let limits = tenant.resource_limits;
        let usage = UsageSnapshot {
            total_users: stats.total_users,
            active_sessions: stats.active_sessions,
            storage_mb: today
                .map(|u| u.storage_used_mb)
                .unwrap_or(0.0)
                .max(stats.storage_mb),
            api_calls_today: today.map(|u| u.api_calls).unwrap_or(0),
            bandwidth_mb_today: today.map(|u| u.bandwidth_mb).unwrap_or(0.0),
        };

        let mut exceeded = Vec::new();
        if usage.total_users > limits.max_users {
            exceeded.push(format!("users ({}/{})", usage.total_users, limits.max_users));
        }
        if usage.storage_mb > limits.max_storage_mb as f64 {
            exceeded.push(format!(
                "storage ({:.2}/{} MB)",
                usage.storage_mb, limits.max_storage_mb
            ));
        }
        if usage.api_calls_today > limits.max_api_calls_per_day {
            exceeded.push(format!(
                "api_calls ({}/{})",
                usage.api_calls_today, limits.max_api_calls_per_day
            ));
        }

        Self {
            tenant_id: tenant.id,
            within_limits: exceeded.is_empty(),
            exceeded,
            usage,
            limits,
        }
    }
}

/// Everything `get_tenant_stats` reports for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantStatsReport {
    pub tenant: Tenant,
    pub stats: TenantStats,
    pub usage_today: Option<TenantUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IsolationLevel, NewTenant};

    fn tenant(max_users: i64) -> Tenant {
        Tenant::new(NewTenant {
            name: "AcmeCorp".into(),
            module: "platform".into(),
            resource_limits: ResourceLimits {
                max_users,
                max_storage_mb: 100,
                max_api_calls_per_day: 1000,
            },
            isolation_level: IsolationLevel::Schema,
        })
        .unwrap()
    }

    #[test]
    fn test_counters_add_and_gauges_keep_max() {
        let mut usage = TenantUsage::empty(Uuid::new_v4(), Utc::now().date_naive());
        usage.apply(&UsageDelta {
            api_calls: 5,
            storage_used_mb: 10.0,
            active_users: 4,
            bandwidth_mb: 1.5,
        });
        usage.apply(&UsageDelta {
            api_calls: 3,
            storage_used_mb: 7.0,
            active_users: 2,
            bandwidth_mb: 2.0,
        });

        assert_eq!(usage.api_calls, 8);
        assert_eq!(usage.bandwidth_mb, 3.5);
        assert_eq!(usage.storage_used_mb, 10.0);
        assert_eq!(usage.active_users, 4);
    }

    #[test]
    fn test_gauge_grows_when_new_reading_is_higher() {
        let mut usage = TenantUsage::empty(Uuid::new_v4(), Utc::now().date_naive());
        usage.apply(&UsageDelta { storage_used_mb: 7.0, ..Default::default() });
        usage.apply(&UsageDelta { storage_used_mb: 12.0, ..Default::default() });
        assert_eq!(usage.storage_used_mb, 12.0);
    }

    #[test]
    fn test_negative_delta_rejected() {
        assert!(UsageDelta { api_calls: -1, ..Default::default() }.validate().is_err());
        assert!(UsageDelta { bandwidth_mb: f64::NAN, ..Default::default() }.validate().is_err());
        assert!(UsageDelta::default().validate().is_ok());
    }

    #[test]
    fn test_limit_equal_is_not_exceeded() {
        let tenant = tenant(10);
        let stats = TenantStats { total_users: 10, ..Default::default() };
        let check = LimitCheck::evaluate(&tenant, &stats, None);
        assert!(check.within_limits);
        assert!(check.exceeded.is_empty());
    }

    #[test]
    fn test_users_over_limit_reported() {
        let tenant = tenant(10);
        let stats = TenantStats { total_users: 11, ..Default::default() };
        let check = LimitCheck::evaluate(&tenant, &stats, None);
        assert!(!check.within_limits);
        assert_eq!(check.exceeded, vec!["users (11/10)".to_string()]);
    }

    #[test]
    fn test_api_calls_and_storage_from_usage_row() {
        let tenant = tenant(10);
        let mut today = TenantUsage::empty(tenant.id, Utc::now().date_naive());
        today.apply(&UsageDelta {
            api_calls: 1001,
            storage_used_mb: 150.0,
            ..Default::default()
        });
        let check = LimitCheck::evaluate(&tenant, &TenantStats::default(), Some(&today));
        assert_eq!(check.exceeded.len(), 2);
        assert!(check.exceeded.contains(&"api_calls (1001/1000)".to_string()));
        assert!(check.exceeded.contains(&"storage (150.00/100 MB)".to_string()));
    }
}

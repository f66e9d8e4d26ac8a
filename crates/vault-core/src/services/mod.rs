//! Core services

pub mod notifications;
pub mod provisioning;
pub mod registry;
pub mod quota;
pub mod backup_engine;
pub mod retention;
pub mod migration_runner;
pub mod module_manager;
pub mod onboarding;
pub mod usage_collector;
pub mod scheduler;

pub use notifications::OperatorNotifier;
pub use provisioning::TenantProvisioner;
pub use registry::{TenantLookup, TenantRegistry};
pub use quota::QuotaEnforcer;
pub use backup_engine::{BackupEngine, BackupPolicy, RestoreReport};
pub use retention::RetentionSweeper;
pub use migration_runner::MigrationRunner;
pub use module_manager::{ModuleInitOutcome, ModuleManager};
pub use onboarding::{OnboardingResult, TenantOnboarding};
pub use usage_collector::UsageCollector;
pub use scheduler::Scheduler;

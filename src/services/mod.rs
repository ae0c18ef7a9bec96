pub mod burn_rate;
pub mod jsonl_loader;
pub mod mock_loader;
pub mod plan_detector;
pub mod prediction;
pub mod scheduler;
pub mod session_segmenter;
pub mod settings_store;
pub mod time_format;
pub mod token_accountant;
pub mod usage_monitor;

use crate::models::*;
use anyhow::Result;

/// Source of the full usage history.
///
/// Implementations return events sorted ascending by timestamp and
/// deduplicated by `(message_id, request_id)` where both are present.
pub trait UsageDataLoader: Send + Sync {
    fn load_usage_data(&self) -> impl std::future::Future<Output = Result<Vec<UsageEvent>>> + Send;
}

/// Persistence for the manual plan override
pub trait SettingsStore: Send + Sync {
    fn get_manual_override(&self) -> Result<ManualOverride>;
    fn set_manual_override(&self, manual: &ManualOverride) -> Result<()>;
}

use super::UsageDataLoader;
use crate::models::*;
use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;

/// Synthetic usage history for development without Claude Code logs
pub struct MockUsageLoader {
    history_hours: i64,
}

impl MockUsageLoader {
    pub fn new(history_hours: i64) -> Self {
        Self {
            history_hours: history_hours.max(1),
        }
    }

    pub fn generate_events(&self) -> Vec<UsageEvent> {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let mut timestamp = now - Duration::hours(self.history_hours);
        let mut events = Vec::new();

        while timestamp < now {
            let model = if rng.gen_bool(0.2) {
                "claude-opus-4-20250514"
            } else {
                "claude-sonnet-4-20250514"
            };

            events.push(
                UsageEvent::new(timestamp, ModelId::new(model))
                    .with_tokens(rng.gen_range(50..2_000), rng.gen_range(100..4_000))
                    .with_cache(rng.gen_range(0..5_000), rng.gen_range(0..40_000)),
            );

            timestamp += Duration::seconds(rng.gen_range(30..900));
        }

        events
    }
}

impl Default for MockUsageLoader {
    fn default() -> Self {
        Self::new(3)
    }
}

impl UsageDataLoader for MockUsageLoader {
    async fn load_usage_data(&self) -> Result<Vec<UsageEvent>> {
        let events = self.generate_events();
        log::debug!("Generated {} mock usage events", events.len());
        Ok(events)
    }
}

use super::{ModelBreakdown, PlanType, ResolvedPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown for reset time and time remaining with no active session
pub const NO_SESSION_PLACEHOLDER: &str = "--";

/// State published to observers after each refresh.
///
/// A snapshot is always replaced as a whole, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub has_active_session: bool,
    pub current_tokens: u64,
    pub raw_tokens: u64,
    pub token_limit: u64,
    pub usage_percent: f64,
    pub burn_rate: f64, // tokens per minute
    pub time_remaining: String,
    pub reset_time: String,
    pub will_exceed_before_reset: bool,
    pub plan: PlanType,
    pub detected_plan: PlanType,
    pub is_manual_plan: bool,
    pub plan_label: String,
    pub session_start: Option<DateTime<Utc>>,
    pub session_end: Option<DateTime<Utc>>,
    pub model_breakdown: Vec<ModelBreakdown>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        let plan = PlanType::default();
        Self {
            has_active_session: false,
            current_tokens: 0,
            raw_tokens: 0,
            token_limit: plan.limit(),
            usage_percent: 0.0,
            burn_rate: 0.0,
            time_remaining: NO_SESSION_PLACEHOLDER.to_string(),
            reset_time: NO_SESSION_PLACEHOLDER.to_string(),
            will_exceed_before_reset: false,
            plan,
            detected_plan: plan,
            is_manual_plan: false,
            plan_label: format!("{} (Auto)", plan.name()),
            session_start: None,
            session_end: None,
            model_breakdown: Vec::new(),
            last_refreshed: None,
        }
    }
}

impl UsageSnapshot {
    /// No-active-session state carrying only the resolved plan
    pub fn without_session(plan: &ResolvedPlan, now: DateTime<Utc>) -> Self {
        Self {
            token_limit: plan.limit(),
            plan: plan.plan,
            detected_plan: plan.detected,
            is_manual_plan: plan.is_manual,
            plan_label: plan.label(),
            last_refreshed: Some(now),
            ..Self::default()
        }
    }

    pub fn remaining_tokens(&self) -> u64 {
        self.token_limit.saturating_sub(self.current_tokens)
    }
}

/// Share of `limit` consumed, in percent; 0.0 when the limit is zero
pub fn usage_percent(current: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        current as f64 / limit as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percent_guards_zero_limit() {
        assert_eq!(usage_percent(500, 0), 0.0);
        assert_eq!(usage_percent(11_000, 44_000), 25.0);
    }

    #[test]
    fn test_without_session_keeps_plan() {
        let plan = ResolvedPlan {
            plan: PlanType::Max5,
            detected: PlanType::Max5,
            is_manual: false,
        };

        let now = Utc::now();
        let cleared = UsageSnapshot::without_session(&plan, now);
        assert!(!cleared.has_active_session);
        assert_eq!(cleared.current_tokens, 0);
        assert_eq!(cleared.burn_rate, 0.0);
        assert_eq!(cleared.time_remaining, NO_SESSION_PLACEHOLDER);
        assert_eq!(cleared.reset_time, NO_SESSION_PLACEHOLDER);
        assert_eq!(cleared.plan, PlanType::Max5);
        assert_eq!(cleared.token_limit, 220_000);
        assert_eq!(cleared.plan_label, "Max5 (Auto)");
        assert_eq!(cleared.last_refreshed, Some(now));
    }
}

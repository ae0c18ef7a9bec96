use crate::models::{ManualOverride, PlanType, ResolvedPlan, SessionWindow};
use crate::services::token_accountant::display_tokens;

const CUSTOM_LIMIT_STEP: u64 = 10_000;

/// Infer the plan tier from the peak display tokens of any window
pub fn detect_plan(windows: &[SessionWindow]) -> PlanType {
    let peak = windows
        .iter()
        .filter(|window| !window.is_gap())
        .map(display_tokens)
        .max()
        .unwrap_or(0);

    plan_for_peak(peak)
}

/// Tier thresholds are inclusive: a peak equal to a tier's limit stays in it
pub fn plan_for_peak(peak: u64) -> PlanType {
    if peak <= PlanType::Pro.limit() {
        PlanType::Pro
    } else if peak <= PlanType::Max5.limit() {
        PlanType::Max5
    } else if peak <= PlanType::Max20.limit() {
        PlanType::Max20
    } else {
        PlanType::CustomMax(peak.div_ceil(CUSTOM_LIMIT_STEP).saturating_mul(CUSTOM_LIMIT_STEP))
    }
}

/// Apply a manual override, if any, on top of the detected tier
pub fn resolve_plan(detected: PlanType, manual: &ManualOverride) -> ResolvedPlan {
    match manual.selected_plan() {
        Some(plan) => ResolvedPlan {
            plan,
            detected,
            is_manual: true,
        },
        None => ResolvedPlan {
            plan: detected,
            detected,
            is_manual: false,
        },
    }
}

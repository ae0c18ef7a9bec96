use crate::models::SessionWindow;
use crate::services::token_accountant::display_tokens;
use chrono::{DateTime, Duration, Utc};

/// Tokens per minute over the trailing hour, across every session window.
///
/// Each window contributes its display tokens scaled by the fraction of its
/// active span `[first event, last event or now]` that falls inside
/// `[now - 1h, now]`. Windows with a non-positive span contribute nothing.
pub fn calculate_burn_rate(windows: &[SessionWindow], now: DateTime<Utc>) -> f64 {
    let hour_ago = now - Duration::hours(1);

    let tokens_last_hour: f64 = windows
        .iter()
        .filter(|window| !window.is_gap())
        .map(|window| window_contribution(window, hour_ago, now))
        .sum();

    tokens_last_hour / 60.0
}

fn window_contribution(window: &SessionWindow, hour_ago: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let start = window.effective_start();
    let end = if window.is_active(now) {
        now
    } else {
        window.actual_end()
    };

    let total_ms = (end - start).num_milliseconds();
    if total_ms <= 0 {
        return 0.0;
    }

    let overlap_ms = (end.min(now) - start.max(hour_ago)).num_milliseconds();
    if overlap_ms <= 0 {
        return 0.0;
    }

    display_tokens(window) as f64 * (overlap_ms as f64 / total_ms as f64)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forecasts longer than this many minutes collapse to "5h+"
const FORECAST_CAP_MINUTES: f64 = 300.0;

/// Time left before the budget runs out or the window resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRemaining {
    Exceeded,
    /// No consumption, so no forecast
    Unbounded,
    BeyondWindow,
    Remaining { hours: i64, minutes: i64 },
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRemaining::Exceeded => f.write_str("Exceeded"),
            TimeRemaining::Unbounded => f.write_str("Unbounded"),
            TimeRemaining::BeyondWindow => f.write_str("5h+"),
            TimeRemaining::Remaining { hours, minutes } => write!(f, "{hours}h {minutes}m"),
        }
    }
}

/// Exhaustion forecast for the active window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub time_remaining: TimeRemaining,
    pub minutes_to_exhaustion: Option<f64>,
    pub minutes_to_reset: f64,
}

impl Prediction {
    /// True when the budget is forecast to run out before the window resets
    pub fn will_exceed_before_reset(&self) -> bool {
        self.minutes_to_exhaustion
            .map_or(false, |exhaustion| exhaustion < self.minutes_to_reset)
    }
}

pub fn predict(
    current_tokens: u64,
    limit: u64,
    burn_rate: f64,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Prediction {
    let minutes_to_reset = (window_end - now).num_milliseconds() as f64 / 60_000.0;

    if current_tokens >= limit {
        return Prediction {
            time_remaining: TimeRemaining::Exceeded,
            minutes_to_exhaustion: None,
            minutes_to_reset,
        };
    }

    if burn_rate.is_nan() || burn_rate <= 0.0 {
        return Prediction {
            time_remaining: TimeRemaining::Unbounded,
            minutes_to_exhaustion: None,
            minutes_to_reset,
        };
    }

    let minutes_to_exhaustion = (limit - current_tokens) as f64 / burn_rate;
    let effective = minutes_to_exhaustion.min(minutes_to_reset);

    let time_remaining = if effective < 0.0 {
        TimeRemaining::Exceeded
    } else if effective > FORECAST_CAP_MINUTES {
        TimeRemaining::BeyondWindow
    } else {
        let whole_minutes = effective as i64;
        TimeRemaining::Remaining {
            hours: whole_minutes / 60,
            minutes: whole_minutes % 60,
        }
    };

    Prediction {
        time_remaining,
        minutes_to_exhaustion: Some(minutes_to_exhaustion),
        minutes_to_reset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_exceeded_regardless_of_rate() {
        for rate in [0.0, 15.0, 1_000_000.0] {
            let prediction = predict(50_000, 44_000, rate, now() + Duration::hours(2), now());
            assert_eq!(prediction.time_remaining, TimeRemaining::Exceeded);
            assert!(!prediction.will_exceed_before_reset());
        }
        let at_limit = predict(44_000, 44_000, 10.0, now() + Duration::hours(2), now());
        assert_eq!(at_limit.time_remaining.to_string(), "Exceeded");
    }

    #[test]
    fn test_zero_rate_is_unbounded() {
        let prediction = predict(1_000, 44_000, 0.0, now() + Duration::hours(3), now());
        assert_eq!(prediction.time_remaining, TimeRemaining::Unbounded);
        assert_eq!(prediction.time_remaining.to_string(), "Unbounded");
        assert!(!prediction.will_exceed_before_reset());
    }

    #[test]
    fn test_exhaustion_before_reset() {
        // 10_000 tokens left at 100/min = 100 minutes; reset is 3h away
        let prediction = predict(34_000, 44_000, 100.0, now() + Duration::hours(3), now());
        assert_eq!(
            prediction.time_remaining,
            TimeRemaining::Remaining { hours: 1, minutes: 40 }
        );
        assert_eq!(prediction.time_remaining.to_string(), "1h 40m");
        assert!(prediction.will_exceed_before_reset());
    }

    #[test]
    fn test_reset_before_exhaustion() {
        let prediction = predict(1_000, 44_000, 10.0, now() + Duration::minutes(95), now());
        assert_eq!(prediction.time_remaining.to_string(), "1h 35m");
        assert!(!prediction.will_exceed_before_reset());
    }

    #[test]
    fn test_long_forecast_capped() {
        // Reset exactly at the cap still formats as a duration
        let capped = predict(0, 880_000, 1.0, now() + Duration::hours(5), now());
        assert_eq!(capped.time_remaining.to_string(), "5h 0m");

        let beyond = predict(0, 880_000, 1.0, now() + Duration::hours(5) + Duration::minutes(1), now());
        assert_eq!(beyond.time_remaining, TimeRemaining::BeyondWindow);
        assert_eq!(beyond.time_remaining.to_string(), "5h+");
    }

    #[test]
    fn test_past_reset_is_exceeded() {
        let prediction = predict(1_000, 44_000, 10.0, now() - Duration::minutes(1), now());
        assert_eq!(prediction.time_remaining, TimeRemaining::Exceeded);
    }
}

use crate::models::*;

const OPUS_MULTIPLIER: u64 = 5;

/// How a model's tokens count toward the plan limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelWeight {
    /// Input plus output, times five
    Opus,
    /// Input plus output, unweighted
    Sonnet,
    /// Not counted toward display tokens, burn rate or breakdown
    Excluded,
}

impl ModelWeight {
    /// Case-insensitive substring match; "opus" takes precedence over "sonnet"
    pub fn for_model(model: &ModelId) -> Self {
        let name = model.as_str().to_lowercase();
        if name.contains("opus") {
            ModelWeight::Opus
        } else if name.contains("sonnet") {
            ModelWeight::Sonnet
        } else {
            ModelWeight::Excluded
        }
    }

    pub fn apply(&self, stats: &ModelStats) -> Option<u64> {
        match self {
            ModelWeight::Opus => Some(stats.raw_tokens().saturating_mul(OPUS_MULTIPLIER)),
            ModelWeight::Sonnet => Some(stats.raw_tokens()),
            ModelWeight::Excluded => None,
        }
    }
}

/// Weighted tokens for one model, or `None` if the model is excluded
pub fn weighted_tokens(model: &ModelId, stats: &ModelStats) -> Option<u64> {
    ModelWeight::for_model(model).apply(stats)
}

/// Sum of weighted tokens across the window's models. Gap windows are zero.
pub fn display_tokens(window: &SessionWindow) -> u64 {
    window
        .model_stats()
        .filter_map(|(model, stats)| weighted_tokens(model, stats))
        .fold(0u64, u64::saturating_add)
}

/// Unweighted input+output over every model, including excluded ones
pub fn raw_tokens(window: &SessionWindow) -> u64 {
    window
        .model_stats()
        .map(|(_, stats)| stats.raw_tokens())
        .fold(0u64, u64::saturating_add)
}

/// Per-model breakdown for weighted models only, heaviest first.
///
/// Ties keep the order in which models first appeared in the window.
pub fn model_breakdown(window: &SessionWindow) -> Vec<ModelBreakdown> {
    let mut breakdown: Vec<ModelBreakdown> = window
        .model_stats()
        .filter_map(|(model, stats)| {
            weighted_tokens(model, stats).map(|weighted| ModelBreakdown {
                model: model.to_string(),
                raw_tokens: stats.raw_tokens(),
                weighted_tokens: weighted,
                cache_creation_tokens: stats.cache_creation_tokens,
                cache_read_tokens: stats.cache_read_tokens,
                entries_count: stats.entries_count,
            })
        })
        .collect();

    // sort_by is stable
    breakdown.sort_by(|a, b| b.weighted_tokens.cmp(&a.weighted_tokens));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session_segmenter::segment;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 10, 0).unwrap()
    }

    fn event(offset_minutes: i64, model: &str, input: u64, output: u64) -> UsageEvent {
        UsageEvent::new(t0() + Duration::minutes(offset_minutes), ModelId::new(model))
            .with_tokens(input, output)
    }

    #[test]
    fn test_weighting_rule() {
        assert_eq!(ModelWeight::for_model(&ModelId::new("claude-3-OPUS")), ModelWeight::Opus);
        assert_eq!(
            ModelWeight::for_model(&ModelId::new("Claude-Sonnet-4-20250514")),
            ModelWeight::Sonnet
        );
        assert_eq!(
            ModelWeight::for_model(&ModelId::new("claude-3-5-haiku")),
            ModelWeight::Excluded
        );
        assert_eq!(ModelWeight::for_model(&ModelId::Unknown), ModelWeight::Excluded);
    }

    #[test]
    fn test_opus_takes_precedence_over_sonnet() {
        let model = ModelId::new("sonnet-distilled-opus");
        assert_eq!(ModelWeight::for_model(&model), ModelWeight::Opus);

        let stats = ModelStats {
            input_tokens: 10,
            output_tokens: 10,
            ..ModelStats::default()
        };
        assert_eq!(weighted_tokens(&model, &stats), Some(100));
    }

    #[test]
    fn test_display_tokens_mixed_window() {
        let windows = segment(&[
            event(0, "claude-sonnet-4", 1000, 500),
            event(60, "claude-opus-4", 200, 100),
        ]);
        assert_eq!(windows.len(), 1);
        assert_eq!(display_tokens(&windows[0]), 1500 + 300 * 5);
    }

    #[test]
    fn test_excluded_models_only_count_as_raw() {
        let windows = segment(&[
            event(0, "claude-sonnet-4", 100, 100),
            event(5, "claude-3-5-haiku", 1000, 1000),
            UsageEvent::new(t0() + Duration::minutes(6), ModelId::Unknown).with_tokens(50, 50),
        ]);
        let window = &windows[0];

        assert_eq!(display_tokens(window), 200);
        assert_eq!(raw_tokens(window), 200 + 2000 + 100);
    }

    #[test]
    fn test_cache_tokens_never_counted() {
        let windows = segment(&[event(0, "claude-sonnet-4", 10, 20).with_cache(5_000, 9_000)]);
        assert_eq!(display_tokens(&windows[0]), 30);
        assert_eq!(raw_tokens(&windows[0]), 30);

        let breakdown = model_breakdown(&windows[0]);
        assert_eq!(breakdown[0].cache_creation_tokens, 5_000);
        assert_eq!(breakdown[0].cache_read_tokens, 9_000);
    }

    #[test]
    fn test_breakdown_sorted_and_filtered() {
        let windows = segment(&[
            event(0, "claude-sonnet-4", 1000, 0),
            event(1, "claude-3-5-haiku", 99_999, 0),
            event(2, "claude-opus-4", 300, 0),
            event(3, "claude-sonnet-3-7", 2000, 0),
        ]);
        let breakdown = model_breakdown(&windows[0]);

        let order: Vec<(&str, u64)> = breakdown
            .iter()
            .map(|b| (b.model.as_str(), b.weighted_tokens))
            .collect();
        assert_eq!(
            order,
            vec![
                ("claude-sonnet-3-7", 2000),
                ("claude-opus-4", 1500),
                ("claude-sonnet-4", 1000),
            ]
        );
        assert_eq!(breakdown[1].raw_tokens, 300);
    }

    #[test]
    fn test_breakdown_ties_keep_first_seen_order() {
        let windows = segment(&[
            event(0, "claude-sonnet-b", 500, 0),
            event(1, "claude-opus-a", 100, 0),
            event(2, "claude-sonnet-c", 500, 0),
        ]);
        let names: Vec<String> = model_breakdown(&windows[0])
            .into_iter()
            .map(|b| b.model)
            .collect();
        assert_eq!(names, vec!["claude-sonnet-b", "claude-opus-a", "claude-sonnet-c"]);
    }

    #[test]
    fn test_gap_window_has_no_tokens() {
        let windows = segment(&[
            event(0, "claude-sonnet-4", 10, 10),
            event(60 * 7, "claude-sonnet-4", 10, 10),
        ]);
        let gap = windows.iter().find(|w| w.is_gap()).unwrap();
        assert_eq!(display_tokens(gap), 0);
        assert_eq!(raw_tokens(gap), 0);
        assert!(model_breakdown(gap).is_empty());
    }
}

use super::burn_rate::calculate_burn_rate;
use super::plan_detector::{detect_plan, resolve_plan};
use super::prediction::predict;
use super::session_segmenter::segment;
use super::time_format::TimeFormatter;
use super::token_accountant::{display_tokens, model_breakdown, raw_tokens};
use super::{SettingsStore, UsageDataLoader};
use crate::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};

pub type UsageSnapshotSender = watch::Sender<UsageSnapshot>;
pub type UsageSnapshotReceiver = watch::Receiver<UsageSnapshot>;

/// What a call to [`UsageMonitorController::refresh`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published,
    /// Another refresh was already in flight
    Skipped,
}

/// Runs refresh cycles and owns the published snapshot.
///
/// Each refresh recomputes everything from the full event history. Only the
/// manual plan override, read from the settings store, survives between
/// refreshes.
pub struct UsageMonitorController<L, S> {
    loader: L,
    settings: S,
    formatter: TimeFormatter,
    snapshot_tx: UsageSnapshotSender,
    refresh_guard: Mutex<()>,
}

impl<L: UsageDataLoader, S: SettingsStore> UsageMonitorController<L, S> {
    pub fn new(loader: L, settings: S, formatter: TimeFormatter) -> Self {
        let (snapshot_tx, _) = watch::channel(UsageSnapshot::default());
        Self {
            loader,
            settings,
            formatter,
            snapshot_tx,
            refresh_guard: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> UsageSnapshotReceiver {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.refresh_at(Utc::now()).await
    }

    /// One refresh cycle evaluated at `now`.
    ///
    /// A load or settings failure returns the error and leaves the previous
    /// snapshot published.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Result<RefreshOutcome> {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            log::debug!("Refresh already in flight; dropping tick");
            return Ok(RefreshOutcome::Skipped);
        };

        let events = self
            .loader
            .load_usage_data()
            .await
            .context("Failed to load usage data")?;
        let manual = self
            .settings
            .get_manual_override()
            .context("Failed to read plan settings")?;

        let previous = self.snapshot();
        let snapshot = build_snapshot(&events, now, &manual, &self.formatter, &previous);

        log::debug!(
            "Refreshed: {} events, active={}, tokens={}/{}, burn={:.1}/min",
            events.len(),
            snapshot.has_active_session,
            snapshot.current_tokens,
            snapshot.token_limit,
            snapshot.burn_rate
        );

        self.snapshot_tx.send_replace(snapshot);
        Ok(RefreshOutcome::Published)
    }

    /// Segment the full history without publishing anything
    pub async fn history(&self) -> Result<Vec<SessionWindow>> {
        let events = self.loader.load_usage_data().await?;
        Ok(segment(&events))
    }

    /// Persist the user's plan choice; takes effect on the next refresh
    pub fn set_plan(&self, selection: PlanSelection) -> Result<()> {
        self.settings.set_manual_override(&ManualOverride::from(selection))
    }
}

/// Compute a complete snapshot from the event history at `now`
pub fn build_snapshot(
    events: &[UsageEvent],
    now: DateTime<Utc>,
    manual: &ManualOverride,
    formatter: &TimeFormatter,
    previous: &UsageSnapshot,
) -> UsageSnapshot {
    let windows = segment(events);

    let Some(active) = find_active_window(&windows, now) else {
        // Detection is skipped, but a pinned plan still applies
        let plan = resolve_plan(previous.detected_plan, manual);
        return UsageSnapshot::without_session(&plan, now);
    };

    let current_tokens = display_tokens(active);
    let burn_rate = calculate_burn_rate(&windows, now);
    let plan = resolve_plan(detect_plan(&windows), manual);
    let prediction = predict(current_tokens, plan.limit(), burn_rate, active.end_time(), now);

    UsageSnapshot {
        has_active_session: true,
        current_tokens,
        raw_tokens: raw_tokens(active),
        token_limit: plan.limit(),
        usage_percent: usage_percent(current_tokens, plan.limit()),
        burn_rate,
        time_remaining: prediction.time_remaining.to_string(),
        reset_time: formatter.format_clock(active.end_time()),
        will_exceed_before_reset: prediction.will_exceed_before_reset(),
        plan: plan.plan,
        detected_plan: plan.detected,
        is_manual_plan: plan.is_manual,
        plan_label: plan.label(),
        session_start: Some(active.start_time()),
        session_end: Some(active.end_time()),
        model_breakdown: model_breakdown(active),
        last_refreshed: Some(now),
    }
}

/// The window containing `now`. Segmentation guarantees at most one; if that
/// ever breaks, the most recently started window wins.
pub fn find_active_window(windows: &[SessionWindow], now: DateTime<Utc>) -> Option<&SessionWindow> {
    let active: Vec<&SessionWindow> = windows.iter().filter(|w| w.is_active(now)).collect();

    if active.len() > 1 {
        log::warn!(
            "{} session windows active at {}; using the most recent",
            active.len(),
            now
        );
    }

    active.into_iter().max_by_key(|w| w.start_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn event(offset_minutes: i64, model: &str, input: u64, output: u64) -> UsageEvent {
        UsageEvent::new(base() + Duration::minutes(offset_minutes), ModelId::new(model))
            .with_tokens(input, output)
    }

    struct StaticLoader {
        events: Vec<UsageEvent>,
        fail: AtomicBool,
    }

    impl StaticLoader {
        fn new(events: Vec<UsageEvent>) -> Self {
            Self {
                events,
                fail: AtomicBool::new(false),
            }
        }
    }

    impl UsageDataLoader for StaticLoader {
        async fn load_usage_data(&self) -> Result<Vec<UsageEvent>> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk unavailable");
            }
            Ok(self.events.clone())
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        manual: std::sync::Mutex<ManualOverride>,
    }

    impl SettingsStore for MemorySettings {
        fn get_manual_override(&self) -> Result<ManualOverride> {
            Ok(self.manual.lock().unwrap().clone())
        }

        fn set_manual_override(&self, manual: &ManualOverride) -> Result<()> {
            *self.manual.lock().unwrap() = manual.clone();
            Ok(())
        }
    }

    fn controller(events: Vec<UsageEvent>) -> UsageMonitorController<StaticLoader, MemorySettings> {
        UsageMonitorController::new(
            StaticLoader::new(events),
            MemorySettings::default(),
            TimeFormatter::utc(false),
        )
    }

    #[tokio::test]
    async fn test_refresh_publishes_active_window() {
        let monitor = controller(vec![
            event(5, "claude-sonnet-4", 1000, 500),
            event(65, "claude-opus-4", 200, 100),
        ]);
        let mut rx = monitor.subscribe();

        let now = base() + Duration::minutes(95);
        let outcome = monitor.refresh_at(now).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published);
        assert!(rx.has_changed().unwrap());

        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.has_active_session);
        assert_eq!(snapshot.current_tokens, 3000);
        assert_eq!(snapshot.raw_tokens, 1800);
        assert_eq!(snapshot.plan, PlanType::Pro);
        assert_eq!(snapshot.token_limit, 44_000);
        assert_eq!(snapshot.plan_label, "Pro (Auto)");
        assert_eq!(snapshot.session_start, Some(base()));
        assert_eq!(snapshot.session_end, Some(base() + Duration::hours(5)));
        assert_eq!(snapshot.reset_time, "2:00 PM");
        assert_eq!(snapshot.last_refreshed, Some(now));

        // Span 09:05..10:35 is 90 minutes; the last 60 carry two thirds
        assert!((snapshot.burn_rate - 3000.0 * (60.0 / 90.0) / 60.0).abs() < 1e-9);

        let models: Vec<(&str, u64)> = snapshot
            .model_breakdown
            .iter()
            .map(|b| (b.model.as_str(), b.weighted_tokens))
            .collect();
        // Equal weights keep first-seen order
        assert_eq!(models, vec![("claude-sonnet-4", 1500), ("claude-opus-4", 1500)]);
    }

    #[tokio::test]
    async fn test_no_active_session_clears_usage() {
        let monitor = controller(vec![event(0, "claude-sonnet-4", 100, 100)]);

        let outcome = monitor
            .refresh_at(base() + Duration::hours(6))
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::Published);

        let snapshot = monitor.snapshot();
        assert!(!snapshot.has_active_session);
        assert_eq!(snapshot.current_tokens, 0);
        assert_eq!(snapshot.burn_rate, 0.0);
        assert_eq!(snapshot.time_remaining, NO_SESSION_PLACEHOLDER);
        assert_eq!(snapshot.reset_time, NO_SESSION_PLACEHOLDER);
        assert!(snapshot.model_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_manual_override_applies_without_session() {
        let monitor = controller(vec![event(0, "claude-opus-4", 10_000, 0)]);
        monitor.refresh_at(base() + Duration::minutes(10)).await.unwrap();
        assert_eq!(monitor.snapshot().detected_plan, PlanType::Max5);

        monitor
            .set_plan(PlanSelection::Manual(PlanType::Max20))
            .unwrap();
        let idle = base() + Duration::hours(6);
        monitor.refresh_at(idle).await.unwrap();

        let snapshot = monitor.snapshot();
        assert!(!snapshot.has_active_session);
        assert_eq!(snapshot.plan, PlanType::Max20);
        assert_eq!(snapshot.detected_plan, PlanType::Max5);
        assert!(snapshot.is_manual_plan);
        assert_eq!(snapshot.token_limit, 880_000);
        assert_eq!(snapshot.plan_label, "Max20 (Manual)");

        monitor.set_plan(PlanSelection::Auto).unwrap();
        monitor.refresh_at(idle).await.unwrap();
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.plan, PlanType::Max5);
        assert!(!snapshot.is_manual_plan);
        assert_eq!(snapshot.plan_label, "Max5 (Auto)");
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_snapshot() {
        let monitor = controller(vec![event(0, "claude-sonnet-4", 4000, 0)]);
        let now = base() + Duration::minutes(30);
        monitor.refresh_at(now).await.unwrap();
        let before = monitor.snapshot();

        monitor.loader.fail.store(true, Ordering::SeqCst);
        assert!(monitor.refresh_at(now + Duration::minutes(1)).await.is_err());
        assert_eq!(monitor.snapshot(), before);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let monitor = controller(vec![
            event(0, "claude-sonnet-4", 4000, 1000),
            event(20, "claude-opus-4", 10, 10),
            event(60 * 7, "claude-sonnet-4", 300, 300),
            event(60 * 7 + 15, "claude-3-5-haiku", 9000, 9000),
        ]);
        let now = base() + Duration::hours(7) + Duration::minutes(40);

        monitor.refresh_at(now).await.unwrap();
        let first = monitor.snapshot();
        monitor.refresh_at(now).await.unwrap();
        assert_eq!(monitor.snapshot(), first);
        assert_eq!(first.current_tokens, 600);
    }

    #[tokio::test]
    async fn test_manual_override_applies_and_keeps_detection() {
        let monitor = controller(vec![event(0, "claude-opus-4", 10_000, 0)]);
        let now = base() + Duration::minutes(10);

        monitor.refresh_at(now).await.unwrap();
        assert_eq!(monitor.snapshot().plan, PlanType::Max5);

        monitor
            .set_plan(PlanSelection::Manual(PlanType::Max20))
            .unwrap();
        monitor.refresh_at(now).await.unwrap();
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.plan, PlanType::Max20);
        assert_eq!(snapshot.detected_plan, PlanType::Max5);
        assert!(snapshot.is_manual_plan);
        assert_eq!(snapshot.token_limit, 880_000);
        assert_eq!(snapshot.plan_label, "Max20 (Manual)");

        monitor.set_plan(PlanSelection::Auto).unwrap();
        monitor.refresh_at(now).await.unwrap();
        assert_eq!(monitor.snapshot().plan, PlanType::Max5);
    }

    #[test]
    fn test_over_limit_is_exceeded() {
        let manual = ManualOverride::from(PlanSelection::Manual(PlanType::Pro));
        let events = vec![
            event(0, "claude-sonnet-4", 25_000, 0),
            event(30, "claude-sonnet-4", 25_000, 0),
        ];
        let snapshot = build_snapshot(
            &events,
            base() + Duration::minutes(45),
            &manual,
            &TimeFormatter::utc(true),
            &UsageSnapshot::default(),
        );

        assert_eq!(snapshot.current_tokens, 50_000);
        assert_eq!(snapshot.token_limit, 44_000);
        assert_eq!(snapshot.time_remaining, "Exceeded");
        assert!(!snapshot.will_exceed_before_reset);
        assert!(snapshot.usage_percent > 100.0);
    }

    #[test]
    fn test_zero_burn_is_unbounded() {
        // Observed at the instant of the only event: zero-length span, zero rate
        let events = vec![event(10, "claude-sonnet-4", 100, 0)];
        let snapshot = build_snapshot(
            &events,
            base() + Duration::minutes(10),
            &ManualOverride::disabled(),
            &TimeFormatter::utc(true),
            &UsageSnapshot::default(),
        );

        assert!(snapshot.has_active_session);
        assert_eq!(snapshot.burn_rate, 0.0);
        assert_eq!(snapshot.time_remaining, "Unbounded");
    }

    #[test]
    fn test_heavy_burn_flags_exhaustion_before_reset() {
        let events = vec![
            event(0, "claude-opus-4", 3_000, 0),
            event(10, "claude-opus-4", 3_000, 0),
        ];
        // 30k weighted over 20 minutes; Pro has 14k left at 500/min
        let snapshot = build_snapshot(
            &events,
            base() + Duration::minutes(20),
            &ManualOverride::from(PlanSelection::Manual(PlanType::Pro)),
            &TimeFormatter::utc(true),
            &UsageSnapshot::default(),
        );

        assert!((snapshot.burn_rate - 500.0).abs() < 1e-9);
        assert!(snapshot.will_exceed_before_reset);
        assert_eq!(snapshot.time_remaining, "0h 28m");
    }

    #[test]
    fn test_most_recent_active_window_wins() {
        let mut earlier = WindowBuilder::open(base(), 0);
        earlier.record(0, &event(0, "claude-sonnet-4", 1, 1));
        let mut later = WindowBuilder::open(base() + Duration::hours(1), 1);
        later.record(1, &event(60, "claude-sonnet-4", 2, 2));
        let windows = vec![earlier.finish(), later.finish()];

        let now = base() + Duration::hours(2);
        let chosen = find_active_window(&windows, now).unwrap();
        assert_eq!(chosen.start_time(), base() + Duration::hours(1));

        assert!(find_active_window(&windows, base() + Duration::hours(7)).is_none());
    }

    struct GatedLoader {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl UsageDataLoader for GatedLoader {
        async fn load_usage_data(&self) -> Result<Vec<UsageEvent>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_dropped() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let monitor = Arc::new(UsageMonitorController::new(
            GatedLoader {
                started: started.clone(),
                release: release.clone(),
            },
            MemorySettings::default(),
            TimeFormatter::utc(false),
        ));

        let in_flight = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.refresh().await })
        };
        started.notified().await;

        assert_eq!(monitor.refresh().await.unwrap(), RefreshOutcome::Skipped);

        release.notify_one();
        assert_eq!(in_flight.await.unwrap().unwrap(), RefreshOutcome::Published);
    }
}

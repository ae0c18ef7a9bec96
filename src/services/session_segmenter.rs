use crate::models::*;
use chrono::{DateTime, Duration, DurationRound, Utc};

/// Partition an ascending event stream into session windows and gap markers.
///
/// Events must already be sorted by timestamp; out-of-order input yields
/// windows that do not describe real sessions but never panics. Every event
/// lands in exactly one non-gap window, in input order.
pub fn segment(events: &[UsageEvent]) -> Vec<SessionWindow> {
    let mut windows = Vec::new();
    let mut current: Option<WindowBuilder> = None;

    for (index, event) in events.iter().enumerate() {
        let needs_new_window = match &current {
            Some(window) => starts_new_window(window, event.timestamp),
            None => true,
        };

        if needs_new_window {
            if let Some(closed) = current.take() {
                let actual_end = closed.actual_end();
                windows.push(closed.finish());

                if event.timestamp - actual_end >= session_duration() {
                    windows.push(SessionWindow::gap(actual_end, event.timestamp, index));
                }
            }
            current = Some(WindowBuilder::open(floor_to_hour(event.timestamp), index));
        }

        if let Some(window) = current.as_mut() {
            window.record(index, event);
        }
    }

    if let Some(last) = current {
        windows.push(last.finish());
    }

    log::debug!(
        "Segmented {} events into {} windows ({} gaps)",
        events.len(),
        windows.len(),
        windows.iter().filter(|w| w.is_gap()).count()
    );

    windows
}

/// Windows are closed-open: an event at exactly `end_time` starts a new one
fn starts_new_window(window: &WindowBuilder, timestamp: DateTime<Utc>) -> bool {
    if timestamp >= window.end_time() {
        return true;
    }

    window
        .last_entry()
        .map_or(false, |last| timestamp - last >= session_duration())
}

/// Truncate to the start of the UTC hour
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(Duration::hours(1))
        .unwrap_or(timestamp)
}

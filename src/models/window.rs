use super::{session_duration, ModelId, ModelStats, UsageEvent};
use chrono::{DateTime, Utc};
use std::ops::Range;

/// A session window (or gap marker) produced by one segmentation pass.
///
/// Windows are frozen once segmentation completes: every field is private and
/// only readable through accessors. Model statistics keep first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWindow {
    id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    first_entry: Option<DateTime<Utc>>,
    last_entry: Option<DateTime<Utc>>,
    is_gap: bool,
    model_stats: Vec<(ModelId, ModelStats)>,
    entries: Range<usize>,
}

impl SessionWindow {
    /// Synthetic marker covering an idle stretch between two windows
    pub(crate) fn gap(from: DateTime<Utc>, to: DateTime<Utc>, at_index: usize) -> Self {
        Self {
            id: format!("gap-{}", from.to_rfc3339()),
            start_time: from,
            end_time: to,
            first_entry: None,
            last_entry: None,
            is_gap: true,
            model_stats: Vec::new(),
            entries: at_index..at_index,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn first_entry_timestamp(&self) -> Option<DateTime<Utc>> {
        self.first_entry
    }

    pub fn last_entry_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_entry
    }

    pub fn is_gap(&self) -> bool {
        self.is_gap
    }

    /// A real session whose end is still ahead of `now`.
    ///
    /// The start is not checked, so for an instant earlier than the newest
    /// event every later window also counts as active.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.end_time && !self.is_gap
    }

    /// Timestamp of the last assigned event, or the start if there was none
    pub fn actual_end(&self) -> DateTime<Utc> {
        self.last_entry.unwrap_or(self.start_time)
    }

    /// Timestamp of the first assigned event, or the start if there was none
    pub fn effective_start(&self) -> DateTime<Utc> {
        self.first_entry.unwrap_or(self.start_time)
    }

    pub fn model_stats(&self) -> impl Iterator<Item = (&ModelId, &ModelStats)> {
        self.model_stats.iter().map(|(model, stats)| (model, stats))
    }

    pub fn stats_for(&self, model: &ModelId) -> Option<&ModelStats> {
        self.model_stats
            .iter()
            .find(|(candidate, _)| candidate == model)
            .map(|(_, stats)| stats)
    }

    /// Indices into the segmented input that this window owns
    pub fn entries(&self) -> Range<usize> {
        self.entries.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Mutable accumulator used while the segmenter walks the event stream
#[derive(Debug)]
pub(crate) struct WindowBuilder {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    first_entry: Option<DateTime<Utc>>,
    last_entry: Option<DateTime<Utc>>,
    model_stats: Vec<(ModelId, ModelStats)>,
    entries: Range<usize>,
}

impl WindowBuilder {
    pub(crate) fn open(start_time: DateTime<Utc>, at_index: usize) -> Self {
        Self {
            start_time,
            end_time: start_time + session_duration(),
            first_entry: None,
            last_entry: None,
            model_stats: Vec::new(),
            entries: at_index..at_index,
        }
    }

    pub(crate) fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub(crate) fn last_entry(&self) -> Option<DateTime<Utc>> {
        self.last_entry
    }

    pub(crate) fn actual_end(&self) -> DateTime<Utc> {
        self.last_entry.unwrap_or(self.start_time)
    }

    /// Assign the event at `index` of the input to this window
    pub(crate) fn record(&mut self, index: usize, event: &UsageEvent) {
        if self.first_entry.is_none() {
            self.first_entry = Some(event.timestamp);
        }
        self.last_entry = Some(event.timestamp);
        self.entries.end = index + 1;

        match self
            .model_stats
            .iter_mut()
            .find(|(model, _)| *model == event.model)
        {
            Some((_, stats)) => stats.record(event),
            None => {
                let mut stats = ModelStats::default();
                stats.record(event);
                self.model_stats.push((event.model.clone(), stats));
            }
        }
    }

    pub(crate) fn finish(self) -> SessionWindow {
        SessionWindow {
            id: self.start_time.to_rfc3339(),
            start_time: self.start_time,
            end_time: self.end_time,
            first_entry: self.first_entry,
            last_entry: self.last_entry,
            is_gap: false,
            model_stats: self.model_stats,
            entries: self.entries,
        }
    }
}

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

/// Formats reset times for display. Owned by the controller; holds no
/// global state so two controllers may format differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormatter {
    /// `None` follows the machine's zone, so DST changes are picked up
    offset: Option<FixedOffset>,
    use_24_hour_clock: bool,
}

impl TimeFormatter {
    pub fn new(offset: FixedOffset, use_24_hour_clock: bool) -> Self {
        Self {
            offset: Some(offset),
            use_24_hour_clock,
        }
    }

    /// Formatter in the machine's zone, offset resolved per instant
    pub fn local(use_24_hour_clock: bool) -> Self {
        Self {
            offset: None,
            use_24_hour_clock,
        }
    }

    pub fn utc(use_24_hour_clock: bool) -> Self {
        Self::new(Utc.fix(), use_24_hour_clock)
    }

    fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self.offset {
            Some(offset) => offset,
            None => instant.with_timezone(&Local).offset().fix(),
        }
    }

    pub fn format_clock(&self, instant: DateTime<Utc>) -> String {
        let local = instant.with_timezone(&self.offset_at(instant));
        if self.use_24_hour_clock {
            local.format("%H:%M").to_string()
        } else {
            local.format("%-I:%M %p").to_string()
        }
    }

    /// Calendar date followed by the clock time, for timelines spanning days
    pub fn format_date_clock(&self, instant: DateTime<Utc>) -> String {
        let date = instant
            .with_timezone(&self.offset_at(instant))
            .format("%Y-%m-%d");
        format!("{} {}", date, self.format_clock(instant))
    }
}

impl Default for TimeFormatter {
    fn default() -> Self {
        Self::local(false)
    }
}

pub mod ratatui_ui;

use crate::models::*;
use crate::services::time_format::TimeFormatter;
use crate::services::token_accountant::display_tokens;
use colored::*;
use std::fmt::Write;

pub use ratatui_ui::RatatuiTerminalUI;

/// Plain-text snapshot for `status` and for terminals without a dashboard
pub fn render_summary(snapshot: &UsageSnapshot, warning_threshold: f64) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "Claude Usage Monitor".bright_blue().bold());
    let _ = writeln!(out, "  Plan:           {}", snapshot.plan_label.cyan());
    if snapshot.is_manual_plan && snapshot.detected_plan != snapshot.plan {
        let _ = writeln!(out, "  Detected:       {}", snapshot.detected_plan);
    }

    if !snapshot.has_active_session {
        let _ = writeln!(out, "  Session:        {}", "no active session".dimmed());
        let _ = writeln!(out, "  Limit:          {} tokens", snapshot.token_limit);
        return out;
    }

    let ratio = snapshot.usage_percent / 100.0;
    let bar = create_progress_bar(snapshot.usage_percent, 30);
    let bar = if ratio >= 1.0 {
        bar.red()
    } else if ratio >= warning_threshold {
        bar.yellow()
    } else {
        bar.green()
    };

    let _ = writeln!(out, "  Session:        {}", "active".green());
    let _ = writeln!(out, "  Usage:          {bar}");
    let _ = writeln!(
        out,
        "  Tokens:         {} / {} ({} raw)",
        snapshot.current_tokens, snapshot.token_limit, snapshot.raw_tokens
    );
    let _ = writeln!(out, "  Burn rate:      {:.1} tokens/min", snapshot.burn_rate);

    let remaining = if snapshot.will_exceed_before_reset {
        snapshot.time_remaining.red().bold()
    } else {
        snapshot.time_remaining.normal()
    };
    let _ = writeln!(out, "  Time remaining: {remaining}");
    let _ = writeln!(out, "  Resets at:      {}", snapshot.reset_time);

    if !snapshot.model_breakdown.is_empty() {
        let _ = writeln!(out, "  Models:");
        for entry in &snapshot.model_breakdown {
            let _ = writeln!(
                out,
                "    {:<32} {:>10} counted {:>10} raw",
                entry.model, entry.weighted_tokens, entry.raw_tokens
            );
        }
    }

    out
}

/// Timeline of the most recent `limit` windows, oldest first
pub fn render_history(windows: &[SessionWindow], formatter: &TimeFormatter, limit: usize) -> String {
    if windows.is_empty() {
        return format!("{}\n", "No usage history found".dimmed());
    }

    let skip = windows.len().saturating_sub(limit);
    let mut out = String::new();

    for window in &windows[skip..] {
        let span = window.end_time() - window.start_time();
        let length = humantime::format_duration(std::time::Duration::from_secs(
            span.num_minutes().max(0) as u64 * 60,
        ));

        if window.is_gap() {
            let _ = writeln!(
                out,
                "{}",
                format!(
                    "  {}  idle for {}",
                    formatter.format_date_clock(window.start_time()),
                    length
                )
                .dimmed()
            );
            continue;
        }

        let _ = writeln!(
            out,
            "  {} - {}  {:>10} tokens  {:>4} entries",
            formatter.format_date_clock(window.start_time()),
            formatter.format_clock(window.end_time()),
            display_tokens(window),
            window.entry_count()
        );
    }

    out
}

/// Fixed-width bar; fill stops at 100% but the label shows the real value
pub fn create_progress_bar(percent: f64, width: usize) -> String {
    let fraction = if percent.is_nan() {
        0.0
    } else {
        (percent / 100.0).clamp(0.0, 1.0)
    };
    let filled = (fraction * width as f64).round() as usize;

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        percent
    )
}

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use claude_usage_monitor::{
    models::*,
    services::{
        jsonl_loader::JsonlUsageLoader,
        mock_loader::MockUsageLoader,
        scheduler::RefreshScheduler,
        settings_store::{load_or_create_config, JsonSettingsStore},
        time_format::TimeFormatter,
        usage_monitor::UsageMonitorController,
        SettingsStore, UsageDataLoader,
    },
    ui::{render_history, render_summary, RatatuiTerminalUI},
};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "claude-usage-monitor")]
#[command(about = "Track Claude token usage against the rolling 5-hour plan windows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Refresh interval in seconds (overrides the saved config)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Write debug logs to ./debug.log
    #[arg(short, long)]
    verbose: bool,

    /// Use generated usage instead of reading JSONL files (development only)
    #[arg(long)]
    force_mock: bool,

    /// Explain how usage is read and how the numbers are calculated
    #[arg(long)]
    explain_how_this_works: bool,

    /// Show version and build information
    #[arg(long)]
    about: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard (default)
    Monitor,
    /// Print the current snapshot once
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the session window timeline
    History {
        /// Number of windows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Pin a plan tier, or return to automatic detection
    Plan {
        /// auto, pro, max5 or max20
        tier: String,
    },
    /// Configure the monitor
    Config {
        /// Set refresh interval in seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Set warning threshold (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,
        /// Show times on a 24-hour clock
        #[arg(long)]
        clock_24h: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.about {
        show_about();
        return Ok(());
    }

    if cli.explain_how_this_works {
        explain_how_this_works();
        return Ok(());
    }

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("claude-usage-monitor");
    std::fs::create_dir_all(&data_dir)?;

    let command = cli.command.unwrap_or(Commands::Monitor);
    init_logging(LogTarget::choose(cli.verbose, &command, &data_dir))?;

    let config_path = data_dir.join("config.json");
    let mut config = load_or_create_config(&config_path)?;
    if let Some(interval) = cli.interval {
        config.update_interval_seconds = interval.max(1);
    }
    let settings = JsonSettingsStore::new(config_path);

    // Commands that never touch usage data
    match command {
        Commands::Plan { tier } => return set_plan(&settings, &tier),
        Commands::Config {
            interval,
            threshold,
            clock_24h,
        } => return configure_monitor(&settings, interval, threshold, clock_24h),
        _ => {}
    }

    if cli.force_mock {
        log::info!("Running in forced mock mode with generated usage");
        run_command(command, MockUsageLoader::default(), settings, config).await
    } else {
        let loader = JsonlUsageLoader::new(&config.data_paths)?;
        run_command(command, loader, settings, config).await
    }
}

/// Where log records go. The dashboard owns the terminal, so while it runs
/// nothing may be written to stderr.
#[derive(Debug, PartialEq)]
enum LogTarget {
    File {
        path: PathBuf,
        level: log::LevelFilter,
    },
    Stderr,
}

impl LogTarget {
    fn choose(verbose: bool, command: &Commands, data_dir: &Path) -> Self {
        if verbose {
            return LogTarget::File {
                path: PathBuf::from("debug.log"),
                level: log::LevelFilter::Debug,
            };
        }
        match command {
            Commands::Monitor => LogTarget::File {
                path: data_dir.join("monitor.log"),
                level: log::LevelFilter::Info,
            },
            _ => LogTarget::Stderr,
        }
    }
}

fn init_logging(target: LogTarget) -> Result<()> {
    match target {
        LogTarget::File { path, level } => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            env_logger::Builder::new()
                .filter_level(level)
                .target(env_logger::Target::Pipe(Box::new(log_file)))
                .init();
        }
        LogTarget::Stderr => {
            env_logger::Builder::new()
                .filter_level(log::LevelFilter::Info)
                .init();
        }
    }
    Ok(())
}

async fn run_command<L>(
    command: Commands,
    loader: L,
    settings: JsonSettingsStore,
    config: UserConfig,
) -> Result<()>
where
    L: UsageDataLoader + 'static,
{
    let formatter = TimeFormatter::local(config.use_24_hour_clock);
    let controller = Arc::new(UsageMonitorController::new(loader, settings, formatter.clone()));

    match command {
        Commands::Status { json } => {
            controller.refresh().await?;
            let snapshot = controller.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render_summary(&snapshot, config.warning_threshold));
            }
        }
        Commands::History { limit } => {
            let windows = controller.history().await?;
            println!(
                "{}",
                format!("Session windows ({} total):", windows.len()).bright_blue().bold()
            );
            print!("{}", render_history(&windows, &formatter, limit));
        }
        _ => run_monitor(controller, &config).await?,
    }

    Ok(())
}

async fn run_monitor<L, S>(controller: Arc<UsageMonitorController<L, S>>, config: &UserConfig) -> Result<()>
where
    L: UsageDataLoader + 'static,
    S: SettingsStore + 'static,
{
    let mut scheduler = RefreshScheduler::from_config(Arc::clone(&controller), config);
    scheduler.start().await;

    // Try the dashboard first, fall back to a one-shot summary if it fails
    let ui_result = match RatatuiTerminalUI::new(config) {
        Ok(mut dashboard) => {
            let result = dashboard
                .run(controller.subscribe(), scheduler.refresh_handle())
                .await;
            let _ = dashboard.cleanup();
            result
        }
        Err(e) => Err(e),
    };

    scheduler.stop().await;

    if let Err(e) = ui_result {
        log::debug!("Dashboard not available: {e}");
        controller.refresh().await?;
        print!(
            "{}",
            render_summary(&controller.snapshot(), config.warning_threshold)
        );
        println!();
        println!("Interactive dashboard not available in this environment.");
        println!("   Use 'claude-usage-monitor status' for quick checks.");
    }

    Ok(())
}

fn set_plan(settings: &JsonSettingsStore, tier: &str) -> Result<()> {
    let selection: PlanSelection = tier.parse()?;
    settings.set_manual_override(&ManualOverride::from(selection))?;

    match selection {
        PlanSelection::Auto => println!("Plan set to automatic detection"),
        PlanSelection::Manual(plan) => {
            println!("Plan pinned to {} ({} tokens per window)", plan, plan.limit())
        }
    }
    Ok(())
}

fn configure_monitor(
    settings: &JsonSettingsStore,
    interval: Option<u64>,
    threshold: Option<f64>,
    clock_24h: Option<bool>,
) -> Result<()> {
    let mut config = settings.load_config()?;

    if let Some(interval_val) = interval {
        if interval_val == 0 {
            bail!("Update interval must be at least 1 second");
        }
        config.update_interval_seconds = interval_val;
        println!("Set update interval to: {interval_val} seconds");
    }

    if let Some(threshold_val) = threshold {
        if !(0.0..=1.0).contains(&threshold_val) {
            bail!("Warning threshold must be between 0.0 and 1.0");
        }
        config.warning_threshold = threshold_val;
        println!("Set warning threshold to: {:.1}%", threshold_val * 100.0);
    }

    if let Some(use_24h) = clock_24h {
        config.use_24_hour_clock = use_24h;
        println!(
            "Times will use a {} clock",
            if use_24h { "24-hour" } else { "12-hour" }
        );
    }

    settings.save_config(&config)?;
    log::debug!("Saved config to {}", settings.config_path().display());
    Ok(())
}

fn show_about() {
    println!("{}", "Claude Usage Monitor".bright_cyan().bold());
    println!();
    println!("{}", "Version Information:".bright_yellow().bold());
    println!("  Version: {}", env!("CARGO_PKG_VERSION").bright_green());
    println!("  Name: {}", "claude-usage-monitor".bright_white());
    println!("  Built: {}", env!("USAGE_MONITOR_BUILD_TIME"));
    println!("  Build ID: {}", env!("USAGE_MONITOR_BUILD_ID"));
    println!("  Git: {}", env!("USAGE_MONITOR_GIT_HASH"));
    println!();

    println!("{}", "Built Using:".bright_yellow().bold());
    println!("  - Tokio async runtime");
    println!("  - Ratatui terminal UI framework");
    println!();

    println!("{}", "Usage:".bright_green().bold());
    println!("  claude-usage-monitor --help");
    println!("  claude-usage-monitor --explain-how-this-works");
    println!("  claude-usage-monitor plan max5");
}

fn explain_how_this_works() {
    println!("{}", "Claude Usage Monitor - How It Works".bright_cyan().bold());
    println!();

    println!("{}", "What It Reads:".bright_yellow().bold());
    println!("- ~/.claude/projects/**/*.jsonl (primary location)");
    println!("- ~/.config/claude/projects/**/*.jsonl (alternative location)");
    println!("- Extra roots from CLAUDE_DATA_PATHS, CLAUDE_DATA_PATH or the config file");
    println!("- Only timestamps, model names and token counts; never message content");
    println!();

    println!("{}", "Session Windows:".bright_yellow().bold());
    println!("- A window opens at the hour of the first message and lasts 5 hours");
    println!("- A message after the window ends, or after 5 idle hours, opens a new one");
    println!("- Idle stretches of 5 hours or more show up as gaps in 'history'");
    println!();

    println!("{}", "How Tokens Count:".bright_yellow().bold());
    println!("- Opus: input + output tokens, times 5");
    println!("- Sonnet: input + output tokens");
    println!("- Other models are shown as raw tokens but do not count toward the limit");
    println!();

    println!("{}", "Plans:".bright_yellow().bold());
    println!("- Pro 44,000 / Max5 220,000 / Max20 880,000 tokens per window");
    println!("- The tier is detected from the busiest window in your history");
    println!("- Above Max20 a Custom Max limit is rounded up to the next 10,000");
    println!("- 'claude-usage-monitor plan <tier>' pins a tier; 'plan auto' clears it");
    println!();

    println!("{}", "Forecast:".bright_yellow().bold());
    println!("- Burn rate: tokens per minute over the last hour across all windows");
    println!("- Time remaining: tokens left divided by burn rate, capped at the reset");
    println!();

    println!("{}", "Getting Started:".bright_green().bold());
    println!("1. Use Claude Code so it writes usage logs");
    println!("2. Run: claude-usage-monitor");
    println!("3. Press Tab to switch views, r to refresh, q to quit");
}

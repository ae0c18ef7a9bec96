use super::usage_monitor::{RefreshOutcome, UsageMonitorController};
use super::{SettingsStore, UsageDataLoader};
use crate::models::UserConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Wakes the scheduler for an immediate refresh
#[derive(Clone)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
}

impl RefreshHandle {
    pub fn request_refresh(&self) {
        self.notify.notify_one();
    }
}

/// Drives periodic refreshes of a [`UsageMonitorController`].
///
/// Every tick spawns its own refresh, so a slow load never delays the next
/// tick; the controller drops ticks that arrive while one is still running.
pub struct RefreshScheduler<L, S> {
    controller: Arc<UsageMonitorController<L, S>>,
    update_interval: Duration,
    initial_delay: Duration,
    is_running: Arc<RwLock<bool>>,
    manual_refresh: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl<L, S> RefreshScheduler<L, S>
where
    L: UsageDataLoader + 'static,
    S: SettingsStore + 'static,
{
    pub fn new(
        controller: Arc<UsageMonitorController<L, S>>,
        update_interval: Duration,
        initial_delay: Duration,
    ) -> Self {
        Self {
            controller,
            // tokio intervals panic on a zero period
            update_interval: update_interval.max(Duration::from_millis(10)),
            initial_delay,
            is_running: Arc::new(RwLock::new(false)),
            manual_refresh: Arc::new(Notify::new()),
            task: None,
        }
    }

    pub fn from_config(controller: Arc<UsageMonitorController<L, S>>, config: &UserConfig) -> Self {
        Self::new(
            controller,
            Duration::from_secs(config.update_interval_seconds),
            Duration::from_secs(config.initial_delay_seconds),
        )
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            notify: Arc::clone(&self.manual_refresh),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn start(&mut self) {
        let mut is_running = self.is_running.write().await;
        if *is_running {
            return;
        }
        *is_running = true;
        drop(is_running);

        log::debug!(
            "Starting usage refresh every {:?} after {:?}",
            self.update_interval,
            self.initial_delay
        );

        self.task = Some(tokio::spawn(refresh_loop(
            Arc::clone(&self.controller),
            self.update_interval,
            self.initial_delay,
            Arc::clone(&self.is_running),
            Arc::clone(&self.manual_refresh),
        )));
    }

    pub async fn stop(&mut self) {
        *self.is_running.write().await = false;
        self.manual_refresh.notify_one();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Refresh loop ended abnormally: {}", e);
            }
        }
        log::debug!("Stopped usage refresh");
    }
}

async fn refresh_loop<L, S>(
    controller: Arc<UsageMonitorController<L, S>>,
    update_interval: Duration,
    initial_delay: Duration,
    is_running: Arc<RwLock<bool>>,
    manual_refresh: Arc<Notify>,
) where
    L: UsageDataLoader + 'static,
    S: SettingsStore + 'static,
{
    tokio::time::sleep(initial_delay).await;

    let mut ticker = interval(update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = manual_refresh.notified() => log::debug!("Manual refresh requested"),
        }

        if !*is_running.read().await {
            break;
        }

        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            match controller.refresh().await {
                Ok(RefreshOutcome::Published) => {}
                Ok(RefreshOutcome::Skipped) => log::debug!("Tick skipped, refresh still running"),
                Err(e) => log::error!("Error refreshing usage: {:#}", e),
            }
        });
    }
}

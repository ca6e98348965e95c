//! Scan scheduler: warm-up plus retry burst, mutation-debounced re-scans, and a
//! periodic sweep. Every timer is an abortable task.

use crate::scan::Scanner;
use crate::site::SiteProfile;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub warmup: Duration,
    pub burst_attempts_dynamic: u32,
    pub burst_gap_dynamic: Duration,
    pub burst_attempts_financial: u32,
    pub burst_gap_financial: Duration,
    pub debounce: Duration,
    /// Second run after a debounced fire on dynamic profiles.
    pub dynamic_followup: Duration,
    pub interval_dynamic: Duration,
    pub interval_financial: Duration,
    /// Pause between successive classifier calls within one scan.
    pub request_gap: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(1000),
            burst_attempts_dynamic: 3,
            burst_gap_dynamic: Duration::from_millis(1500),
            burst_attempts_financial: 2,
            burst_gap_financial: Duration::from_millis(1000),
            debounce: Duration::from_millis(500),
            dynamic_followup: Duration::from_millis(1000),
            interval_dynamic: Duration::from_secs(5),
            interval_financial: Duration::from_secs(10),
            request_gap: Duration::from_millis(100),
        }
    }
}

impl ScheduleConfig {
    /// Attempts (including the initial run) and the gap between them.
    pub fn burst(&self, profile: SiteProfile) -> (u32, Duration) {
        if profile.is_dynamic() {
            (self.burst_attempts_dynamic, self.burst_gap_dynamic)
        } else if profile.is_financial() {
            (self.burst_attempts_financial, self.burst_gap_financial)
        } else {
            (1, Duration::ZERO)
        }
    }

    pub fn interval(&self, profile: SiteProfile) -> Option<Duration> {
        if profile.is_dynamic() {
            Some(self.interval_dynamic)
        } else if profile.is_financial() {
            Some(self.interval_financial)
        } else {
            None
        }
    }
}

pub struct Scheduler {
    scanner: Arc<Scanner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn tasks_lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// (Re)start all timers. Must be called inside a tokio runtime.
    pub fn start(&self) {
        self.stop();
        let profile = self.scanner.profile();
        let cfg = self.scanner.schedule().clone();
        let mut tasks = self.tasks_lock();

        tasks.push(tokio::spawn(burst(self.scanner.clone(), cfg.clone(), profile)));
        tasks.push(tokio::spawn(observe(self.scanner.clone(), cfg.clone(), profile)));
        if let Some(period) = cfg.interval(profile) {
            tasks.push(tokio::spawn(sweep(self.scanner.clone(), period)));
        }
        tracing::debug!(profile = %profile, tasks = tasks.len(), "scheduler started");
    }

    pub fn stop(&self) {
        let mut tasks = self.tasks_lock();
        if tasks.is_empty() {
            return;
        }
        for t in tasks.drain(..) {
            t.abort();
        }
        tracing::debug!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.tasks_lock().iter().any(|t| !t.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn burst(scanner: Arc<Scanner>, cfg: ScheduleConfig, profile: SiteProfile) {
    tokio::time::sleep(cfg.warmup).await;
    let (attempts, gap) = cfg.burst(profile);
    for i in 0..attempts {
        if i > 0 {
            tokio::time::sleep(gap).await;
        }
        scanner.scan_if_enabled().await;
    }
}

async fn observe(scanner: Arc<Scanner>, cfg: ScheduleConfig, profile: SiteProfile) {
    loop {
        scanner.mutated().notified().await;
        if !scanner.drain_qualifying_mutations() {
            continue;
        }
        let mut deadline = Instant::now() + cfg.debounce;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = scanner.mutated().notified() => {
                    if scanner.drain_qualifying_mutations() {
                        deadline = Instant::now() + cfg.debounce;
                    }
                }
            }
        }
        scanner.scan_if_enabled().await;
        if profile.is_dynamic() {
            tokio::time::sleep(cfg.dynamic_followup).await;
            scanner.scan_if_enabled().await;
        }
    }
}

async fn sweep(scanner: Arc<Scanner>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        scanner.scan_if_enabled().await;
    }
}

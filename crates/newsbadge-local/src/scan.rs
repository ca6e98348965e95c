//! Scanner: one collector run followed by sequential classification of its candidates.
//!
//! The page sits behind a `std::sync::Mutex`. Every lock is taken in a short block and
//! released before the next `.await`, so DOM reads and writes between suspension
//! points are atomic and concurrent scans only meet at the skip checks.

use crate::dom::{Document, NodeId};
use crate::page::Page;
use crate::scheduler::ScheduleConfig;
use crate::session::{filter_value, Session};
use crate::site::SiteProfile;
use newsbadge_core::{keys, Classifier, Result, SentimentFilter, Settings, SettingsStore, Stats};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanReport {
    pub profile: SiteProfile,
    pub candidates: usize,
    /// Newly annotated during this run.
    pub annotated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stats: Stats,
}

pub struct Scanner {
    page: Mutex<Page>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn SettingsStore>,
    schedule: ScheduleConfig,
    mutated: Notify,
    scans: AtomicU64,
}

impl Scanner {
    pub fn new(
        page: Page,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn SettingsStore>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            page: Mutex::new(page),
            classifier,
            store,
            schedule,
            mutated: Notify::new(),
            scans: AtomicU64::new(0),
        }
    }

    /// Load the session from `store`; an unreadable store starts from defaults.
    pub async fn load(
        doc: Document,
        profile: SiteProfile,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn SettingsStore>,
        schedule: ScheduleConfig,
    ) -> Self {
        let session = match Session::load(store.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "settings load failed; using defaults");
                Session::default()
            }
        };
        tracing::debug!(profile = %profile, settings = ?session.settings, "session loaded");
        Self::new(Page::new(doc, session, profile), classifier, store, schedule)
    }

    fn lock(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a closure against the page under the lock.
    pub fn with_page<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
        let p = self.lock();
        f(&p)
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn profile(&self) -> SiteProfile {
        self.lock().profile()
    }

    pub fn settings(&self) -> Settings {
        self.lock().session.settings
    }

    pub fn stats(&self) -> Stats {
        self.lock().session.stats
    }

    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn render_html(&self) -> String {
        self.lock().doc.to_html()
    }

    pub async fn scan_once(&self) -> ScanReport {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let (profile, candidates) = {
            let mut p = self.lock();
            (p.profile(), p.collect())
        };
        let mut report = ScanReport {
            profile,
            candidates: candidates.len(),
            annotated: 0,
            failed: 0,
            skipped: 0,
            stats: Stats::default(),
        };

        let mut sent = 0usize;
        for c in candidates {
            let claimed = {
                let mut p = self.lock();
                p.claim(&c)
            };
            let Some(text) = claimed else {
                report.skipped += 1;
                continue;
            };
            if sent > 0 {
                tokio::time::sleep(self.schedule.request_gap).await;
            }
            sent += 1;

            match self.classifier.classify(&text).await {
                Ok(result) => {
                    let applied = {
                        let mut p = self.lock();
                        p.apply(c.node, text, result)
                    };
                    if applied {
                        report.annotated += 1;
                        self.persist_stats().await;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) => {
                    {
                        let mut p = self.lock();
                        p.release(c.node);
                    }
                    tracing::warn!(
                        classifier = self.classifier.name(),
                        node = c.node.index(),
                        error = %e,
                        "classification failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report.stats = self.stats();
        if report.annotated > 0 {
            tracing::info!(
                profile = %report.profile,
                candidates = report.candidates,
                annotated = report.annotated,
                failed = report.failed,
                "scan complete"
            );
        } else {
            tracing::debug!(
                profile = %report.profile,
                candidates = report.candidates,
                "scan complete"
            );
        }
        report
    }

    /// Scheduled entry point: a no-op while disabled.
    pub async fn scan_if_enabled(&self) -> Option<ScanReport> {
        if !self.settings().enabled {
            return None;
        }
        Some(self.scan_once().await)
    }

    /// Classify an annotated element again and replace its badge.
    pub async fn reclassify(&self, node: NodeId) -> Result<bool> {
        let claimed = {
            let mut p = self.lock();
            p.claim_existing(node)
        };
        let Some(text) = claimed else {
            return Ok(false);
        };
        let result = match self.classifier.classify(&text).await {
            Ok(r) => r,
            Err(e) => {
                let mut p = self.lock();
                p.release(node);
                return Err(e);
            }
        };
        let applied = {
            let mut p = self.lock();
            p.apply(node, text, result)
        };
        if applied {
            self.persist_stats().await;
        }
        Ok(applied)
    }

    pub fn annotated_nodes(&self) -> Vec<NodeId> {
        self.lock().session.annotated_nodes()
    }

    pub async fn set_enabled(&self, enabled: bool) {
        {
            let mut p = self.lock();
            p.session.settings.enabled = enabled;
        }
        self.persist(keys::ENABLED, Value::Bool(enabled)).await;
    }

    pub async fn set_filter(&self, filter: SentimentFilter) {
        {
            let mut p = self.lock();
            p.set_filter(filter);
        }
        self.persist(keys::FILTER, filter_value(filter)).await;
    }

    pub async fn set_highlight(&self, on: bool) {
        {
            let mut p = self.lock();
            p.set_highlight(on);
        }
        self.persist(keys::HIGHLIGHT, Value::Bool(on)).await;
    }

    pub async fn set_show_confidence(&self, on: bool) {
        {
            let mut p = self.lock();
            p.set_show_confidence(on);
        }
        self.persist(keys::SHOW_CONFIDENCE, Value::Bool(on)).await;
    }

    pub async fn reset_stats(&self) -> Stats {
        let stats = {
            let mut p = self.lock();
            p.reset_stats()
        };
        self.persist_stats().await;
        stats
    }

    /// Insert markup under the first element matching `selector`, as a page script
    /// would. Returns the number of inserted element roots.
    pub fn append_html(&self, selector: &str, html: &str) -> Result<usize> {
        let inserted = {
            let mut p = self.lock();
            let target = p.doc.snapshot().select(selector)?.into_iter().next();
            match target {
                Some(t) => p.doc.append_html(t, html).len(),
                None => 0,
            }
        };
        if inserted > 0 {
            self.mutated.notify_one();
        }
        Ok(inserted)
    }

    pub(crate) fn mutated(&self) -> &Notify {
        &self.mutated
    }

    pub(crate) fn drain_qualifying_mutations(&self) -> bool {
        self.lock().drain_qualifying_mutations()
    }

    async fn persist_stats(&self) {
        let stats = {
            let p = self.lock();
            p.session.stats_value()
        };
        self.persist(keys::STATS, stats).await;
    }

    async fn persist(&self, key: &str, value: Value) {
        let entries = BTreeMap::from([(key.to_string(), value)]);
        if let Err(e) = self.store.set(entries).await {
            tracing::warn!(key, error = %e, "settings write failed");
        }
    }
}

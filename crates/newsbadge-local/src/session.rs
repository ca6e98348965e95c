//! Per-page session state: persisted toggles and stats, plus the annotation side-table.

use crate::annotate::AnnotationRecord;
use crate::dom::{Document, NodeId};
use newsbadge_core::{keys, Result, SentimentFilter, Settings, SettingsStore, Stats};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct Session {
    pub settings: Settings,
    pub stats: Stats,
    annotated: HashMap<NodeId, AnnotationRecord>,
    in_flight: HashSet<NodeId>,
}

impl Session {
    pub fn new(settings: Settings, stats: Stats) -> Self {
        Self {
            settings,
            stats,
            ..Self::default()
        }
    }

    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let entries = store.get(&keys::ALL).await?;
        Ok(Self::from_entries(&entries))
    }

    /// Missing or malformed entries fall back to defaults, one key at a time.
    pub fn from_entries(entries: &BTreeMap<String, Value>) -> Self {
        let defaults = Settings::default();
        let flag = |k: &str, d: bool| entries.get(k).and_then(Value::as_bool).unwrap_or(d);
        let filter = entries
            .get(keys::FILTER)
            .and_then(|v| serde_json::from_value::<SentimentFilter>(v.clone()).ok())
            .unwrap_or(defaults.filter);
        let stats = entries
            .get(keys::STATS)
            .and_then(|v| serde_json::from_value::<Stats>(v.clone()).ok())
            .filter(Stats::is_consistent)
            .unwrap_or_default();
        Self::new(
            Settings {
                enabled: flag(keys::ENABLED, defaults.enabled),
                highlight: flag(keys::HIGHLIGHT, defaults.highlight),
                show_confidence: flag(keys::SHOW_CONFIDENCE, defaults.show_confidence),
                filter,
            },
            stats,
        )
    }

    pub fn stats_value(&self) -> Value {
        serde_json::to_value(self.stats).unwrap_or(Value::Null)
    }

    pub fn is_annotated(&self, n: NodeId) -> bool {
        self.annotated.contains_key(&n)
    }

    pub fn is_in_flight(&self, n: NodeId) -> bool {
        self.in_flight.contains(&n)
    }

    pub fn is_tracked(&self, n: NodeId) -> bool {
        self.is_annotated(n) || self.is_in_flight(n)
    }

    /// False when the node is already in flight.
    pub fn begin(&mut self, n: NodeId) -> bool {
        self.in_flight.insert(n)
    }

    pub fn finish(&mut self, n: NodeId) {
        self.in_flight.remove(&n);
    }

    pub fn record(&self, n: NodeId) -> Option<&AnnotationRecord> {
        self.annotated.get(&n)
    }

    pub fn insert(&mut self, n: NodeId, record: AnnotationRecord) {
        self.annotated.insert(n, record);
    }

    /// Annotated nodes in arena order.
    pub fn annotated_nodes(&self) -> Vec<NodeId> {
        let mut v: Vec<NodeId> = self.annotated.keys().copied().collect();
        v.sort();
        v
    }

    /// Forget nodes that left the document.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.annotated.len();
        self.annotated.retain(|n, _| doc.is_attached(*n));
        before - self.annotated.len()
    }
}

pub fn filter_value(f: SentimentFilter) -> Value {
    serde_json::to_value(f).unwrap_or(Value::Null)
}

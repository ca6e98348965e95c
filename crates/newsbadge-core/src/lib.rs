use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("classification failed: {0}")]
    Classify(String),
    #[error("missing field in classifier response: {0}")]
    MissingField(&'static str),
    #[error("settings store error: {0}")]
    Store(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("io: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Buy,
    Hold,
    Sell,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Buy => "Buy",
            Sentiment::Hold => "Hold",
            Sentiment::Sell => "Sell",
        }
    }

    /// Parse a label as returned by the classifier. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Buy" | "buy" | "BUY" => Some(Sentiment::Buy),
            "Hold" | "hold" | "HOLD" => Some(Sentiment::Hold),
            "Sell" | "sell" | "SELL" => Some(Sentiment::Sell),
            _ => None,
        }
    }

    /// Badge color (CSS hex).
    pub fn color(self) -> &'static str {
        match self {
            Sentiment::Buy => "#4caf50",
            Sentiment::Hold => "#ff9800",
            Sentiment::Sell => "#f44336",
        }
    }

    /// Same color as `color()`, as an `rgba()` with the given alpha.
    pub fn tint(self, alpha: f64) -> String {
        let (r, g, b) = match self {
            Sentiment::Buy => (76, 175, 80),
            Sentiment::Hold => (255, 152, 0),
            Sentiment::Sell => (244, 67, 54),
        };
        format!("rgba({r}, {g}, {b}, {alpha})")
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedStock {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyRecommendation {
    pub recommended: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One classifier verdict. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub sentiment: Sentiment,
    /// In `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stocks: Vec<DetectedStock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_recommendation: Option<BuyRecommendation>,
}

impl Classification {
    pub fn new(sentiment: Sentiment, confidence: f64) -> Self {
        Self {
            sentiment,
            confidence,
            probabilities: None,
            explanation: None,
            stocks: Vec::new(),
            buy_recommendation: None,
        }
    }

    /// `Confidence: 82.0%` (badge tooltip).
    pub fn confidence_label(&self) -> String {
        format!("Confidence: {:.1}%", self.confidence * 100.0)
    }

    /// `82%` (confidence chip).
    pub fn confidence_percent(&self) -> String {
        format!("{:.0}%", self.confidence * 100.0)
    }
}

/// Running tally. `total == buy + hold + sell` after every `record`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total: u64,
    pub buy: u64,
    pub hold: u64,
    pub sell: u64,
}

impl Stats {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Buy => self.buy += 1,
            Sentiment::Hold => self.hold += 1,
            Sentiment::Sell => self.sell += 1,
        }
        self.total += 1;
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.buy + self.hold + self.sell
    }
}

/// Which sentiments keep their badge visible.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SentimentFilter {
    #[default]
    #[serde(rename = "all")]
    All,
    Buy,
    Hold,
    Sell,
}

impl SentimentFilter {
    pub fn admits(self, sentiment: Sentiment) -> bool {
        match self {
            SentimentFilter::All => true,
            SentimentFilter::Buy => sentiment == Sentiment::Buy,
            SentimentFilter::Hold => sentiment == Sentiment::Hold,
            SentimentFilter::Sell => sentiment == Sentiment::Sell,
        }
    }
}

impl std::str::FromStr for SentimentFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" | "All" | "" => Ok(SentimentFilter::All),
            other => Sentiment::from_label(other)
                .map(|s| match s {
                    Sentiment::Buy => SentimentFilter::Buy,
                    Sentiment::Hold => SentimentFilter::Hold,
                    Sentiment::Sell => SentimentFilter::Sell,
                })
                .ok_or_else(|| Error::InvalidMessage(format!("unknown filter: {other}"))),
        }
    }
}

/// User toggles. Missing keys in the store fall back to `Default`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub highlight: bool,
    pub show_confidence: bool,
    pub filter: SentimentFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            highlight: true,
            show_confidence: true,
            filter: SentimentFilter::All,
        }
    }
}

/// Persisted keys (chrome.storage-style flat namespace).
pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const HIGHLIGHT: &str = "highlight";
    pub const SHOW_CONFIDENCE: &str = "showConfidence";
    pub const FILTER: &str = "filter";
    pub const STATS: &str = "stats";

    pub const ALL: [&str; 5] = [ENABLED, HIGHLIGHT, SHOW_CONFIDENCE, FILTER, STATS];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_loaded: bool,
}

#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// Flat key/value store. `get` returns only the keys that are present.
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<BTreeMap<String, serde_json::Value>>;
    async fn set(&self, entries: BTreeMap<String, serde_json::Value>) -> Result<()>;
}

/// Popup → page request. Tagged by `action` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetStatus,
    SetEnabled { enabled: bool },
    AnalyzeNow,
    ResetStats,
    SetHighlight { highlight: bool },
    SetShowConfidence { show: bool },
    SetFilter { filter: SentimentFilter },
}

impl Request {
    const ACTIONS: [&'static str; 7] = [
        "getStatus",
        "setEnabled",
        "analyzeNow",
        "resetStats",
        "setHighlight",
        "setShowConfidence",
        "setFilter",
    ];

    /// Decode a wire message, distinguishing unknown actions from malformed payloads.
    pub fn from_value(v: serde_json::Value) -> Result<Self> {
        let action = v
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| Error::InvalidMessage("missing `action`".to_string()))?
            .to_string();
        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(Error::UnknownAction(action));
        }
        serde_json::from_value(v).map_err(|e| Error::InvalidMessage(format!("{action}: {e}")))
    }
}

/// Page → popup reply. Every request gets one, including no-op paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_stats(stats: Stats) -> Self {
        Self {
            success: true,
            stats: Some(stats),
            ..Self::default()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_record_keeps_total_consistent() {
        let mut s = Stats::default();
        for sent in [Sentiment::Buy, Sentiment::Sell, Sentiment::Sell, Sentiment::Hold] {
            s.record(sent);
            assert!(s.is_consistent());
        }
        assert_eq!(
            s,
            Stats {
                total: 4,
                buy: 1,
                hold: 1,
                sell: 2
            }
        );
    }

    #[test]
    fn filter_wire_format_matches_popup_values() {
        assert_eq!(
            serde_json::to_value(SentimentFilter::All).unwrap(),
            serde_json::json!("all")
        );
        assert_eq!(
            serde_json::from_value::<SentimentFilter>(serde_json::json!("Sell")).unwrap(),
            SentimentFilter::Sell
        );
        assert!(SentimentFilter::Sell.admits(Sentiment::Sell));
        assert!(!SentimentFilter::Sell.admits(Sentiment::Buy));
        assert_eq!("Hold".parse::<SentimentFilter>().unwrap(), SentimentFilter::Hold);
        assert!("Maybe".parse::<SentimentFilter>().is_err());
    }

    #[test]
    fn settings_serialize_with_camel_case_keys() {
        let v = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(v["showConfidence"], serde_json::json!(true));
        assert_eq!(v["filter"], serde_json::json!("all"));
    }

    #[test]
    fn request_decodes_known_actions_and_flags_unknown_ones() {
        let msg = serde_json::json!({"action": "setShowConfidence", "show": false});
        let r = Request::from_value(msg).unwrap();
        assert_eq!(r, Request::SetShowConfidence { show: false });

        let r = Request::from_value(serde_json::json!({"action": "setFilter", "filter": "Buy"}))
            .unwrap();
        assert_eq!(
            r,
            Request::SetFilter {
                filter: SentimentFilter::Buy
            }
        );

        match Request::from_value(serde_json::json!({"action": "selfDestruct"})) {
            Err(Error::UnknownAction(a)) => assert_eq!(a, "selfDestruct"),
            other => panic!("expected unknown action, got {other:?}"),
        }
        assert!(matches!(
            Request::from_value(serde_json::json!({"action": "setEnabled"})),
            Err(Error::InvalidMessage(_))
        ));
        assert!(matches!(
            Request::from_value(serde_json::json!({"enabled": true})),
            Err(Error::InvalidMessage(_))
        ));
    }

    #[test]
    fn classification_accepts_minimal_and_rich_payloads() {
        let c: Classification =
            serde_json::from_value(serde_json::json!({"sentiment": "Buy", "confidence": 0.82}))
                .unwrap();
        assert_eq!(c.sentiment, Sentiment::Buy);
        assert_eq!(c.confidence_label(), "Confidence: 82.0%");
        assert_eq!(c.confidence_percent(), "82%");

        let c: Classification = serde_json::from_value(serde_json::json!({
            "sentiment": "Sell",
            "confidence": 0.5,
            "probabilities": {"Buy": 0.2, "Hold": 0.3, "Sell": 0.5},
            "stocks": [{"symbol": "AAPL", "name": "Apple Inc.", "exchange": "NASDAQ"}],
            "explanation": "weak guidance"
        }))
        .unwrap();
        assert_eq!(c.stocks.len(), 1);
        assert_eq!(c.probabilities.unwrap().len(), 3);
    }

    #[test]
    fn response_omits_absent_fields() {
        let v = serde_json::to_value(Response::ok()).unwrap();
        assert_eq!(v, serde_json::json!({"success": true}));
        let v = serde_json::to_value(Response::error("nope")).unwrap();
        assert_eq!(v, serde_json::json!({"success": false, "error": "nope"}));
    }
}

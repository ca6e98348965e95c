use async_trait::async_trait;
use newsbadge_core::{
    BuyRecommendation, Classification, Classifier, DetectedStock, Error, Health, Result, Sentiment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Remote sentiment model over HTTP (`/predict`, `/predict/batch`, `/health`).
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("newsbadge/0.1")
            // Safety defaults: a stalled model server must not wedge the scan loop.
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Classify(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn endpoint_predict(&self) -> String {
        self.endpoint("/predict")
    }

    fn endpoint_batch(&self) -> String {
        self.endpoint("/predict/batch")
    }

    fn endpoint_health(&self) -> String {
        self.endpoint("/health")
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: &B,
    ) -> Result<R> {
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Classify(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Classify(format!("HTTP {status}")));
        }
        resp.json().await.map_err(|e| Error::Classify(e.to_string()))
    }

    /// Classify several texts in one request. Blank texts are dropped by the server.
    pub async fn classify_batch(&self, texts: &[String]) -> Result<Vec<BatchItem>> {
        let parsed: BatchResponse = self
            .post_json(self.endpoint_batch(), &BatchRequest { texts })
            .await?;
        if let Some(e) = parsed.error {
            return Err(Error::Classify(e));
        }
        parsed
            .results
            .into_iter()
            .map(|r| {
                let text = r.text.clone().unwrap_or_default();
                Ok(BatchItem {
                    text,
                    result: r.into_classification()?,
                })
            })
            .collect()
    }

    pub async fn health(&self) -> Result<Health> {
        let resp = self
            .client
            .get(self.endpoint_health())
            .send()
            .await
            .map_err(|e| Error::Classify(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Classify(format!("health HTTP {status}")));
        }
        resp.json().await.map_err(|e| Error::Classify(e.to_string()))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        let parsed: PredictResponse = self
            .post_json(self.endpoint_predict(), &PredictRequest { text })
            .await?;
        parsed.into_classification()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub text: String,
    pub result: Classification,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    probabilities: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    stocks: Vec<DetectedStock>,
    #[serde(default)]
    buy_recommendation: Option<BuyRecommendation>,
    #[serde(default)]
    error: Option<String>,
}

impl PredictResponse {
    fn into_classification(self) -> Result<Classification> {
        if let Some(e) = self.error {
            if self.sentiment.is_none() {
                return Err(Error::Classify(e));
            }
        }
        let sentiment = self
            .sentiment
            .as_deref()
            .and_then(Sentiment::from_label)
            .ok_or(Error::MissingField("sentiment"))?;
        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .ok_or(Error::MissingField("confidence"))?
            .clamp(0.0, 1.0);
        Ok(Classification {
            sentiment,
            confidence,
            probabilities: self.probabilities,
            explanation: self.explanation,
            stocks: self.stocks,
            buy_recommendation: self.buy_recommendation,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<PredictResponse>,
    #[serde(default)]
    error: Option<String>,
}

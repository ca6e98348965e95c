use newsbadge_core::{Error, Result};
use std::time::Duration;

pub mod agent;
pub mod annotate;
pub mod classifier;
pub mod collect;
pub mod dom;
pub mod filter;
pub mod page;
pub mod scan;
pub mod scheduler;
pub mod selectors;
pub mod session;
pub mod site;
pub mod store;
pub mod thresholds;

pub use agent::PageAgent;
pub use classifier::HttpClassifier;
pub use scan::{ScanReport, Scanner};
pub use scheduler::{ScheduleConfig, Scheduler};
pub use site::SiteProfile;
pub use store::{FsSettingsStore, MemoryStore};

/// Pages larger than this are truncated before parsing.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    /// After redirects; this is what the site profile is derived from.
    pub final_url: String,
    pub status: u16,
    pub html: String,
    pub truncated: bool,
}

/// Plain HTTP page loader for `scan --url` and `agent --url`.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("newsbadge/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            // Safety defaults: avoid “hang forever” on DNS/TLS/body stalls.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_PAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn fetch(&self, page_url: &str) -> Result<FetchedPage> {
        let url = url::Url::parse(page_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {status} for {page_url}")));
        }

        let mut bytes = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp.chunk().await.map_err(|e| Error::Fetch(e.to_string()))? {
            if bytes.len().saturating_add(chunk.len()) > self.max_bytes {
                let can_take = self.max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        if truncated {
            tracing::warn!(url = page_url, max_bytes = self.max_bytes, "page truncated");
        }

        Ok(FetchedPage {
            url: page_url.to_string(),
            final_url,
            status: status.as_u16(),
            html: String::from_utf8_lossy(&bytes).into_owned(),
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, http::StatusCode, response::Redirect, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn fetcher_follows_redirects_and_reports_final_url() {
        let app = Router::new()
            .route("/old", get(|| async { Redirect::permanent("/news/today") }))
            .route(
                "/news/today",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/html")],
                        "<html><body><h1>Markets open higher on jobs data</h1></body></html>",
                    )
                }),
            )
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        let addr = serve(app).await;
        let f = PageFetcher::new().unwrap();

        let p = f.fetch(&format!("http://{addr}/old")).await.unwrap();
        assert_eq!(p.status, 200);
        assert!(p.final_url.ends_with("/news/today"));
        assert!(p.html.contains("Markets open higher"));
        assert!(!p.truncated);

        assert!(matches!(
            f.fetch(&format!("http://{addr}/gone")).await,
            Err(Error::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn fetcher_caps_body_and_rejects_bad_urls() {
        let app = Router::new().route("/", get(|| async { "x".repeat(4096) }));
        let addr = serve(app).await;
        let f = PageFetcher::new().unwrap().with_max_bytes(100);
        let p = f.fetch(&format!("http://{addr}/")).await.unwrap();
        assert_eq!(p.html.len(), 100);
        assert!(p.truncated);

        assert!(matches!(f.fetch("nope").await, Err(Error::InvalidUrl(_))));
        assert!(matches!(
            f.fetch("file:///etc/passwd").await,
            Err(Error::InvalidUrl(_))
        ));
    }
}

//! Page agent: owns the scanner and scheduler and answers control messages.

use crate::scan::Scanner;
use crate::scheduler::Scheduler;
use newsbadge_core::{Error, Request, Response, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub struct PageAgent {
    scanner: Arc<Scanner>,
    scheduler: Scheduler,
}

impl PageAgent {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scheduler: Scheduler::new(scanner.clone()),
            scanner,
        }
    }

    pub fn scanner(&self) -> &Arc<Scanner> {
        &self.scanner
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Start scheduling if the loaded session is enabled.
    pub fn start(&self) {
        if self.scanner.settings().enabled {
            self.scheduler.start();
        } else {
            tracing::info!("annotator disabled; scheduler idle");
        }
    }

    pub async fn handle(&self, message: Value) -> Response {
        match Request::from_value(message) {
            Ok(req) => self.dispatch(req).await,
            Err(e) => {
                tracing::debug!(error = %e, "rejected message");
                Response::error(e.to_string())
            }
        }
    }

    pub async fn dispatch(&self, req: Request) -> Response {
        tracing::debug!(request = ?req, "message");
        match req {
            Request::GetStatus => Response {
                stats: Some(self.scanner.stats()),
                enabled: Some(self.scanner.settings().enabled),
                ..Response::ok()
            },
            Request::SetEnabled { enabled } => {
                self.scanner.set_enabled(enabled).await;
                if enabled {
                    self.scheduler.start();
                } else {
                    self.scheduler.stop();
                }
                Response::ok()
            }
            // Runs even while disabled: an explicit user request.
            Request::AnalyzeNow => {
                let report = self.scanner.scan_once().await;
                Response::with_stats(report.stats)
            }
            Request::ResetStats => {
                self.scanner.reset_stats().await;
                Response::ok()
            }
            Request::SetHighlight { highlight } => {
                self.scanner.set_highlight(highlight).await;
                Response::ok()
            }
            Request::SetShowConfidence { show } => {
                self.scanner.set_show_confidence(show).await;
                Response::ok()
            }
            Request::SetFilter { filter } => {
                self.scanner.set_filter(filter).await;
                Response::ok()
            }
        }
    }

    /// Serve JSON-line requests until EOF. One response line per non-blank input line.
    pub async fn serve_lines<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::Io(format!("read: {e}")))?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let resp = match serde_json::from_str::<Value>(line) {
                Ok(v) => self.handle(v).await,
                Err(e) => Response::error(format!("invalid message: {e}")),
            };
            let mut out = serde_json::to_vec(&resp)
                .map_err(|e| Error::InvalidMessage(e.to_string()))?;
            out.push(b'\n');
            writer
                .write_all(&out)
                .await
                .map_err(|e| Error::Io(format!("write: {e}")))?;
            writer
                .flush()
                .await
                .map_err(|e| Error::Io(format!("write: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for PageAgent {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

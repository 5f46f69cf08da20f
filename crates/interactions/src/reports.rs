use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The persisted record of one handler failure. The `error_id` is what the
/// user sees in the apology message and what an operator looks up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureReport {
    pub error_id: String,
    pub command: String,
    pub arguments: String,
    pub author_id: Option<String>,
    pub guild_id: Option<String>,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Where failure reports go. Production wires this to the document store;
/// recording failures must never fail the interaction, so `record` is
/// infallible from the caller's point of view.
#[async_trait]
pub trait FailureReportSink: Send + Sync {
    async fn record(&self, report: FailureReport);
    async fn fetch(&self, error_id: &str) -> Option<FailureReport>;
}

#[derive(Default)]
pub struct InMemoryReportSink {
    reports: Mutex<Vec<FailureReport>>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|reports| reports.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FailureReportSink for InMemoryReportSink {
    async fn record(&self, report: FailureReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }

    async fn fetch(&self, error_id: &str) -> Option<FailureReport> {
        let reports = self.reports.lock().ok()?;
        reports.iter().find(|report| report.error_id == error_id).cloned()
    }
}

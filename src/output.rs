//! JSON views of command results.

use serde::Serialize;
use time::{OffsetDateTime, UtcDateTime, UtcOffset};
use timekeeper_lifecycle::{SweepOutcome, SweepReport};
use timekeeper_model::{FailureDetails, Page, Scan, ScanId, ScanSummary};

fn rfc3339(at: UtcDateTime) -> OffsetDateTime {
    at.to_offset(UtcOffset::UTC)
}

#[derive(Debug, Serialize)]
pub struct FailureView<'a> {
    code: i32,
    message: Option<&'a str>,
    description: Option<&'a str>,
}
impl<'a> From<&'a FailureDetails> for FailureView<'a> {
    fn from(details: &'a FailureDetails) -> Self {
        Self {
            code: details.code,
            message: details.message.as_deref(),
            description: details.description.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultView<'a> {
    id: i64,
    url: &'a str,
    status: &'static str,
    external_id: Option<&'a str>,
    result_location: Option<&'a str>,
    failure: Option<FailureView<'a>>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct ScanView<'a> {
    id: i64,
    user_id: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    result: ResultView<'a>,
}
impl<'a> From<&'a Scan> for ScanView<'a> {
    fn from(scan: &'a Scan) -> Self {
        let result = &scan.result;
        Self {
            id: scan.id.get(),
            user_id: &scan.user_id,
            created_at: rfc3339(scan.created_at),
            updated_at: rfc3339(scan.updated_at),
            result: ResultView {
                id: result.id().get(),
                url: result.url(),
                status: result.status().as_str(),
                external_id: result.external_id(),
                result_location: result.result_location(),
                failure: result.failure().map(FailureView::from),
                created_at: rfc3339(result.created_at()),
                updated_at: rfc3339(result.updated_at()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryView<'a> {
    id: i64,
    url: &'a str,
    status: &'static str,
    failure: Option<FailureView<'a>>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}
impl<'a> From<&'a ScanSummary> for SummaryView<'a> {
    fn from(summary: &'a ScanSummary) -> Self {
        Self {
            id: summary.id.get(),
            url: &summary.url,
            status: summary.status.as_str(),
            failure: summary.failure.as_ref().map(FailureView::from),
            created_at: rfc3339(summary.created_at),
            updated_at: rfc3339(summary.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageView<'a> {
    items: Vec<SummaryView<'a>>,
    page: u32,
    page_size: u32,
    total_items: u64,
    total_pages: u32,
}
impl<'a> From<&'a Page<ScanSummary>> for PageView<'a> {
    fn from(page: &'a Page<ScanSummary>) -> Self {
        Self {
            items: page.items.iter().map(SummaryView::from).collect(),
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    stage: &'static str,
    outcome: &'static str,
    #[serde(with = "time::serde::rfc3339::option")]
    until: Option<OffsetDateTime>,
    pages: u32,
    examined: usize,
    transitioned: usize,
}
impl ReportView {
    pub fn new(stage: &'static str, report: &SweepReport) -> Self {
        let (outcome, until) = match report.outcome {
            SweepOutcome::Completed => ("completed", None),
            SweepOutcome::Gated { until } => ("gated", Some(until)),
            SweepOutcome::Throttled { until } => ("throttled", Some(until)),
            SweepOutcome::StoreUnavailable => ("store_unavailable", None),
        };
        Self {
            stage,
            outcome,
            until: until.map(rfc3339),
            pages: report.pages,
            examined: report.examined,
            transitioned: report.transitioned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedView {
    id: i64,
    deleted: bool,
}
impl DeletedView {
    pub fn new(id: ScanId, deleted: bool) -> Self {
        Self { id: id.get(), deleted }
    }
}

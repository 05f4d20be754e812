//! Binary artifacts: project badges and regulatory reports.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{RequestOptions, SonarClient};
use crate::download::DownloadStream;
use crate::error::{Result, SonarError};
use crate::query::QueryParams;

/// Regulatory reports can take a while to build server-side.
const REPORT_TIMEOUT: Duration = Duration::from_secs(1800);

/// Metrics a project badge can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeMetric {
    AlertStatus,
    Bugs,
    CodeSmells,
    Coverage,
    DuplicatedLinesDensity,
    Ncloc,
    ReliabilityRating,
    SecurityHotspots,
    SecurityRating,
    SqaleIndex,
    SqaleRating,
    Vulnerabilities,
}

impl BadgeMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeMetric::AlertStatus => "alert_status",
            BadgeMetric::Bugs => "bugs",
            BadgeMetric::CodeSmells => "code_smells",
            BadgeMetric::Coverage => "coverage",
            BadgeMetric::DuplicatedLinesDensity => "duplicated_lines_density",
            BadgeMetric::Ncloc => "ncloc",
            BadgeMetric::ReliabilityRating => "reliability_rating",
            BadgeMetric::SecurityHotspots => "security_hotspots",
            BadgeMetric::SecurityRating => "security_rating",
            BadgeMetric::SqaleIndex => "sqale_index",
            BadgeMetric::SqaleRating => "sqale_rating",
            BadgeMetric::Vulnerabilities => "vulnerabilities",
        }
    }
}

impl fmt::Display for BadgeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BadgeMetric {
    type Err = SonarError;

    fn from_str(s: &str) -> Result<Self> {
        let metric = match s {
            "alert_status" => BadgeMetric::AlertStatus,
            "bugs" => BadgeMetric::Bugs,
            "code_smells" => BadgeMetric::CodeSmells,
            "coverage" => BadgeMetric::Coverage,
            "duplicated_lines_density" => BadgeMetric::DuplicatedLinesDensity,
            "ncloc" => BadgeMetric::Ncloc,
            "reliability_rating" => BadgeMetric::ReliabilityRating,
            "security_hotspots" => BadgeMetric::SecurityHotspots,
            "security_rating" => BadgeMetric::SecurityRating,
            "sqale_index" => BadgeMetric::SqaleIndex,
            "sqale_rating" => BadgeMetric::SqaleRating,
            "vulnerabilities" => BadgeMetric::Vulnerabilities,
            other => {
                return Err(SonarError::validation(
                    "metric",
                    format!("Unknown badge metric '{other}'"),
                ))
            }
        };
        Ok(metric)
    }
}

/// Fetch the SVG badge for one metric of a project.
///
/// `token` is the project badge token required for private projects.
///
/// # Errors
///
/// Returns an error if the project is missing or the request fails.
#[tracing::instrument(skip(client, token))]
pub async fn project_badge(
    client: &SonarClient,
    project: &str,
    metric: BadgeMetric,
    branch: Option<&str>,
    token: Option<&str>,
) -> Result<Vec<u8>> {
    if project.is_empty() {
        return Err(SonarError::validation("project", "project is required"));
    }

    let mut params = QueryParams::new();
    params
        .set("project", project)
        .set("metric", metric.as_str())
        .set_opt("branch", branch)
        .set_opt("token", token);

    client
        .request_binary("/project_badges/measure", RequestOptions::get().with_query(&params))
        .await
}

/// Start downloading the regulatory report (a zip archive) of a project branch.
///
/// The returned stream yields chunks with progress as they arrive; `cancel`
/// aborts the transfer.
///
/// # Errors
///
/// Returns an error if the report cannot be requested.
#[tracing::instrument(skip(client, cancel))]
pub async fn download_regulatory_report(
    client: &SonarClient,
    project: &str,
    branch: Option<&str>,
    cancel: Option<CancellationToken>,
) -> Result<DownloadStream> {
    if project.is_empty() {
        return Err(SonarError::validation("project", "project is required"));
    }

    let mut params = QueryParams::new();
    params.set("project", project).set_opt("branch", branch);

    let mut options = RequestOptions::get()
        .with_query(&params)
        .with_timeout(REPORT_TIMEOUT);
    if let Some(token) = cancel {
        options = options.with_cancel(token);
    }

    client
        .request_stream("/regulatory_reports/download", options)
        .await
}

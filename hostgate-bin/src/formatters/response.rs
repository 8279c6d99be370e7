use anyhow::{Context, Result};
use hostgate_lib::queue::QueueStatsMap;
use hostgate_lib::{ErrorKind, FailureKind};
use serde_json::json;

use super::color::{DIM, GREEN, PINK, YELLOW};
use super::queue_stats;
use crate::commands::FetchResult;

/// Formats the results of a run for stdout
pub(crate) trait ResponseFormatter {
    fn format(&self, results: &[FetchResult], stats: Option<&QueueStatsMap>) -> Result<String>;
}

/// Width of the `[status]` column, brackets included
const STATUS_WIDTH: usize = 5;

/// One line per request: status, URL, and the error if there was one
pub(crate) struct Compact {
    color: bool,
}

impl Compact {
    pub(crate) const fn new(color: bool) -> Self {
        Self { color }
    }

    fn line(&self, result: &FetchResult) -> String {
        let (code, detail) = match &result.outcome {
            Ok(response) => (
                response.status.as_u16().to_string(),
                response.is_cached().then(|| "(cached)".to_string()),
            ),
            Err(err) => (
                err.status()
                    .map_or_else(|| "ERR".to_string(), |status| status.as_u16().to_string()),
                Some(format!("| {}", error_detail(err))),
            ),
        };

        let status = format!("{:>STATUS_WIDTH$}", format!("[{code}]"));
        let status = if self.color {
            let style = match &result.outcome {
                Ok(_) => &GREEN,
                Err(err) if err.status().is_some() => &PINK,
                Err(_) => &YELLOW,
            };
            style.apply_to(status).to_string()
        } else {
            status
        };

        match detail {
            Some(detail) if self.color && result.is_success() => {
                format!("{status} {} {}", result.url, DIM.apply_to(detail))
            }
            Some(detail) => format!("{status} {} {detail}", result.url),
            None => format!("{status} {}", result.url),
        }
    }
}

/// The error without the request summary, which the line already shows
fn error_detail(err: &ErrorKind) -> String {
    match err {
        ErrorKind::Request(failure) => match &failure.kind {
            FailureKind::Network(source) => format!("Network error: {source}"),
            kind => kind.to_string(),
        },
        err => err.to_string(),
    }
}

impl ResponseFormatter for Compact {
    fn format(&self, results: &[FetchResult], stats: Option<&QueueStatsMap>) -> Result<String> {
        let mut lines: Vec<String> = results.iter().map(|result| self.line(result)).collect();
        if let Some(stats) = stats.filter(|stats| !stats.is_empty()) {
            lines.push(queue_stats::compact(stats, self.color));
        }
        Ok(lines.join("\n"))
    }
}

/// A single JSON document
pub(crate) struct Json;

impl ResponseFormatter for Json {
    fn format(&self, results: &[FetchResult], stats: Option<&QueueStatsMap>) -> Result<String> {
        let results: Vec<_> = results
            .iter()
            .map(|result| match &result.outcome {
                Ok(response) => json!({
                    "url": result.url,
                    "cached": response.is_cached(),
                    "response": response,
                }),
                Err(err) => json!({
                    "url": result.url,
                    "status": err.status().map(|status| status.as_u16()),
                    "error": err,
                    "diagnostic": err.diagnostic(),
                }),
            })
            .collect();

        let mut output = json!({ "results": results });
        if let Some(stats) = stats {
            output["queue_stats"] = serde_json::to_value(stats)?;
        }
        serde_json::to_string_pretty(&output).context("Cannot format results as JSON")
    }
}

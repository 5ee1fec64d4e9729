use anyhow::{Context, Result};
use batchfetch_lib::BatchSummary;
use serde::Serialize;

use super::OutputFormatter;
use crate::report::{Entry, Report};

pub(crate) struct Json;

impl Json {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [Entry],
    summary: JsonSummary<'a>,
}

/// The batch summary plus the figures derived from it
#[derive(Serialize)]
struct JsonSummary<'a> {
    #[serde(flatten)]
    summary: &'a BatchSummary,
    failed: usize,
    requests_per_second: f64,
    average_secs_per_url: f64,
}

impl OutputFormatter for Json {
    /// Format results and summary as a JSON object
    fn format(&self, report: &Report) -> Result<String> {
        let summary = &report.summary;
        let json = JsonReport {
            results: &report.results,
            summary: JsonSummary {
                summary,
                failed: summary.failed(),
                requests_per_second: summary.requests_per_second(),
                average_secs_per_url: summary.average_per_target().as_secs_f64(),
            },
        };
        serde_json::to_string_pretty(&json).context("Cannot format results as JSON")
    }
}

use std::fmt::Write;

use anyhow::Result;

use super::OutputFormatter;
use crate::{formatters::duration::Duration, report::Report};

/// One line per URL, then the summary
pub(crate) struct Plain;

impl Plain {
    pub(crate) const fn new() -> Self {
        Self {}
    }
}

impl OutputFormatter for Plain {
    fn format(&self, report: &Report) -> Result<String> {
        let mut out = String::new();
        for entry in &report.results {
            match &entry.body {
                Some(body) => writeln!(out, "[OK] {} ({} bytes)", entry.url, body.len())?,
                None => writeln!(out, "[ERR] {}", entry.url)?,
            }
        }

        let summary = &report.summary;
        writeln!(
            out,
            "Fetched {}/{} URLs in {} ({:.2} req/s, concurrency {})",
            summary.succeeded,
            summary.total,
            Duration::from(summary.elapsed),
            summary.requests_per_second(),
            summary.concurrency
        )?;
        writeln!(
            out,
            "Average time per URL: {}",
            Duration::from(summary.average_per_target())
        )?;
        Ok(out)
    }
}

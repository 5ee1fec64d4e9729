mod json;
mod plain;

pub(crate) use json::Json;
pub(crate) use plain::Plain;

use crate::report::Report;
use anyhow::Result;

pub(crate) trait OutputFormatter {
    /// Format the results and summary of a batch
    fn format(&self, report: &Report) -> Result<String>;
}

use std::time::Duration;

use batchfetch_lib::BatchSummary;
use serde::Serialize;

/// The outcome of fetching one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Entry {
    pub(crate) url: String,
    /// The response body, `None` if every attempt failed
    pub(crate) body: Option<String>,
}

/// Everything batchfetch reports after a batch: the per-URL results in
/// input order and the summary.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Report {
    pub(crate) results: Vec<Entry>,
    pub(crate) summary: BatchSummary,
}

impl Report {
    /// Pair every URL with the body fetched for it.
    ///
    /// `bodies` holds one slot per URL, in the same order.
    pub(crate) fn new(
        urls: Vec<String>,
        bodies: Vec<Option<String>>,
        elapsed: Duration,
        concurrency: usize,
    ) -> Self {
        let summary = BatchSummary::new(&bodies, elapsed, concurrency);
        let results = urls
            .into_iter()
            .zip(bodies)
            .map(|(url, body)| Entry { url, body })
            .collect();
        Self { results, summary }
    }

    /// Returns `true` if every URL yielded a body
    pub(crate) const fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

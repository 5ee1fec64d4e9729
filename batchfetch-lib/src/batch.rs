//! The batch orchestrator.
//!
//! All targets of a batch are polled as futures on the calling task. A target
//! has to pass the [`AdmissionGate`] before its first attempt and keeps its
//! unit until the fetcher returns, backoff sleeps included. Results are
//! written into a pre-sized slot at the index of the target, so completion
//! order never affects the output order.

use std::time::Instant;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::info;

use crate::{BatchSummary, fetcher::Fetcher, gate::AdmissionGate, transport::Transport};

/// Fetch all `targets` with at most `concurrency` of them in flight.
///
/// The gate lives for exactly one call. `concurrency` must be non-zero,
/// which callers validate before getting here.
pub(crate) async fn run<T, S>(
    fetcher: &Fetcher<T>,
    targets: &[S],
    concurrency: usize,
) -> Vec<Option<String>>
where
    T: Transport,
    S: AsRef<str> + Sync,
{
    let mut results: Vec<Option<String>> = vec![None; targets.len()];
    if targets.is_empty() {
        return results;
    }

    let start = Instant::now();
    info!(
        "Starting batch of {} URLs (concurrency: {concurrency}, max attempts: {})",
        targets.len(),
        fetcher.backoff().max_attempts()
    );

    let gate = AdmissionGate::new(concurrency);
    let mut pending: FuturesUnordered<_> = targets
        .iter()
        .enumerate()
        .map(|(index, target)| {
            let gate = &gate;
            async move {
                let admission = gate.admit().await;
                let body = fetcher
                    .fetch(target.as_ref(), admission.active_at_admission())
                    .await;
                drop(admission);
                (index, body)
            }
        })
        .collect();

    while let Some((index, body)) = pending.next().await {
        results[index] = body;
    }

    let summary = BatchSummary::new(&results, start.elapsed(), concurrency);
    info!("Batch completed: {summary}");
    results
}

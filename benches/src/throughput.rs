use std::hint::black_box;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use batchfetch_lib::{AttemptError, Backoff, Client, Fetched, Transport};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::StatusCode;
use tokio::runtime::Runtime;

/// Answers every request after a fixed latency, without touching the network
struct Simulated {
    latency: Duration,
    fail: bool,
}

#[async_trait]
impl Transport for Simulated {
    async fn get(&self, url: &str) -> Result<Fetched, AttemptError> {
        tokio::time::sleep(self.latency).await;
        if self.fail {
            return Err(AttemptError::Network(
                io::Error::from(io::ErrorKind::ConnectionRefused).into(),
            ));
        }
        Ok(Fetched::new(
            StatusCode::OK,
            format!("{{\"data\": \"test_response\", \"url\": \"{url}\"}}"),
        ))
    }
}

fn urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://api.example.com/endpoint/{i}"))
        .collect()
}

fn client(fail: bool, concurrency: usize) -> Client<Simulated> {
    let transport = Simulated {
        latency: Duration::from_millis(1),
        fail,
    };
    Client::with_backoff(transport, concurrency, Backoff::new(3, Duration::ZERO)).unwrap()
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn batch_sizes(c: &mut Criterion) {
    let runtime = runtime();
    let mut group = c.benchmark_group("batch size");

    for (size, concurrency) in [(10, 5), (100, 10), (1000, 50)] {
        let urls = urls(size);
        let client = client(false, concurrency);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &urls, |b, urls| {
            b.to_async(&runtime)
                .iter(|| async { black_box(client.fetch_all(urls).await) });
        });
    }
    group.finish();
}

fn concurrency_levels(c: &mut Criterion) {
    let runtime = runtime();
    let urls = urls(200);
    let mut group = c.benchmark_group("concurrency");
    group.throughput(Throughput::Elements(200));

    for concurrency in [1, 10, 50, 100] {
        let client = client(false, concurrency);
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            &urls,
            |b, urls| {
                b.to_async(&runtime)
                    .iter(|| async { black_box(client.fetch_all(urls).await) });
            },
        );
    }
    group.finish();
}

fn failing_targets(c: &mut Criterion) {
    let runtime = runtime();
    let urls = urls(100);
    let client = client(true, 10);

    c.bench_function("all targets exhausted", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(client.fetch_all(&urls).await) });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = batch_sizes, concurrency_levels, failing_targets
);
criterion_main!(benches);

//! Request counters and latency statistics for the scoring service.

use crate::types::result::Label;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept per request kind before old ones are dropped
const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for the scoring service
pub struct ServiceMetrics {
    /// Score requests answered successfully
    pub postings_scored: AtomicU64,
    /// Explain requests answered successfully
    pub postings_explained: AtomicU64,
    /// Scored postings labelled fake
    pub fake_labels: AtomicU64,
    /// Failed requests by error kind
    failures: RwLock<HashMap<String, u64>>,
    /// Processing times by request kind (in microseconds)
    processing_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            postings_scored: AtomicU64::new(0),
            postings_explained: AtomicU64::new(0),
            fake_labels: AtomicU64::new(0),
            failures: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(HashMap::new()),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored posting
    pub fn record_score(&self, processing_time: Duration, proba_fake: f64, label: Label) {
        self.postings_scored.fetch_add(1, Ordering::Relaxed);
        if label == Label::Fake {
            self.fake_labels.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time("score", processing_time);

        let bucket = ((proba_fake * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record an explained posting
    pub fn record_explain(&self, processing_time: Duration) {
        self.postings_explained.fetch_add(1, Ordering::Relaxed);
        self.record_time("explain", processing_time);
    }

    /// Record a failed request by error kind
    pub fn record_failure(&self, kind: &str) {
        if let Ok(mut failures) = self.failures.write() {
            *failures.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    fn record_time(&self, request: &str, duration: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            let samples = times.entry(request.to_string()).or_default();
            samples.push(duration.as_micros() as u64);
            if samples.len() > MAX_SAMPLES {
                samples.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Latency statistics for one request kind
    pub fn get_processing_stats(&self, request: &str) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) => times.get(request).cloned().unwrap_or_default(),
            Err(_) => return ProcessingStats::default(),
        };
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Total failed requests
    pub fn failure_count(&self) -> u64 {
        self.failures
            .read()
            .map(|f| f.values().sum())
            .unwrap_or(0)
    }

    pub fn get_failures(&self) -> HashMap<String, u64> {
        self.failures.read().map(|f| f.clone()).unwrap_or_default()
    }

    /// Requests answered per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let handled = self.postings_scored.load(Ordering::Relaxed)
            + self.postings_explained.load(Ordering::Relaxed);
        if elapsed > 0.0 {
            handled as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.postings_scored.load(Ordering::Relaxed);
        let explained = self.postings_explained.load(Ordering::Relaxed);
        let fake = self.fake_labels.load(Ordering::Relaxed);
        let fake_rate = if scored > 0 {
            (fake as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let score_times = self.get_processing_stats("score");
        let explain_times = self.get_processing_stats("explain");
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             FAKE JOB DETECTOR - METRICS SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Postings Scored:    {:>8}  │  Throughput: {:>6.1} req/s    ║",
            scored,
            self.get_throughput()
        );
        info!(
            "║ Labelled Fake:      {:>8}  │  Fake Rate:  {:>6.1}%         ║",
            fake, fake_rate
        );
        info!(
            "║ Postings Explained: {:>8}  │  Failures:   {:>8}        ║",
            explained,
            self.failure_count()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Score (μs):   mean={:>6} p50={:>6} p95={:>6} p99={:>6}   ║",
            score_times.mean_us, score_times.p50_us, score_times.p95_us, score_times.p99_us
        );
        info!(
            "║ Explain (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}   ║",
            explain_times.mean_us, explain_times.p50_us, explain_times.p95_us, explain_times.p99_us
        );
        let failures = self.get_failures();
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Kind:                                            ║");
            for (kind, count) in &failures {
                info!("║   {:16}: {:>8}                                 ║", kind, count);
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

//! Search metrics with rolling averages.
//!
//! Every completed search records its stage timings and result counts into a
//! process-wide collector (`global_metrics()`). Samples older than the
//! rolling window are ignored by the averages and dropped by `prune()`;
//! lifetime counters are kept until `clear()`.

use crate::search::types::SearchResponse;
use instant::Instant;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Rolling window for search timings (5 minutes).
const DEFAULT_WINDOW_SECS: u64 = 300;

/// Maximum samples kept per metric.
const MAX_SAMPLES: usize = 1000;

#[derive(Clone, Debug)]
struct TimingSample {
    timestamp: Instant,
    duration_ms: f64,
}

#[derive(Debug, Default)]
struct MetricData {
    samples: VecDeque<TimingSample>,
    total_count: u64,
}

impl MetricData {
    fn record(&mut self, duration_ms: f64) {
        self.total_count += 1;
        self.samples.push_back(TimingSample {
            timestamp: Instant::now(),
            duration_ms,
        });
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    fn prune(&mut self, window: Duration) {
        // Window may extend before the process clock started
        let Some(cutoff) = Instant::now().checked_sub(window) else {
            return;
        };
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    fn in_window(&self, window: Duration) -> impl Iterator<Item = &TimingSample> {
        let cutoff = Instant::now().checked_sub(window);
        self.samples
            .iter()
            .filter(move |s| cutoff.is_none_or(|c| s.timestamp >= c))
    }

    fn rolling_avg(&self, window: Duration) -> Option<f64> {
        let (sum, count) = self
            .in_window(window)
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.duration_ms, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    fn rolling_count(&self, window: Duration) -> usize {
        self.in_window(window).count()
    }
}

#[derive(Clone, Debug, Default)]
struct LastSearchInfo {
    mode: String,
    result_count: usize,
    keyword_candidates: usize,
    vector_candidates: usize,
    forced_by_group: usize,
    top_score: Option<f32>,
    median_score: Option<f32>,
}

/// Point-in-time view of the collected metrics.
#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    pub conditions_avg_ms: Option<f64>,
    pub keyword_avg_ms: Option<f64>,
    pub vector_avg_ms: Option<f64>,
    pub fusion_avg_ms: Option<f64>,
    pub pipeline_avg_ms: Option<f64>,
    pub total_latency_avg_ms: Option<f64>,
    /// Searches in the rolling window
    pub query_count: usize,

    /// Lifetime totals
    pub total_searches: u64,
    pub total_failures: u64,
    pub total_cancelled: u64,
    pub query_cache_hits: u64,

    pub last_mode: Option<String>,
    pub last_result_count: Option<usize>,
    pub last_keyword_candidates: Option<usize>,
    pub last_vector_candidates: Option<usize>,
    pub last_forced_by_group: Option<usize>,
    pub last_top_score: Option<f32>,
    pub last_median_score: Option<f32>,
}

#[derive(Default)]
struct MetricsInner {
    conditions: MetricData,
    keyword: MetricData,
    vector: MetricData,
    fusion: MetricData,
    pipeline: MetricData,
    total: MetricData,
    failures: u64,
    cancelled: u64,
    cache_hits: u64,
    last_search: Option<LastSearchInfo>,
}

/// Thread-safe search metrics collector.
#[derive(Clone)]
pub struct SearchMetrics {
    inner: Arc<RwLock<MetricsInner>>,
    window: Duration,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW_SECS)
    }

    pub fn with_window(window_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records timings and counts of a completed search.
    pub fn record_search(&self, response: &SearchResponse) {
        let Ok(mut inner) = self.inner.write() else {
            return;
        };
        let timing = &response.timing;
        inner.conditions.record(timing.conditions_ms);
        inner.keyword.record(timing.keyword_ms);
        inner.vector.record(timing.vector_ms);
        inner.fusion.record(timing.fusion_ms);
        inner.pipeline.record(timing.pipeline_ms);
        inner.total.record(timing.total_ms);
        if response.stats.embedding_cache_hit {
            inner.cache_hits += 1;
        }

        let mut scores: Vec<f32> = response.results.iter().map(|r| r.score).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        inner.last_search = Some(LastSearchInfo {
            mode: response.stats.mode.to_string(),
            result_count: response.results.len(),
            keyword_candidates: response.stats.keyword_candidates,
            vector_candidates: response.stats.vector_candidates,
            forced_by_group: response.stats.forced_by_group,
            top_score: scores.last().copied(),
            median_score: scores.get(scores.len() / 2).copied(),
        });
    }

    pub fn record_failure(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failures += 1;
        }
    }

    pub fn record_cancelled(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.cancelled += 1;
        }
    }

    /// Drops samples outside the rolling window.
    pub fn prune(&self) {
        if let Ok(mut guard) = self.inner.write() {
            let window = self.window;
            let inner = &mut *guard;
            for metric in [
                &mut inner.conditions,
                &mut inner.keyword,
                &mut inner.vector,
                &mut inner.fusion,
                &mut inner.pipeline,
                &mut inner.total,
            ] {
                metric.prune(window);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let Ok(inner) = self.inner.read() else {
            return MetricsSnapshot::default();
        };
        let window = self.window;
        let last = inner.last_search.as_ref();

        MetricsSnapshot {
            conditions_avg_ms: inner.conditions.rolling_avg(window),
            keyword_avg_ms: inner.keyword.rolling_avg(window),
            vector_avg_ms: inner.vector.rolling_avg(window),
            fusion_avg_ms: inner.fusion.rolling_avg(window),
            pipeline_avg_ms: inner.pipeline.rolling_avg(window),
            total_latency_avg_ms: inner.total.rolling_avg(window),
            query_count: inner.total.rolling_count(window),

            total_searches: inner.total.total_count,
            total_failures: inner.failures,
            total_cancelled: inner.cancelled,
            query_cache_hits: inner.cache_hits,

            last_mode: last.map(|s| s.mode.clone()),
            last_result_count: last.map(|s| s.result_count),
            last_keyword_candidates: last.map(|s| s.keyword_candidates),
            last_vector_candidates: last.map(|s| s.vector_candidates),
            last_forced_by_group: last.map(|s| s.forced_by_group),
            last_top_score: last.and_then(|s| s.top_score),
            last_median_score: last.and_then(|s| s.median_score),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = MetricsInner::default();
        }
    }
}

impl std::fmt::Debug for SearchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchMetrics")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_METRICS: Lazy<SearchMetrics> = Lazy::new(SearchMetrics::new);

/// The process-wide collector the search engine records into.
pub fn global_metrics() -> &'static SearchMetrics {
    &GLOBAL_METRICS
}

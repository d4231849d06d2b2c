//! Broad-phase metrics
//!
//! Gauges and tick timing for a driver loop, rendered in Prometheus text
//! format or JSON. Serving them is left to the embedding application.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::hshg::HshgStats;

/// Samples kept for percentile calculation
const TICK_HISTORY_LEN: usize = 1000;
/// Samples needed before percentiles are published
const MIN_PERCENTILE_SAMPLES: usize = 10;

/// Metrics registry for one index and its driver
#[derive(Debug)]
pub struct BroadPhaseMetrics {
    // Index shape
    pub objects: AtomicU64,
    pub tiers: AtomicU64,
    pub occupied_cells: AtomicU64,
    pub grid_expansions: AtomicU64,

    // Last tick
    pub candidate_pairs: AtomicU64,
    pub rehashed_objects: AtomicU64,

    // Tick timing (microseconds)
    pub update_time_us: AtomicU64,
    pub query_time_us: AtomicU64,
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,

    pub tick_count: AtomicU64,
    pub pairs_total: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl BroadPhaseMetrics {
    pub fn new() -> Self {
        Self {
            objects: AtomicU64::new(0),
            tiers: AtomicU64::new(0),
            occupied_cells: AtomicU64::new(0),
            grid_expansions: AtomicU64::new(0),
            candidate_pairs: AtomicU64::new(0),
            rehashed_objects: AtomicU64::new(0),
            update_time_us: AtomicU64::new(0),
            query_time_us: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            pairs_total: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record one update + query pass
    pub fn record_tick(&self, update: Duration, query: Duration, rehashed: usize, pairs: usize) {
        self.update_time_us.store(update.as_micros() as u64, Ordering::Relaxed);
        self.query_time_us.store(query.as_micros() as u64, Ordering::Relaxed);
        self.rehashed_objects.store(rehashed as u64, Ordering::Relaxed);
        self.candidate_pairs.store(pairs as u64, Ordering::Relaxed);
        self.pairs_total.fetch_add(pairs as u64, Ordering::Relaxed);
        self.record_tick_time(update + query);
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= MIN_PERCENTILE_SAMPLES {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Copy the index-shape gauges from a stats snapshot
    pub fn observe(&self, stats: &HshgStats) {
        self.objects.store(stats.object_count as u64, Ordering::Relaxed);
        self.tiers.store(stats.tier_count as u64, Ordering::Relaxed);
        self.occupied_cells.store(stats.occupied_cells as u64, Ordering::Relaxed);
        self.grid_expansions.store(stats.grid_expansions, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Mean candidate pairs per tick so far
    pub fn mean_pairs_per_tick(&self) -> f64 {
        let ticks = self.tick_count.load(Ordering::Relaxed);
        if ticks == 0 {
            return 0.0;
        }
        self.pairs_total.load(Ordering::Relaxed) as f64 / ticks as f64
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("hshg_objects", "Number of indexed objects", "gauge",
            self.objects.load(Ordering::Relaxed));
        metric!("hshg_tiers", "Number of grid tiers", "gauge",
            self.tiers.load(Ordering::Relaxed));
        metric!("hshg_occupied_cells", "Non-empty cells across all tiers", "gauge",
            self.occupied_cells.load(Ordering::Relaxed));
        metric!("hshg_grid_expansions_total", "Grid expansions performed", "counter",
            self.grid_expansions.load(Ordering::Relaxed));

        metric!("hshg_candidate_pairs", "Candidate pairs reported by the last query", "gauge",
            self.candidate_pairs.load(Ordering::Relaxed));
        metric!("hshg_candidate_pairs_total", "Candidate pairs reported by all queries", "counter",
            self.pairs_total.load(Ordering::Relaxed));
        metric!("hshg_rehashed_objects", "Objects that changed cell in the last update", "gauge",
            self.rehashed_objects.load(Ordering::Relaxed));

        metric!("hshg_update_time_microseconds", "Last update pass in microseconds", "gauge",
            self.update_time_us.load(Ordering::Relaxed));
        metric!("hshg_query_time_microseconds", "Last query pass in microseconds", "gauge",
            self.query_time_us.load(Ordering::Relaxed));
        metric!("hshg_tick_time_microseconds", "Last update + query in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("hshg_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("hshg_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("hshg_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("hshg_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("hshg_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects: self.objects.load(Ordering::Relaxed),
            tiers: self.tiers.load(Ordering::Relaxed),
            occupied_cells: self.occupied_cells.load(Ordering::Relaxed),
            grid_expansions: self.grid_expansions.load(Ordering::Relaxed),
            candidate_pairs: self.candidate_pairs.load(Ordering::Relaxed),
            mean_pairs_per_tick: self.mean_pairs_per_tick(),
            rehashed_objects: self.rehashed_objects.load(Ordering::Relaxed),
            tick: TickTimes {
                update_us: self.update_time_us.load(Ordering::Relaxed),
                query_us: self.query_time_us.load(Ordering::Relaxed),
                total_us: self.tick_time_us.load(Ordering::Relaxed),
                p95_us: self.tick_time_p95_us.load(Ordering::Relaxed),
                p99_us: self.tick_time_p99_us.load(Ordering::Relaxed),
                max_us: self.tick_time_max_us.load(Ordering::Relaxed),
                count: self.tick_count.load(Ordering::Relaxed),
            },
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// JSON rendering of [`BroadPhaseMetrics::snapshot`]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Default for BroadPhaseMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all gauges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub objects: u64,
    pub tiers: u64,
    pub occupied_cells: u64,
    pub grid_expansions: u64,
    pub candidate_pairs: u64,
    pub mean_pairs_per_tick: f64,
    pub rehashed_objects: u64,
    pub tick: TickTimes,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickTimes {
    pub update_us: u64,
    pub query_us: u64,
    pub total_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    pub count: u64,
}

//! Fan-out Metrics
//!
//! Prometheus metrics for the fan-out worker pool

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::time::Duration;

static FANOUT_JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_fanout_jobs_total",
        "Total fan-out jobs processed (completed/author_missing/failed)",
        &["status"]
    )
    .expect("Failed to register fan-out jobs metric")
});

static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_fanout_deliveries_total",
        "Timeline deliveries by outcome (delivered/skipped/failed)",
        &["outcome"]
    )
    .expect("Failed to register fan-out deliveries metric")
});

static FANOUT_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "feed_fanout_queue_depth",
        "Fan-out jobs waiting for a worker"
    )
    .expect("Failed to register fan-out queue depth metric")
});

static FANOUT_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_fanout_duration_seconds",
        "Time to deliver one post to every follower",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .expect("Failed to register fan-out duration metric")
});

/// Record a finished fan-out job
pub fn record_fanout_job(status: &str) {
    FANOUT_JOBS_TOTAL.with_label_values(&[status]).inc();
}

/// Record per-follower outcomes for one job
pub fn record_deliveries(outcome: &str, count: u64) {
    if count > 0 {
        FANOUT_DELIVERIES_TOTAL
            .with_label_values(&[outcome])
            .inc_by(count);
    }
}

pub fn job_enqueued() {
    FANOUT_QUEUE_DEPTH.inc();
}

pub fn job_dequeued() {
    FANOUT_QUEUE_DEPTH.dec();
}

pub fn record_fanout_duration(duration: Duration) {
    FANOUT_DURATION_SECONDS.observe(duration.as_secs_f64());
}

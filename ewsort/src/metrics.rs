//! Classification metrics, recorded through the `metrics` facade.
//!
//! Nothing is exported unless a recorder is installed; with `enable_metrics` the router installs
//! the Prometheus recorder from `axum-prometheus` and serves it at `/internal/metrics`.

use std::time::Duration;

use metrics::{counter, histogram};

/// Count one finished `/classify` request. `outcome` is `success` or an error kind.
pub fn record_classification(outcome: &'static str) {
    counter!("ewsort_classifications_total", "outcome" => outcome).increment(1);
}

/// Time spent waiting on the upstream model, successful or not
pub fn record_upstream_latency(elapsed: Duration) {
    histogram!("ewsort_upstream_duration_seconds").record(elapsed.as_secs_f64());
}

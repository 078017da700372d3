use prometheus::{IntCounter, Registry};

/// Coordinator-owned counters, registered into an independent [`Registry`]
/// so tests can construct throwaway instances without colliding.
pub struct CoordinatorMetrics {
    pub node_compute_errors_total: IntCounter,
    pub warm_start_failures_total: IntCounter,
    pub publish_failures_total: IntCounter,
}

impl CoordinatorMetrics {
    #[must_use]
    pub fn new(registry: &Registry) -> Self {
        let node_compute_errors_total = IntCounter::new(
            "node_compute_errors_total",
            "Node compute calls that panicked and were recorded as empty output",
        )
        .expect("valid metric");
        let warm_start_failures_total = IntCounter::new(
            "warm_start_failures_total",
            "Warm-start queries that failed; the node started cold instead",
        )
        .expect("valid metric");
        let publish_failures_total = IntCounter::new(
            "publish_failures_total",
            "Indicator/strategy output publishes that failed",
        )
        .expect("valid metric");

        registry
            .register(Box::new(node_compute_errors_total.clone()))
            .expect("single registration");
        registry
            .register(Box::new(warm_start_failures_total.clone()))
            .expect("single registration");
        registry
            .register(Box::new(publish_failures_total.clone()))
            .expect("single registration");

        Self {
            node_compute_errors_total,
            warm_start_failures_total,
            publish_failures_total,
        }
    }
}

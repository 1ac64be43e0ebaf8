use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the order repository
// ============================================================================
//
// Provides metrics for:
// - Repository operations by outcome (ok, not_found, invalid_state, storage)
// - Operation latency
// - Delivered-order guard rejections
// - Serial values allocated for new orders
//
// The registry is exposed so the embedding application can scrape it.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub operations_total: IntCounterVec,
    pub operation_duration: HistogramVec,
    pub delivered_guard_rejections: IntCounter,
    pub serial_values_allocated: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("repository_operations_total", "Total repository operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "repository_operation_duration_seconds",
                "Repository operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let delivered_guard_rejections = IntCounter::new(
            "delivered_guard_rejections_total",
            "Saves refused because the stored order was already delivered",
        )?;
        registry.register(Box::new(delivered_guard_rejections.clone()))?;

        let serial_values_allocated = IntCounter::new(
            "serial_values_allocated_total",
            "Identifiers drawn from a sequence for new orders",
        )?;
        registry.register(Box::new(serial_values_allocated.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration,
            delivered_guard_rejections,
            serial_values_allocated,
        })
    }

    /// Get the Prometheus registry for exposing metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished repository operation
    pub fn record_operation(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.operations_total.with_label_values(&[operation, outcome]).inc();
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_guard_rejection(&self) {
        self.delivered_guard_rejections.inc();
    }

    pub fn record_serial_allocation(&self) {
        self.serial_values_allocated.inc();
    }
}

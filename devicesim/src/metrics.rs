use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref COMMANDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("devicesim_commands_total", "Commands recorded, by outcome"),
        &["outcome"]
    )
    .unwrap();
    pub static ref CONFLICTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "devicesim_conflicts_total",
        "Conditional device writes that lost to a concurrent command"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "devicesim_store_failures_total",
        "Store calls that failed or timed out"
    ))
    .unwrap();
    pub static ref COMMAND_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "devicesim_command_latency_seconds",
            "Time taken to apply and record a command"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(COMMANDS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(CONFLICTS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(COMMAND_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

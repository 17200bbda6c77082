use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};

pub struct Metrics {
    request_counter: IntCounterVec,
    scan_duration: Histogram,
    detections: IntCounterVec,
    empty_scans: IntCounter,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("viume".to_string()), None)?;

        let request_counter = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests"),
            &["route"],
        )?;

        // 50ms up to ~25s
        let scan_duration = Histogram::with_opts(
            HistogramOpts::new(
                "scan_duration_seconds",
                "Duration of the detect, annotate and chart pipeline in seconds",
            )
            .buckets(exponential_buckets(0.05, 2.0, 10)?),
        )?;

        let detections = IntCounterVec::new(
            Opts::new("detections_total", "Detections reported by the model per class"),
            &["class"],
        )?;

        let empty_scans = IntCounter::new(
            "scans_without_detections_total",
            "Scans for which the model reported nothing",
        )?;

        registry.register(Box::new(request_counter.clone()))?;
        registry.register(Box::new(scan_duration.clone()))?;
        registry.register(Box::new(detections.clone()))?;
        registry.register(Box::new(empty_scans.clone()))?;

        Ok(Metrics {
            request_counter,
            scan_duration,
            detections,
            empty_scans,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        self.request_counter.with_label_values(&[route]).inc();
    }

    pub fn record_scan_duration(&self, seconds: f64) {
        self.scan_duration.observe(seconds);
    }

    pub fn record_detections(&self, class: &str, count: usize) {
        self.detections
            .with_label_values(&[class])
            .inc_by(count as u64);
    }

    pub fn record_empty_scan(&self) {
        self.empty_scans.inc();
    }

    /// Prometheus text exposition of everything registered.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

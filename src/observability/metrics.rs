use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_outcomes_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub drivers_online: IntGauge,
    pub deliveries_total: IntCounterVec,
    pub events_published_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_outcomes_total = IntCounterVec::new(
            Opts::new("dispatch_outcomes_total", "Trip dispatch attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_outcomes_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of matching a trip event and publishing its outcome",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let drivers_online = IntGauge::new("drivers_online", "Drivers currently registered")
            .expect("valid drivers_online metric");

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Consumed broker deliveries by settlement"),
            &["queue", "disposition"],
        )
        .expect("valid deliveries_total metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Events published to the broker"),
            &["routing_key"],
        )
        .expect("valid events_published_total metric");

        registry
            .register(Box::new(dispatch_outcomes_total.clone()))
            .expect("register dispatch_outcomes_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(drivers_online.clone()))
            .expect("register drivers_online");
        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");

        Self {
            registry,
            dispatch_outcomes_total,
            dispatch_latency_seconds,
            drivers_online,
            deliveries_total,
            events_published_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

//! Prometheus metrics registry, generalizing the teacher's `Metrics`
//! struct + `ReconcileMeasurer` RAII timer to the gateway's components.

use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, IntGauge, Registry};
use tokio::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub informers_started: IntCounterVec,
    pub informer_sync_timeouts: IntCounterVec,
    pub coalescer_builds: IntCounterVec,
    pub coalescer_build_duration: HistogramVec,
    pub sse_subscribers: IntGauge,
    pub sse_publishes: IntCounterVec,
    pub sse_dropped_events: IntCounterVec,
    pub action_failures: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let coalescer_build_duration = HistogramVec::new(
            histogram_opts!(
                "gateway_coalescer_build_duration_seconds",
                "Duration of a coalesced rebuild, by stream kind",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1., 5.]),
            &["stream_kind"],
        )
        .unwrap();
        Self {
            informers_started: IntCounterVec::new(
                opts!("gateway_informers_started_total", "Informers started, by kind"),
                &["kind"],
            )
            .unwrap(),
            informer_sync_timeouts: IntCounterVec::new(
                opts!(
                    "gateway_informer_sync_timeouts_total",
                    "Informer initial-sync timeouts, by kind"
                ),
                &["kind"],
            )
            .unwrap(),
            coalescer_builds: IntCounterVec::new(
                opts!("gateway_coalescer_builds_total", "Coalesced rebuilds run, by stream kind"),
                &["stream_kind"],
            )
            .unwrap(),
            coalescer_build_duration,
            sse_subscribers: IntGauge::new("gateway_sse_subscribers", "Live SSE subscribers").unwrap(),
            sse_publishes: IntCounterVec::new(
                opts!("gateway_sse_publishes_total", "Publishes to the SSE broker, by stream kind"),
                &["stream_kind"],
            )
            .unwrap(),
            sse_dropped_events: IntCounterVec::new(
                opts!(
                    "gateway_sse_dropped_events_total",
                    "Intermediate events dropped under subscriber back-pressure, by stream kind"
                ),
                &["stream_kind"],
            )
            .unwrap(),
            action_failures: IntCounterVec::new(
                opts!("gateway_action_failures_total", "Per-item action failures, by verb"),
                &["verb"],
            )
            .unwrap(),
        }
    }
}

impl Metrics {
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.informers_started.clone()))?;
        registry.register(Box::new(self.informer_sync_timeouts.clone()))?;
        registry.register(Box::new(self.coalescer_builds.clone()))?;
        registry.register(Box::new(self.coalescer_build_duration.clone()))?;
        registry.register(Box::new(self.sse_subscribers.clone()))?;
        registry.register(Box::new(self.sse_publishes.clone()))?;
        registry.register(Box::new(self.sse_dropped_events.clone()))?;
        registry.register(Box::new(self.action_failures.clone()))?;
        Ok(self)
    }

    pub fn count_coalescer_build(&self, stream_kind: &str) -> BuildMeasurer {
        self.coalescer_builds.with_label_values(&[stream_kind]).inc();
        BuildMeasurer {
            start: Instant::now(),
            metric: self.coalescer_build_duration.clone(),
            stream_kind: stream_kind.to_string(),
        }
    }
}

/// Relies on `Drop` to record the observation, mirroring the teacher's
/// `ReconcileMeasurer`.
pub struct BuildMeasurer {
    start: Instant,
    metric: HistogramVec,
    stream_kind: String,
}

impl Drop for BuildMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.stream_kind.as_str()])
            .observe(duration);
    }
}

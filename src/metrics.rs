use prometheus::{Encoder, IntCounter, Registry, TextEncoder, opts};

use crate::stats::{StatsDelta, StatsReporter, TotalReport, WindowReport};

/// Run counters in a Prometheus registry, fed from the aggregator's delta stream.
///
/// Clones share the same counters, so the driver keeps one handle to encode the
/// registry after the aggregator task has finished.
#[derive(Clone)]
pub struct PrometheusReporter {
    registry: Registry,
    sent_packets: IntCounter,
    successful_requests: IntCounter,
    bytes_sent: IntCounter,
    errors: IntCounter,
    replies_tracked: bool,
}

impl PrometheusReporter {
    pub fn new(replies_tracked: bool) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sent_packets = IntCounter::with_opts(opts!(
            "dnsstress_sent_packets_total",
            "Total number of DNS queries sent"
        ))?;

        let successful_requests = IntCounter::with_opts(opts!(
            "dnsstress_successful_requests_total",
            "Total number of queries that got a matching reply"
        ))?;

        let bytes_sent = IntCounter::with_opts(opts!(
            "dnsstress_bytes_sent_total",
            "Total number of query bytes written to the socket"
        ))?;

        let errors = IntCounter::with_opts(opts!(
            "dnsstress_errors_total",
            "Total number of failed exchanges and worker setup failures"
        ))?;

        registry.register(Box::new(sent_packets.clone()))?;
        registry.register(Box::new(successful_requests.clone()))?;
        registry.register(Box::new(bytes_sent.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            sent_packets,
            successful_requests,
            bytes_sent,
            errors,
            replies_tracked,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format of every registered counter.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl StatsReporter for PrometheusReporter {
    fn delta(&mut self, delta: &StatsDelta) {
        self.sent_packets.inc_by(delta.sent);
        self.bytes_sent.inc_by(delta.bytes_sent);
        self.errors.inc_by(delta.errors);
        if self.replies_tracked {
            self.successful_requests
                .inc_by(delta.sent.saturating_sub(delta.errors));
        }
    }

    fn window(&mut self, _report: &WindowReport) {}

    fn total(&mut self, _report: &TotalReport) {}
}

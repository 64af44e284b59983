//! Prometheus metrics for the faucet

use prometheus::{
    histogram_opts, opts, Encoder, Gauge, Histogram, IntCounterVec, Registry, TextEncoder,
};

/// Faucet metrics, owned by a private registry
#[derive(Clone)]
pub struct FaucetMetrics {
    registry: Registry,

    /// Requests by outcome (`success` or an error code)
    pub requests_total: IntCounterVec,

    /// Time spent inside the serialized submission section
    pub submission_duration: Histogram,

    /// Last balance observed during an affordability check, in ether
    pub faucet_balance: Gauge,
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            opts!("faucet_requests_total", "Disbursement requests by outcome"),
            &["outcome"],
        )?;

        let submission_duration = Histogram::with_opts(
            histogram_opts!(
                "faucet_submission_duration_seconds",
                "Time spent submitting transfers to the network"
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let faucet_balance = Gauge::with_opts(opts!(
            "faucet_balance_ether",
            "Faucet wallet balance at the last affordability check"
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(submission_duration.clone()))?;
        registry.register(Box::new(faucet_balance.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            submission_duration,
            faucet_balance,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

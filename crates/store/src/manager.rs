use std::sync::Arc;

use necker_core::{
    CanonicalType, NamespaceLabels, NotificationSource, SelectorPolicy, Statistics, TargetSet, WatchError,
};
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::export::{self, MetricSample};

#[derive(Debug)]
pub struct StartFailure {
    pub target: CanonicalType,
    pub error: WatchError,
}

/// One aggregator per target type. Aggregators share nothing; a failure to
/// start one leaves the others running.
pub struct WatcherManager {
    aggregators: Vec<Aggregator>,
}

impl WatcherManager {
    pub fn new(targets: &TargetSet, policy: &SelectorPolicy, namespaces: Arc<dyn NamespaceLabels>) -> Self {
        let aggregators = targets
            .iter()
            .map(|t| Aggregator::new(t.clone(), policy.pair_for(t), Arc::clone(&namespaces)))
            .collect();
        Self { aggregators }
    }

    pub fn aggregators(&self) -> &[Aggregator] { &self.aggregators }

    pub async fn start(&self, source: &dyn NotificationSource) -> Vec<StartFailure> {
        let mut failures = Vec::new();
        for agg in &self.aggregators {
            info!(gvk = %agg.target(), "starting aggregator");
            if let Err(e) = agg.start(source).await {
                error!(gvk = %agg.target(), error = %e, "aggregator failed to start");
                failures.push(StartFailure { target: agg.target().clone(), error: e });
            }
        }
        info!(total = self.aggregators.len(), failed = failures.len(), "aggregators started");
        failures
    }

    pub async fn statistics(&self) -> Vec<Statistics> {
        let mut out = Vec::with_capacity(self.aggregators.len());
        for agg in &self.aggregators {
            out.push(agg.statistics().await);
        }
        out
    }

    pub async fn samples(&self) -> Vec<MetricSample> {
        self.statistics().await.iter().flat_map(export::samples).collect()
    }

    /// Push current counters to the metrics recorder; returns the sample count.
    pub async fn publish(&self) -> usize {
        let samples = self.samples().await;
        export::publish(&samples);
        samples.len()
    }

    pub async fn stop(&self) {
        futures::future::join_all(self.aggregators.iter().map(|a| a.stop())).await;
    }
}

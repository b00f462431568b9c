//! Scrape-friendly enumeration of aggregator counters.

use necker_core::{EventKind, Statistics};
use serde::Serialize;

pub const RESOURCE_EVENTS: &str = "necker_resource_events_total";
pub const NAMESPACE_EVENTS: &str = "necker_namespace_events_total";
pub const EVENTS_DROPPED: &str = "necker_events_dropped_total";

/// One counter value. `resource_name` is set for per-object samples only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSample {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub resource_name: Option<String>,
    pub event_type: EventKind,
    pub value: u64,
}

impl MetricSample {
    pub fn metric_name(&self) -> &'static str {
        if self.resource_name.is_some() { RESOURCE_EVENTS } else { NAMESPACE_EVENTS }
    }
}

pub fn describe() {
    metrics::describe_counter!(RESOURCE_EVENTS, "Total number of update events per Kubernetes resource");
    metrics::describe_counter!(NAMESPACE_EVENTS, "Total number of add/update/delete events per namespace and type");
    metrics::describe_counter!(EVENTS_DROPPED, "Notifications dropped before counting, by reason");
}

pub fn samples(stats: &Statistics) -> Vec<MetricSample> {
    let gvk = &stats.gvk;
    let sample = |ns: &str, name: Option<&String>, event_type: EventKind, value: u64| MetricSample {
        group: gvk.group.clone(),
        version: gvk.version.clone(),
        kind: gvk.kind.clone(),
        namespace: ns.to_string(),
        resource_name: name.cloned(),
        event_type,
        value,
    };
    let mut out = Vec::new();
    for (ns, ns_stats) in &stats.namespaces {
        out.push(sample(ns, None, EventKind::Add, ns_stats.added));
        out.push(sample(ns, None, EventKind::Update, ns_stats.updated));
        out.push(sample(ns, None, EventKind::Delete, ns_stats.deleted));
        for (name, obj) in &ns_stats.resources {
            out.push(sample(ns, Some(name), EventKind::Update, obj.updated));
        }
    }
    out
}

/// Publish samples as absolute counters on the installed recorder.
pub fn publish(samples: &[MetricSample]) {
    for s in samples {
        let labels = (s.group.clone(), s.version.clone(), s.kind.clone(), s.namespace.clone());
        match &s.resource_name {
            Some(name) => metrics::absolute_counter!(
                RESOURCE_EVENTS, s.value,
                "group" => labels.0, "version" => labels.1, "kind" => labels.2,
                "namespace" => labels.3, "event_type" => s.event_type.as_str(), "resource_name" => name.clone()
            ),
            None => metrics::absolute_counter!(
                NAMESPACE_EVENTS, s.value,
                "group" => labels.0, "version" => labels.1, "kind" => labels.2,
                "namespace" => labels.3, "event_type" => s.event_type.as_str()
            ),
        }
    }
}

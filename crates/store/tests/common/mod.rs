#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use necker_core::{CanonicalType, Labels, LookupError, NamespaceLabels, Notification, NotificationSource, WatchError};
use tokio::sync::mpsc;

pub fn configmaps() -> CanonicalType { CanonicalType::new("", "v1", "ConfigMap") }

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Namespace labels from a fixed table; unknown namespaces fail the lookup.
#[derive(Default)]
pub struct FakeNamespaces {
    table: HashMap<String, Labels>,
    calls: AtomicUsize,
}

impl FakeNamespaces {
    pub fn with(mut self, ns: &str, pairs: &[(&str, &str)]) -> Self {
        self.table.insert(ns.to_string(), labels(pairs));
        self
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait::async_trait]
impl NamespaceLabels for FakeNamespaces {
    async fn namespace_labels(&self, namespace: &str) -> Result<Labels, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.get(namespace).cloned().ok_or_else(|| LookupError::new(namespace, "not found"))
    }
}

/// Hands out one channel per subscribed type and keeps the sending half.
#[derive(Default)]
pub struct ChannelSource {
    senders: Mutex<HashMap<CanonicalType, mpsc::Sender<Notification>>>,
    broken: HashSet<CanonicalType>,
}

impl ChannelSource {
    pub fn failing_for(mut self, t: CanonicalType) -> Self {
        self.broken.insert(t);
        self
    }

    pub fn sender(&self, t: &CanonicalType) -> mpsc::Sender<Notification> {
        self.senders.lock().unwrap().get(t).cloned().expect("type was subscribed")
    }

    pub fn subscribed(&self) -> usize { self.senders.lock().unwrap().len() }
}

#[async_trait::async_trait]
impl NotificationSource for ChannelSource {
    async fn subscribe(&self, target: &CanonicalType) -> Result<mpsc::Receiver<Notification>, WatchError> {
        if self.broken.contains(target) {
            return Err(WatchError::Subscribe { target: target.clone(), reason: "no such resource".into() });
        }
        let (tx, rx) = mpsc::channel(64);
        self.senders.lock().unwrap().insert(target.clone(), tx);
        Ok(rx)
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

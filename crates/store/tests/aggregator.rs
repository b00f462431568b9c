#![forbid(unsafe_code)]

mod common;

use std::sync::Arc;

use chrono::{Duration, Timelike};
use common::{configmaps, eventually, ChannelSource, FakeNamespaces};
use necker_core::{EventKind, LabelFilter, Notification, ObjectRevisionMeta, SelectorPair, WatchError};
use necker_store::{Aggregator, Outcome, Phase};

async fn running(selectors: SelectorPair, namespaces: Arc<FakeNamespaces>) -> (Aggregator, ChannelSource) {
    let source = ChannelSource::default();
    let agg = Aggregator::new(configmaps(), selectors, namespaces);
    agg.start(&source).await.unwrap();
    (agg, source)
}

fn fresh(agg: &Aggregator, ns: &str, name: &str) -> ObjectRevisionMeta {
    ObjectRevisionMeta::new(Some(ns), name).created_at(agg.started_at().unwrap() + Duration::seconds(5))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn counters_follow_event_kinds() {
    let (agg, _src) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let obj = fresh(&agg, "default", "test");

    assert_eq!(agg.on_event(EventKind::Add, &obj).await, Outcome::Counted);
    for _ in 0..3 {
        assert_eq!(agg.on_event(EventKind::Update, &obj).await, Outcome::Counted);
    }
    assert_eq!(agg.on_event(EventKind::Delete, &obj).await, Outcome::Counted);

    let stats = agg.statistics().await;
    let ns = stats.namespace("default").unwrap();
    assert_eq!((ns.added, ns.updated, ns.deleted), (1, 3, 1));
    assert_eq!(ns.resources["test"].updated, 3, "object entry survives deletion");
    assert_eq!(stats.gvk, configmaps());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backfill_adds_before_start_are_not_counted() {
    let (agg, _src) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let before = agg.started_at().unwrap() - Duration::seconds(60);

    for i in 0..10 {
        let obj = ObjectRevisionMeta::new(Some("default"), format!("old-{i}")).created_at(before);
        assert_eq!(agg.on_event(EventKind::Add, &obj).await, Outcome::Backfill);
    }
    let old = ObjectRevisionMeta::new(Some("default"), "old-0").created_at(before);
    assert_eq!(agg.on_event(EventKind::Update, &old).await, Outcome::Counted);
    assert_eq!(agg.on_event(EventKind::Delete, &old).await, Outcome::Counted);

    let stats = agg.statistics().await;
    let ns = stats.namespace("default").unwrap();
    assert_eq!(ns.added, 0);
    assert_eq!((ns.updated, ns.deleted), (1, 1));
    assert_eq!(ns.resources.len(), 1, "suppressed adds leave no object entries");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn creation_earlier_in_the_start_second_is_backfill() {
    let (agg, _src) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let started = agg.started_at().unwrap();
    let same_second = started.with_nanosecond(0).unwrap();

    let racy = ObjectRevisionMeta::new(Some("default"), "racy").created_at(same_second);
    let expected = if same_second < started { Outcome::Backfill } else { Outcome::Counted };
    assert_eq!(agg.on_event(EventKind::Add, &racy).await, expected);

    let at_start = ObjectRevisionMeta::new(Some("default"), "new").created_at(started);
    assert_eq!(agg.on_event(EventKind::Add, &at_start).await, Outcome::Counted, "not strictly before the start");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn object_selector_rejects_before_namespace_lookup() {
    let namespaces = Arc::new(FakeNamespaces::default().with("admin-ns", &[("role", "admin")]));
    let selectors = SelectorPair::new(
        LabelFilter::from_pairs([("role", "admin")]),
        LabelFilter::parse("ignored!=true").unwrap(),
    );
    let (agg, _src) = running(selectors, Arc::clone(&namespaces)).await;

    let ignored = fresh(&agg, "admin-ns", "skip").with_label("ignored", "true");
    assert_eq!(agg.on_event(EventKind::Add, &ignored).await, Outcome::Filtered);
    assert_eq!(namespaces.calls(), 0, "namespace lookup skipped for rejected objects");

    assert_eq!(agg.on_event(EventKind::Add, &fresh(&agg, "admin-ns", "keep")).await, Outcome::Counted);
    assert_eq!(namespaces.calls(), 1);

    let stats = agg.statistics().await;
    assert_eq!(stats.namespaces.len(), 1);
    assert!(!stats.namespace("admin-ns").unwrap().resources.contains_key("skip"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn namespace_selector_filters_by_namespace_labels() {
    let namespaces = Arc::new(
        FakeNamespaces::default().with("admin-ns", &[("role", "admin")]).with("user-ns", &[("role", "user")]),
    );
    let selectors = SelectorPair::new(LabelFilter::from_pairs([("role", "admin")]), LabelFilter::everything());
    let (agg, _src) = running(selectors, Arc::clone(&namespaces)).await;

    assert_eq!(agg.on_event(EventKind::Add, &fresh(&agg, "admin-ns", "test1")).await, Outcome::Counted);
    assert_eq!(agg.on_event(EventKind::Add, &fresh(&agg, "user-ns", "test2")).await, Outcome::Filtered);

    let cluster_scoped = ObjectRevisionMeta::new(None, "global").created_at(agg.started_at().unwrap());
    assert_eq!(agg.on_event(EventKind::Add, &cluster_scoped).await, Outcome::Counted);
    assert_eq!(namespaces.calls(), 2, "cluster-scoped objects never trigger a lookup");

    let stats = agg.statistics().await;
    assert!(stats.namespace("user-ns").is_none());
    assert_eq!(stats.namespace("admin-ns").unwrap().added, 1);
    assert_eq!(stats.namespace("").unwrap().added, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn match_everything_namespace_selector_skips_lookup() {
    let namespaces = Arc::new(FakeNamespaces::default());
    let (agg, _src) = running(SelectorPair::everything(), Arc::clone(&namespaces)).await;
    assert_eq!(agg.on_event(EventKind::Update, &fresh(&agg, "anywhere", "x")).await, Outcome::Counted);
    assert_eq!(namespaces.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_namespace_lookup_drops_only_that_event() {
    let namespaces = Arc::new(FakeNamespaces::default().with("admin-ns", &[("role", "admin")]));
    let selectors = SelectorPair::new(LabelFilter::from_pairs([("role", "admin")]), LabelFilter::everything());
    let (agg, _src) = running(selectors, namespaces).await;

    assert_eq!(agg.on_event(EventKind::Update, &fresh(&agg, "gone", "x")).await, Outcome::LookupFailed);
    assert_eq!(agg.phase(), Phase::Running);
    assert_eq!(agg.on_event(EventKind::Update, &fresh(&agg, "admin-ns", "y")).await, Outcome::Counted);

    let stats = agg.statistics().await;
    assert!(stats.namespace("gone").is_none());
    assert_eq!(stats.namespace("admin-ns").unwrap().updated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_only_count_while_running() {
    let source = ChannelSource::default();
    let agg = Aggregator::new(configmaps(), SelectorPair::everything(), Arc::new(FakeNamespaces::default()));
    let obj = ObjectRevisionMeta::new(Some("default"), "a");

    assert_eq!(agg.phase(), Phase::Created);
    assert_eq!(agg.on_event(EventKind::Update, &obj).await, Outcome::Inactive);

    agg.start(&source).await.unwrap();
    assert!(matches!(agg.start(&source).await, Err(WatchError::AlreadyStarted(_))));
    assert_eq!(agg.on_event(EventKind::Update, &obj).await, Outcome::Counted);

    agg.stop().await;
    assert_eq!(agg.phase(), Phase::Stopped);
    assert_eq!(agg.on_event(EventKind::Update, &obj).await, Outcome::Inactive);
    assert!(matches!(agg.start(&source).await, Err(WatchError::Stopped(_))));
    assert_eq!(agg.statistics().await.total(EventKind::Update), 1, "final snapshot readable after stop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscription_failure_stops_the_aggregator() {
    let source = ChannelSource::default().failing_for(configmaps());
    let agg = Aggregator::new(configmaps(), SelectorPair::everything(), Arc::new(FakeNamespaces::default()));
    assert!(matches!(agg.start(&source).await, Err(WatchError::Subscribe { .. })));
    assert_eq!(agg.phase(), Phase::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notifications_flow_through_the_subscription() {
    let (agg, source) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let tx = source.sender(&configmaps());
    let obj = fresh(&agg, "default", "streamed");
    tx.send(Notification::new(EventKind::Add, obj.clone())).await.unwrap();
    tx.send(Notification::new(EventKind::Update, obj.clone())).await.unwrap();
    tx.send(Notification::new(EventKind::Update, obj)).await.unwrap();

    let ok = eventually(|| async { agg.statistics().await.total(EventKind::Update) == 2 }).await;
    assert!(ok, "pump should deliver notifications in order");
    let stats = agg.statistics().await;
    assert_eq!(stats.namespace("default").unwrap().added, 1);

    agg.stop().await;
    let _ = tx.send(Notification::new(EventKind::Delete, ObjectRevisionMeta::new(Some("default"), "streamed"))).await;
    assert_eq!(agg.statistics().await.total(EventKind::Delete), 0, "nothing counted after stop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_are_isolated_from_later_events() {
    let (agg, _src) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let obj = fresh(&agg, "default", "a");
    agg.on_event(EventKind::Update, &obj).await;
    let before = agg.statistics().await;
    agg.on_event(EventKind::Update, &obj).await;
    agg.on_event(EventKind::Update, &fresh(&agg, "other", "b")).await;
    assert_eq!(before.total(EventKind::Update), 1);
    assert_eq!(before.namespaces.len(), 1);
    assert_eq!(agg.statistics().await.total(EventKind::Update), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_never_produce_torn_snapshots() {
    const WRITERS: usize = 8;
    const UPDATES: u64 = 200;
    let (agg, _src) = running(SelectorPair::everything(), Arc::new(FakeNamespaces::default())).await;
    let agg = Arc::new(agg);

    let mut handles = Vec::new();
    for w in 0..WRITERS {
        let agg = Arc::clone(&agg);
        handles.push(tokio::spawn(async move {
            let obj = ObjectRevisionMeta::new(Some("default"), format!("obj-{w}"));
            for _ in 0..UPDATES {
                agg.on_event(EventKind::Update, &obj).await;
                tokio::task::yield_now().await;
            }
        }));
    }
    let mut readers = Vec::new();
    for _ in 0..4 {
        let agg = Arc::clone(&agg);
        readers.push(tokio::spawn(async move {
            let mut last = 0u64;
            for _ in 0..100 {
                let snap = agg.statistics().await;
                if let Some(ns) = snap.namespace("default") {
                    let per_object: u64 = ns.resources.values().map(|o| o.updated).sum();
                    assert_eq!(ns.updated, per_object, "namespace and object counters must agree");
                    assert!(ns.updated >= last, "counts never go backwards");
                    last = ns.updated;
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for h in handles.into_iter().chain(readers) {
        h.await.unwrap();
    }
    let stats = agg.statistics().await;
    assert_eq!(stats.total(EventKind::Update), WRITERS as u64 * UPDATES);
    assert!(stats.namespace("default").unwrap().resources.values().all(|o| o.updated == UPDATES));
}

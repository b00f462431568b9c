#![forbid(unsafe_code)]

mod common;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use common::{configmaps, eventually, ChannelSource};
use necker_core::{EventKind, Notification, ObjectIdentity, ObjectRevisionMeta};
use necker_store::{BlameAttributor, Outcome, Phase};

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() }

fn at(secs: i64) -> Option<DateTime<Utc>> { Some(t0() + Duration::seconds(secs)) }

async fn running() -> (BlameAttributor, ChannelSource) {
    let source = ChannelSource::default();
    let blame = BlameAttributor::with_high_water_mark(configmaps(), ObjectIdentity::new(Some("default"), "test"), t0());
    blame.start(&source).await.unwrap();
    (blame, source)
}

fn revision() -> ObjectRevisionMeta { ObjectRevisionMeta::new(Some("default"), "test") }

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attributes_each_newer_claim_once() {
    let (blame, _src) = running().await;

    let first = revision().with_manager("kubectl-client-side-apply", at(10)).with_manager("kube-controller", at(20));
    assert_eq!(blame.on_event(EventKind::Update, &first).await, Outcome::Counted);

    let second = first.clone().with_manager("operator", at(30));
    assert_eq!(blame.on_event(EventKind::Update, &second).await, Outcome::Counted);

    let stats = blame.statistics().await;
    assert_eq!(stats.count("kubectl-client-side-apply"), 1);
    assert_eq!(stats.count("kube-controller"), 1);
    assert_eq!(stats.count("operator"), 1);
    assert_eq!(stats.high_water_mark, at(30).unwrap());
    assert_eq!(stats.total(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn replaying_a_revision_changes_nothing() {
    let (blame, _src) = running().await;
    let rev = revision().with_manager("a", at(5)).with_manager("b", at(6));

    assert_eq!(blame.on_event(EventKind::Update, &rev).await, Outcome::Counted);
    let once = blame.statistics().await;
    for _ in 0..3 {
        assert_eq!(blame.on_event(EventKind::Update, &rev).await, Outcome::Stale);
    }
    assert_eq!(blame.statistics().await, once);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn high_water_mark_never_moves_backwards() {
    let (blame, _src) = running().await;
    blame.on_event(EventKind::Update, &revision().with_manager("a", at(50))).await;

    let older = revision().with_manager("b", at(40)).with_manager("c", at(50));
    assert_eq!(blame.on_event(EventKind::Update, &older).await, Outcome::Stale);

    let stats = blame.statistics().await;
    assert_eq!(stats.high_water_mark, at(50).unwrap());
    assert_eq!(stats.count("b"), 0);
    assert_eq!(stats.count("c"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn claims_at_or_before_the_initial_mark_are_ignored() {
    let (blame, _src) = running().await;
    let rev = revision().with_manager("before", at(-30)).with_manager("exact", at(0)).with_manager("untimed", None);
    assert_eq!(blame.on_event(EventKind::Add, &rev).await, Outcome::Stale);
    assert!(blame.statistics().await.managers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deletes_and_other_objects_are_ignored() {
    let (blame, _src) = running().await;
    let deleted = revision().with_manager("gc", at(100));
    assert_eq!(blame.on_event(EventKind::Delete, &deleted).await, Outcome::Ignored);

    let same_name_other_ns = ObjectRevisionMeta::new(Some("kube-system"), "test").with_manager("x", at(100));
    assert_eq!(blame.on_event(EventKind::Update, &same_name_other_ns).await, Outcome::Ignored);

    let stats = blame.statistics().await;
    assert!(stats.managers.is_empty());
    assert_eq!(stats.high_water_mark, t0());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_mark_is_construction_time() {
    let source = ChannelSource::default();
    let blame = BlameAttributor::new(configmaps(), ObjectIdentity::new(Some("default"), "test"));
    blame.start(&source).await.unwrap();

    let mark = blame.statistics().await.high_water_mark;
    let same_second = revision().with_manager("racy", Some(mark.with_nanosecond(0).unwrap()));
    assert_eq!(blame.on_event(EventKind::Update, &same_second).await, Outcome::Stale);

    let history = revision().with_manager("old", Some(Utc::now() - Duration::hours(1)));
    assert_eq!(blame.on_event(EventKind::Update, &history).await, Outcome::Stale);

    let fresh = history.with_manager("new", Some(Utc::now() + Duration::seconds(5)));
    assert_eq!(blame.on_event(EventKind::Update, &fresh).await, Outcome::Counted);
    let stats = blame.statistics().await;
    assert_eq!((stats.count("racy"), stats.count("old"), stats.count("new")), (0, 0, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pumped_updates_are_attributed_and_stop_freezes_counts() {
    let (blame, source) = running().await;
    let tx = source.sender(&configmaps());
    tx.send(Notification::new(EventKind::Update, revision().with_manager("a", at(1)))).await.unwrap();
    tx.send(Notification::new(EventKind::Update, revision().with_manager("a", at(2)))).await.unwrap();

    assert!(eventually(|| async { blame.statistics().await.count("a") == 2 }).await);

    blame.stop().await;
    assert_eq!(blame.phase(), Phase::Stopped);
    assert_eq!(blame.on_event(EventKind::Update, &revision().with_manager("a", at(3))).await, Outcome::Inactive);
    assert_eq!(blame.statistics().await.count("a"), 2);
}

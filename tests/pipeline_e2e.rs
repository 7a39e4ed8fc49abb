// tests/pipeline_e2e.rs
//
// Full pipeline runs over an in-memory fixture feed: smart-follower pass,
// per-window signal scores and mindshare, leaderboard merge — all against
// one as-of-date.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use mindshare_pipeline::config::ScoringConfig;
use mindshare_pipeline::feed::InMemoryFeed;
use mindshare_pipeline::model::{
    AccountProfile, ContentType, ContributionEvent, FollowEdge, JoinRecord, SentimentLabel, Window,
};
use mindshare_pipeline::pipeline::Pipeline;
use mindshare_pipeline::store::SnapshotStore;

const TUNED: &str = r#"
[signal]
like_weight = 1.0
reply_weight = 2.0
retweet_weight = 3.0

[mindshare]
mention_weight = 1.0
contributor_weight = 1.0
engagement_weight = 1.0
"#;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn mention(actor: &str, project: &str, likes: u64) -> ContributionEvent {
    ContributionEvent {
        actor: actor.into(),
        project: project.into(),
        // A few hours before the window end (midnight after as_of).
        ts: Utc.with_ymd_and_hms(2025, 6, 1, 20, 0, 0).unwrap(),
        content_type: ContentType::Original,
        likes,
        replies: 0,
        retweets: 0,
        sentiment: SentimentLabel::Neutral,
        is_official: false,
        text: format!("{actor} on {project}: genuinely interesting work"),
    }
}

fn profile(id: &str, followers: u64) -> AccountProfile {
    AccountProfile {
        identity: id.into(),
        follower_count: followers,
        following_count: followers / 2,
        created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn edge(from: &str, to: &str) -> FollowEdge {
    FollowEdge {
        follower: from.into(),
        followee: to.into(),
        first_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn fixture() -> Arc<InMemoryFeed> {
    let feed = InMemoryFeed::new();
    feed.add_project("arena", "Arena");
    feed.add_project("beta", "Beta");
    feed.add_account("alice");
    feed.add_account("bob");
    feed.add_event(mention("@Alice", "arena", 10));
    feed.add_event(mention("bob", "arena", 4));
    feed.add_event(mention("bob", "beta", 2));
    feed.add_edge(edge("alice", "arena"));
    feed.add_edge(edge("bob", "arena"));
    feed.add_profile(profile("alice", 500));
    feed.add_profile(profile("bob", 200));
    feed.add_profile(profile("arena", 100));
    feed.add_profile(profile("beta", 50));
    feed.set_heat("arena", 3.0);
    feed.add_join(JoinRecord {
        identity: "alice".into(),
        project: "arena".into(),
        points: 40,
        follow_verified: true,
    });
    Arc::new(feed)
}

fn pipeline_over(feed: Arc<InMemoryFeed>) -> Pipeline {
    let cfg = Arc::new(ScoringConfig::from_toml_str(TUNED).expect("tuned config"));
    Pipeline::new(cfg, feed, Arc::new(SnapshotStore::new()))
}

#[tokio::test]
async fn daily_run_commits_every_window_with_exact_bps() {
    let pipeline = pipeline_over(fixture());
    let summaries = pipeline.run_day(as_of()).await.expect("run_day");
    assert_eq!(summaries.len(), 4, "all four windows must commit");

    let store = pipeline.store();
    for window in Window::ALL {
        let rows = store.mindshare_for(window, as_of());
        assert_eq!(rows.len(), 2, "{}", window.as_str());
        let sum: u64 = rows.iter().map(|r| r.mindshare_bps as u64).sum();
        assert_eq!(sum, 10_000, "{}", window.as_str());
        // More mentions, contributors and engagement on arena.
        assert_eq!(rows[0].project, "arena");
        assert!(rows[0].mindshare_bps > rows[1].mindshare_bps);
    }
}

#[tokio::test]
async fn signal_scores_are_persisted_per_creator_and_project() {
    let pipeline = pipeline_over(fixture());
    pipeline.run_day(as_of()).await.expect("run_day");

    let store = pipeline.store();
    // "@Alice" in the raw feed resolves to the canonical key.
    let alice = store.signal_for("alice", "arena", Window::H24).expect("alice row");
    assert!(alice.signal_score > 0.0 && alice.signal_score <= 100.0);
    let bob = store.signal_for("bob", "arena", Window::H24).expect("bob row");
    assert!(
        alice.signal_score > bob.signal_score,
        "more engagement must not score lower: {} vs {}",
        alice.signal_score,
        bob.signal_score
    );
    assert!(store.signal_for("bob", "beta", Window::H24).is_some());
    assert!(store.signal_for("alice", "beta", Window::H24).is_none());
}

#[tokio::test]
async fn smart_pass_snapshots_graph_entities() {
    let pipeline = pipeline_over(fixture());
    pipeline.run_day(as_of()).await.expect("run_day");

    let store = pipeline.store();
    let arena = store.smart_snapshot("arena", as_of()).expect("arena snapshot");
    assert!(!arena.is_estimate);
    assert_eq!(arena.total_followers, 2, "alice and bob follow arena");
    assert!(arena.smart_followers_pct >= 0.0 && arena.smart_followers_pct <= 1.0);
}

#[tokio::test]
async fn empty_graph_falls_back_to_estimate_mode() {
    let feed = InMemoryFeed::new();
    feed.add_project("arena", "Arena");
    feed.add_profile(profile("arena", 100));
    let pipeline = pipeline_over(Arc::new(feed));
    pipeline.run_day(as_of()).await.expect("run_day");

    let snap = pipeline.store().smart_snapshot("arena", as_of()).expect("snapshot");
    assert!(snap.is_estimate);
    assert_eq!(snap.smart_followers_count, 10, "sqrt(100) audience estimate");
}

#[tokio::test]
async fn leaderboard_merges_auto_and_joined_sources() {
    let pipeline = pipeline_over(fixture());
    pipeline.run_day(as_of()).await.expect("run_day");

    let rows = pipeline.store().leaderboard_for("arena");
    assert_eq!(rows.len(), 2);
    // alice: 10 auto + 40 joined = 50 base, verified join boost 1.5 -> 75.
    assert_eq!(rows[0].identity, "alice");
    assert_eq!(rows[0].base_points, 50);
    assert_eq!(rows[0].score, 75);
    assert!(rows[0].is_joined && rows[0].is_auto_tracked && rows[0].follow_verified);
    // bob: auto only, no boost.
    assert_eq!(rows[1].identity, "bob");
    assert_eq!(rows[1].score, 4);
    assert!(!rows[1].is_joined);
}

#[tokio::test]
async fn rerun_for_the_same_date_is_idempotent() {
    let feed = fixture();
    let pipeline = pipeline_over(feed);
    pipeline.run_day(as_of()).await.expect("first run");
    let first = pipeline.store().mindshare_for(Window::H24, as_of());
    pipeline.run_day(as_of()).await.expect("second run");
    let second = pipeline.store().mindshare_for(Window::H24, as_of());

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.project, b.project);
        assert_eq!(a.mindshare_bps, b.mindshare_bps);
    }
}

#[tokio::test]
async fn window_with_no_activity_splits_attention_evenly() {
    let feed = InMemoryFeed::new();
    feed.add_project("quiet-a", "A");
    feed.add_project("quiet-b", "B");
    let pipeline = pipeline_over(Arc::new(feed));
    pipeline.run_window(Window::H24, as_of()).await.expect("run_window");

    let rows = pipeline.store().mindshare_for(Window::H24, as_of());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].mindshare_bps, 5_000);
    assert_eq!(rows[1].mindshare_bps, 5_000);
}

// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /mindshare   (latest date, explicit date, deltas, unknown window)
// - GET /signal-score
// - GET /smart-followers
// - GET /leaderboard

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use mindshare_pipeline::api::{create_router, AppState};
use mindshare_pipeline::config::ScoringConfig;
use mindshare_pipeline::model::{
    LeaderboardEntry, MindshareSnapshot, SignalScoreResult, SmartFollowersSnapshot, TrustBand,
    Window,
};
use mindshare_pipeline::store::SnapshotStore;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Build the same Router the binary uses, over a pre-seeded store.
fn test_router(store: Arc<SnapshotStore>) -> Router {
    let state = AppState { store, cfg: Arc::new(ScoringConfig::default()) };
    create_router(state)
}

fn seeded_store() -> Arc<SnapshotStore> {
    let store = Arc::new(SnapshotStore::new());
    let snap = |project: &str, as_of: NaiveDate, bps: u32| MindshareSnapshot {
        project: project.into(),
        window: Window::H24,
        as_of,
        attention_value: bps as f64,
        mindshare_bps: bps,
    };
    store.upsert_mindshare(vec![
        snap("alpha", date(2025, 6, 1), 6_000),
        snap("beta", date(2025, 6, 1), 4_000),
        snap("alpha", date(2025, 6, 2), 7_000),
        snap("beta", date(2025, 6, 2), 3_000),
    ]);
    store.upsert_signal(vec![SignalScoreResult {
        creator: "alice".into(),
        project: "alpha".into(),
        window: Window::H24,
        as_of: date(2025, 6, 2),
        signal_score: 62.5,
        trust_band: TrustBand::B,
    }]);
    store.upsert_smart_snapshots(vec![
        SmartFollowersSnapshot {
            entity: "alpha".into(),
            as_of: date(2025, 6, 1),
            smart_followers_count: 10,
            total_followers: 100,
            smart_followers_pct: 0.10,
            is_estimate: false,
        },
        SmartFollowersSnapshot {
            entity: "alpha".into(),
            as_of: date(2025, 6, 2),
            smart_followers_count: 14,
            total_followers: 110,
            smart_followers_pct: 0.127,
            is_estimate: false,
        },
    ]);
    store.replace_leaderboard(
        "alpha",
        vec![LeaderboardEntry {
            identity: "alice".into(),
            project: "alpha".into(),
            base_points: 100,
            multiplier: 1.5,
            score: 150,
            is_joined: true,
            is_auto_tracked: true,
            follow_verified: true,
        }],
    );
    store
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let v: Json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(seeded_store());

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "ok");
}

#[tokio::test]
async fn api_mindshare_defaults_to_latest_date() {
    let (status, v) = get_json(test_router(seeded_store()), "/mindshare?window=24h").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["as_of"], "2025-06-02");
    let entries = v["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 2);
    // Sorted by bps descending.
    assert_eq!(entries[0]["project"], "alpha");
    assert_eq!(entries[0]["mindshare_bps"], 7_000);
    let sum: i64 = entries.iter().map(|e| e["mindshare_bps"].as_i64().unwrap()).sum();
    assert_eq!(sum, 10_000);
}

#[tokio::test]
async fn api_mindshare_reports_deltas_against_prior_rows() {
    let (status, v) =
        get_json(test_router(seeded_store()), "/mindshare?window=24h&as_of=2025-06-02").await;
    assert_eq!(status, StatusCode::OK);
    let entries = v["entries"].as_array().unwrap();
    let alpha = entries.iter().find(|e| e["project"] == "alpha").unwrap();
    assert_eq!(alpha["delta_1d"], 1_000);
    // No snapshot 7 days earlier: a gap, reported as null rather than 0.
    assert!(alpha["delta_7d"].is_null());
}

#[tokio::test]
async fn api_mindshare_rejects_unknown_window() {
    let (status, v) = get_json(test_router(seeded_store()), "/mindshare?window=90d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("window"));
}

#[tokio::test]
async fn api_mindshare_missing_date_is_404() {
    let (status, _) =
        get_json(test_router(seeded_store()), "/mindshare?window=24h&as_of=1999-01-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_signal_score_normalizes_the_handle() {
    // "@Alice" must resolve to the same row as "alice".
    let (status, v) = get_json(
        test_router(seeded_store()),
        "/signal-score?creator=%40Alice&project=alpha",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["creator"], "alice");
    assert_eq!(v["signal_score"], 62.5);
    assert_eq!(v["trust_band"], "B");
}

#[tokio::test]
async fn api_smart_followers_serves_latest_snapshot_with_deltas() {
    let (status, v) = get_json(test_router(seeded_store()), "/smart-followers?entity=alpha").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["as_of"], "2025-06-02");
    assert_eq!(v["smart_followers_count"], 14);
    assert_eq!(v["delta_1d"], 4);
    assert!(v["delta_7d"].is_null(), "gap must be null, not zero");
    assert_eq!(v["is_estimate"], false);
}

#[tokio::test]
async fn api_smart_followers_unknown_entity_is_404() {
    let (status, _) = get_json(test_router(seeded_store()), "/smart-followers?entity=nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_leaderboard_returns_ranked_entries() {
    let (status, v) = get_json(test_router(seeded_store()), "/leaderboard?project=alpha").await;
    assert_eq!(status, StatusCode::OK);
    let entries = v["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["identity"], "alice");
    assert_eq!(entries[0]["score"], 150);
    assert_eq!(entries[0]["follow_verified"], true);
}

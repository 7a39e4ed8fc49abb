//! Read-only HTTP surface over the snapshot store. Every endpoint serves
//! persisted snapshots; nothing here triggers computation.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::ScoringConfig;
use crate::identity::normalize;
use crate::model::{LeaderboardEntry, Window};
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub cfg: Arc<ScoringConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/mindshare", get(mindshare))
        .route("/signal-score", get(signal_score))
        .route("/smart-followers", get(smart_followers))
        .route("/leaderboard", get(leaderboard))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg })))
}

fn not_found(msg: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": msg })))
}

fn parse_window(raw: Option<&str>) -> Result<Window, ApiError> {
    let s = raw.unwrap_or("24h");
    Window::parse(s).ok_or_else(|| bad_request("unknown window; expected one of 24h, 48h, 7d, 30d"))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    raw.parse().map_err(|_| bad_request("invalid as_of; expected YYYY-MM-DD"))
}

/* ---- /mindshare ---- */

#[derive(Deserialize)]
struct MindshareParams {
    window: Option<String>,
    as_of: Option<String>,
}

#[derive(Serialize)]
struct MindshareRow {
    project: String,
    mindshare_bps: u32,
    attention_value: f64,
    /// bps change vs. 1 day earlier; null when the earlier snapshot is a gap.
    delta_1d: Option<i64>,
    delta_7d: Option<i64>,
}

#[derive(Serialize)]
struct MindshareResponse {
    window: &'static str,
    as_of: NaiveDate,
    entries: Vec<MindshareRow>,
}

async fn mindshare(
    State(state): State<AppState>,
    Query(params): Query<MindshareParams>,
) -> Result<Json<MindshareResponse>, ApiError> {
    let window = parse_window(params.window.as_deref())?;
    let as_of = match params.as_of.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => state
            .store
            .latest_mindshare_date(window)
            .ok_or_else(|| not_found("no mindshare snapshot for this window yet"))?,
    };

    let rows = state.store.mindshare_for(window, as_of);
    if rows.is_empty() {
        return Err(not_found("no mindshare snapshot for this date"));
    }

    let entries = rows
        .into_iter()
        .map(|r| {
            let delta = |days: i64| {
                let earlier = as_of - chrono::Duration::days(days);
                state
                    .store
                    .mindshare_bps(&r.project, window, earlier)
                    .map(|then| r.mindshare_bps as i64 - then as i64)
            };
            MindshareRow {
                delta_1d: delta(1),
                delta_7d: delta(7),
                project: r.project,
                mindshare_bps: r.mindshare_bps,
                attention_value: r.attention_value,
            }
        })
        .collect();

    Ok(Json(MindshareResponse { window: window.as_str(), as_of, entries }))
}

/* ---- /signal-score ---- */

#[derive(Deserialize)]
struct SignalParams {
    creator: String,
    project: String,
    window: Option<String>,
}

#[derive(Serialize)]
struct SignalResponse {
    creator: String,
    project: String,
    window: &'static str,
    as_of: NaiveDate,
    signal_score: f64,
    trust_band: crate::model::TrustBand,
}

async fn signal_score(
    State(state): State<AppState>,
    Query(params): Query<SignalParams>,
) -> Result<Json<SignalResponse>, ApiError> {
    let window = parse_window(params.window.as_deref())?;
    let creator = normalize(&params.creator);
    let project = normalize(&params.project);
    let row = state
        .store
        .signal_for(&creator, &project, window)
        .ok_or_else(|| not_found("no signal score for this creator/project"))?;
    Ok(Json(SignalResponse {
        creator: row.creator,
        project: row.project,
        window: window.as_str(),
        as_of: row.as_of,
        signal_score: row.signal_score,
        trust_band: row.trust_band,
    }))
}

/* ---- /smart-followers ---- */

#[derive(Deserialize)]
struct SmartParams {
    entity: String,
}

#[derive(Serialize)]
struct SmartResponse {
    entity: String,
    as_of: NaiveDate,
    smart_followers_count: u64,
    total_followers: u64,
    smart_followers_pct: f64,
    is_estimate: bool,
    delta_1d: Option<i64>,
    delta_7d: Option<i64>,
    delta_30d: Option<i64>,
}

async fn smart_followers(
    State(state): State<AppState>,
    Query(params): Query<SmartParams>,
) -> Result<Json<SmartResponse>, ApiError> {
    let entity = normalize(&params.entity);
    let snap = state
        .store
        .latest_smart_snapshot(&entity)
        .ok_or_else(|| not_found("no smart-followers snapshot for this entity"))?;
    let delta = |days| state.store.smart_delta(&entity, snap.as_of, days);
    Ok(Json(SmartResponse {
        delta_1d: delta(1),
        delta_7d: delta(7),
        delta_30d: delta(30),
        entity: snap.entity,
        as_of: snap.as_of,
        smart_followers_count: snap.smart_followers_count,
        total_followers: snap.total_followers,
        smart_followers_pct: snap.smart_followers_pct,
        is_estimate: snap.is_estimate,
    }))
}

/* ---- /leaderboard ---- */

#[derive(Deserialize)]
struct LeaderboardParams {
    project: String,
}

#[derive(Serialize)]
struct LeaderboardResponse {
    project: String,
    entries: Vec<LeaderboardEntry>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let project = normalize(&params.project);
    let entries = state.store.leaderboard_for(&project);
    Ok(Json(LeaderboardResponse { project, entries }))
}

//! # Data Model
//! Shared types for the scoring pipeline: time windows, content categories,
//! raw activity records, and the versioned snapshot rows the engines emit.
//!
//! Raw records (`ContributionEvent`, `FollowEdge`, `TrackedEntity`, joins) are
//! owned by external collaborators and read-only here. Snapshot rows are
//! write-once-per-run, upserted by natural key; history is preserved by the
//! `as_of` date, never by mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Time window for a scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "48h")]
    H48,
    #[serde(rename = "7d")]
    D7,
    #[serde(rename = "30d")]
    D30,
}

impl Window {
    pub const ALL: [Window; 4] = [Window::H24, Window::H48, Window::D7, Window::D30];

    pub fn hours(self) -> f64 {
        match self {
            Window::H24 => 24.0,
            Window::H48 => 48.0,
            Window::D7 => 7.0 * 24.0,
            Window::D30 => 30.0 * 24.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::H24 => "24h",
            Window::H48 => "48h",
            Window::D7 => "7d",
            Window::D30 => "30d",
        }
    }

    /// Parse a query-string token. Unknown tokens are a handled `None`, not a panic.
    pub fn parse(s: &str) -> Option<Window> {
        match s {
            "24h" => Some(Window::H24),
            "48h" => Some(Window::H48),
            "7d" => Some(Window::D7),
            "30d" => Some(Window::D30),
            _ => None,
        }
    }
}

/// Closed content-type taxonomy. Anything the ingest side could not classify
/// lands in `Unknown`, which weighs neutral (1.0) — an unclassified
/// contribution must not vanish silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Thread,
    Analysis,
    Meme,
    Quote,
    Retweet,
    Reply,
    Original,
    #[serde(other)]
    Unknown,
}

/// Sentiment label attached to a contribution by the ingest collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Numeric value used when averaging: +1 / 0 / -1.
    pub fn value(self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -1.0,
        }
    }
}

/// Discrete trust tier derived from a signal score. Total and exhaustive:
/// every score maps to exactly one band, `D` is the bottom catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustBand {
    A,
    B,
    C,
    D,
}

/// A project or creator enrolled for tracking. Created by the onboarding
/// collaborator; the core only reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Normalized identity key.
    pub identity: String,
    pub display_name: String,
    pub is_active: bool,
}

/// One raw activity record: a mention of `project` by `actor`.
/// Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionEvent {
    pub actor: String,
    pub project: String,
    pub ts: DateTime<Utc>,
    pub content_type: ContentType,
    pub likes: u64,
    pub replies: u64,
    pub retweets: u64,
    pub sentiment: SentimentLabel,
    /// Posts by the project's own official account; excluded from
    /// leaderboard auto-points.
    pub is_official: bool,
    pub text: String,
}

/// Directed follow edge (`follower` follows `followee`). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: String,
    pub followee: String,
    pub first_seen: DateTime<Utc>,
}

/// Per-account profile facts used by the bot-risk heuristic and the
/// audience-estimate fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub identity: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Explicit leaderboard join record from the surrounding application's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRecord {
    pub identity: String,
    pub project: String,
    /// Base arc points plus any manual adjustments.
    pub points: u64,
    pub follow_verified: bool,
}

/// Per (identity, as-of-date) output of the graph engine. Superseded rows are
/// retained for history, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartAccountScore {
    pub identity: String,
    pub as_of: NaiveDate,
    /// Importance score in 0..1.
    pub importance: f64,
    /// Bot-risk score in 0..1.
    pub bot_risk: f64,
    pub is_smart: bool,
    pub account_age_days: i64,
}

/// Per (entity, as-of-date) smart-follower aggregate, persisted so 7d/30d
/// deltas are a row lookup, not a recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartFollowersSnapshot {
    pub entity: String,
    pub as_of: NaiveDate,
    pub smart_followers_count: u64,
    pub total_followers: u64,
    /// 0 when `total_followers` is 0, never a division error.
    pub smart_followers_pct: f64,
    /// True when produced by the audience-estimate fallback; consumers must
    /// not conflate precision levels.
    pub is_estimate: bool,
}

/// One immutable mindshare row per (project, window, as-of-date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindshareSnapshot {
    pub project: String,
    pub window: Window,
    pub as_of: NaiveDate,
    /// Raw, pre-normalization attention value (non-negative).
    pub attention_value: f64,
    /// Integer basis points; across all projects of one (window, as_of) run
    /// these sum to exactly 10_000.
    pub mindshare_bps: u32,
}

/// Per (creator, project, window) composite score. Recomputed idempotently,
/// overwritten on each run, never accumulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalScoreResult {
    pub creator: String,
    pub project: String,
    pub window: Window,
    pub as_of: NaiveDate,
    /// Bounded 0..100.
    pub signal_score: f64,
    pub trust_band: TrustBand,
}

/// One merged leaderboard row per (project, creator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: String,
    pub project: String,
    pub base_points: u64,
    /// 1.0, or the configured join/verification boost.
    pub multiplier: f64,
    /// `floor(base_points * multiplier)`.
    pub score: u64,
    pub is_joined: bool,
    pub is_auto_tracked: bool,
    pub follow_verified: bool,
}

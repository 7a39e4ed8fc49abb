//! # Scoring Configuration
//! All weight/threshold/half-life parameters live here, loaded once at run
//! start from TOML and passed into the engines as an immutable object — never
//! a mutable module-level singleton, so a run is reproducible from its
//! configuration snapshot.
//!
//! Every field has a documented default. For multiplicative knobs the default
//! is the neutral 1.0, for additive weights it is 0.0: an absent key is a
//! no-op, never a crash, and never an undocumented value that reshuffles
//! ranking order. `config/scoring.toml` ships example tuned values.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::ContentType;

pub const DEFAULT_SCORING_CONFIG_PATH: &str = "config/scoring.toml";
pub const ENV_SCORING_CONFIG_PATH: &str = "SCORING_CONFIG_PATH";

/// Root configuration object shared by all engines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub smart: SmartConfig,
    #[serde(default)]
    pub mindshare: MindshareConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl ScoringConfig {
    /// Load from `$SCORING_CONFIG_PATH`, falling back to
    /// `config/scoring.toml`. A missing file yields the all-neutral default
    /// config (logged), not an error — tuned weights are optional by design.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_SCORING_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCORING_CONFIG_PATH));
        if !path.exists() {
            tracing::warn!(path = %path.display(), "scoring config not found; using neutral defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scoring config at {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: ScoringConfig = toml::from_str(s).context("parsing scoring config TOML")?;
        Ok(cfg)
    }
}

/* ----------------------------
Signal Score Engine
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Additive engagement weights; all default 0.0 (neutral no-op).
    #[serde(default)]
    pub like_weight: f64,
    #[serde(default)]
    pub reply_weight: f64,
    #[serde(default)]
    pub retweet_weight: f64,

    /// Half-life in hours per window, keyed "24h"/"48h"/"7d"/"30d".
    /// A window without an entry applies no decay (weight 1.0).
    #[serde(default)]
    pub half_life_hours: HashMap<String, f64>,

    /// Content-type multipliers keyed by snake_case type name.
    /// Missing/unknown types weigh 1.0 — an unclassified contribution must
    /// not vanish silently.
    #[serde(default)]
    pub content_weights: HashMap<String, f64>,

    /// Normalized-similarity threshold above which two texts in the same
    /// window count as near-duplicates. Default 1.0: only exact copies.
    #[serde(default = "one")]
    pub duplicate_similarity_threshold: f64,
    /// Down-weight factor applied to a near-duplicate event (never discard).
    /// Default 1.0: no penalty.
    #[serde(default = "one")]
    pub duplicate_penalty: f64,

    /// Authenticity multiplier bounds (from smart-follower pct / bot risk).
    #[serde(default = "one")]
    pub authenticity_floor: f64,
    #[serde(default = "one")]
    pub authenticity_cap: f64,

    /// Sentiment multiplier bounds (from average sentiment label).
    #[serde(default = "one")]
    pub sentiment_floor: f64,
    #[serde(default = "one")]
    pub sentiment_cap: f64,

    /// Bounded bonus multiplier for creators who explicitly joined.
    #[serde(default = "one")]
    pub join_bonus: f64,

    /// Trust band thresholds on the bounded 0..100 score: A ≥ a, B ≥ b,
    /// C ≥ c, else D. Defaults 75/50/25.
    #[serde(default = "default_band_a")]
    pub band_a_min: f64,
    #[serde(default = "default_band_b")]
    pub band_b_min: f64,
    #[serde(default = "default_band_c")]
    pub band_c_min: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        // Keep in sync with the serde field defaults above.
        Self {
            like_weight: 0.0,
            reply_weight: 0.0,
            retweet_weight: 0.0,
            half_life_hours: HashMap::new(),
            content_weights: HashMap::new(),
            duplicate_similarity_threshold: 1.0,
            duplicate_penalty: 1.0,
            authenticity_floor: 1.0,
            authenticity_cap: 1.0,
            sentiment_floor: 1.0,
            sentiment_cap: 1.0,
            join_bonus: 1.0,
            band_a_min: default_band_a(),
            band_b_min: default_band_b(),
            band_c_min: default_band_c(),
        }
    }
}

impl SignalConfig {
    /// Half-life for a window, `None` when decay is not configured.
    pub fn half_life_for(&self, window: crate::model::Window) -> Option<f64> {
        self.half_life_hours
            .get(window.as_str())
            .copied()
            .filter(|h| *h > 0.0)
    }

    /// Content-type multiplier; missing entries weigh neutral 1.0.
    pub fn content_weight(&self, ct: ContentType) -> f64 {
        let key = match ct {
            ContentType::Thread => "thread",
            ContentType::Analysis => "analysis",
            ContentType::Meme => "meme",
            ContentType::Quote => "quote",
            ContentType::Retweet => "retweet",
            ContentType::Reply => "reply",
            ContentType::Original => "original",
            ContentType::Unknown => return 1.0,
        };
        self.content_weights.get(key).copied().unwrap_or(1.0)
    }
}

/* ----------------------------
Smart Followers Graph Engine
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct SmartConfig {
    /// PageRank damping factor.
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Convergence epsilon (L1 delta between iterations).
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Hard iteration cap; on cap the best approximation is emitted, flagged.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Wall-clock budget for the convergence loop. On timeout the best
    /// current approximation is emitted rather than failing the run.
    #[serde(default = "default_max_wall_millis")]
    pub max_wall_millis: u64,

    /// Fraction of ranked accounts eligible for `is_smart` (top-percentage
    /// mode). Ignored when `smart_top_n` is set.
    #[serde(default = "default_top_fraction")]
    pub smart_top_fraction: f64,
    /// Absolute top-N mode; takes precedence over the fraction when present.
    #[serde(default)]
    pub smart_top_n: Option<usize>,

    /// Accounts younger than this are bot-risk signals.
    #[serde(default = "default_min_account_age")]
    pub min_account_age_days: i64,
    /// Following/follower ratio above this is a bot-risk signal.
    #[serde(default = "default_max_following_ratio")]
    pub max_following_ratio: f64,
    /// Bot-risk at or above this excludes an account from `is_smart`.
    #[serde(default = "default_high_risk")]
    pub high_risk_threshold: f64,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            epsilon: default_epsilon(),
            max_iterations: default_max_iterations(),
            max_wall_millis: default_max_wall_millis(),
            smart_top_fraction: default_top_fraction(),
            smart_top_n: None,
            min_account_age_days: default_min_account_age(),
            max_following_ratio: default_max_following_ratio(),
            high_risk_threshold: default_high_risk(),
        }
    }
}

/* ----------------------------
Mindshare Attention Engine
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct MindshareConfig {
    /// Additive weights over the four log1p-transformed inputs. They need not
    /// sum to 1 — the combination is a relative-ranking score, not a
    /// probability. All default 0.0.
    #[serde(default)]
    pub mention_weight: f64,
    #[serde(default)]
    pub contributor_weight: f64,
    #[serde(default)]
    pub engagement_weight: f64,
    #[serde(default)]
    pub heat_weight: f64,

    /// Bounds for each quality multiplier. Neutral (1.0/1.0) by default so no
    /// single multiplier can zero out or explode a project's score unless the
    /// operator widens the band.
    #[serde(default)]
    pub creator_organic: MultiplierBounds,
    #[serde(default)]
    pub audience_organic: MultiplierBounds,
    #[serde(default)]
    pub originality: MultiplierBounds,
    #[serde(default)]
    pub sentiment: MultiplierBounds,
    #[serde(default)]
    pub smart_boost: MultiplierBounds,
    #[serde(default)]
    pub keyword_match: MultiplierBounds,

    /// Keyword regex patterns for the keyword-match-strength multiplier.
    /// Empty list keeps the multiplier neutral.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for MindshareConfig {
    fn default() -> Self {
        Self {
            mention_weight: 0.0,
            contributor_weight: 0.0,
            engagement_weight: 0.0,
            heat_weight: 0.0,
            creator_organic: MultiplierBounds::default(),
            audience_organic: MultiplierBounds::default(),
            originality: MultiplierBounds::default(),
            sentiment: MultiplierBounds::default(),
            smart_boost: MultiplierBounds::default(),
            keyword_match: MultiplierBounds::default(),
            keywords: Vec::new(),
        }
    }
}

/// Floor/cap pair for one bounded quality multiplier.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MultiplierBounds {
    #[serde(default = "one")]
    pub floor: f64,
    #[serde(default = "one")]
    pub cap: f64,
}

impl Default for MultiplierBounds {
    fn default() -> Self {
        Self { floor: 1.0, cap: 1.0 }
    }
}

impl MultiplierBounds {
    /// Map a 0..1 strength into the configured band. Degenerate bounds
    /// (cap ≤ floor) collapse to the floor, which keeps the neutral default
    /// exactly 1.0.
    pub fn apply(&self, strength: f64) -> f64 {
        let s = strength.clamp(0.0, 1.0);
        if self.cap <= self.floor {
            return self.floor;
        }
        self.floor + s * (self.cap - self.floor)
    }
}

/* ----------------------------
Leaderboard Merge Engine
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    /// Engagement formula for auto-tracked points:
    /// `likes*like_points + replies*reply_points + retweets*retweet_points`.
    #[serde(default = "default_like_points")]
    pub like_points: u64,
    #[serde(default = "default_reply_points")]
    pub reply_points: u64,
    #[serde(default = "default_retweet_points")]
    pub retweet_points: u64,
    /// Multiplier granted to joined + follow-verified creators.
    #[serde(default = "default_joined_boost")]
    pub joined_boost: f64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            like_points: default_like_points(),
            reply_points: default_reply_points(),
            retweet_points: default_retweet_points(),
            joined_boost: default_joined_boost(),
        }
    }
}

/* ----------------------------
Scheduler
---------------------------- */

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SchedulerConfig {
    /// Daily snapshot cadence (mindshare, signal, smart followers).
    #[serde(default = "default_daily_interval")]
    pub daily_interval_secs: u64,
    /// Leaderboard merge cadence.
    #[serde(default = "default_leaderboard_interval")]
    pub leaderboard_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_interval_secs: default_daily_interval(),
            leaderboard_interval_secs: default_leaderboard_interval(),
        }
    }
}

/* ----------------------------
serde defaults
---------------------------- */

fn one() -> f64 {
    1.0
}
fn default_band_a() -> f64 {
    75.0
}
fn default_band_b() -> f64 {
    50.0
}
fn default_band_c() -> f64 {
    25.0
}
fn default_damping() -> f64 {
    0.85
}
fn default_epsilon() -> f64 {
    1e-6
}
fn default_max_iterations() -> u32 {
    // The L1 delta decays roughly like damping^k, so reaching the default
    // epsilon of 1e-6 at damping 0.85 needs on the order of 85 iterations.
    200
}
fn default_max_wall_millis() -> u64 {
    5_000
}
fn default_top_fraction() -> f64 {
    0.10
}
fn default_min_account_age() -> i64 {
    30
}
fn default_max_following_ratio() -> f64 {
    50.0
}
fn default_high_risk() -> f64 {
    0.5
}
fn default_like_points() -> u64 {
    1
}
fn default_reply_points() -> u64 {
    2
}
fn default_retweet_points() -> u64 {
    3
}
fn default_joined_boost() -> f64 {
    1.5
}
fn default_daily_interval() -> u64 {
    24 * 3600
}
fn default_leaderboard_interval() -> u64 {
    3600
}

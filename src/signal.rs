//! # Signal Score Engine
//! Pure, testable logic mapping a creator's contribution set for one
//! (creator, project, window) to a bounded composite score and trust band.
//! No I/O; all knobs come from [`SignalConfig`].
//!
//! Per-event score = engagement × recency × content-type × originality.
//! Per-creator aggregate = Σ(per-event) × authenticity × sentiment, with an
//! optional bounded join bonus, clamped to 0..100 and mapped to {A,B,C,D}.
//!
//! Empty contribution set is the defined empty case, not an error:
//! score 0, band D.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::config::SignalConfig;
use crate::model::{ContributionEvent, TrustBand, Window};

/// Creator-level facts fed in from the graph engine and the join ledger.
/// Everything optional: absence means neutral, never a crash.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorContext {
    /// Smart-follower share in 0..1 from the graph engine.
    pub smart_followers_pct: Option<f64>,
    /// Bot-risk in 0..1 from the graph engine.
    pub bot_risk: Option<f64>,
    /// Estimate-mode outputs must not sharpen or dull scores; when set the
    /// authenticity multiplier stays neutral.
    pub is_estimate: bool,
    pub is_joined: bool,
}

/// Window-level duplicate flags, parallel to the event slice they were built
/// from. Contributions whose text near-duplicates an *earlier* event in the
/// same window (same or different creator) are down-weighted, not discarded.
#[derive(Debug, Clone)]
pub struct OriginalityIndex {
    duplicate: Vec<bool>,
}

impl OriginalityIndex {
    /// Build over all events of one window, in feed order. Exact copies are
    /// caught by content fingerprint; near-copies by normalized Levenshtein
    /// similarity at or above `similarity_threshold`. A threshold of 1.0
    /// keeps only the exact-copy pass (the neutral default).
    pub fn build(events: &[ContributionEvent], similarity_threshold: f64) -> Self {
        let mut duplicate = vec![false; events.len()];
        let mut seen_fingerprints: HashMap<[u8; 32], usize> = HashMap::new();
        let mut seen_texts: Vec<String> = Vec::new();

        for (i, ev) in events.iter().enumerate() {
            let norm = normalize_for_similarity(&ev.text);
            if norm.is_empty() {
                continue;
            }
            let fp = fingerprint(&norm);
            if seen_fingerprints.contains_key(&fp) {
                duplicate[i] = true;
                continue;
            }
            if similarity_threshold < 1.0 {
                let near = seen_texts
                    .iter()
                    .any(|prev| strsim::normalized_levenshtein(prev, &norm) >= similarity_threshold);
                if near {
                    duplicate[i] = true;
                    // Remembered anyway so later exact copies of this text
                    // are still caught cheaply.
                }
            }
            seen_fingerprints.insert(fp, i);
            seen_texts.push(norm);
        }

        Self { duplicate }
    }

    pub fn is_duplicate(&self, index: usize) -> bool {
        self.duplicate.get(index).copied().unwrap_or(false)
    }

    /// Share of non-duplicate events among `indices`; 1.0 when empty.
    pub fn original_share(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 1.0;
        }
        let originals = indices.iter().filter(|&&i| !self.is_duplicate(i)).count();
        originals as f64 / indices.len() as f64
    }
}

/// Score one creator's events (given as indices into the window's event
/// slice). Returns the bounded score and its trust band.
pub fn score_creator(
    cfg: &SignalConfig,
    window: Window,
    now: DateTime<Utc>,
    events: &[ContributionEvent],
    indices: &[usize],
    originality: &OriginalityIndex,
    ctx: &CreatorContext,
) -> (f64, TrustBand) {
    if indices.is_empty() {
        return (0.0, TrustBand::D);
    }

    let half_life = cfg.half_life_for(window);
    let dup_penalty = sanitize_penalty(cfg.duplicate_penalty);

    let mut sum = 0.0f64;
    let mut sentiment_acc = 0.0f64;
    for &i in indices {
        let Some(ev) = events.get(i) else { continue };
        let engagement = ev.likes as f64 * cfg.like_weight
            + ev.replies as f64 * cfg.reply_weight
            + ev.retweets as f64 * cfg.retweet_weight;
        let recency = recency_weight(now, ev.ts, half_life);
        let content = cfg.content_weight(ev.content_type);
        let orig = if originality.is_duplicate(i) { dup_penalty } else { 1.0 };
        sum += engagement * recency * content * orig;
        sentiment_acc += ev.sentiment.value();
    }

    let authenticity = authenticity_weight(cfg, ctx);
    let sentiment = sentiment_weight(cfg, sentiment_acc / indices.len() as f64);
    let join = if ctx.is_joined { cfg.join_bonus.max(1.0) } else { 1.0 };

    let score = (sum * authenticity * sentiment * join).clamp(0.0, 100.0);
    (score, band_for(cfg, score))
}

/// Exponential decay: `2^(-age_hours / half_life)`. No configured half-life
/// means no decay. Future timestamps clamp to age 0.
pub fn recency_weight(now: DateTime<Utc>, ts: DateTime<Utc>, half_life_hours: Option<f64>) -> f64 {
    let Some(half_life) = half_life_hours else { return 1.0 };
    let age_hours = (now - ts).num_seconds().max(0) as f64 / 3600.0;
    (2.0f64).powf(-age_hours / half_life)
}

/// Map the bounded score to its band. Total and exhaustive; D is the bottom.
pub fn band_for(cfg: &SignalConfig, score: f64) -> TrustBand {
    if score >= cfg.band_a_min {
        TrustBand::A
    } else if score >= cfg.band_b_min {
        TrustBand::B
    } else if score >= cfg.band_c_min {
        TrustBand::C
    } else {
        TrustBand::D
    }
}

fn authenticity_weight(cfg: &SignalConfig, ctx: &CreatorContext) -> f64 {
    // Estimate-mode or missing graph data stays neutral (1.0), never zero.
    if ctx.is_estimate {
        return 1.0;
    }
    let (Some(pct), Some(risk)) = (ctx.smart_followers_pct, ctx.bot_risk) else {
        return 1.0;
    };
    let strength = (pct.clamp(0.0, 1.0) * (1.0 - risk.clamp(0.0, 1.0))).clamp(0.0, 1.0);
    bounded(cfg.authenticity_floor, cfg.authenticity_cap, strength)
}

fn sentiment_weight(cfg: &SignalConfig, avg_sentiment: f64) -> f64 {
    // avg in [-1, 1] → strength in [0, 1]
    let strength = ((avg_sentiment.clamp(-1.0, 1.0)) + 1.0) / 2.0;
    bounded(cfg.sentiment_floor, cfg.sentiment_cap, strength)
}

fn bounded(floor: f64, cap: f64, strength: f64) -> f64 {
    if cap <= floor {
        return floor;
    }
    floor + strength * (cap - floor)
}

/// A penalty outside (0, 1] is a misconfiguration; fall back to the neutral
/// no-op rather than discarding contributions.
fn sanitize_penalty(p: f64) -> f64 {
    if p > 0.0 && p <= 1.0 {
        p
    } else {
        1.0
    }
}

fn normalize_for_similarity(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

fn fingerprint(norm_text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(norm_text.as_bytes());
    hasher.finalize().into()
}

//! # Mindshare Attention & Normalization Engine
//! Per (window, as-of-date): turn window-scoped project inputs into a raw
//! `attention_value`, then normalize all projects' values into whole basis
//! points summing to exactly 10_000.
//!
//! The inputs are log1p-transformed before weighting so whale events cannot
//! dominate the ranking, and every quality multiplier is floor/capped by
//! configuration so no single multiplier can zero out or explode a project.
//!
//! Normalization is largest-remainder with deterministic tie-breaking by
//! identity key; a result that does not sum to 10_000 is fatal for the
//! window and must not be persisted.

use anyhow::bail;
use regex::Regex;
use tracing::warn;

use crate::config::MindshareConfig;

/// Window-scoped raw inputs for one project. Missing upstream data defaults
/// to 0 contribution for that input only, never a run failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectInputs {
    pub mention_count: u64,
    pub unique_contributors: u64,
    pub total_engagement: u64,
    /// External "community heat" metric supplied by a collaborator.
    pub community_heat: f64,
}

/// Strengths in 0..1 for the six bounded quality multipliers. `None` means
/// the signal is unavailable and the multiplier stays neutral (1.0).
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityStrengths {
    pub creator_organic: Option<f64>,
    pub audience_organic: Option<f64>,
    pub originality: Option<f64>,
    pub sentiment: Option<f64>,
    pub smart_boost: Option<f64>,
    pub keyword_match: Option<f64>,
}

/// Raw attention value: weighted sum of log1p inputs times the bounded
/// quality multipliers. Non-negative; zero qualifying activity yields 0.
pub fn attention_value(cfg: &MindshareConfig, inputs: &ProjectInputs, quality: &QualityStrengths) -> f64 {
    let base = cfg.mention_weight * log1p_u64(inputs.mention_count)
        + cfg.contributor_weight * log1p_u64(inputs.unique_contributors)
        + cfg.engagement_weight * log1p_u64(inputs.total_engagement)
        + cfg.heat_weight * inputs.community_heat.max(0.0).ln_1p();

    let multiplier = bounded_or_neutral(&cfg.creator_organic, quality.creator_organic)
        * bounded_or_neutral(&cfg.audience_organic, quality.audience_organic)
        * bounded_or_neutral(&cfg.originality, quality.originality)
        * bounded_or_neutral(&cfg.sentiment, quality.sentiment)
        * bounded_or_neutral(&cfg.smart_boost, quality.smart_boost)
        * bounded_or_neutral(&cfg.keyword_match, quality.keyword_match);

    (base * multiplier).max(0.0)
}

fn bounded_or_neutral(bounds: &crate::config::MultiplierBounds, strength: Option<f64>) -> f64 {
    match strength {
        Some(s) => bounds.apply(s),
        None => 1.0,
    }
}

fn log1p_u64(v: u64) -> f64 {
    (v as f64).ln_1p()
}

/// Normalize attention values into integer basis points summing to exactly
/// 10_000. Input order does not matter; output is sorted by identity key and
/// deterministic for a given input set.
///
/// - All-zero values: even split, remainder to the first `10000 % n` projects
///   in identity order.
/// - Otherwise: floor of each raw share, then the remainder one unit at a
///   time to the largest fractional remainders, ties by identity key.
/// - Monotone: strictly higher attention never yields fewer bps.
///
/// Errors only on an invariant violation, which callers must treat as fatal
/// for the (window, as-of-date) commit.
pub fn normalize_bps(values: &[(String, f64)]) -> anyhow::Result<Vec<(String, u32)>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }

    // Stable base order: identity key. Negative/NaN inputs count as zero.
    let mut rows: Vec<(String, f64)> = values
        .iter()
        .map(|(id, v)| {
            let v = if v.is_finite() && *v > 0.0 { *v } else { 0.0 };
            (id.clone(), v)
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let n = rows.len();
    let total: f64 = rows.iter().map(|(_, v)| v).sum();

    let out: Vec<(String, u32)> = if total <= 0.0 {
        // Absence is not silence: every project participates; distribute
        // evenly with a deterministic remainder assignment.
        let base = (10_000 / n) as u32;
        let remainder = 10_000 % n;
        rows.iter()
            .enumerate()
            .map(|(i, (id, _))| (id.clone(), base + u32::from(i < remainder)))
            .collect()
    } else {
        let mut floors: Vec<u32> = Vec::with_capacity(n);
        let mut fracs: Vec<(f64, usize)> = Vec::with_capacity(n);
        let mut assigned: u64 = 0;
        for (i, (_, v)) in rows.iter().enumerate() {
            let exact = v / total * 10_000.0;
            let floor = exact.floor() as u32;
            floors.push(floor);
            fracs.push((exact - floor as f64, i));
            assigned += floor as u64;
        }

        // Largest fractional remainder first; ties by identity key (rows are
        // already in identity order, so the index tiebreak is the key order).
        fracs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

        // Floors lose strictly less than one unit each, so the leftover is
        // always < n and assignable in one pass.
        let leftover = 10_000u64.saturating_sub(assigned) as usize;
        for (_, i) in fracs.iter().take(leftover.min(n)) {
            floors[*i] += 1;
        }

        rows.iter()
            .zip(floors)
            .map(|((id, _), bps)| (id.clone(), bps))
            .collect()
    };

    let sum: u64 = out.iter().map(|(_, b)| *b as u64).sum();
    if sum != 10_000 {
        bail!("mindshare basis points sum to {sum}, expected exactly 10000");
    }
    Ok(out)
}

/// Compiled keyword patterns for the keyword-match-strength multiplier.
#[derive(Debug, Default)]
pub struct KeywordMatcher {
    patterns: Vec<Regex>,
}

impl KeywordMatcher {
    /// Compile configured patterns; an invalid pattern is skipped with a
    /// warning rather than failing the run.
    pub fn new(patterns: &[String]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "invalid keyword pattern skipped");
                    None
                }
            })
            .collect();
        Self { patterns: compiled }
    }

    /// Share of texts matching any pattern, or `None` when no patterns are
    /// configured (multiplier stays neutral).
    pub fn strength<'a, I: IntoIterator<Item = &'a str>>(&self, texts: I) -> Option<f64> {
        if self.patterns.is_empty() {
            return None;
        }
        let mut total = 0usize;
        let mut matched = 0usize;
        for t in texts {
            total += 1;
            if self.patterns.iter().any(|re| re.is_match(t)) {
                matched += 1;
            }
        }
        if total == 0 {
            return Some(0.0);
        }
        Some(matched as f64 / total as f64)
    }
}

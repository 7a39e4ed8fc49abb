//! # Smart Followers Graph Engine
//! Builds a directed follow graph over the tracked-account universe, ranks
//! account importance with a bounded PageRank pass, flags high-importance /
//! low-bot-risk accounts as "smart", and aggregates smart-follower counts per
//! tracked entity.
//!
//! Two modes, surfaced explicitly so consumers never conflate precision
//! levels:
//! - `graph`: edges exist for the universe; full ranking pass.
//! - `estimate`: the graph is empty or ingestion failed; a coarser function
//!   of raw follower count only, every snapshot flagged `is_estimate` and
//!   downstream multipliers kept neutral.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::SmartConfig;
use crate::identity::{is_unattributable, normalize};
use crate::model::{AccountProfile, FollowEdge, SmartAccountScore, SmartFollowersSnapshot};

/// Full output of one engine run for one as-of-date.
#[derive(Debug, Clone)]
pub struct SmartRun {
    pub accounts: Vec<SmartAccountScore>,
    pub snapshots: Vec<SmartFollowersSnapshot>,
    /// False when the ranking pass hit its iteration cap or wall-clock
    /// budget; scores are then a best-effort approximation.
    pub converged: bool,
    pub is_estimate: bool,
}

/// Compute scores and per-entity aggregates for one run.
///
/// `universe` is the set of accounts enrolled for tracking (projects and
/// creators); the graph is restricted to it so the computation stays bounded
/// regardless of platform size. `entities` is the subset that needs a
/// per-entity snapshot row.
pub fn run(
    cfg: &SmartConfig,
    as_of: NaiveDate,
    universe: &[String],
    edges: &[FollowEdge],
    profiles: &[AccountProfile],
    entities: &[String],
) -> SmartRun {
    let universe: HashSet<String> = universe
        .iter()
        .map(|u| normalize(u))
        .filter(|u| !is_unattributable(u))
        .collect();

    let profile_by_id: HashMap<String, &AccountProfile> = profiles
        .iter()
        .map(|p| (normalize(&p.identity), p))
        .collect();

    // Restrict edges to the tracked universe and drop unattributable ends.
    let mut graph_edges: Vec<(String, String)> = Vec::new();
    for e in edges {
        let from = normalize(&e.follower);
        let to = normalize(&e.followee);
        if is_unattributable(&from) || is_unattributable(&to) || from == to {
            continue;
        }
        if universe.contains(&from) && universe.contains(&to) {
            graph_edges.push((from, to));
        }
    }

    if graph_edges.is_empty() {
        warn!(as_of = %as_of, "follow graph empty; falling back to audience-estimate mode");
        return estimate_run(as_of, &profile_by_id, entities);
    }

    let (importance, converged) = pagerank(cfg, &universe, &graph_edges);
    if !converged {
        warn!(
            as_of = %as_of,
            max_iterations = cfg.max_iterations,
            "importance ranking did not converge; emitting best-effort scores"
        );
    }

    // Bot-risk heuristic and smart flags over the ranked universe.
    let mut ranked: Vec<(&String, f64)> = importance.iter().map(|(k, v)| (k, *v)).collect();
    // Ties broken by identity key for determinism.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(b.0)));

    let top_len = match cfg.smart_top_n {
        Some(n) => n.min(ranked.len()),
        None => ((ranked.len() as f64) * cfg.smart_top_fraction.clamp(0.0, 1.0)).ceil() as usize,
    };
    let top_ids: HashSet<&String> = ranked.iter().take(top_len).map(|(id, _)| *id).collect();

    let mut smart_ids: HashSet<String> = HashSet::new();
    let mut accounts = Vec::with_capacity(ranked.len());
    for (id, score) in &ranked {
        let (bot_risk, age_days) = bot_risk_for(cfg, as_of, profile_by_id.get(id.as_str()).copied());
        let is_smart = top_ids.contains(id) && bot_risk < cfg.high_risk_threshold;
        if is_smart {
            smart_ids.insert((*id).clone());
        }
        accounts.push(SmartAccountScore {
            identity: (*id).clone(),
            as_of,
            importance: *score,
            bot_risk,
            is_smart,
            account_age_days: age_days,
        });
    }

    // Per-entity aggregates from in-edges of the restricted graph.
    let mut followers_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in &graph_edges {
        followers_of.entry(to.as_str()).or_default().push(from.as_str());
    }

    let mut snapshots = Vec::with_capacity(entities.len());
    for entity in entities {
        let key = normalize(entity);
        if is_unattributable(&key) {
            continue;
        }
        let followers = followers_of.get(key.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let total = followers.len() as u64;
        let smart = followers.iter().filter(|f| smart_ids.contains(**f)).count() as u64;
        let pct = if total == 0 { 0.0 } else { smart as f64 / total as f64 };
        snapshots.push(SmartFollowersSnapshot {
            entity: key,
            as_of,
            smart_followers_count: smart,
            total_followers: total,
            smart_followers_pct: pct,
            is_estimate: false,
        });
    }

    info!(
        as_of = %as_of,
        accounts = accounts.len(),
        smart = smart_ids.len(),
        entities = snapshots.len(),
        converged,
        "smart followers graph run complete"
    );

    SmartRun { accounts, snapshots, converged, is_estimate: false }
}

/// Iterative importance ranking: redistribute each node's score across its
/// outgoing edges plus a damping reset term, dangling mass spread evenly.
/// Bounded by both the iteration cap and the wall-clock budget; callers can
/// distinguish a converged result from a capped approximation.
///
/// Scores are normalized so the highest-ranked account is 1.0.
pub fn pagerank(
    cfg: &SmartConfig,
    universe: &HashSet<String>,
    edges: &[(String, String)],
) -> (HashMap<String, f64>, bool) {
    let nodes: Vec<&String> = {
        let mut v: Vec<&String> = universe.iter().collect();
        v.sort(); // stable node order -> deterministic float accumulation
        v
    };
    let n = nodes.len();
    if n == 0 {
        return (HashMap::new(), true);
    }
    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();

    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (from, to) in edges {
        if let (Some(&f), Some(&t)) = (index.get(from.as_str()), index.get(to.as_str())) {
            out_edges[f].push(t);
        }
    }
    for targets in &mut out_edges {
        targets.sort_unstable();
    }

    let damping = cfg.damping.clamp(0.0, 1.0);
    let reset = (1.0 - damping) / n as f64;
    let deadline = Instant::now() + Duration::from_millis(cfg.max_wall_millis.max(1));

    let mut rank = vec![1.0 / n as f64; n];
    let mut converged = false;

    for _ in 0..cfg.max_iterations {
        let mut next = vec![reset; n];
        let mut dangling_mass = 0.0;
        for (i, targets) in out_edges.iter().enumerate() {
            if targets.is_empty() {
                dangling_mass += rank[i];
                continue;
            }
            let share = damping * rank[i] / targets.len() as f64;
            for &t in targets {
                next[t] += share;
            }
        }
        // Dangling nodes donate their mass evenly so the pass terminates
        // with a proper distribution.
        let dangling_share = damping * dangling_mass / n as f64;
        for v in &mut next {
            *v += dangling_share;
        }

        let delta: f64 = rank.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < cfg.epsilon {
            converged = true;
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    let max = rank.iter().cloned().fold(0.0f64, f64::max);
    let scores = nodes
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let s = if max > 0.0 { rank[i] / max } else { 0.0 };
            ((*id).clone(), s)
        })
        .collect();
    (scores, converged)
}

/// Bot-risk in 0..1 from configured signals. A missing profile contributes
/// nothing (risk 0, unknown age) — missing input is never an error.
fn bot_risk_for(cfg: &SmartConfig, as_of: NaiveDate, profile: Option<&AccountProfile>) -> (f64, i64) {
    let Some(p) = profile else { return (0.0, 0) };
    let age_days = (as_of - p.created_at.date_naive()).num_days().max(0);

    let mut risk = 0.0f64;
    if age_days < cfg.min_account_age_days {
        risk += 0.5;
    }
    let ratio = if p.follower_count == 0 {
        p.following_count as f64
    } else {
        p.following_count as f64 / p.follower_count as f64
    };
    if ratio > cfg.max_following_ratio {
        risk += 0.5;
    }
    (risk.clamp(0.0, 1.0), age_days)
}

/// Audience-estimate fallback: precision-marked snapshots derived from raw
/// follower counts only (square-root scale keeps large audiences from
/// dominating). No per-account scores are emitted in this mode.
fn estimate_run(
    as_of: NaiveDate,
    profiles: &HashMap<String, &AccountProfile>,
    entities: &[String],
) -> SmartRun {
    let mut snapshots = Vec::with_capacity(entities.len());
    for entity in entities {
        let key = normalize(entity);
        if is_unattributable(&key) {
            continue;
        }
        let total = profiles.get(&key).map(|p| p.follower_count).unwrap_or(0);
        let est = (total as f64).sqrt().floor() as u64;
        let pct = if total == 0 { 0.0 } else { est as f64 / total as f64 };
        snapshots.push(SmartFollowersSnapshot {
            entity: key,
            as_of,
            smart_followers_count: est,
            total_followers: total,
            smart_followers_pct: pct,
            is_estimate: true,
        });
    }
    SmartRun { accounts: Vec::new(), snapshots, converged: true, is_estimate: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn cfg() -> SmartConfig {
        SmartConfig { smart_top_fraction: 0.5, ..SmartConfig::default() }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn edge(from: &str, to: &str) -> FollowEdge {
        FollowEdge {
            follower: from.into(),
            followee: to.into(),
            first_seen: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn profile(id: &str, followers: u64, following: u64, age_days: i64) -> AccountProfile {
        AccountProfile {
            identity: id.into(),
            follower_count: followers,
            following_count: following,
            created_at: Utc
                .from_utc_datetime(&(date() - chrono::Duration::days(age_days)).and_hms_opt(0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn zero_edges_falls_back_to_estimate_mode() {
        let universe = vec!["alice".to_string(), "proj".to_string()];
        let profiles = vec![profile("proj", 100, 10, 400)];
        let out = run(&cfg(), date(), &universe, &[], &profiles, &["proj".to_string()]);
        assert!(out.is_estimate);
        assert!(out.accounts.is_empty());
        let snap = &out.snapshots[0];
        assert!(snap.is_estimate);
        assert_eq!(snap.total_followers, 100);
        assert_eq!(snap.smart_followers_count, 10); // sqrt(100)
    }

    #[test]
    fn estimate_pct_is_zero_on_zero_followers() {
        let out = run(&cfg(), date(), &["ghost".to_string()], &[], &[], &["ghost".to_string()]);
        assert_eq!(out.snapshots[0].smart_followers_pct, 0.0);
        assert_eq!(out.snapshots[0].total_followers, 0);
    }

    #[test]
    fn pagerank_ranks_the_followed_account_highest() {
        let universe: HashSet<String> =
            ["a", "b", "c", "hub"].iter().map(|s| s.to_string()).collect();
        let edges = vec![
            ("a".to_string(), "hub".to_string()),
            ("b".to_string(), "hub".to_string()),
            ("c".to_string(), "hub".to_string()),
            ("hub".to_string(), "a".to_string()),
        ];
        let (scores, converged) = pagerank(&SmartConfig::default(), &universe, &edges);
        assert!(converged);
        assert!((scores["hub"] - 1.0).abs() < 1e-9, "top score normalizes to 1.0");
        assert!(scores["hub"] > scores["a"]);
        assert!(scores["a"] > scores["b"]); // hub endorses a
    }

    #[test]
    fn iteration_cap_yields_flagged_approximation() {
        let capped = SmartConfig { max_iterations: 1, epsilon: 0.0, ..SmartConfig::default() };
        let universe: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "a".to_string())];
        let (scores, converged) = pagerank(&capped, &universe, &edges);
        assert!(!converged);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn high_bot_risk_excluded_from_smart() {
        let universe: Vec<String> =
            ["bot", "human", "proj"].iter().map(|s| s.to_string()).collect();
        let edges = vec![edge("bot", "proj"), edge("human", "proj")];
        // bot: fresh account with extreme following ratio -> risk 1.0
        let profiles = vec![profile("bot", 1, 500, 2), profile("human", 300, 200, 900)];
        let out = run(
            &SmartConfig { smart_top_fraction: 1.0, ..SmartConfig::default() },
            date(),
            &universe,
            &edges,
            &profiles,
            &["proj".to_string()],
        );
        let by_id: HashMap<&str, &SmartAccountScore> =
            out.accounts.iter().map(|a| (a.identity.as_str(), a)).collect();
        assert!(!by_id["bot"].is_smart);
        assert!(by_id["bot"].bot_risk >= 0.5);
        assert!(by_id["human"].is_smart);
        let snap = &out.snapshots[0];
        assert_eq!(snap.total_followers, 2);
        assert_eq!(snap.smart_followers_count, 1);
        assert!((snap.smart_followers_pct - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bot_risk_stays_in_unit_range() {
        let c = SmartConfig::default();
        // Both signals firing must clamp to 1.0, not stack beyond it.
        let worst = profile("w", 0, 1_000, 1);
        let (risk, age) = bot_risk_for(&c, date(), Some(&worst));
        assert_eq!(risk, 1.0);
        assert_eq!(age, 1);
        // Missing profile contributes nothing.
        assert_eq!(bot_risk_for(&c, date(), None), (0.0, 0));
    }

    #[test]
    fn edges_outside_universe_are_ignored() {
        let universe: Vec<String> = ["a", "proj"].iter().map(|s| s.to_string()).collect();
        let edges = vec![edge("a", "proj"), edge("stranger", "proj")];
        let out = run(&cfg(), date(), &universe, &edges, &[], &["proj".to_string()]);
        assert!(!out.is_estimate);
        assert_eq!(out.snapshots[0].total_followers, 1);
    }

    #[test]
    fn handles_are_normalized_before_matching() {
        let universe: Vec<String> = ["@Alice", "Proj"].iter().map(|s| s.to_string()).collect();
        let edges = vec![edge("alice", "@proj")];
        let out = run(&cfg(), date(), &universe, &edges, &[], &["proj".to_string()]);
        assert_eq!(out.snapshots[0].total_followers, 1);
    }
}

//! # Leaderboard Merge Engine
//! Reconciles auto-detected participants (creators seen via mentions) with
//! explicitly joined participants into one ranked list per project.
//!
//! Identity collision is resolved by the shared normalizer: a creator present
//! in both sources gets exactly one merged row with summed base points and
//! `is_joined = true`. The join/verification multiplier applies only when the
//! creator both joined and verified the follow. Output is read-only ranking
//! data — never a permission grant.

use std::collections::HashMap;

use crate::config::LeaderboardConfig;
use crate::identity::{is_unattributable, normalize};
use crate::model::{ContributionEvent, JoinRecord, LeaderboardEntry};

/// Sum the engagement formula over all non-official mentions of `project`,
/// keyed by normalized actor identity. Official posts and unattributable
/// actors are skipped.
pub fn auto_points(
    cfg: &LeaderboardConfig,
    project: &str,
    events: &[ContributionEvent],
) -> HashMap<String, u64> {
    let project_key = normalize(project);
    let mut points: HashMap<String, u64> = HashMap::new();
    for ev in events {
        if ev.is_official || normalize(&ev.project) != project_key {
            continue;
        }
        let actor = normalize(&ev.actor);
        if is_unattributable(&actor) {
            continue;
        }
        let p = ev.likes * cfg.like_points
            + ev.replies * cfg.reply_points
            + ev.retweets * cfg.retweet_points;
        *points.entry(actor).or_insert(0) += p;
    }
    points
}

/// Merge auto-tracked and joined point sets into the final ranked list.
///
/// Ranking: `score = floor(base_points * multiplier)` descending, ties broken
/// by identity key for determinism. An identity whose merged base points are
/// zero is excluded entirely, whichever source it came from — a zero row
/// carries no information.
pub fn merge(
    cfg: &LeaderboardConfig,
    project: &str,
    auto: &HashMap<String, u64>,
    joins: &[JoinRecord],
) -> Vec<LeaderboardEntry> {
    let project_key = normalize(project);

    struct Joined {
        points: u64,
        follow_verified: bool,
    }
    let mut joined: HashMap<String, Joined> = HashMap::new();
    for j in joins {
        if normalize(&j.project) != project_key {
            continue;
        }
        let id = normalize(&j.identity);
        if is_unattributable(&id) {
            continue;
        }
        let entry = joined.entry(id).or_insert(Joined { points: 0, follow_verified: false });
        entry.points += j.points;
        entry.follow_verified |= j.follow_verified;
    }

    let mut out: Vec<LeaderboardEntry> = Vec::with_capacity(auto.len() + joined.len());

    for (id, &auto_pts) in auto {
        if is_unattributable(id) {
            continue;
        }
        match joined.remove(id) {
            Some(j) => {
                if auto_pts + j.points == 0 {
                    continue;
                }
                out.push(build_entry(
                    cfg,
                    &project_key,
                    id,
                    auto_pts + j.points,
                    true,
                    true,
                    j.follow_verified,
                ));
            }
            None => {
                if auto_pts == 0 {
                    continue;
                }
                out.push(build_entry(cfg, &project_key, id, auto_pts, false, true, false));
            }
        }
    }
    // Remaining joined-only identities; the zero-point rule applies here too.
    for (id, j) in joined {
        if j.points == 0 {
            continue;
        }
        out.push(build_entry(cfg, &project_key, &id, j.points, true, false, j.follow_verified));
    }

    out.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.identity.cmp(&b.identity)));
    out
}

fn build_entry(
    cfg: &LeaderboardConfig,
    project: &str,
    identity: &str,
    base_points: u64,
    is_joined: bool,
    is_auto_tracked: bool,
    follow_verified: bool,
) -> LeaderboardEntry {
    let multiplier = if is_joined && follow_verified { cfg.joined_boost.max(1.0) } else { 1.0 };
    let score = (base_points as f64 * multiplier).floor() as u64;
    LeaderboardEntry {
        identity: identity.to_string(),
        project: project.to_string(),
        base_points,
        multiplier,
        score,
        is_joined,
        is_auto_tracked,
        follow_verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentType, SentimentLabel};
    use chrono::{TimeZone, Utc};

    fn cfg() -> LeaderboardConfig {
        LeaderboardConfig::default() // 1 / 2 / 3 points, 1.5 boost
    }

    fn mention(actor: &str, likes: u64, replies: u64, retweets: u64, official: bool) -> ContributionEvent {
        ContributionEvent {
            actor: actor.into(),
            project: "arena".into(),
            ts: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            content_type: ContentType::Original,
            likes,
            replies,
            retweets,
            sentiment: SentimentLabel::Neutral,
            is_official: official,
            text: "mention".into(),
        }
    }

    fn join(identity: &str, points: u64, verified: bool) -> JoinRecord {
        JoinRecord { identity: identity.into(), project: "arena".into(), points, follow_verified: verified }
    }

    #[test]
    fn auto_points_use_engagement_formula_and_skip_official() {
        let events = vec![
            mention("@Alice", 10, 5, 2, false), // 10 + 10 + 6 = 26
            mention("alice", 1, 0, 0, false),   // merged by normalizer: +1
            mention("arena", 100, 100, 100, true),
        ];
        let pts = auto_points(&cfg(), "arena", &events);
        assert_eq!(pts.get("alice"), Some(&27));
        assert!(!pts.contains_key("arena"));
    }

    #[test]
    fn identity_in_both_sources_appears_once_with_summed_points() {
        let auto = HashMap::from([("alice".to_string(), 100u64)]);
        let joins = vec![join("@Alice", 40, false)];
        let rows = merge(&cfg(), "arena", &auto, &joins);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.base_points, 140);
        assert!(r.is_joined);
        assert!(r.is_auto_tracked);
        assert_eq!(r.multiplier, 1.0, "unverified follow gets no boost");
        assert_eq!(r.score, 140);
    }

    #[test]
    fn boost_requires_joined_and_verified() {
        let auto = HashMap::from([("alice".to_string(), 100u64)]);
        let rows = merge(&cfg(), "arena", &auto, &[join("alice", 0, true)]);
        assert_eq!(rows[0].multiplier, 1.5);
        assert_eq!(rows[0].score, 150);

        // follow_verified=false => multiplier 1.0 regardless of is_joined
        let rows = merge(&cfg(), "arena", &auto, &[join("alice", 0, false)]);
        assert_eq!(rows[0].multiplier, 1.0);

        // auto-only, never a boost
        let rows = merge(&cfg(), "arena", &auto, &[]);
        assert_eq!(rows[0].multiplier, 1.0);
        assert!(!rows[0].is_joined);
    }

    #[test]
    fn score_floors_after_multiplier() {
        let auto = HashMap::from([("alice".to_string(), 101u64)]);
        let rows = merge(&cfg(), "arena", &auto, &[join("alice", 0, true)]);
        // 101 * 1.5 = 151.5 -> 151
        assert_eq!(rows[0].score, 151);
    }

    #[test]
    fn zero_point_auto_only_rows_are_excluded() {
        let auto = HashMap::from([("ghost".to_string(), 0u64), ("alice".to_string(), 5u64)]);
        let rows = merge(&cfg(), "arena", &auto, &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identity, "alice");
    }

    #[test]
    fn zero_contribution_identities_are_excluded_from_every_source() {
        // Joined with no points and no mentions: no row, not a zero row.
        let rows = merge(&cfg(), "arena", &HashMap::new(), &[join("ghost", 0, true)]);
        assert!(rows.is_empty());

        // Present in both sources but summing to zero: still excluded.
        let auto = HashMap::from([("ghost".to_string(), 0u64)]);
        let rows = merge(&cfg(), "arena", &auto, &[join("ghost", 0, true)]);
        assert!(rows.is_empty());
    }

    #[test]
    fn joined_only_identity_keeps_its_row() {
        let rows = merge(&cfg(), "arena", &HashMap::new(), &[join("bob", 30, true)]);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_joined);
        assert!(!rows[0].is_auto_tracked);
        assert_eq!(rows[0].score, 45);
    }

    #[test]
    fn ranking_is_deterministic_on_ties() {
        let auto = HashMap::from([
            ("zed".to_string(), 50u64),
            ("amy".to_string(), 50u64),
            ("mia".to_string(), 80u64),
        ]);
        let rows = merge(&cfg(), "arena", &auto, &[]);
        let ids: Vec<&str> = rows.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(ids, vec!["mia", "amy", "zed"]);
    }

    #[test]
    fn joins_for_other_projects_are_ignored() {
        let other = JoinRecord {
            identity: "alice".into(),
            project: "different".into(),
            points: 999,
            follow_verified: true,
        };
        let rows = merge(&cfg(), "arena", &HashMap::new(), &[other]);
        assert!(rows.is_empty());
    }
}

//! # Snapshot Store
//! Upsert-by-natural-key persistence for every pipeline output. Each write is
//! an idempotent replace keyed by the row's natural identity, which makes
//! re-runs safe (last-write-wins) and rollback trivial (delete-and-recompute).
//! History is preserved by the `as_of` key, never by soft-delete.
//!
//! Deltas (1d/7d/30d) are plain row lookups against earlier dates, not
//! recomputation.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{
    LeaderboardEntry, MindshareSnapshot, SignalScoreResult, SmartAccountScore,
    SmartFollowersSnapshot, Window,
};

type MindshareKey = (String, Window, NaiveDate);
type SignalKey = (String, String, Window, NaiveDate);
type SmartAccountKey = (String, NaiveDate);
type SmartSnapshotKey = (String, NaiveDate);

#[derive(Default)]
pub struct SnapshotStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    mindshare: HashMap<MindshareKey, MindshareSnapshot>,
    signal: HashMap<SignalKey, SignalScoreResult>,
    smart_accounts: HashMap<SmartAccountKey, SmartAccountScore>,
    smart_snapshots: HashMap<SmartSnapshotKey, SmartFollowersSnapshot>,
    /// Leaderboards are whole-list replaces per project: the merge engine is
    /// the single writer and its output is only meaningful as a complete set.
    leaderboards: HashMap<String, Vec<LeaderboardEntry>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /* ---- mindshare ---- */

    /// Upsert one full window run. Caller must only pass a set that already
    /// satisfies the 10_000-bps invariant; partially computed windows are
    /// never handed to the store.
    pub fn upsert_mindshare(&self, rows: Vec<MindshareSnapshot>) {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        for row in rows {
            let key = (row.project.clone(), row.window, row.as_of);
            t.mindshare.insert(key, row);
        }
    }

    /// All rows for (window, as_of), sorted by bps descending then identity.
    pub fn mindshare_for(&self, window: Window, as_of: NaiveDate) -> Vec<MindshareSnapshot> {
        let t = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<MindshareSnapshot> = t
            .mindshare
            .values()
            .filter(|r| r.window == window && r.as_of == as_of)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.mindshare_bps.cmp(&a.mindshare_bps).then_with(|| a.project.cmp(&b.project)));
        rows
    }

    /// Latest as-of-date with any row for this window.
    pub fn latest_mindshare_date(&self, window: Window) -> Option<NaiveDate> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.mindshare.keys().filter(|(_, w, _)| *w == window).map(|(_, _, d)| *d).max()
    }

    pub fn mindshare_bps(&self, project: &str, window: Window, as_of: NaiveDate) -> Option<u32> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.mindshare.get(&(project.to_string(), window, as_of)).map(|r| r.mindshare_bps)
    }

    /* ---- signal scores ---- */

    pub fn upsert_signal(&self, rows: Vec<SignalScoreResult>) {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        for row in rows {
            let key = (row.creator.clone(), row.project.clone(), row.window, row.as_of);
            t.signal.insert(key, row);
        }
    }

    /// Latest result for (creator, project, window) by as-of-date.
    pub fn signal_for(&self, creator: &str, project: &str, window: Window) -> Option<SignalScoreResult> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.signal
            .values()
            .filter(|r| r.creator == creator && r.project == project && r.window == window)
            .max_by_key(|r| r.as_of)
            .cloned()
    }

    /* ---- smart followers ---- */

    pub fn upsert_smart_accounts(&self, rows: Vec<SmartAccountScore>) {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        for row in rows {
            t.smart_accounts.insert((row.identity.clone(), row.as_of), row);
        }
    }

    pub fn smart_account(&self, identity: &str, as_of: NaiveDate) -> Option<SmartAccountScore> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.smart_accounts.get(&(identity.to_string(), as_of)).cloned()
    }

    /// Latest account score on or before `as_of`.
    pub fn latest_smart_account(&self, identity: &str, as_of: NaiveDate) -> Option<SmartAccountScore> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.smart_accounts
            .values()
            .filter(|r| r.identity == identity && r.as_of <= as_of)
            .max_by_key(|r| r.as_of)
            .cloned()
    }

    pub fn upsert_smart_snapshots(&self, rows: Vec<SmartFollowersSnapshot>) {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        for row in rows {
            t.smart_snapshots.insert((row.entity.clone(), row.as_of), row);
        }
    }

    pub fn smart_snapshot(&self, entity: &str, as_of: NaiveDate) -> Option<SmartFollowersSnapshot> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.smart_snapshots.get(&(entity.to_string(), as_of)).cloned()
    }

    /// Latest snapshot for an entity, newest as-of-date first.
    pub fn latest_smart_snapshot(&self, entity: &str) -> Option<SmartFollowersSnapshot> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.smart_snapshots
            .values()
            .filter(|r| r.entity == entity)
            .max_by_key(|r| r.as_of)
            .cloned()
    }

    /// Count delta against the snapshot `days` earlier; `None` when the
    /// earlier row does not exist (a gap, not a zero).
    pub fn smart_delta(&self, entity: &str, as_of: NaiveDate, days: i64) -> Option<i64> {
        let earlier = as_of - chrono::Duration::days(days);
        let t = self.inner.lock().expect("store mutex poisoned");
        let now = t.smart_snapshots.get(&(entity.to_string(), as_of))?;
        let then = t.smart_snapshots.get(&(entity.to_string(), earlier))?;
        Some(now.smart_followers_count as i64 - then.smart_followers_count as i64)
    }

    /* ---- leaderboards ---- */

    pub fn replace_leaderboard(&self, project: &str, rows: Vec<LeaderboardEntry>) {
        let mut t = self.inner.lock().expect("store mutex poisoned");
        t.leaderboards.insert(project.to_string(), rows);
    }

    pub fn leaderboard_for(&self, project: &str) -> Vec<LeaderboardEntry> {
        let t = self.inner.lock().expect("store mutex poisoned");
        t.leaderboards.get(project).cloned().unwrap_or_default()
    }
}

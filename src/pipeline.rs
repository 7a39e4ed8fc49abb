//! # Pipeline Orchestration
//! Independent, idempotent batch jobs over the engines: the daily snapshot
//! run (smart followers → signal scores → mindshare per window) and the
//! hourly leaderboard merge. All state crossing runs lives in the snapshot
//! store; nothing is held in memory between runs.
//!
//! Within one (window, as-of-date) run, per-project attention values are
//! computed concurrently (fan-out), then normalized once all are ready —
//! normalization is a single-threaded barrier so the sum-to-10000 invariant
//! holds over the complete set. All three upstream outputs checkpoint
//! against the same as-of-date, so the mindshare pass never mixes
//! computation runs from different dates.
//!
//! A failed window aborts only that window's commit; re-running after a
//! cancellation converges to the same final state because every write is an
//! upsert by natural key.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{SchedulerConfig, ScoringConfig};
use crate::feed::{window_bounds, ActivityFeed};
use crate::identity::{is_unattributable, normalize};
use crate::leaderboard;
use crate::mindshare::{self, KeywordMatcher, ProjectInputs, QualityStrengths};
use crate::model::{ContributionEvent, MindshareSnapshot, SignalScoreResult, Window};
use crate::signal::{self, CreatorContext, OriginalityIndex};
use crate::smart;
use crate::store::SnapshotStore;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed daily pipeline runs.");
        describe_counter!(
            "pipeline_window_aborts_total",
            "Window commits aborted by a normalization invariant failure or unreachable feed."
        );
        describe_counter!("leaderboard_merges_total", "Completed leaderboard merge runs.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the daily pipeline last ran.");
        describe_gauge!(
            "smart_graph_converged",
            "1 when the last importance-ranking pass converged, 0 when capped."
        );
        describe_gauge!("pipeline_daily_interval_secs", "Configured daily pipeline cadence.");
    });
}

/// Summary of one completed window run.
#[derive(Debug, Clone)]
pub struct WindowRunSummary {
    pub window: Window,
    pub as_of: NaiveDate,
    pub projects: usize,
    pub creators_scored: usize,
}

pub struct Pipeline {
    cfg: Arc<ScoringConfig>,
    feed: Arc<dyn ActivityFeed>,
    store: Arc<SnapshotStore>,
}

impl Pipeline {
    pub fn new(cfg: Arc<ScoringConfig>, feed: Arc<dyn ActivityFeed>, store: Arc<SnapshotStore>) -> Self {
        ensure_metrics_described();
        gauge!("pipeline_daily_interval_secs").set(cfg.scheduler.daily_interval_secs as f64);
        Self { cfg, feed, store }
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Full daily run for one as-of-date: smart-follower pass first, then
    /// every window, then the leaderboard merge — all checkpointed against
    /// the same date. A failing window is logged and skipped; the remaining
    /// windows still commit.
    pub async fn run_day(&self, as_of: NaiveDate) -> anyhow::Result<Vec<WindowRunSummary>> {
        self.run_smart_followers(as_of).await?;

        let mut summaries = Vec::new();
        for window in Window::ALL {
            match self.run_window(window, as_of).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    counter!("pipeline_window_aborts_total").increment(1);
                    warn!(window = window.as_str(), as_of = %as_of, error = ?e, "window commit aborted");
                }
            }
        }

        self.run_leaderboards(as_of).await?;

        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        info!(as_of = %as_of, windows = summaries.len(), "daily pipeline run complete");
        Ok(summaries)
    }

    /// Smart Followers graph pass for one date. Falls back to estimate mode
    /// on an empty/unreachable graph; never fails the day for it.
    pub async fn run_smart_followers(&self, as_of: NaiveDate) -> anyhow::Result<()> {
        let universe = self.feed.tracked_accounts().await.context("fetching tracked accounts")?;
        let edges = match self.feed.follow_edges().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = ?e, "follow-edge feed unreachable; estimate mode");
                Vec::new()
            }
        };
        let profiles = self.feed.account_profiles().await.unwrap_or_else(|e| {
            warn!(error = ?e, "account-profile feed unreachable; proceeding without profiles");
            Vec::new()
        });

        let run = smart::run(&self.cfg.smart, as_of, &universe, &edges, &profiles, &universe);
        gauge!("smart_graph_converged").set(if run.converged { 1.0 } else { 0.0 });
        self.store.upsert_smart_accounts(run.accounts);
        self.store.upsert_smart_snapshots(run.snapshots);
        Ok(())
    }

    /// One (window, as-of-date) run: signal scores for every contributing
    /// creator, then per-project attention fan-out, then the normalization
    /// barrier and a single atomic upsert. Errors here mean nothing was
    /// persisted for this window's mindshare — the consumer sees "no
    /// snapshot", never an inconsistent one.
    pub async fn run_window(&self, window: Window, as_of: NaiveDate) -> anyhow::Result<WindowRunSummary> {
        let projects = self.feed.tracked_projects().await.context("fetching tracked projects")?;
        let events = Arc::new(
            self.feed
                .contributions(window, as_of)
                .await
                .context("fetching window contributions")?,
        );
        // Softer inputs default rather than abort: a missing metric is a
        // zero contribution, not a run failure.
        let heat = self.feed.community_heat(as_of).await.unwrap_or_else(|e| {
            warn!(error = ?e, "community-heat feed unreachable; defaulting to 0");
            HashMap::new()
        });
        let joins = self.feed.join_ledger().await.unwrap_or_else(|e| {
            warn!(error = ?e, "join ledger unreachable; defaulting to empty");
            Vec::new()
        });

        let joined_pairs: HashSet<(String, String)> = joins
            .iter()
            .map(|j| (normalize(&j.project), normalize(&j.identity)))
            .collect();

        let originality = Arc::new(OriginalityIndex::build(
            &events,
            self.cfg.signal.duplicate_similarity_threshold,
        ));
        let matcher = Arc::new(KeywordMatcher::new(&self.cfg.mindshare.keywords));

        // Deterministic "now": the window's end instant, so a re-run for the
        // same as-of-date reproduces identical recency weights.
        let (_, now) = window_bounds(window, as_of);

        // Partition event indices by normalized project key.
        let mut by_project: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, ev) in events.iter().enumerate() {
            let key = normalize(&ev.project);
            if !is_unattributable(&key) {
                by_project.entry(key).or_default().push(i);
            }
        }

        // Creator contexts come from this date's smart checkpoint only.
        let mut creator_ctx: HashMap<String, CreatorContext> = HashMap::new();
        for ev in events.iter() {
            let actor = normalize(&ev.actor);
            if is_unattributable(&actor) || creator_ctx.contains_key(&actor) {
                continue;
            }
            let snap = self.store.smart_snapshot(&actor, as_of);
            let account = self.store.smart_account(&actor, as_of);
            let ctx = CreatorContext {
                smart_followers_pct: snap.as_ref().filter(|s| !s.is_estimate).map(|s| s.smart_followers_pct),
                bot_risk: account.as_ref().map(|a| a.bot_risk),
                is_estimate: snap.as_ref().map(|s| s.is_estimate).unwrap_or(false),
                is_joined: false, // filled per project below
            };
            creator_ctx.insert(actor, ctx);
        }

        // Fan-out: one task per tracked project. No project's attention
        // depends on another's until the normalization barrier.
        let mut handles: Vec<JoinHandle<(String, f64, Vec<SignalScoreResult>)>> = Vec::new();
        for project in &projects {
            let project_key = normalize(&project.identity);
            if is_unattributable(&project_key) {
                continue;
            }
            let indices = by_project.remove(&project_key).unwrap_or_default();
            let project_heat = heat.get(&project_key).copied().unwrap_or(0.0);
            let project_smart = self
                .store
                .smart_snapshot(&project_key, as_of)
                .filter(|s| !s.is_estimate)
                .map(|s| s.smart_followers_pct);

            let cfg = Arc::clone(&self.cfg);
            let events = Arc::clone(&events);
            let originality = Arc::clone(&originality);
            let matcher = Arc::clone(&matcher);
            let creator_ctx = creator_ctx.clone();
            let joined_pairs = joined_pairs.clone();

            handles.push(tokio::spawn(async move {
                compute_project(
                    &cfg,
                    window,
                    as_of,
                    now,
                    project_key,
                    indices,
                    &events,
                    &originality,
                    &matcher,
                    &creator_ctx,
                    &joined_pairs,
                    project_heat,
                    project_smart,
                )
            }));
        }

        let mut attention: Vec<(String, f64)> = Vec::with_capacity(handles.len());
        let mut signal_rows: Vec<SignalScoreResult> = Vec::new();
        for handle in handles {
            let (project, value, rows) = handle.await.context("project attention task panicked")?;
            attention.push((project, value));
            signal_rows.extend(rows);
        }
        let creators_scored = signal_rows.len();
        // Signal results are an upstream output in their own right; they
        // commit independently of the mindshare invariant below.
        self.store.upsert_signal(signal_rows);

        // Normalization barrier. An invariant failure here is fatal for the
        // window: nothing is upserted.
        let bps = mindshare::normalize_bps(&attention)
            .with_context(|| format!("normalizing window {} for {}", window.as_str(), as_of))?;

        let by_key: HashMap<&str, f64> = attention.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let rows: Vec<MindshareSnapshot> = bps
            .into_iter()
            .map(|(project, mindshare_bps)| MindshareSnapshot {
                attention_value: by_key.get(project.as_str()).copied().unwrap_or(0.0),
                project,
                window,
                as_of,
                mindshare_bps,
            })
            .collect();
        let projects_count = rows.len();
        self.store.upsert_mindshare(rows);

        info!(
            window = window.as_str(),
            as_of = %as_of,
            projects = projects_count,
            creators_scored,
            "window run committed"
        );
        Ok(WindowRunSummary { window, as_of, projects: projects_count, creators_scored })
    }

    /// Leaderboard merge for every tracked project. The arena's active
    /// period is the 30d window ending at `as_of`.
    pub async fn run_leaderboards(&self, as_of: NaiveDate) -> anyhow::Result<()> {
        let projects = self.feed.tracked_projects().await.context("fetching tracked projects")?;
        let events = self
            .feed
            .contributions(Window::D30, as_of)
            .await
            .context("fetching active-period contributions")?;
        let joins = self.feed.join_ledger().await.unwrap_or_else(|e| {
            warn!(error = ?e, "join ledger unreachable; merging auto-tracked only");
            Vec::new()
        });

        for project in &projects {
            let key = normalize(&project.identity);
            if is_unattributable(&key) {
                continue;
            }
            let auto = leaderboard::auto_points(&self.cfg.leaderboard, &key, &events);
            let rows = leaderboard::merge(&self.cfg.leaderboard, &key, &auto, &joins);
            self.store.replace_leaderboard(&key, rows);
        }
        counter!("leaderboard_merges_total").increment(1);
        Ok(())
    }
}

/// Per-project attention computation, run inside the fan-out task. Pure with
/// respect to its inputs; returns the project's raw attention value plus the
/// signal-score rows for its contributing creators.
#[allow(clippy::too_many_arguments)]
fn compute_project(
    cfg: &ScoringConfig,
    window: Window,
    as_of: NaiveDate,
    now: chrono::DateTime<Utc>,
    project_key: String,
    indices: Vec<usize>,
    events: &[ContributionEvent],
    originality: &OriginalityIndex,
    matcher: &KeywordMatcher,
    creator_ctx: &HashMap<String, CreatorContext>,
    joined_pairs: &HashSet<(String, String)>,
    community_heat: f64,
    project_smart_pct: Option<f64>,
) -> (String, f64, Vec<SignalScoreResult>) {
    // Group this project's events by creator.
    let mut by_creator: HashMap<String, Vec<usize>> = HashMap::new();
    let mut total_engagement = 0u64;
    let mut sentiment_acc = 0.0;
    for &i in &indices {
        let ev = &events[i];
        total_engagement += ev.likes + ev.replies + ev.retweets;
        sentiment_acc += ev.sentiment.value();
        let actor = normalize(&ev.actor);
        if !is_unattributable(&actor) {
            by_creator.entry(actor).or_default().push(i);
        }
    }

    let mut signal_rows = Vec::with_capacity(by_creator.len());
    let mut score_acc = 0.0;
    let mut pct_acc = 0.0;
    let mut pct_n = 0usize;
    for (creator, creator_indices) in &by_creator {
        let mut ctx = creator_ctx.get(creator).copied().unwrap_or_default();
        ctx.is_joined = joined_pairs.contains(&(project_key.clone(), creator.clone()));
        let (score, band) =
            signal::score_creator(&cfg.signal, window, now, events, creator_indices, originality, &ctx);
        score_acc += score;
        if let Some(pct) = ctx.smart_followers_pct {
            pct_acc += pct;
            pct_n += 1;
        }
        signal_rows.push(SignalScoreResult {
            creator: creator.clone(),
            project: project_key.clone(),
            window,
            as_of,
            signal_score: score,
            trust_band: band,
        });
    }

    let creator_count = by_creator.len();
    let inputs = ProjectInputs {
        mention_count: indices.len() as u64,
        unique_contributors: creator_count as u64,
        total_engagement,
        community_heat,
    };
    let quality = QualityStrengths {
        creator_organic: (creator_count > 0).then(|| (score_acc / creator_count as f64) / 100.0),
        audience_organic: (pct_n > 0).then(|| pct_acc / pct_n as f64),
        originality: (!indices.is_empty()).then(|| originality.original_share(&indices)),
        sentiment: (!indices.is_empty())
            .then(|| ((sentiment_acc / indices.len() as f64).clamp(-1.0, 1.0) + 1.0) / 2.0),
        smart_boost: project_smart_pct,
        keyword_match: matcher.strength(indices.iter().map(|&i| events[i].text.as_str())),
    };

    let value = mindshare::attention_value(&cfg.mindshare, &inputs, &quality);
    (project_key, value, signal_rows)
}

/// Spawn the background schedulers: the daily snapshot pipeline and the
/// leaderboard merge on their configured cadences.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, cfg: SchedulerConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut daily = tokio::time::interval(std::time::Duration::from_secs(cfg.daily_interval_secs.max(1)));
        let mut hourly =
            tokio::time::interval(std::time::Duration::from_secs(cfg.leaderboard_interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = daily.tick() => {
                    let as_of = Utc::now().date_naive();
                    if let Err(e) = pipeline.run_day(as_of).await {
                        warn!(error = ?e, "scheduled daily run failed");
                    }
                }
                _ = hourly.tick() => {
                    let as_of = Utc::now().date_naive();
                    if let Err(e) = pipeline.run_leaderboards(as_of).await {
                        warn!(error = ?e, "scheduled leaderboard merge failed");
                    }
                }
            }
        }
    })
}

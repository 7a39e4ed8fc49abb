//! # Collaborator Feeds
//! Read-only interfaces to the surrounding application: tracked entities,
//! raw contribution/mention records, follow edges, account profiles,
//! community heat, and the explicit join/verification ledger.
//!
//! The core never writes through these. `InMemoryFeed` is the fixture
//! implementation used by tests and local runs.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::model::{AccountProfile, ContributionEvent, FollowEdge, JoinRecord, TrackedEntity, Window};

/// Everything a pipeline run reads from the outside world.
#[async_trait]
pub trait ActivityFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Active tracked projects. The core never creates these.
    async fn tracked_projects(&self) -> anyhow::Result<Vec<TrackedEntity>>;

    /// Account universe enrolled for graph tracking (projects and creators).
    async fn tracked_accounts(&self) -> anyhow::Result<Vec<String>>;

    /// All contribution events inside `window` ending at `as_of` (exclusive
    /// upper bound at end of day).
    async fn contributions(&self, window: Window, as_of: NaiveDate)
        -> anyhow::Result<Vec<ContributionEvent>>;

    /// Append-only follow-edge feed.
    async fn follow_edges(&self) -> anyhow::Result<Vec<FollowEdge>>;

    async fn account_profiles(&self) -> anyhow::Result<Vec<AccountProfile>>;

    /// External community-heat metric per project identity.
    async fn community_heat(&self, as_of: NaiveDate) -> anyhow::Result<HashMap<String, f64>>;

    /// Explicit join/verification ledger (all projects).
    async fn join_ledger(&self) -> anyhow::Result<Vec<JoinRecord>>;
}

/// Window cutoff helper shared by feed implementations: the inclusive start
/// instant for a (window, as-of-date) run. The run covers
/// `[end - window, end)` where `end` is midnight after `as_of`.
pub fn window_bounds(window: Window, as_of: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = as_of
        .succ_opt()
        .unwrap_or(as_of)
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);
    let start = end - chrono::Duration::seconds((window.hours() * 3600.0) as i64);
    (start, end)
}

/// In-memory fixture feed. Fields are plain vectors that tests populate
/// directly; `contributions` applies the window bounds like a real feed
/// would.
#[derive(Default)]
pub struct InMemoryFeed {
    inner: Mutex<FeedData>,
}

#[derive(Default)]
struct FeedData {
    projects: Vec<TrackedEntity>,
    accounts: Vec<String>,
    events: Vec<ContributionEvent>,
    edges: Vec<FollowEdge>,
    profiles: Vec<AccountProfile>,
    heat: HashMap<String, f64>,
    joins: Vec<JoinRecord>,
}

/// On-disk shape for a local fixture feed. All sections optional.
#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    projects: Vec<TrackedEntity>,
    #[serde(default)]
    accounts: Vec<String>,
    #[serde(default)]
    events: Vec<ContributionEvent>,
    #[serde(default)]
    edges: Vec<FollowEdge>,
    #[serde(default)]
    profiles: Vec<AccountProfile>,
    #[serde(default)]
    heat: HashMap<String, f64>,
    #[serde(default)]
    joins: Vec<JoinRecord>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture feed from a JSON file (local runs and demos).
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture feed {}", path.display()))?;
        let fixture: FixtureFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture feed {}", path.display()))?;
        let feed = Self::new();
        {
            let mut d = feed.inner.lock().expect("feed mutex poisoned");
            let mut accounts = fixture.accounts;
            accounts.extend(fixture.projects.iter().map(|p| p.identity.clone()));
            d.projects = fixture.projects;
            d.accounts = accounts;
            d.events = fixture.events;
            d.edges = fixture.edges;
            d.profiles = fixture.profiles;
            d.heat = fixture.heat;
            d.joins = fixture.joins;
        }
        Ok(feed)
    }

    pub fn add_project(&self, identity: &str, display_name: &str) -> &Self {
        let mut d = self.inner.lock().expect("feed mutex poisoned");
        d.projects.push(TrackedEntity {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            is_active: true,
        });
        d.accounts.push(identity.to_string());
        self
    }

    pub fn add_account(&self, identity: &str) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").accounts.push(identity.to_string());
        self
    }

    pub fn add_event(&self, ev: ContributionEvent) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").events.push(ev);
        self
    }

    pub fn add_edge(&self, edge: FollowEdge) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").edges.push(edge);
        self
    }

    pub fn add_profile(&self, profile: AccountProfile) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").profiles.push(profile);
        self
    }

    pub fn set_heat(&self, project: &str, heat: f64) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").heat.insert(project.to_string(), heat);
        self
    }

    pub fn add_join(&self, join: JoinRecord) -> &Self {
        self.inner.lock().expect("feed mutex poisoned").joins.push(join);
        self
    }
}

#[async_trait]
impl ActivityFeed for InMemoryFeed {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn tracked_projects(&self) -> anyhow::Result<Vec<TrackedEntity>> {
        let d = self.inner.lock().expect("feed mutex poisoned");
        Ok(d.projects.iter().filter(|p| p.is_active).cloned().collect())
    }

    async fn tracked_accounts(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.inner.lock().expect("feed mutex poisoned").accounts.clone())
    }

    async fn contributions(
        &self,
        window: Window,
        as_of: NaiveDate,
    ) -> anyhow::Result<Vec<ContributionEvent>> {
        let (start, end) = window_bounds(window, as_of);
        let d = self.inner.lock().expect("feed mutex poisoned");
        Ok(d.events.iter().filter(|e| e.ts >= start && e.ts < end).cloned().collect())
    }

    async fn follow_edges(&self) -> anyhow::Result<Vec<FollowEdge>> {
        Ok(self.inner.lock().expect("feed mutex poisoned").edges.clone())
    }

    async fn account_profiles(&self) -> anyhow::Result<Vec<AccountProfile>> {
        Ok(self.inner.lock().expect("feed mutex poisoned").profiles.clone())
    }

    async fn community_heat(&self, _as_of: NaiveDate) -> anyhow::Result<HashMap<String, f64>> {
        Ok(self.inner.lock().expect("feed mutex poisoned").heat.clone())
    }

    async fn join_ledger(&self) -> anyhow::Result<Vec<JoinRecord>> {
        Ok(self.inner.lock().expect("feed mutex poisoned").joins.clone())
    }
}

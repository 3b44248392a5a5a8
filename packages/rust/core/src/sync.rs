//! Sync pipeline: local store → calculator → reconciliation → remote service.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use brewsync_calc::recalculate;
use brewsync_remote::{RemoteClient, SessionContext};
use brewsync_shared::{Brew, BrewSyncError, NamePattern, Recipe, Result, SyncOptions, UnitType};
use brewsync_sources::{CanonicalRecord, ExportFile, KbhDatabase, SourceRecord};

use crate::reconcile::{SyncAction, reconcile_brew, reconcile_recipe};
use crate::watch::ChangeWatcher;

// ---------------------------------------------------------------------------
// Local source
// ---------------------------------------------------------------------------

/// The authoritative local store a push reads from.
pub enum LocalSource {
    Log(KbhDatabase),
    Export(ExportFile),
}

impl LocalSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::Export(_) => "export",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Log(db) => db.path(),
            Self::Export(file) => file.path(),
        }
    }

    /// Re-read the store after it changed on disk.
    pub async fn reopen(&mut self) -> Result<()> {
        match self {
            Self::Log(db) => db.reopen().await,
            Self::Export(file) => {
                let path: PathBuf = file.path().to_path_buf();
                *file = ExportFile::open(&path).await?;
                Ok(())
            }
        }
    }

    /// Raw records whose name matches `pattern`.
    pub async fn records(&self, pattern: &NamePattern) -> Result<Vec<SourceRecord>> {
        match self {
            Self::Log(db) => Ok(db
                .records(pattern)
                .await?
                .into_iter()
                .map(SourceRecord::Log)
                .collect()),
            Self::Export(file) => Ok(file
                .records(pattern)
                .into_iter()
                .cloned()
                .map(SourceRecord::Export)
                .collect()),
        }
    }

    /// Canonical, recalculated records. Records that fail to translate are
    /// logged and counted, not fatal.
    pub async fn canonical(&self, pattern: &NamePattern) -> Result<(Vec<CanonicalRecord>, usize)> {
        let mut records = Vec::new();
        let mut failed = 0;
        for raw in self.records(pattern).await? {
            let name = raw.name().to_string();
            match raw.into_canonical() {
                Ok(mut record) => {
                    recalculate(&mut record.recipe, false);
                    records.push(record);
                }
                Err(e) => {
                    warn!(recipe = %name, error = %e, "skipping unreadable recipe");
                    failed += 1;
                }
            }
        }
        Ok((records, failed))
    }

    /// The single recalculated record matching `pattern`.
    pub async fn unique(&self, pattern: &NamePattern) -> Result<CanonicalRecord> {
        let mut records = self.records(pattern).await?;
        if records.len() != 1 {
            warn!(pattern = pattern.as_str(), count = records.len(), "pattern did not select a unique local recipe");
            return Err(BrewSyncError::AmbiguousMatch {
                pattern: pattern.as_str().to_string(),
                count: records.len(),
            });
        }
        let mut record = records.remove(0).into_canonical()?;
        recalculate(&mut record.recipe, false);
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Decisions taken by one push; dry runs count what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub conflicts: usize,
    /// Local records that could not be translated.
    pub failed: usize,
    pub brews_created: usize,
    pub brews_updated: usize,
    pub brews_skipped: usize,
    pub brew_conflicts: usize,
    pub elapsed: Duration,
}

impl PushReport {
    /// Number of recipes written (or that would have been).
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

/// Progress callback for sync operations.
pub trait SyncReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per local recipe with the decision taken for it.
    fn recipe(&self, name: &str, action: &SyncAction);
    /// Called when a push completes.
    fn done(&self, report: &PushReport);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl SyncReporter for SilentReporter {
    fn phase(&self, _name: &str) {}
    fn recipe(&self, _name: &str, _action: &SyncAction) {}
    fn done(&self, _report: &PushReport) {}
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One row of the merged local/remote recipe table.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub name: String,
    pub remote_id: Option<u64>,
    pub local: bool,
    pub remote: bool,
    pub public: bool,
    /// Local copy updated after the remote one.
    pub outdated: bool,
    pub local_updated: Option<DateTime<Utc>>,
    pub remote_updated: Option<DateTime<Utc>>,
    pub batch_size: f64,
    pub metric: bool,
}

impl ListEntry {
    fn merge(name: &str, local: Option<&Recipe>, remote: Option<&Recipe>) -> Self {
        let shown = remote.or(local);
        let outdated = match (local, remote) {
            (Some(l), Some(r)) => matches!(
                (l.updated_at, r.updated_at),
                (Some(lu), Some(ru)) if lu > ru
            ),
            _ => false,
        };
        Self {
            name: name.to_string(),
            remote_id: remote.and_then(|r| r.id),
            local: local.is_some(),
            remote: remote.is_some(),
            public: remote.and_then(|r| r.is_public).unwrap_or(false),
            outdated,
            local_updated: local.and_then(|l| l.updated_at),
            remote_updated: remote.and_then(|r| r.updated_at),
            batch_size: shown.map(|r| r.batch_size).unwrap_or_default(),
            metric: shown
                .and_then(|r| r.unit_type_id)
                .is_none_or(|u| u == UnitType::Metric),
        }
    }

    /// The `k g p o` presence flags.
    pub fn flags(&self) -> String {
        [
            (self.local, 'k'),
            (self.remote, 'g'),
            (self.public, 'p'),
            (self.outdated, 'o'),
        ]
        .iter()
        .map(|(set, c)| if *set { *c } else { '-' })
        .collect()
    }

    /// A fixed-width table line with times in the local timezone.
    pub fn render(&self) -> String {
        let id = self
            .remote_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let unit = if self.metric { "l" } else { "gal" };
        format!(
            "{id:>8} {} {:>16} {:>16} {:>7} {}",
            self.flags(),
            local_minute(self.local_updated),
            local_minute(self.remote_updated),
            format!("{:.1}{unit}", self.batch_size),
            self.name
        )
    }
}

fn local_minute(t: Option<DateTime<Utc>>) -> String {
    t.map_or_else(
        || "-".to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Merge local and remote recipes into name-sorted rows; the first record of a name wins.
pub fn merge_listing(local: &[Recipe], remote: &[Recipe]) -> Vec<ListEntry> {
    let mut names: BTreeMap<&str, (Option<&Recipe>, Option<&Recipe>)> = BTreeMap::new();
    for recipe in remote {
        names.entry(&recipe.name).or_default().1.get_or_insert(recipe);
    }
    for recipe in local {
        names.entry(&recipe.name).or_default().0.get_or_insert(recipe);
    }
    names
        .into_iter()
        .map(|(name, (local, remote))| ListEntry::merge(name, local, remote))
        .collect()
}

/// Pretty JSON with object keys sorted at every level.
pub fn sorted_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sort(v))).collect();
                Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_string_pretty(&sort(value)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

/// Runs sync operations against one remote client.
pub struct SyncEngine<'a> {
    client: &'a RemoteClient,
    options: SyncOptions,
}

impl<'a> SyncEngine<'a> {
    pub fn new(client: &'a RemoteClient, options: SyncOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Push matching local recipes (and their brews) to the remote service.
    #[instrument(skip_all, fields(pattern = pattern.as_str(), source = source.kind()))]
    pub async fn push(
        &self,
        ctx: &mut SessionContext,
        source: &LocalSource,
        pattern: &NamePattern,
        reporter: &dyn SyncReporter,
    ) -> Result<PushReport> {
        reporter.phase("Reading local recipes");
        let (records, failed) = source.canonical(pattern).await?;
        let mut report = self.push_records(ctx, &records, reporter).await?;
        report.failed = failed;
        reporter.done(&report);
        Ok(report)
    }

    /// Reconcile already loaded local records against the remote listing.
    pub async fn push_records(
        &self,
        ctx: &mut SessionContext,
        records: &[CanonicalRecord],
        reporter: &dyn SyncReporter,
    ) -> Result<PushReport> {
        let start = Instant::now();
        let mut report = PushReport::default();
        if records.is_empty() {
            info!("no local recipes selected");
            report.elapsed = start.elapsed();
            return Ok(report);
        }

        reporter.phase("Listing remote recipes");
        self.client.ensure_login(ctx).await?;
        // every remote recipe, so create vs. update is decided against the whole account
        let remote = self.client.my_recipes(ctx, &NamePattern::any()).await?;

        reporter.phase("Synchronizing");
        for record in records {
            let local = &record.recipe;
            let action = reconcile_recipe(local, &remote, self.options.force);
            reporter.recipe(&local.name, &action);

            let remote_id = match &action {
                SyncAction::Create => {
                    info!("creating {local}");
                    report.created += 1;
                    match action.prepare_recipe(local) {
                        Some(sent) => self
                            .client
                            .create_recipe(ctx, &sent)
                            .await?
                            .and_then(|stored| stored.id),
                        None => None,
                    }
                }
                SyncAction::Update { remote_id } => {
                    info!(remote_id, "updating {local}");
                    report.updated += 1;
                    if let Some(sent) = action.prepare_recipe(local) {
                        self.client.update_recipe(ctx, &sent).await?;
                    }
                    Some(*remote_id)
                }
                SyncAction::Skip { remote_id } => {
                    info!(remote_id, "{local} needs no update");
                    debug!(local = ?local.updated_at, "remote copy is newer");
                    report.skipped += 1;
                    Some(*remote_id)
                }
                SyncAction::Conflict { remote_ids } => {
                    warn!(?remote_ids, "no single remote recipe is named \"{}\", not touching any", local.name);
                    report.conflicts += 1;
                    None
                }
            };

            if let (true, Some(brew)) = (self.options.brews, &record.brew) {
                match remote_id {
                    Some(recipe_id) => self.push_brew(ctx, recipe_id, brew, &mut report).await?,
                    None => debug!("{local} has no remote id, brew not synchronized"),
                }
            }
        }

        report.elapsed = start.elapsed();
        info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            conflicts = report.conflicts,
            "push complete"
        );
        Ok(report)
    }

    async fn push_brew(
        &self,
        ctx: &mut SessionContext,
        recipe_id: u64,
        brew: &Brew,
        report: &mut PushReport,
    ) -> Result<()> {
        let remote = self.client.brews(ctx, recipe_id).await?;
        let action = reconcile_brew(brew, &remote, self.options.force);
        match &action {
            SyncAction::Create => {
                info!(recipe_id, "creating {brew}");
                report.brews_created += 1;
                if let Some(sent) = action.prepare_brew(brew, Utc::now()) {
                    self.client.create_brew(ctx, recipe_id, &sent).await?;
                }
            }
            SyncAction::Update { remote_id } => {
                info!(recipe_id, remote_id, "updating {brew}");
                report.brews_updated += 1;
                if let Some(sent) = action.prepare_brew(brew, Utc::now()) {
                    self.client.update_brew(ctx, &sent).await?;
                }
            }
            SyncAction::Skip { remote_id } => {
                info!(recipe_id, remote_id, "{brew} needs no update");
                report.brews_skipped += 1;
            }
            SyncAction::Conflict { remote_ids } => {
                warn!(recipe_id, ?remote_ids, "no single remote brew on the day of {brew}");
                report.brew_conflicts += 1;
            }
        }
        Ok(())
    }

    /// Merged table of local and remote recipes matching `pattern`.
    #[instrument(skip_all, fields(pattern = pattern.as_str()))]
    pub async fn list(
        &self,
        ctx: &mut SessionContext,
        source: Option<&LocalSource>,
        pattern: &NamePattern,
    ) -> Result<Vec<ListEntry>> {
        self.client.ensure_login(ctx).await?;
        let remote = self.client.my_recipes(ctx, pattern).await?;
        let local: Vec<Recipe> = match source {
            Some(source) => source
                .canonical(pattern)
                .await?
                .0
                .into_iter()
                .map(|r| r.recipe)
                .collect(),
            None => Vec::new(),
        };
        Ok(merge_listing(&local, &remote))
    }

    /// Full remote recipe objects matching `pattern`.
    pub async fn dump_remote(
        &self,
        ctx: &mut SessionContext,
        pattern: &NamePattern,
    ) -> Result<Vec<Value>> {
        self.client.ensure_login(ctx).await?;
        let listed = self.client.my_recipes(ctx, pattern).await?;
        let mut full = Vec::with_capacity(listed.len());
        for id in listed.iter().filter_map(|r| r.id) {
            full.push(self.client.recipe_value(ctx, id).await?);
        }
        Ok(full)
    }

    /// Local and remote JSON of the one recipe matching `pattern`, keys sorted.
    pub async fn diff_pair(
        &self,
        ctx: &mut SessionContext,
        source: &LocalSource,
        pattern: &NamePattern,
    ) -> Result<(String, String)> {
        let local = source.unique(pattern).await?;
        self.client.ensure_login(ctx).await?;
        let remote = self.client.my_recipe_value(ctx, pattern).await?;
        Ok((
            sorted_json(&local.recipe.to_payload()),
            sorted_json(&remote),
        ))
    }

    /// Delete every remote recipe matching `pattern`. Returns how many were deleted.
    #[instrument(skip_all, fields(pattern = pattern.as_str()))]
    pub async fn delete(&self, ctx: &mut SessionContext, pattern: &NamePattern) -> Result<usize> {
        self.client.ensure_login(ctx).await?;
        let doomed = self.client.my_recipes(ctx, pattern).await?;
        let mut deleted = 0;
        for recipe in &doomed {
            let Some(id) = recipe.id else { continue };
            info!("deleting {recipe}");
            if self.client.delete_recipe(ctx, id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Push once, then push again after every change of the source file until
    /// `shutdown` resolves. A pass always runs to completion before the next check.
    #[instrument(skip_all, fields(path = %source.path().display()))]
    pub async fn daemon(
        &self,
        ctx: &mut SessionContext,
        source: &mut LocalSource,
        pattern: &NamePattern,
        reporter: &dyn SyncReporter,
        (interval, settle): (Duration, Duration),
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        self.push(ctx, source, pattern, reporter).await?;

        let mut watcher = ChangeWatcher::new(source.path(), interval, settle);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("stopping watcher");
                    return Ok(());
                }
                _ = watcher.changed() => {}
            }
            info!("local store changed, synchronizing");
            if let Err(e) = source.reopen().await {
                error!(error = %e, "failed to reopen local store");
                continue;
            }
            if let Err(e) = self.push(ctx, source, pattern, reporter).await {
                error!(error = %e, "sync pass failed");
            }
        }
    }
}

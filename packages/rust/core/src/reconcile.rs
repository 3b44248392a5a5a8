//! Create / update / skip decisions for local records against the remote listing.
//!
//! Recipes correspond by exact name, brews by the UTC day they were created.
//! The newer side wins unless forced; several remote candidates for one local
//! record are a conflict and nothing is written for it. A remote candidate
//! without an id also makes a conflict, since it cannot be updated and
//! creating beside it would duplicate it. Nothing here mutates the records it
//! is given.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use brewsync_shared::{Brew, Recipe};

// ---------------------------------------------------------------------------
// SyncAction
// ---------------------------------------------------------------------------

/// What to do with one local record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No remote counterpart: send as new.
    Create,
    /// Replace the remote record `remote_id`.
    Update { remote_id: u64 },
    /// The remote record is newer and force was not requested.
    Skip { remote_id: u64 },
    /// Several remote records, or one without an id, correspond to the local one.
    /// Only the known ids are listed.
    Conflict { remote_ids: Vec<u64> },
}

impl SyncAction {
    /// The remote id the local record corresponds to, if exactly one.
    pub fn remote_id(&self) -> Option<u64> {
        match self {
            Self::Update { remote_id } | Self::Skip { remote_id } => Some(*remote_id),
            Self::Create | Self::Conflict { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update { .. } => "update",
            Self::Skip { .. } => "skip",
            Self::Conflict { .. } => "conflict",
        }
    }

    /// The copy of `local` to send, bound and tidied; `None` when nothing is sent.
    pub fn prepare_recipe(&self, local: &Recipe) -> Option<Recipe> {
        let mut recipe = local.clone();
        match self {
            Self::Create => recipe.id = None,
            Self::Update { remote_id } => recipe.bind(*remote_id),
            Self::Skip { .. } | Self::Conflict { .. } => return None,
        }
        recipe.tidy();
        Some(recipe)
    }

    /// The copy of `local` to send, with its status as of `now`.
    pub fn prepare_brew(&self, local: &Brew, now: DateTime<Utc>) -> Option<Brew> {
        let mut brew = local.clone();
        brew.status = local.effective_status(now);
        match self {
            Self::Create => brew.id = None,
            Self::Update { remote_id } => brew.bind(*remote_id),
            Self::Skip { .. } | Self::Conflict { .. } => return None,
        }
        Some(brew)
    }
}

/// Whether the remote copy is strictly newer. Without both timestamps the
/// local copy is taken as authoritative.
pub fn remote_is_newer(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    matches!((local, remote), (Some(local), Some(remote)) if remote > local)
}

type Candidate = (Option<u64>, Option<DateTime<Utc>>);

fn decide(
    local_updated: Option<DateTime<Utc>>,
    candidates: &[Candidate],
    force: bool,
) -> SyncAction {
    match candidates {
        [] => SyncAction::Create,
        [(Some(remote_id), remote_updated)] => {
            if !force && remote_is_newer(local_updated, *remote_updated) {
                SyncAction::Skip {
                    remote_id: *remote_id,
                }
            } else {
                SyncAction::Update {
                    remote_id: *remote_id,
                }
            }
        }
        many => SyncAction::Conflict {
            remote_ids: many.iter().filter_map(|(id, _)| *id).collect(),
        },
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

/// Decide for one local recipe against the remote listing.
pub fn reconcile_recipe(local: &Recipe, remote: &[Recipe], force: bool) -> SyncAction {
    let candidates: Vec<Candidate> = remote
        .iter()
        .filter(|r| r.name == local.name)
        .map(|r| (r.id, r.updated_at))
        .collect();
    if candidates.iter().any(|(id, _)| id.is_none()) {
        warn!(name = %local.name, "a remote recipe of this name has no id");
    }
    decide(local.updated_at, &candidates, force)
}

/// Decide for every local recipe, in order.
pub fn reconcile(local: &[Recipe], remote: &[Recipe], force: bool) -> Vec<SyncAction> {
    local
        .iter()
        .map(|recipe| reconcile_recipe(recipe, remote, force))
        .collect()
}

// ---------------------------------------------------------------------------
// Brews
// ---------------------------------------------------------------------------

fn brew_day(brew: &Brew) -> Option<NaiveDate> {
    brew.created_at.map(|t| t.date_naive())
}

/// Decide for a local brew against the remote sessions of its recipe.
pub fn reconcile_brew(local: &Brew, remote: &[Brew], force: bool) -> SyncAction {
    let Some(day) = brew_day(local) else {
        return SyncAction::Create;
    };
    let candidates: Vec<Candidate> = remote
        .iter()
        .filter(|b| brew_day(b) == Some(day))
        .map(|b| (b.id, b.updated_at))
        .collect();
    if candidates.iter().any(|(id, _)| id.is_none()) {
        warn!(%day, "a remote brew session of this day has no id");
    }
    decide(local.updated_at, &candidates, force)
}

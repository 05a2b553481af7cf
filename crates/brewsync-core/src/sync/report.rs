//! Structured results of each command, for the CLI to render.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use super::diff::ChangeSet;
use super::engine::SyncAction;
use crate::models::{LocalRecipe, Milli, RemoteRecipe};
use crate::pattern::NamePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    NoOp,
    Ambiguous,
}

impl ActionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::NoOp => "no-op",
            Self::Ambiguous => "ambiguous",
        }
    }
}

impl From<&SyncAction> for ActionKind {
    fn from(action: &SyncAction) -> Self {
        match action {
            SyncAction::Create { .. } => Self::Create,
            SyncAction::Update { .. } => Self::Update,
            SyncAction::NoOp { .. } => Self::NoOp,
            SyncAction::Ambiguous { .. } => Self::Ambiguous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// Would have been applied; dry-run.
    Planned,
    /// Nothing to do, or nothing safe to do.
    Skipped,
    Failed(String),
}

impl Outcome {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    pub local_id: i64,
    pub remote_id: Option<i64>,
    pub name: String,
    pub action: ActionKind,
    pub changed_fields: Vec<&'static str>,
    /// Competing remote ids of an ambiguous name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<i64>,
    pub outcome: Outcome,
}

impl SyncEntry {
    pub fn new(action: &SyncAction, outcome: Outcome) -> Self {
        let (changed_fields, candidates) = match action {
            SyncAction::Update { changes, .. } => (changes.fields(), Vec::new()),
            SyncAction::Ambiguous { remote_ids, .. } => (Vec::new(), remote_ids.clone()),
            SyncAction::Create { .. } | SyncAction::NoOp { .. } => (Vec::new(), Vec::new()),
        };
        Self {
            local_id: action.local_id(),
            remote_id: action.remote_id(),
            name: action.name().to_string(),
            action: action.into(),
            changed_fields,
            candidates,
            outcome,
        }
    }
}

/// A local recipe whose comment tags could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationFailure {
    pub local_id: i64,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub entries: Vec<SyncEntry>,
    pub translation_failures: Vec<TranslationFailure>,
}

impl SyncReport {
    pub fn count(&self, kind: ActionKind) -> usize {
        self.entries.iter().filter(|entry| entry.action == kind).count()
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_failure())
            .count()
            + self.translation_failures.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteEntry {
    pub remote_id: i64,
    pub name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub dry_run: bool,
    pub entries: Vec<DeleteEntry>,
}

impl DeleteReport {
    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_failure())
            .count()
    }
}

/// One recipe name as seen locally, remotely, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub name: String,
    pub local_id: Option<i64>,
    pub remote_id: Option<i64>,
    pub public: Option<bool>,
    /// The local recipe changed after the remote copy was last updated.
    pub outdated: bool,
    pub local_modified: Option<NaiveDateTime>,
    pub remote_updated: Option<String>,
    pub batch_size: Option<Milli>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListReport {
    pub entries: Vec<ListEntry>,
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
}

fn is_outdated(local: &LocalRecipe, remote: &RemoteRecipe) -> bool {
    remote
        .updated_at_utc()
        .is_some_and(|updated| local_to_utc(local.modified_at) > updated)
}

impl ListReport {
    /// Union of selected local and remote names, sorted by name.
    pub fn build(locals: &[LocalRecipe], remotes: &[RemoteRecipe], pattern: &NamePattern) -> Self {
        let mut entries = Vec::new();

        for remote in remotes.iter().filter(|remote| pattern.matches(&remote.name)) {
            let local = locals
                .iter()
                .filter(|local| local.name == remote.name)
                .min_by_key(|local| local.id);
            entries.push(ListEntry {
                name: remote.name.clone(),
                local_id: local.map(|local| local.id),
                remote_id: Some(remote.id),
                public: Some(remote.is_public),
                outdated: local.is_some_and(|local| is_outdated(local, remote)),
                local_modified: local.map(|local| local.modified_at),
                remote_updated: remote.updated_at.clone(),
                batch_size: remote.batch_size,
            });
        }

        for local in locals.iter().filter(|local| pattern.matches(&local.name)) {
            if remotes.iter().any(|remote| remote.name == local.name) {
                continue;
            }
            entries.push(ListEntry {
                name: local.name.clone(),
                local_id: Some(local.id),
                remote_id: None,
                public: None,
                outdated: false,
                local_modified: Some(local.modified_at),
                remote_updated: None,
                batch_size: Some(local.batch_volume),
            });
        }

        entries.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.local_id.cmp(&b.local_id))
                .then(a.remote_id.cmp(&b.remote_id))
        });
        Self { entries }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiffOutcome {
    Compared {
        local_id: i64,
        remote_id: i64,
        name: String,
        changes: ChangeSet,
        local: Value,
        remote: Value,
    },
    /// The pattern did not select exactly one local and one remote recipe.
    NotUnique {
        local_matches: Vec<i64>,
        remote_matches: Vec<i64>,
    },
    TranslationFailed {
        local_id: i64,
        name: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub pattern: String,
    #[serde(flatten)]
    pub outcome: DiffOutcome,
}

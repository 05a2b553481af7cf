//! One entry point per command, composed from the repository, translator,
//! sync engine and session manager.
//!
//! Per-recipe failures (unparsable tags, rejected writes, ambiguous names)
//! land in the returned report. Session-level failures end the command.

use serde_json::Value;

use crate::db::RecipeRepository;
use crate::error::{Error, Result};
use crate::models::{LocalRecipe, RemoteRecipe};
use crate::pattern::NamePattern;
use crate::session::{
    Credentials, Gateway, SessionError, SessionManager, SessionPhase, StatePersistence,
};
use crate::sync::{
    diff_documents, plan_delete, plan_push, unique_matches, ActionKind, DeleteEntry, DeleteReport,
    DiffOutcome, DiffReport, ListReport, Outcome, SyncAction, SyncEntry, SyncReport,
    TranslatedRecipe, TranslationFailure,
};
use crate::translate::translate_recipe;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Plan and report without writing to the remote service.
    pub dry_run: bool,
    /// Update matched recipes even when nothing differs.
    pub force: bool,
}

/// Await a session call; on `SessionExpired` log in again once per command
/// (when credentials are known) and repeat the call.
macro_rules! relogin_on_expiry {
    ($service:ident, $call:expr) => {{
        match $call.await {
            Err(SessionError::Expired) if $service.can_relogin() => {
                $service.relogin().await?;
                $call.await
            }
            other => other,
        }
    }};
}

pub struct SyncService<'a, G: Gateway, S: StatePersistence> {
    session: &'a mut SessionManager<G, S>,
    repository: Option<&'a dyn RecipeRepository>,
    credentials: Option<Credentials>,
    options: SyncOptions,
    relogged: bool,
}

impl<'a, G: Gateway, S: StatePersistence> SyncService<'a, G, S> {
    pub fn new(session: &'a mut SessionManager<G, S>, options: SyncOptions) -> Self {
        Self {
            session,
            repository: None,
            credentials: None,
            options,
            relogged: false,
        }
    }

    #[must_use]
    pub fn with_repository(mut self, repository: &'a dyn RecipeRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub const fn options(&self) -> SyncOptions {
        self.options
    }

    fn can_relogin(&self) -> bool {
        !self.relogged && self.credentials.is_some()
    }

    async fn relogin(&mut self) -> Result<()> {
        self.relogged = true;
        let Some(credentials) = self.credentials.as_ref() else {
            return Err(SessionError::Expired.into());
        };
        tracing::info!("Session expired, logging in again");
        self.session.login(credentials).await?;
        Ok(())
    }

    /// Make sure the session is usable: resume persisted state, else log in.
    async fn begin(&mut self) -> Result<()> {
        self.relogged = false;
        if self.session.phase() != SessionPhase::Authenticated {
            self.session.establish(self.credentials.as_ref()).await?;
        }
        Ok(())
    }

    fn local_recipes(&self) -> Result<Vec<LocalRecipe>> {
        let repository = self
            .repository
            .ok_or_else(|| Error::InvalidInput("no local recipe database configured".to_string()))?;
        repository.fetch_all_recipes()
    }

    /// The remote listing, retried once after a transient failure.
    async fn catalogue(&mut self) -> Result<Vec<RemoteRecipe>> {
        match relogin_on_expiry!(self, self.session.list_recipes()) {
            Err(SessionError::TransientFetch(reason)) => {
                tracing::warn!("Listing recipes failed ({}), retrying once", reason);
                Ok(relogin_on_expiry!(self, self.session.list_recipes())?)
            }
            other => Ok(other?),
        }
    }

    async fn fetch(&mut self, id: i64) -> Result<RemoteRecipe> {
        Ok(relogin_on_expiry!(self, self.session.fetch_recipe(id))?)
    }

    /// Local recipes and remote presence, for `list`.
    pub async fn list(&mut self, pattern: &NamePattern) -> Result<ListReport> {
        let locals = match self.repository {
            Some(repository) => repository.fetch_all_recipes()?,
            None => Vec::new(),
        };
        self.begin().await?;
        let remotes = self.catalogue().await?;
        Ok(ListReport::build(&locals, &remotes, pattern))
    }

    /// Full remote records of every selected recipe.
    pub async fn dump(&mut self, pattern: &NamePattern) -> Result<Vec<Value>> {
        self.begin().await?;
        let ids: Vec<i64> = self
            .catalogue()
            .await?
            .iter()
            .filter(|remote| pattern.matches(&remote.name))
            .map(|remote| remote.id)
            .collect();

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            documents.push(self.fetch(id).await?.body);
        }
        Ok(documents)
    }

    /// Create or update the remote copy of every selected local recipe.
    pub async fn push(&mut self, pattern: &NamePattern) -> Result<SyncReport> {
        let mut report = SyncReport {
            dry_run: self.options.dry_run,
            ..SyncReport::default()
        };

        let mut translated = Vec::new();
        for recipe in self.local_recipes()? {
            if !pattern.matches(&recipe.name) {
                continue;
            }
            match translate_recipe(&recipe) {
                Ok(document) => translated.push(TranslatedRecipe {
                    local_id: recipe.id,
                    name: recipe.name,
                    document,
                }),
                Err(error) => {
                    tracing::warn!("Skipping recipe '{}' ({}): {}", recipe.name, recipe.id, error);
                    report.translation_failures.push(TranslationFailure {
                        local_id: recipe.id,
                        name: recipe.name,
                        error: error.to_string(),
                    });
                }
            }
        }

        self.begin().await?;
        let mut remotes = self.catalogue().await?;
        for id in unique_matches(&translated, &remotes, pattern) {
            let full = self.fetch(id).await?;
            if let Some(slot) = remotes.iter_mut().find(|remote| remote.id == id) {
                *slot = full;
            }
        }

        for action in plan_push(&translated, &remotes, pattern, self.options.force) {
            let entry = self.execute(&action, &remotes).await?;
            report.entries.push(entry);
        }
        Ok(report)
    }

    async fn execute(&mut self, action: &SyncAction, remotes: &[RemoteRecipe]) -> Result<SyncEntry> {
        if !action.is_write() {
            return Ok(SyncEntry::new(action, Outcome::Skipped));
        }
        if self.options.dry_run {
            tracing::info!(
                "Would {} recipe '{}'",
                ActionKind::from(action).as_str(),
                action.name()
            );
            return Ok(SyncEntry::new(action, Outcome::Planned));
        }

        let (result, created) = match action {
            SyncAction::Create { document, name, .. } => {
                tracing::info!("Creating recipe '{}'", name);
                match relogin_on_expiry!(self, self.session.create(document)) {
                    Ok(id) => (Ok(()), id),
                    Err(error) => (Err(error), None),
                }
            }
            SyncAction::Update {
                remote_id,
                name,
                changes,
                ..
            } => {
                tracing::info!(
                    "Updating recipe '{}' ({}): {}",
                    name,
                    remote_id,
                    changes.fields().join(", ")
                );
                let mut body = remotes
                    .iter()
                    .find(|remote| remote.id == *remote_id)
                    .map(|remote| remote.body.clone())
                    .unwrap_or_default();
                changes.apply_to(&mut body)?;
                (
                    relogin_on_expiry!(self, self.session.update(*remote_id, &body)),
                    None,
                )
            }
            SyncAction::NoOp { .. } | SyncAction::Ambiguous { .. } => (Ok(()), None),
        };

        match result {
            Ok(()) => {
                let mut entry = SyncEntry::new(action, Outcome::Applied);
                entry.remote_id = entry.remote_id.or(created);
                Ok(entry)
            }
            Err(error @ SessionError::RemoteWrite { .. }) => {
                tracing::warn!("Write for recipe '{}' rejected: {}", action.name(), error);
                Ok(SyncEntry::new(action, Outcome::Failed(error.to_string())))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Delete every remote recipe selected by `pattern`, whether or not it
    /// still exists locally.
    pub async fn delete(&mut self, pattern: &NamePattern) -> Result<DeleteReport> {
        self.begin().await?;
        let remotes = self.catalogue().await?;
        let targets: Vec<(i64, String)> = plan_delete(&remotes, pattern)
            .into_iter()
            .map(|remote| (remote.id, remote.name.clone()))
            .collect();

        let mut report = DeleteReport {
            dry_run: self.options.dry_run,
            entries: Vec::with_capacity(targets.len()),
        };
        for (remote_id, name) in targets {
            let outcome = if self.options.dry_run {
                tracing::info!("Would delete recipe '{}' ({})", name, remote_id);
                Outcome::Planned
            } else {
                tracing::info!("Deleting recipe '{}' ({})", name, remote_id);
                match relogin_on_expiry!(self, self.session.delete(remote_id)) {
                    Ok(()) => Outcome::Applied,
                    Err(error @ SessionError::RemoteWrite { .. }) => {
                        tracing::warn!("Delete of recipe '{}' rejected: {}", name, error);
                        Outcome::Failed(error.to_string())
                    }
                    Err(error) => return Err(error.into()),
                }
            };
            report.entries.push(DeleteEntry {
                remote_id,
                name,
                outcome,
            });
        }
        Ok(report)
    }

    /// Compare the single local recipe with the single remote recipe that
    /// `pattern` selects.
    pub async fn diff(&mut self, pattern: &NamePattern) -> Result<DiffReport> {
        let locals: Vec<LocalRecipe> = self
            .local_recipes()?
            .into_iter()
            .filter(|recipe| pattern.matches(&recipe.name))
            .collect();
        self.begin().await?;
        let remote_ids: Vec<i64> = self
            .catalogue()
            .await?
            .iter()
            .filter(|remote| pattern.matches(&remote.name))
            .map(|remote| remote.id)
            .collect();

        let report = |outcome| DiffReport {
            pattern: pattern.to_string(),
            outcome,
        };

        let (local, remote_id) = match (locals.as_slice(), remote_ids.as_slice()) {
            ([local], [remote_id]) => (local, *remote_id),
            _ => {
                return Ok(report(DiffOutcome::NotUnique {
                    local_matches: locals.iter().map(|recipe| recipe.id).collect(),
                    remote_matches: remote_ids.clone(),
                }))
            }
        };

        let document = match translate_recipe(local) {
            Ok(document) => document,
            Err(error) => {
                return Ok(report(DiffOutcome::TranslationFailed {
                    local_id: local.id,
                    name: local.name.clone(),
                    error: error.to_string(),
                }))
            }
        };
        let remote = self.fetch(remote_id).await?;
        let changes = diff_documents(&document, remote.document().as_ref(), false);

        Ok(report(DiffOutcome::Compared {
            local_id: local.id,
            remote_id,
            name: local.name.clone(),
            changes,
            local: serde_json::to_value(&document)?,
            remote: remote.body,
        }))
    }

    /// Invalidate the remote session and forget the persisted state.
    pub async fn logout(&mut self) -> Result<()> {
        self.session.logout().await?;
        Ok(())
    }
}

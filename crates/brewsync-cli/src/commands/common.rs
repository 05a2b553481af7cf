use brewsync_core::db::KbhRepository;
use brewsync_core::session::{FileStateStore, HttpGateway, SessionManager};
use brewsync_core::sync::{
    ActionKind, DeleteReport, DiffOutcome, DiffReport, ListEntry, ListReport, Outcome, SyncReport,
};
use brewsync_core::{NamePattern, SyncOptions};
use serde::Serialize;

use crate::config::Settings;
use crate::error::CliError;

pub type Session = SessionManager<HttpGateway, FileStateStore>;

/// Resolved settings plus the global switches every command honours.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub options: SyncOptions,
    pub json: bool,
}

/// Session bound to the configured account's state file.
pub fn open_session(settings: &Settings) -> Result<Session, CliError> {
    let account = settings
        .username
        .as_deref()
        .ok_or(CliError::MissingCredentials)?;
    let store = FileStateStore::for_account(&settings.state_dir, account);
    tracing::debug!("Session state file: {}", store.path().display());
    let gateway = HttpGateway::new(settings.timeout)?;
    Ok(SessionManager::new(gateway, store, settings.endpoints()?))
}

pub fn open_repository(settings: &Settings) -> Result<KbhRepository, CliError> {
    if !settings.kbh_file.is_file() {
        return Err(CliError::MissingDatabase(settings.kbh_file.clone()));
    }
    Ok(KbhRepository::new(&settings.kbh_file))
}

pub fn parse_pattern(pattern: Option<&str>) -> Result<NamePattern, CliError> {
    match pattern {
        Some(pattern) => Ok(NamePattern::new(pattern)?),
        None => Ok(NamePattern::any()),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn id_label(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

pub fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Applied => "done".to_string(),
        Outcome::Planned => "planned".to_string(),
        Outcome::Skipped => "skipped".to_string(),
        Outcome::Failed(reason) => format!("failed: {reason}"),
    }
}

fn list_flags(entry: &ListEntry) -> String {
    let public = match entry.public {
        Some(true) => 'P',
        Some(false) => 'p',
        None => '-',
    };
    let outdated = if entry.outdated { 'O' } else { '-' };
    format!("{public}{outdated}")
}

/// One line per recipe: local id, remote id, flags and name.
///
/// Flags are `P`/`p` for public/private on the remote side and `O` when the
/// local copy was modified after the remote one.
pub fn format_list_lines(report: &ListReport) -> Vec<String> {
    if report.entries.is_empty() {
        return vec!["No recipes found".to_string()];
    }
    report
        .entries
        .iter()
        .map(|entry| {
            format!(
                "{:>6} {:>8} {} {}",
                id_label(entry.local_id),
                id_label(entry.remote_id),
                list_flags(entry),
                entry.name
            )
        })
        .collect()
}

pub fn format_sync_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.entries.len() + report.translation_failures.len() + 1);

    for failure in &report.translation_failures {
        lines.push(format!(
            "{:<9} {} (local {}): {}",
            "error", failure.name, failure.local_id, failure.error
        ));
    }

    for entry in &report.entries {
        let mut line = format!(
            "{:<9} {} (local {}, remote {}) {}",
            entry.action.as_str(),
            entry.name,
            entry.local_id,
            id_label(entry.remote_id),
            outcome_label(&entry.outcome)
        );
        if entry.action == ActionKind::Update && !entry.changed_fields.is_empty() {
            line.push_str(&format!(" [{}]", entry.changed_fields.join(", ")));
        }
        if !entry.candidates.is_empty() {
            let candidates: Vec<String> = entry.candidates.iter().map(i64::to_string).collect();
            line.push_str(&format!(" [candidates: {}]", candidates.join(", ")));
        }
        lines.push(line);
    }

    let mut summary = format!(
        "{} created, {} updated, {} unchanged, {} ambiguous, {} failed",
        report.count(ActionKind::Create),
        report.count(ActionKind::Update),
        report.count(ActionKind::NoOp),
        report.count(ActionKind::Ambiguous),
        report.failures()
    );
    if report.dry_run {
        summary.push_str(" (dry run)");
    }
    lines.push(summary);
    lines
}

pub fn format_delete_lines(report: &DeleteReport) -> Vec<String> {
    if report.entries.is_empty() {
        return vec!["No matching remote recipes".to_string()];
    }
    let mut lines: Vec<String> = report
        .entries
        .iter()
        .map(|entry| {
            format!(
                "delete {} (remote {}) {}",
                entry.name,
                entry.remote_id,
                outcome_label(&entry.outcome)
            )
        })
        .collect();
    if report.dry_run {
        lines.push("(dry run)".to_string());
    }
    lines
}

pub fn format_diff_lines(report: &DiffReport) -> Vec<String> {
    match &report.outcome {
        DiffOutcome::Compared {
            local_id,
            remote_id,
            name,
            changes,
            ..
        } => {
            let mut lines = vec![format!("{name} (local {local_id}, remote {remote_id})")];
            if changes.is_empty() {
                lines.push("no differences".to_string());
            }
            for change in &changes.changes {
                lines.push(format!("{}:", change.field));
                lines.push(format!(
                    "  - remote {}",
                    serde_json::to_string(&change.remote).unwrap_or_default()
                ));
                lines.push(format!(
                    "  + local  {}",
                    serde_json::to_string(&change.local).unwrap_or_default()
                ));
            }
            lines
        }
        DiffOutcome::NotUnique {
            local_matches,
            remote_matches,
        } => vec![format!(
            "'{}' matches {} local and {} remote recipe(s); exactly one of each is needed",
            report.pattern,
            local_matches.len(),
            remote_matches.len()
        )],
        DiffOutcome::TranslationFailed {
            local_id,
            name,
            error,
        } => vec![format!("{name} (local {local_id}) cannot be translated: {error}")],
    }
}

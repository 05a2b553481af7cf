use brewsync_core::session::{Gateway, SessionError, StatePersistence};
use brewsync_core::watch::{FileWatcher, POLL_INTERVAL, SETTLE_DELAY};
use brewsync_core::{NamePattern, SyncService};
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::commands::common::{open_repository, open_session, parse_pattern, Context};
use crate::commands::push::print_sync_report;
use crate::error::CliError;

/// Push once, then again after every settled change of the database file,
/// until Ctrl-C.
pub async fn run_daemon(context: &Context, pattern: Option<&str>) -> Result<(), CliError> {
    let pattern = parse_pattern(pattern)?;
    let repository = open_repository(&context.settings)?;
    let mut session = open_session(&context.settings)?;
    let mut service = SyncService::new(&mut session, context.options)
        .with_repository(&repository)
        .with_credentials(context.settings.credentials());

    push_once(&mut service, &pattern, context.json).await?;

    let mut watcher = FileWatcher::new(repository.path())?;
    let mut ticker = interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!("Watching {}", watcher.path().display());
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                tracing::info!("Interrupted, stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                if watcher.poll_changed()? {
                    sleep(SETTLE_DELAY).await;
                    push_once(&mut service, &pattern, context.json).await?;
                }
            }
        }
    }
}

/// Per-recipe failures and network hiccups are reported and the daemon keeps
/// going; anything else ends it.
pub async fn push_once<G: Gateway, S: StatePersistence>(
    service: &mut SyncService<'_, G, S>,
    pattern: &NamePattern,
    as_json: bool,
) -> Result<(), CliError> {
    match service.push(pattern).await {
        Ok(report) => {
            if report.has_failures() {
                tracing::warn!("{} recipe(s) could not be synced", report.failures());
            }
            print_sync_report(&report, as_json)
        }
        Err(brewsync_core::Error::Session(SessionError::TransientFetch(reason))) => {
            tracing::warn!("Push skipped, remote service unreachable: {}", reason);
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

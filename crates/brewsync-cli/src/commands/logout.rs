use brewsync_core::SyncService;

use crate::commands::common::{open_session, Context};
use crate::error::CliError;

pub async fn run_logout(context: &Context) -> Result<(), CliError> {
    let mut session = open_session(&context.settings)?;
    SyncService::new(&mut session, context.options)
        .logout()
        .await?;
    tracing::info!("Logged out");
    Ok(())
}

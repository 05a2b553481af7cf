use brewsync_core::SyncService;

use crate::commands::common::{open_session, parse_pattern, print_json, Context};
use crate::error::CliError;

/// Always JSON: the records are printed exactly as the service returns them.
pub async fn run_dump(context: &Context, pattern: Option<&str>) -> Result<(), CliError> {
    let pattern = parse_pattern(pattern)?;
    let mut session = open_session(&context.settings)?;
    let records = SyncService::new(&mut session, context.options)
        .with_credentials(context.settings.credentials())
        .dump(&pattern)
        .await?;
    print_json(&records)
}

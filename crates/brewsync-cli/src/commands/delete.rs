use brewsync_core::SyncService;

use crate::commands::common::{
    format_delete_lines, open_session, parse_pattern, print_json, print_lines, Context,
};
use crate::error::CliError;

pub async fn run_delete(context: &Context, pattern: &str) -> Result<(), CliError> {
    let pattern = parse_pattern(Some(pattern))?;
    let mut session = open_session(&context.settings)?;
    let report = SyncService::new(&mut session, context.options)
        .with_credentials(context.settings.credentials())
        .delete(&pattern)
        .await?;

    if context.json {
        print_json(&report)?;
    } else {
        print_lines(&format_delete_lines(&report));
    }

    match report.failures() {
        0 => Ok(()),
        failed => Err(CliError::Incomplete(failed)),
    }
}

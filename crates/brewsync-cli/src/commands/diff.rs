use brewsync_core::SyncService;

use crate::commands::common::{
    format_diff_lines, open_repository, open_session, parse_pattern, print_json, print_lines,
    Context,
};
use crate::error::CliError;

pub async fn run_diff(context: &Context, pattern: &str) -> Result<(), CliError> {
    let pattern = parse_pattern(Some(pattern))?;
    let repository = open_repository(&context.settings)?;
    let mut session = open_session(&context.settings)?;
    let report = SyncService::new(&mut session, context.options)
        .with_repository(&repository)
        .with_credentials(context.settings.credentials())
        .diff(&pattern)
        .await?;

    if context.json {
        print_json(&report)
    } else {
        print_lines(&format_diff_lines(&report));
        Ok(())
    }
}

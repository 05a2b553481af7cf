use brewsync_core::sync::SyncReport;
use brewsync_core::SyncService;

use crate::commands::common::{
    format_sync_lines, open_repository, open_session, parse_pattern, print_json, print_lines,
    Context,
};
use crate::error::CliError;

pub async fn run_push(context: &Context, pattern: Option<&str>) -> Result<(), CliError> {
    let pattern = parse_pattern(pattern)?;
    let repository = open_repository(&context.settings)?;
    let mut session = open_session(&context.settings)?;
    let report = SyncService::new(&mut session, context.options)
        .with_repository(&repository)
        .with_credentials(context.settings.credentials())
        .push(&pattern)
        .await?;

    print_sync_report(&report, context.json)?;
    if report.has_failures() {
        return Err(CliError::Incomplete(report.failures()));
    }
    Ok(())
}

pub fn print_sync_report(report: &SyncReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        print_json(report)
    } else {
        print_lines(&format_sync_lines(report));
        Ok(())
    }
}

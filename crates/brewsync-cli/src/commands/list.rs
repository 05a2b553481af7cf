use brewsync_core::SyncService;

use crate::commands::common::{
    format_list_lines, open_session, parse_pattern, print_json, print_lines, Context,
};
use crate::error::CliError;

/// Local recipes are included when the database exists; otherwise only the
/// remote side is listed.
pub async fn run_list(context: &Context, pattern: Option<&str>) -> Result<(), CliError> {
    let pattern = parse_pattern(pattern)?;
    let repository = if context.settings.kbh_file.is_file() {
        Some(brewsync_core::db::KbhRepository::new(&context.settings.kbh_file))
    } else {
        tracing::warn!(
            "{} not found, listing remote recipes only",
            context.settings.kbh_file.display()
        );
        None
    };

    let mut session = open_session(&context.settings)?;
    let mut service = SyncService::new(&mut session, context.options)
        .with_credentials(context.settings.credentials());
    if let Some(repository) = repository.as_ref() {
        service = service.with_repository(repository);
    }

    let report = service.list(&pattern).await?;
    if context.json {
        print_json(&report)?;
    } else {
        print_lines(&format_list_lines(&report));
    }
    Ok(())
}

use std::io;
use std::path::PathBuf;

use brewsync_core::session::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] brewsync_core::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No Grainfather account configured. Pass --user and --password (or --pwfile), or set them in the config file."
    )]
    MissingCredentials,
    #[error("Kleiner-Brauhelfer database not found at {}", .0.display())]
    MissingDatabase(PathBuf),
    #[error("{0} recipe(s) could not be synced")]
    Incomplete(usize),
}

//! brewsync-core - Core library for brewsync
//!
//! Reads recipes from a Kleiner-Brauhelfer database, translates them into
//! Grainfather recipe documents and keeps the remote copies in step through
//! a persisted, cookie-based web session.

pub mod db;
pub mod error;
pub mod models;
pub mod pattern;
pub mod service;
pub mod session;
pub mod sync;
pub mod tags;
pub mod translate;
pub mod util;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use models::{LocalRecipe, RecipeDocument, RemoteRecipe};
pub use pattern::NamePattern;
pub use service::{SyncOptions, SyncService};

pub mod common;
pub mod completions;
pub mod daemon;
pub mod delete;
pub mod diff;
pub mod dump;
pub mod list;
pub mod logout;
pub mod push;

//! Database and media backup/restore orchestration.
//!
//! A backup run exports the database and media through external commands,
//! archives them into `{prefix}.{timestamp}.tgz` and moves the bundle to a
//! local directory or copies it to a remote host. A restore run fetches the
//! latest bundle and feeds it back to the import commands.

pub mod core;
pub mod error;
pub mod utils;

pub use error::{Error, Result};

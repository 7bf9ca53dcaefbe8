pub mod archive;
pub mod backup;
pub mod config;
pub mod layout;
pub mod locate;
pub mod remote;
pub mod restore;
pub mod run;
pub mod signals;
pub mod staging;
pub mod tasks;
pub mod transport;

pub use config::{BackupConfig, ConfigOverrides, ConfigResolver};
pub use locate::{locate, ArtifactLocation, ArtifactRef};
pub use run::{run_backup, run_restore, BackupReport, RestoreReport};
pub use staging::StagingArea;
pub use tasks::{Asset, ShellTaskRunner, TaskRunner};
pub use transport::FinalLocation;

/// Built-in defaults, env keys and naming constants
///
/// Everything that ends up in a file name or a default value lives here so the
/// backup and restore paths agree on it.

/// Directory inside the staging area that becomes the archive root
pub const BACKUP_ROOT_DIR: &str = "backup_files";

/// Extension of a backup bundle
pub const BUNDLE_EXTENSION: &str = "tgz";

/// Suffix of the database dump inside a bundle (`{prefix}.sql`)
pub const DATABASE_DUMP_SUFFIX: &str = "sql";

/// Suffix of the media archive inside a bundle (`{prefix}.media.tgz`)
pub const MEDIA_ARCHIVE_SUFFIX: &str = "media.tgz";

/// Fixed-width, lexically sortable timestamp (`YYYYMMDD-HHMMSS`)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Prefix of staging directory names, followed by a random suffix
pub const STAGING_PREFIX: &str = "backup-cli.";

/// Placeholder replaced by the quoted file path in collaborator commands
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Env files consulted when `--env-file` is not given, later files win
pub const DEFAULT_ENV_FILES: &[&str] = &[
    "development/development.env",
    "development/creds.env",
    ".env",
];

// Built-in defaults
pub const DEFAULT_FILENAME_PREFIX: &str = "backup";
pub const DEFAULT_BACKUP_DIRECTORY: &str = "backups";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_USERNAME: &str = "backup";
pub const DEFAULT_REMOTE_DIR: &str = "backups";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SSH_PROGRAM: &str = "ssh";
pub const DEFAULT_SCP_PROGRAM: &str = "scp";

pub const DEFAULT_DB_EXPORT_COMMAND: &str = "invoke backup-db --output-file {path}";
pub const DEFAULT_MEDIA_EXPORT_COMMAND: &str = "invoke backup-media --output-file {path}";
pub const DEFAULT_DB_IMPORT_COMMAND: &str = "invoke import-db --input-file {path}";
pub const DEFAULT_MEDIA_IMPORT_COMMAND: &str = "invoke import-media --input-file {path}";

/// Env keys read from env files
pub mod env_keys {
    pub const FILENAME_PREFIX: &str = "BACKUP_FILENAME_STARTSWITH";
    pub const BACKUP_DIRECTORY: &str = "BACKUP_DIRECTORY";
    pub const HOST: &str = "BACKUP_HOST";
    pub const USERNAME: &str = "BACKUP_USERNAME";
    pub const REMOTE_DIR: &str = "BACKUP_REMOTE_DIR";
    pub const SCP_ENABLE: &str = "BACKUP_SCP_ENABLE";
    pub const STAGING_DIR: &str = "BACKUP_STAGING_DIR";
    pub const REMOTE_TIMEOUT: &str = "BACKUP_REMOTE_TIMEOUT";
    pub const SSH_PORT: &str = "BACKUP_SSH_PORT";
    pub const SSH_IDENTITY: &str = "BACKUP_SSH_IDENTITY";
    pub const SSH_PROGRAM: &str = "BACKUP_SSH_PROGRAM";
    pub const SCP_PROGRAM: &str = "BACKUP_SCP_PROGRAM";
    pub const PRIVILEGED_CHOWN: &str = "BACKUP_PRIVILEGED_CHOWN";
    pub const DB_EXPORT_COMMAND: &str = "BACKUP_DB_EXPORT_COMMAND";
    pub const MEDIA_EXPORT_COMMAND: &str = "BACKUP_MEDIA_EXPORT_COMMAND";
    pub const DB_IMPORT_COMMAND: &str = "BACKUP_DB_IMPORT_COMMAND";
    pub const MEDIA_IMPORT_COMMAND: &str = "BACKUP_MEDIA_IMPORT_COMMAND";
}

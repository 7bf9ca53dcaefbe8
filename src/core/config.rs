/// Configuration resolution for backup and restore runs
///
/// Merges three layers into one immutable `BackupConfig`:
/// built-in defaults, then env files (later files override earlier ones),
/// then explicit overrides from the command line. Env files are parsed, never
/// loaded into the process environment.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::utils::{env_keys, parse_bool_flag};
use crate::utils::{
    DEFAULT_BACKUP_DIRECTORY, DEFAULT_DB_EXPORT_COMMAND, DEFAULT_DB_IMPORT_COMMAND,
    DEFAULT_ENV_FILES, DEFAULT_FILENAME_PREFIX, DEFAULT_HOST, DEFAULT_MEDIA_EXPORT_COMMAND,
    DEFAULT_MEDIA_IMPORT_COMMAND, DEFAULT_REMOTE_DIR, DEFAULT_REMOTE_TIMEOUT_SECS,
    DEFAULT_SCP_PROGRAM, DEFAULT_SSH_PROGRAM, DEFAULT_USERNAME,
};

/// Effective configuration of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupConfig {
    pub filename_prefix: String,
    pub backup_directory: PathBuf,
    pub host: String,
    pub username: String,
    pub remote_dir: String,
    pub scp_enable: bool,
    pub staging_dir: PathBuf,
    pub remote_timeout_secs: u64,
    pub privileged_chown: bool,
    pub ssh: SshConfig,
    pub commands: TaskCommands,
}

/// How `ssh` and `scp` are invoked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SshConfig {
    pub ssh_program: String,
    pub scp_program: String,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
}

/// Shell command templates of the export/import collaborators
///
/// `{path}` is replaced by the quoted dump or media file path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCommands {
    pub db_export: String,
    pub media_export: String,
    pub db_import: String,
    pub media_import: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            filename_prefix: DEFAULT_FILENAME_PREFIX.to_string(),
            backup_directory: PathBuf::from(DEFAULT_BACKUP_DIRECTORY),
            host: DEFAULT_HOST.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            remote_dir: DEFAULT_REMOTE_DIR.to_string(),
            scp_enable: false,
            staging_dir: std::env::temp_dir(),
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            privileged_chown: false,
            ssh: SshConfig {
                ssh_program: DEFAULT_SSH_PROGRAM.to_string(),
                scp_program: DEFAULT_SCP_PROGRAM.to_string(),
                port: None,
                identity_file: None,
            },
            commands: TaskCommands {
                db_export: DEFAULT_DB_EXPORT_COMMAND.to_string(),
                media_export: DEFAULT_MEDIA_EXPORT_COMMAND.to_string(),
                db_import: DEFAULT_DB_IMPORT_COMMAND.to_string(),
                media_import: DEFAULT_MEDIA_IMPORT_COMMAND.to_string(),
            },
        }
    }
}

impl BackupConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// `user@host` as used by ssh and scp
    pub fn remote_destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// Apply key/value pairs gathered from env files
    ///
    /// Unknown keys are ignored; empty values count as unset.
    fn apply_env(&mut self, values: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(v) = get(env_keys::FILENAME_PREFIX) {
            self.filename_prefix = v.to_string();
        }
        if let Some(v) = get(env_keys::BACKUP_DIRECTORY) {
            self.backup_directory = PathBuf::from(v);
        }
        if let Some(v) = get(env_keys::HOST) {
            self.host = v.to_string();
        }
        if let Some(v) = get(env_keys::USERNAME) {
            self.username = v.to_string();
        }
        if let Some(v) = get(env_keys::REMOTE_DIR) {
            self.remote_dir = v.to_string();
        }
        if let Some(v) = get(env_keys::SCP_ENABLE) {
            self.scp_enable = parse_flag(env_keys::SCP_ENABLE, v)?;
        }
        if let Some(v) = get(env_keys::STAGING_DIR) {
            self.staging_dir = PathBuf::from(v);
        }
        if let Some(v) = get(env_keys::REMOTE_TIMEOUT) {
            self.remote_timeout_secs = v
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    Error::config(format!(
                        "{} must be a positive number of seconds, got {:?}",
                        env_keys::REMOTE_TIMEOUT,
                        v
                    ))
                })?;
        }
        if let Some(v) = get(env_keys::PRIVILEGED_CHOWN) {
            self.privileged_chown = parse_flag(env_keys::PRIVILEGED_CHOWN, v)?;
        }
        if let Some(v) = get(env_keys::SSH_PORT) {
            let port = v.parse::<u16>().map_err(|_| {
                Error::config(format!("{} must be a port number, got {:?}", env_keys::SSH_PORT, v))
            })?;
            self.ssh.port = Some(port);
        }
        if let Some(v) = get(env_keys::SSH_IDENTITY) {
            self.ssh.identity_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get(env_keys::SSH_PROGRAM) {
            self.ssh.ssh_program = v.to_string();
        }
        if let Some(v) = get(env_keys::SCP_PROGRAM) {
            self.ssh.scp_program = v.to_string();
        }
        if let Some(v) = get(env_keys::DB_EXPORT_COMMAND) {
            self.commands.db_export = v.to_string();
        }
        if let Some(v) = get(env_keys::MEDIA_EXPORT_COMMAND) {
            self.commands.media_export = v.to_string();
        }
        if let Some(v) = get(env_keys::DB_IMPORT_COMMAND) {
            self.commands.db_import = v.to_string();
        }
        if let Some(v) = get(env_keys::MEDIA_IMPORT_COMMAND) {
            self.commands.media_import = v.to_string();
        }

        Ok(())
    }

    /// Apply explicit overrides, field by field
    fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        if let Some(prefix) = &overrides.filename_prefix {
            self.filename_prefix = prefix.clone();
        }
        if let Some(dir) = &overrides.backup_directory {
            self.backup_directory = dir.clone();
        }
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(username) = &overrides.username {
            self.username = username.clone();
        }
        if let Some(remote_dir) = &overrides.remote_dir {
            self.remote_dir = remote_dir.clone();
        }
        if let Some(flag) = &overrides.scp_enable {
            self.scp_enable = parse_flag("--scp-enable", flag)?;
        }
        if let Some(dir) = &overrides.staging_dir {
            self.staging_dir = dir.clone();
        }

        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    parse_bool_flag(value).ok_or_else(|| {
        Error::config(format!("{} must be \"True\" or \"False\", got {:?}", name, value))
    })
}

/// Explicit overrides, usually taken from command-line flags
///
/// `scp_enable` stays a raw string so a malformed value surfaces as a
/// configuration error instead of being silently dropped.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub filename_prefix: Option<String>,
    pub backup_directory: Option<PathBuf>,
    pub host: Option<String>,
    pub username: Option<String>,
    pub remote_dir: Option<String>,
    pub scp_enable: Option<String>,
    pub staging_dir: Option<PathBuf>,
}

/// Resolved configuration plus the env files that contributed to it
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: BackupConfig,
    pub env_files: Vec<PathBuf>,
}

/// Layered configuration loader
pub struct ConfigResolver {
    env_files: Vec<PathBuf>,
}

impl ConfigResolver {
    /// Resolver reading the given env files, in order
    pub fn new(env_files: Vec<PathBuf>) -> Self {
        Self { env_files }
    }

    /// Resolver reading the default env files relative to `root`
    pub fn with_default_env_files(root: &Path) -> Self {
        Self::new(DEFAULT_ENV_FILES.iter().map(|f| root.join(f)).collect())
    }

    pub fn env_files(&self) -> &[PathBuf] {
        &self.env_files
    }

    /// Merge defaults, env files and overrides
    ///
    /// Missing env files are skipped. An env file that exists but cannot be
    /// read or parsed, or a malformed value in any layer, is a config error.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
        let mut values = HashMap::new();
        let mut loaded = Vec::new();

        for path in &self.env_files {
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "env file not present, skipping");
                continue;
            }

            let entries = read_env_file(path)?;
            tracing::debug!(path = %path.display(), keys = entries.len(), "loaded env file");
            values.extend(entries);
            loaded.push(path.clone());
        }

        let mut config = BackupConfig::default();
        config.apply_env(&values)?;
        config.apply_overrides(overrides)?;

        Ok(ResolvedConfig {
            config,
            env_files: loaded,
        })
    }
}

fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        Error::config(format!("failed to read env file {}: {}", path.display(), e))
    })?;

    iter.map(|item| {
        item.map_err(|e| {
            Error::config(format!("failed to parse env file {}: {}", path.display(), e))
        })
    })
    .collect()
}

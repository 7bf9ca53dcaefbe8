/// ssh/scp invocation with a bounded timeout

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::BackupConfig;
use crate::utils::shell_quote;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{program} timed out after {}", humantime::format_duration(*timeout))]
    TimedOut { program: String, timeout: Duration },
}

/// Remote host reachable over ssh/scp
#[derive(Debug, Clone)]
pub struct RemoteShell {
    destination: String,
    ssh_program: String,
    scp_program: String,
    port: Option<u16>,
    identity_file: Option<String>,
    timeout: Duration,
}

impl RemoteShell {
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            destination: config.remote_destination(),
            ssh_program: config.ssh.ssh_program.clone(),
            scp_program: config.ssh.scp_program.clone(),
            port: config.ssh.port,
            identity_file: config
                .ssh
                .identity_file
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            timeout: config.remote_timeout(),
        }
    }

    /// `user@host`
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// `user@host:path`
    pub fn qualify(&self, remote_path: &str) -> String {
        format!("{}:{}", self.destination, remote_path)
    }

    // BatchMode keeps ssh from prompting for a password and hanging.
    fn common_options(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if let Some(port) = self.port {
            args.push(port_flag.to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        args
    }

    fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = self.common_options("-p");
        args.push(self.destination.clone());
        args.push(remote_command.to_string());
        args
    }

    fn scp_args(&self, from: &str, to: &str) -> Vec<String> {
        let mut args = self.common_options("-P");
        args.push("-q".to_string());
        args.push(from.to_string());
        args.push(to.to_string());
        args
    }

    /// Run a command on the remote host, returning its stdout
    pub async fn exec(&self, remote_command: &str) -> Result<String, RemoteError> {
        let output = self.run(&self.ssh_program, self.ssh_args(remote_command)).await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// `mkdir -p` on the remote host
    pub async fn create_dir(&self, remote_dir: &str) -> Result<(), RemoteError> {
        self.exec(&format!("mkdir -p {}", shell_quote(remote_dir)))
            .await
            .map(|_| ())
    }

    /// File names directly under a remote directory
    pub async fn list_dir(&self, remote_dir: &str) -> Result<Vec<String>, RemoteError> {
        let stdout = self
            .exec(&format!("ls -1 -- {}", shell_quote(remote_dir)))
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Copy a local file into a remote directory
    pub async fn upload(&self, local: &Path, remote_dir: &str) -> Result<(), RemoteError> {
        let target = self.qualify(&format!("{}/", remote_dir.trim_end_matches('/')));
        self.run(
            &self.scp_program,
            self.scp_args(&local.to_string_lossy(), &target),
        )
        .await
        .map(|_| ())
    }

    /// Copy a remote file to a local path
    pub async fn download(&self, remote_path: &str, local: &Path) -> Result<(), RemoteError> {
        self.run(
            &self.scp_program,
            self.scp_args(&self.qualify(remote_path), &local.to_string_lossy()),
        )
        .await
        .map(|_| ())
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<Output, RemoteError> {
        tracing::debug!(program, ?args, "running remote command");

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| RemoteError::TimedOut {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| RemoteError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(RemoteError::Failed {
                program: program.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> BackupConfig {
        let mut config = BackupConfig {
            username: "ops".to_string(),
            host: "vault.example.com".to_string(),
            remote_timeout_secs: 1,
            ..Default::default()
        };
        config.ssh.port = Some(2222);
        config.ssh.identity_file = Some(PathBuf::from("/keys/id_ed25519"));
        config
    }

    #[test]
    fn test_ssh_args() {
        let remote = RemoteShell::from_config(&config());
        assert_eq!(
            remote.ssh_args("ls -1 -- /srv/backups"),
            vec![
                "-o", "BatchMode=yes", "-p", "2222", "-i", "/keys/id_ed25519",
                "ops@vault.example.com", "ls -1 -- /srv/backups",
            ]
        );
    }

    #[test]
    fn test_scp_args_use_capital_port_flag() {
        let remote = RemoteShell::from_config(&config());
        let args = remote.scp_args("/tmp/a.tgz", &remote.qualify("/srv/backups/"));
        assert_eq!(&args[2..4], &["-P".to_string(), "2222".to_string()]);
        assert_eq!(args.last().unwrap(), "ops@vault.example.com:/srv/backups/");
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let remote = RemoteShell {
            timeout: Duration::from_millis(200),
            ..RemoteShell::from_config(&config())
        };

        let err = remote
            .run("sh", vec!["-c".to_string(), "sleep 5".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let remote = RemoteShell::from_config(&config());
        let err = remote
            .run("sh", vec!["-c".to_string(), "echo nope >&2; exit 2".to_string()])
            .await
            .unwrap_err();

        match err {
            RemoteError::Failed { stderr, .. } => assert_eq!(stderr, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

/// Export/import collaborators
///
/// The orchestration never knows how a dump or a media archive is produced or
/// loaded. It hands a file path to a `TaskRunner` and only looks at the
/// outcome. `ShellTaskRunner` runs the configured command templates through
/// `sh -c`, substituting `{path}`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::core::config::TaskCommands;
use crate::error::{Error, Result};
use crate::utils::{shell_quote, PATH_PLACEHOLDER};

/// What a collaborator exports or imports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Database,
    Media,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Database => write!(f, "database"),
            Asset::Media => write!(f, "media"),
        }
    }
}

/// Capability to export assets to files and import them back
///
/// Implementations must not return before the file is fully written (export)
/// or consumed (import). Failures are reported as `Error::Export` /
/// `Error::Import`.
#[allow(async_fn_in_trait)]
pub trait TaskRunner {
    async fn export(&self, asset: Asset, output: &Path) -> Result<()>;

    async fn import(&self, asset: Asset, input: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Export,
    Import,
}

/// Runs collaborator command templates with `sh -c`
#[derive(Debug, Clone)]
pub struct ShellTaskRunner {
    commands: TaskCommands,
    working_dir: Option<PathBuf>,
}

impl ShellTaskRunner {
    pub fn new(commands: TaskCommands) -> Self {
        Self {
            commands,
            working_dir: None,
        }
    }

    /// Run commands from `dir` (e.g. the project holding the task runner)
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn template(&self, direction: Direction, asset: Asset) -> &str {
        match (direction, asset) {
            (Direction::Export, Asset::Database) => &self.commands.db_export,
            (Direction::Export, Asset::Media) => &self.commands.media_export,
            (Direction::Import, Asset::Database) => &self.commands.db_import,
            (Direction::Import, Asset::Media) => &self.commands.media_import,
        }
    }

    async fn run(&self, direction: Direction, asset: Asset, path: &Path) -> Result<()> {
        let command_line = render_command(self.template(direction, asset), path);
        let failed = |message: String| match direction {
            Direction::Export => Error::export(message),
            Direction::Import => Error::import(message),
        };

        tracing::debug!(%asset, command = %command_line, "running collaborator");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command_line)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .await
            .map_err(|e| failed(format!("could not start {} command `{}`: {}", asset, command_line, e)))?;

        if !status.success() {
            return Err(failed(format!(
                "{} command `{}` exited with {}",
                asset, command_line, status
            )));
        }

        Ok(())
    }
}

impl TaskRunner for ShellTaskRunner {
    async fn export(&self, asset: Asset, output: &Path) -> Result<()> {
        self.run(Direction::Export, asset, output).await
    }

    async fn import(&self, asset: Asset, input: &Path) -> Result<()> {
        self.run(Direction::Import, asset, input).await
    }
}

/// Substitute the quoted path into a command template
///
/// A template without `{path}` gets the path appended as last argument.
pub fn render_command(template: &str, path: &Path) -> String {
    let quoted = shell_quote(&path.to_string_lossy());
    if template.contains(PATH_PLACEHOLDER) {
        template.replace(PATH_PLACEHOLDER, &quoted)
    } else {
        format!("{} {}", template.trim_end(), quoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn commands(db_export: &str, db_import: &str) -> TaskCommands {
        TaskCommands {
            db_export: db_export.to_string(),
            media_export: "printf media > {path}".to_string(),
            db_import: db_import.to_string(),
            media_import: "test -f {path}".to_string(),
        }
    }

    #[test]
    fn test_render_command() {
        let path = Path::new("/tmp/stage dir/demo.sql");
        assert_eq!(
            render_command("invoke backup-db --output-file {path}", path),
            "invoke backup-db --output-file '/tmp/stage dir/demo.sql'"
        );
        assert_eq!(
            render_command("pg-dump-wrapper", Path::new("/tmp/a.sql")),
            "pg-dump-wrapper /tmp/a.sql"
        );
        assert_eq!(
            render_command("sleep 30 # {path}", Path::new("/tmp/a.sql")),
            "sleep 30 # /tmp/a.sql"
        );
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("demo.sql");
        let runner = ShellTaskRunner::new(commands("printf dump > {path}", "true"));

        runner.export(Asset::Database, &output).await.unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "dump");

        runner.export(Asset::Media, &dir.path().join("m.tgz")).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("m.tgz")).unwrap(), "media");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_export_error() {
        let dir = TempDir::new().unwrap();
        let runner = ShellTaskRunner::new(commands("exit 3", "true"));

        let err = runner
            .export(Asset::Database, &dir.path().join("demo.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Export { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_import_error() {
        let dir = TempDir::new().unwrap();
        let runner = ShellTaskRunner::new(commands("true", "false"));

        let err = runner
            .import(Asset::Database, &dir.path().join("demo.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Import { .. }));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let dir = TempDir::new().unwrap();
        let runner = ShellTaskRunner::new(commands("pwd > {path}", "true"))
            .with_working_dir(dir.path());
        let output = dir.path().join("pwd.txt");

        runner.export(Asset::Database, &output).await.unwrap();
        let pwd = fs::read_to_string(&output).unwrap();
        assert_eq!(
            fs::canonicalize(pwd.trim()).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
    }
}

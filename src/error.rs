/// Error taxonomy shared by every backup and restore step

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {message}")]
    Config { message: String },

    #[error("no backup artifact found: {message}")]
    NotFound { message: String },

    #[error("export failed: {message}")]
    Export { message: String },

    #[error("import failed: {message}")]
    Import { message: String },

    #[error("transport failed: {message}")]
    Transport { message: String },

    #[error("archive error ({}): {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted by {signal}")]
    Interrupted { signal: &'static str },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export { message: message.into() }
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::Import { message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive { path: path.into(), source }
    }
}

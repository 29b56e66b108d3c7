//! Error types shared by every module in this crate.

use thiserror::Error;

/// The single fallible-operation error type of `morph-core`.
///
/// Binaries convert this into `anyhow::Error` at the process boundary and
/// map the variants onto the exit codes documented in the crate's README:
/// `Configuration`/`Io` exit with code 1, `InvariantViolation` with code 2.
#[derive(Debug, Error)]
pub enum MorphError {
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        line: Option<usize>,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl MorphError {
    pub fn config(message: impl Into<String>) -> Self {
        MorphError::Configuration {
            message: message.into(),
            line: None,
        }
    }

    pub fn config_at(message: impl Into<String>, line: usize) -> Self {
        MorphError::Configuration {
            message: message.into(),
            line: Some(line),
        }
    }

    /// Process exit code mandated for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            MorphError::InvariantViolation(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, MorphError>;

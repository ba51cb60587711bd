//! ATW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AtwError>;

/// Top-level error type for the Altius Test Watcher.
///
/// Every variant surfaced from a poll cycle is fatal: the watcher does not
/// retry, it exits and leaves restarting to the supervisor.
#[derive(Debug, Error)]
pub enum AtwError {
    #[error("[ATW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ATW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ATW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ATW-2001] status fetch failure: {details}")]
    Transport { details: String },

    #[error("[ATW-2002] invalid retrieval code or date of birth")]
    InvalidInput,

    #[error("[ATW-2101] notification dispatch failure: {details}")]
    Notify { details: String },

    #[error("[ATW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ATW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl AtwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ATW-1001",
            Self::MissingConfig { .. } => "ATW-1002",
            Self::ConfigParse { .. } => "ATW-1003",
            Self::Transport { .. } => "ATW-2001",
            Self::InvalidInput => "ATW-2002",
            Self::Notify { .. } => "ATW-2101",
            Self::Io { .. } => "ATW-3002",
            Self::Runtime { .. } => "ATW-3900",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<toml::de::Error> for AtwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<AtwError> {
        vec![
            AtwError::InvalidConfig {
                details: String::new(),
            },
            AtwError::MissingConfig {
                path: PathBuf::new(),
            },
            AtwError::ConfigParse {
                context: "",
                details: String::new(),
            },
            AtwError::Transport {
                details: String::new(),
            },
            AtwError::InvalidInput,
            AtwError::Notify {
                details: String::new(),
            },
            AtwError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            AtwError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let codes: Vec<&str> = all_errors().iter().map(AtwError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_atw_prefix() {
        for err in &all_errors() {
            assert!(
                err.code().starts_with("ATW-"),
                "code {} must start with ATW-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = AtwError::Transport {
            details: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("ATW-2001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("connection refused"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = AtwError::io(
            "/tmp/test.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "ATW-3002");
        assert!(err.to_string().contains("/tmp/test.jsonl"));
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: AtwError = toml_err.into();
        assert_eq!(err.code(), "ATW-1003");
    }
}

//! Contains [Error], exported as [crate::Error]
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while deriving action IDs or hashing their inputs.
#[derive(Debug, Error)]
pub enum Error {
    /// The package uses a compilation mode whose inputs are not modelled.
    /// The payload names the feature, so callers can report it.
    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),

    #[error("no tool ID configured for {0:?}")]
    MissingToolId(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("unable to hash {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    #[error("action has no package")]
    MissingPackage,

    #[error("invalid digest length: {0}")]
    InvalidDigestLen(usize),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn unsupported_names_feature() {
        let err = Error::Unsupported("assembly");
        assert_eq!("unsupported configuration: assembly", err.to_string());
    }

    #[test]
    fn io_error_mentions_path() {
        let err = Error::Io {
            path: "/src/pkg/a.go".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/src/pkg/a.go"));
        assert!(msg.contains("file not found"));
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Coarse error taxonomy callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing knowledge directory or file
    NotFound,
    /// Unreadable or malformed structured file
    Load,
    /// Well-formed data that violates the schema or its invariants
    Validation,
    /// Another reload is already running
    Busy,
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge source not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {context}: {message}")]
    Validation { context: String, message: String },

    #[error("A reload is already in progress")]
    ReloadInProgress,
}

impl KnowledgeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } | Self::Parse { .. } => ErrorKind::Load,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ReloadInProgress => ErrorKind::Busy,
        }
    }

    pub(crate) fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let not_found = KnowledgeError::NotFound {
            path: PathBuf::from("/kb/diseases"),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert!(not_found.to_string().contains("/kb/diseases"));

        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let parse = KnowledgeError::Parse {
            path: PathBuf::from("a.json"),
            source: parse_err,
        };
        assert_eq!(parse.kind(), ErrorKind::Load);

        let validation = KnowledgeError::validation("disease file x.json", "bad weight");
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(validation.to_string(), "Invalid disease file x.json: bad weight");

        assert_eq!(KnowledgeError::ReloadInProgress.kind(), ErrorKind::Busy);
    }
}

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database does not have correct {tag} (expected {expected:#x}, found {found:#x})")]
    SchemaMismatch {
        tag: SchemaTag,
        expected: i64,
        found: i64,
    },

    #[error("database file is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Errors that `--fix` recovers from by replacing the file.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::Corrupt(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaTag {
    ApplicationId,
    Version,
}

impl std::fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApplicationId => f.write_str("application ID"),
            Self::Version => f.write_str("version"),
        }
    }
}

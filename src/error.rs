use std::path::PathBuf;
use thiserror::Error;

/// The registry could not be loaded. Nothing can be attributed without it, so
/// this aborts the run.
#[derive(Debug, Error)]
pub enum RegistryLoadError {
    #[error("cannot read resource registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed resource registry {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("resource registry {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("resource registry {path} has an empty '{column}' on line {line}")]
    EmptyField {
        path: PathBuf,
        column: &'static str,
        line: u64,
    },

    #[error("resource registry {path} lists '{resource_id}' more than once")]
    DuplicateResource { path: PathBuf, resource_id: String },

    #[error("resource registry {path} contains no storage resources")]
    Empty { path: PathBuf },
}

/// A disclosure file header does not carry a column the schema requires.
#[derive(Debug, Error, PartialEq)]
#[error("missing required column '{0}'")]
pub struct SchemaError(pub String);

/// One input file could not be used. Recoverable: the file is reported and
/// skipped, the rest of the period is still processed.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },

    #[error("cannot read price table {path}: {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },

    #[error("unsupported price table format: {path}")]
    UnsupportedFormat { path: PathBuf },
}

impl SourceError {
    pub fn path(&self) -> &PathBuf {
        match self {
            SourceError::Unreadable { path, .. }
            | SourceError::Csv { path, .. }
            | SourceError::Schema { path, .. }
            | SourceError::Polars { path, .. }
            | SourceError::UnsupportedFormat { path } => path,
        }
    }

    /// csv wraps open failures in its own error type; keep those apart from
    /// genuine parse failures.
    pub fn from_csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        let path = path.into();
        if !source.is_io_error() {
            return SourceError::Csv { path, source };
        }
        match source.into_kind() {
            csv::ErrorKind::Io(io) => SourceError::Unreadable { path, source: io },
            kind => SourceError::Unreadable {
                path,
                source: std::io::Error::new(std::io::ErrorKind::Other, format!("{kind:?}")),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize ledger to {path}: {source}")]
    Polars {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Fatal errors of a run. Everything below the registry load degrades into
/// `RunDiagnostics` instead.
#[derive(Debug, Error)]
pub enum RevenueError {
    #[error(transparent)]
    Registry(#[from] RegistryLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

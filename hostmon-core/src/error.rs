use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A severity profile failed validation.
///
/// Raised once, while profiles are being built. A profile that produced one of
/// these is never installed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("[{profile}] invalid clamp ({lo}, {hi}): lo must be below hi")]
    InvalidClamp { profile: String, lo: f64, hi: f64 },

    #[error("[{profile}] band list is empty")]
    NoBands { profile: String },

    #[error("[{profile}] first band starts at {first_min}, clamp starts at {lo}")]
    StartMismatch {
        profile: String,
        first_min: f64,
        lo: f64,
    },

    #[error("[{profile}] band #{index} is not increasing: {min} .. {max}")]
    NonMonotonic {
        profile: String,
        index: usize,
        min: f64,
        max: f64,
    },

    #[error("[{profile}] band #{index} ({min} .. {max}) leaves clamp ({lo}, {hi})")]
    OutOfClamp {
        profile: String,
        index: usize,
        min: f64,
        max: f64,
        lo: f64,
        hi: f64,
    },

    #[error("[{profile}] gap between bands: {from} .. {to}")]
    Gap { profile: String, from: f64, to: f64 },

    #[error("[{profile}] overlapping bands: {start} < {previous_max}")]
    Overlap {
        profile: String,
        start: f64,
        previous_max: f64,
    },

    #[error("[{profile}] last band ends at {last_max}, clamp ends at {hi}")]
    IncompleteCoverage {
        profile: String,
        last_max: f64,
        hi: f64,
    },
}

impl ConfigurationError {
    pub fn profile(&self) -> &str {
        match self {
            ConfigurationError::InvalidClamp { profile, .. }
            | ConfigurationError::NoBands { profile }
            | ConfigurationError::StartMismatch { profile, .. }
            | ConfigurationError::NonMonotonic { profile, .. }
            | ConfigurationError::OutOfClamp { profile, .. }
            | ConfigurationError::Gap { profile, .. }
            | ConfigurationError::Overlap { profile, .. }
            | ConfigurationError::IncompleteCoverage { profile, .. } => profile,
        }
    }
}

/// Soft failure reported by a raw metrics accessor.
#[derive(Error, Debug)]
pub enum AccessorError {
    #[error("{what} is not supported on this platform")]
    Unsupported { what: String },

    #[error("permission denied reading {what}")]
    PermissionDenied { what: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl AccessorError {
    pub fn unsupported<S: Into<String>>(what: S) -> Self {
        AccessorError::Unsupported { what: what.into() }
    }

    pub fn permission_denied<S: Into<String>>(what: S) -> Self {
        AccessorError::PermissionDenied { what: what.into() }
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        AccessorError::NotFound { what: what.into() }
    }

    /// Map an IO error for `what` onto the soft failure taxonomy.
    pub fn from_io<S: Into<String>>(what: S, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::permission_denied(what),
            io::ErrorKind::NotFound => Self::not_found(what),
            io::ErrorKind::Unsupported => Self::unsupported(what),
            _ => AccessorError::Io(err),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AccessorError::PermissionDenied { .. })
    }
}

impl From<procfs::ProcError> for AccessorError {
    fn from(err: procfs::ProcError) -> Self {
        match err {
            procfs::ProcError::PermissionDenied(path) => AccessorError::permission_denied(
                path.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "procfs".to_string()),
            ),
            procfs::ProcError::NotFound(path) => AccessorError::not_found(
                path.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "procfs".to_string()),
            ),
            procfs::ProcError::Io(e, _) => AccessorError::Io(e),
            other => AccessorError::Other(other.to_string()),
        }
    }
}

pub type SourceResult<T> = std::result::Result<T, AccessorError>;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("failed to build sampler runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to spawn sampler thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("cold start enumeration failed: {0}")]
    ColdStart(#[source] AccessorError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid severity profile: {0}")]
    Profile(#[from] ConfigurationError),
}

/// A field formatter rejected its input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot format {field}: {reason}")]
pub struct FormatError {
    pub field: String,
    pub reason: String,
}

impl FormatError {
    pub fn new<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

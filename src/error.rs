//! Error taxonomy shared across the engine (see `SPEC_FULL.md` §7/§10.2).

use thiserror::Error;

/// Raised at configuration boundaries. Validation never partially applies: either
/// every field of the incoming configuration is accepted, or none of it is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("release phase {index}: end ({end}) must be greater than start ({start})")]
    InvalidPhaseBounds { index: usize, start: f64, end: f64 },

    #[error("release phase {a} and {b} overlap in time")]
    OverlappingPhases { a: usize, b: usize },

    #[error("unknown tracer id '{0}'")]
    UnknownTracer(String),

    #[error("particle pool size must be positive, got {0}")]
    NonPositivePoolSize(i64),
}

/// Returned by `load_day` and the binary-format readers underneath the field services.
/// Per-query misses do not use this type; they collapse to `found: false` at the query
/// API (see `FieldError::GridMiss` for the one variant that is the exception while a
/// `load_day` is in flight).
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("io error reading day file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported day-file format: {reason}")]
    Format { reason: String },

    #[error("query coordinates outside the indexed envelope")]
    GridMiss,
}

impl FieldError {
    pub fn format(reason: impl Into<String>) -> Self {
        FieldError::Format {
            reason: reason.into(),
        }
    }
}

/// Wraps whatever a headless bake failed on. The caller is expected to still hold and
/// export the partial snapshot list alongside this error.
#[derive(Debug, Error)]
#[error("bake aborted: {reason}")]
pub struct BakeError {
    pub reason: String,
    #[source]
    pub source: Option<FieldError>,
}

impl BakeError {
    pub fn new(reason: impl Into<String>) -> Self {
        BakeError {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn from_field(reason: impl Into<String>, source: FieldError) -> Self {
        BakeError {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

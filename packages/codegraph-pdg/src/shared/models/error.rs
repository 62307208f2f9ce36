//! Error types for the codegraph-pdg crate
//!
//! Analysis errors are scoped to one procedure: the batch driver records them
//! next to the procedure and keeps going. Only boundary errors (I/O, config)
//! abort a whole run.

use crate::config::ConfigError;
use crate::shared::models::Span;
use thiserror::Error;

/// Error kind categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    MalformedControlFlow,
    InternalInvariantViolation,
    Parse,
    Config,
    Export,
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedControlFlow => "malformed_control_flow",
            ErrorKind::InternalInvariantViolation => "internal_invariant_violation",
            ErrorKind::Parse => "parse",
            ErrorKind::Config => "config",
            ErrorKind::Export => "export",
            ErrorKind::IO => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum PdgError {
    /// A jump without a matching target, or a tree the CFG builder cannot lower
    #[error("[malformed_control_flow] {procedure}: {message} at {span}")]
    MalformedControlFlow {
        procedure: String,
        message: String,
        span: Span,
    },

    /// Fixpoint or dominance bookkeeping went wrong. Always a bug upstream.
    #[error("[internal_invariant_violation] {procedure}: {message}")]
    InternalInvariantViolation { procedure: String, message: String },

    #[error("[parse] {path}: {message}")]
    Parse { path: String, message: String },

    #[error("[io] {0}")]
    Io(#[from] std::io::Error),

    #[error("[config] {0}")]
    Config(#[from] ConfigError),

    #[error("[export] {0}")]
    Export(#[from] serde_json::Error),
}

impl PdgError {
    pub fn malformed(procedure: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        PdgError::MalformedControlFlow {
            procedure: procedure.into(),
            message: message.into(),
            span,
        }
    }

    pub fn invariant(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        PdgError::InternalInvariantViolation {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        PdgError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PdgError::MalformedControlFlow { .. } => ErrorKind::MalformedControlFlow,
            PdgError::InternalInvariantViolation { .. } => ErrorKind::InternalInvariantViolation,
            PdgError::Parse { .. } => ErrorKind::Parse,
            PdgError::Io(_) => ErrorKind::IO,
            PdgError::Config(_) => ErrorKind::Config,
            PdgError::Export(_) => ErrorKind::Export,
        }
    }

    /// Whether the error should stop a whole batch rather than one procedure
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, PdgError::Io(_) | PdgError::Config(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PdgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PdgError::malformed("Foo.bar(int)", "break outside of loop or switch", Span::new(4, 8, 4, 14));

        let msg = format!("{}", err);
        assert!(msg.contains("malformed_control_flow"));
        assert!(msg.contains("Foo.bar(int)"));
        assert!(msg.contains("4:8-4:14"));
        assert_eq!(err.kind(), ErrorKind::MalformedControlFlow);
    }

    #[test]
    fn test_only_boundary_errors_abort_run() {
        assert!(!PdgError::invariant("p", "no ipdom").is_fatal_for_run());
        assert!(!PdgError::malformed("p", "x", Span::zero()).is_fatal_for_run());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(PdgError::from(io).is_fatal_for_run());
    }
}

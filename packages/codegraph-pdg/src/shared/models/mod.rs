//! Shared models

mod diagnostic;
mod error;
mod span;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{ErrorKind, PdgError, Result};
pub use span::Span;

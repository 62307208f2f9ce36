//! Syntax Adapter Port
//!
//! Defines the contract between a language front end and the CFG builder.
//! Each language lowers source text into language-neutral procedures.

use crate::features::syntax::domain::Procedure;
use crate::shared::models::Result;

pub trait SyntaxAdapter: Send + Sync {
    /// Language name as string
    fn language(&self) -> &'static str;

    /// File extensions handled, without the dot
    fn file_extensions(&self) -> &'static [&'static str];

    /// Every analyzable procedure in `source`, in source order.
    /// A syntax error fails the whole file with `PdgError::Parse`.
    fn lower_source(&self, source: &str, path: &str) -> Result<Vec<Procedure>>;

    fn handles_extension(&self, extension: &str) -> bool {
        self.file_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

//! Common error type.

use crate::diagnostic::Diagnostic;
use crate::symbols::Entries;
use crate::{elaborate, parse};

/// Common error type.
#[derive(Clone, Debug)]
pub enum Error {
    Parse(parse::Error),
    Scope(elaborate::Error),
    Diagnostic(Diagnostic),
}

impl Error {
    /// Render the error with symbol handles resolved against a registry.
    pub fn render<E: Entries>(&self, ctx: &E) -> String {
        match self {
            Self::Parse(err) => err.to_string(),
            Self::Scope(err) => err.to_string(),
            Self::Diagnostic(d) => d.render(ctx),
        }
    }
}

impl From<parse::Error> for Error {
    fn from(err: parse::Error) -> Self {
        Self::Parse(err)
    }
}

impl From<elaborate::Error> for Error {
    fn from(err: elaborate::Error) -> Self {
        Self::Scope(err)
    }
}

impl From<Diagnostic> for Error {
    fn from(err: Diagnostic) -> Self {
        Self::Diagnostic(err)
    }
}

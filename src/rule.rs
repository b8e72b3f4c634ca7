//! Rewrite rules.

use crate::{RTerm, Symbol};

/// Rewrite rule, installed as a down-value on the head symbol of its
/// left-hand side.
///
/// The left-hand side contains pattern holes for the symbols in
/// `patterns`; the right-hand side refers to them as ordinary symbols.
#[derive(Clone)]
pub struct Rule {
    /// pattern symbols bound by the left-hand side
    pub patterns: Vec<Symbol>,
    /// left-hand side (a call with pattern holes)
    pub lhs: RTerm,
    /// right-hand side (term to replace a match with)
    pub rhs: RTerm,
}

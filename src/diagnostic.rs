//! Diagnostics recorded during solving.

use crate::fmt::{name, pretty};
use crate::symbols::Entries;
use crate::{Constraint, RTerm, Symbol};

/// A problem found while solving; recording one never aborts solving.
///
/// Any diagnostic present at the end of an elaboration causes the
/// symbols created by it to be rolled back.
#[derive(Clone, Debug)]
pub enum Diagnostic {
    /// a symbol was used in a typed position but has no type
    UntypedExpression(RTerm),
    /// two terms were required to be equal but are not
    Unequal(RTerm, RTerm),
    /// a constraint could not be resolved within the iteration bound
    UnresolvedConstraint(Constraint),
    /// metavariables that were never assigned a value
    UninferredVars(Vec<Symbol>),
    /// a term was applied but its type does not normalise to a function type
    FnTypeExpected(RTerm),
}

impl Diagnostic {
    /// Render the diagnostic with symbol handles resolved against a registry.
    pub fn render<E: Entries>(&self, ctx: &E) -> String {
        match self {
            Self::UntypedExpression(tm) => {
                format!("untyped expression: {}", pretty(tm, ctx))
            }
            Self::Unequal(lhs, rhs) => {
                format!("unequal terms: {} and {}", pretty(lhs, ctx), pretty(rhs, ctx))
            }
            Self::UnresolvedConstraint(c) => format!("unresolved constraint: {}", c),
            Self::UninferredVars(vars) => {
                let vars: Vec<_> = vars.iter().map(|v| name(*v, ctx)).collect();
                format!("uninferred variables: {}", vars.join(", "))
            }
            Self::FnTypeExpected(tm) => {
                format!("function type expected: {}", pretty(tm, ctx))
            }
        }
    }
}

//! Elaboration and proof checking for a dependently-typed lambda calculus
//! with an explicit, cumulative hierarchy of universe levels.
//!
//! A source file consists of declarations: type assertions (`x : T`),
//! definitions (`x : T = v`, `x = v`), rewrite rules (`f(?x) := v`), and
//! equality checks (`lhs :=== rhs`).
//! The [`elaborate`] module resolves identifiers into a [`Symbols`]
//! registry, converts the raw syntax into core [`Term`]s, and seeds a
//! [`Solver`](solver::Solver) with typing and equality constraints.
//! The solver runs to a fixed point, unifying terms with the help of
//! the normaliser ([`reduce`]), assigning metavariables on the fly, and
//! defaulting omitted universe levels to `0l`.
//! A file is accepted iff every constraint is solved and every
//! metavariable is inferred; otherwise the registry is restored and
//! the diagnostics are reported.
//!
//! ~~~
//! use nivelo::{check, Symbols};
//!
//! let mut syms = Symbols::prelude();
//! let out = check("Nat: type(0l)\nNat.zero: Nat", &mut syms, 100);
//! assert!(out.is_ok());
//!
//! let out = check("bad: Undeclared", &mut syms, 100);
//! assert!(!out.is_ok());
//! ~~~

#[macro_use]
extern crate log;

pub mod constraint;
pub mod diagnostic;
pub mod elaborate;
pub mod error;
pub mod fmt;
pub mod matching;
pub mod parse;
pub mod preterm;
pub mod reduce;
pub mod rule;
pub mod scratch;
pub mod solver;
pub mod subst;
pub mod symbol;
pub mod symbols;
pub mod term;

pub use constraint::Constraint;
pub use diagnostic::Diagnostic;
pub use error::Error;
pub use rule::Rule;
pub use scratch::Scratch;
pub use symbol::Symbol;
pub use symbols::Symbols;
pub use term::{RTerm, Term};

/// Parse and elaborate a source string against the registry.
pub fn check(src: &str, syms: &mut Symbols, max_iterations: usize) -> elaborate::Outcome {
    elaborate::elaborate(parse::program(src), syms, max_iterations)
}

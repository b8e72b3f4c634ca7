//! Terms for the level-polymorphic dependent lambda calculus.

use crate::Symbol;
use core::fmt::{self, Display};
use core::ops::Deref;
use std::rc::Rc;

/// Pointer to a shared term.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RTerm(Rc<Term>);

/// Term of the calculus.
///
/// Every surface construct desugars into one of these tags.
/// Binders ([`Abst`] and dependent [`Prod`]) carry a symbol that is
/// unique across the whole program, so occurrences of a bound variable
/// are ordinary [`Symb`] nodes referring to it by handle.
///
/// [`Abst`]: Term::Abst
/// [`Prod`]: Term::Prod
/// [`Symb`]: Term::Symb
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Term {
    /// reference to a registry entry
    Symb(Symbol),
    /// n-ary application (at least one argument)
    Appl(RTerm, Vec<RTerm>),
    /// single-argument abstraction
    Abst(Symbol, RTerm),
    /// function type; dependent iff the binder symbol is present
    Prod(Option<Symbol>, RTerm, RTerm),
    /// universe with a level subscript
    Type(RTerm),
    /// the type of universe levels
    Level,
    /// closed level literal
    Lvl(u64),
    /// successor of a level
    Succ(RTerm),
    /// maximum of two levels
    Max(RTerm, RTerm),
    /// pattern hole; occurs only in rewrite-rule left-hand sides
    Pat(Option<Symbol>),
    /// `_`, a hole whose content is inferred
    Hole,
}

impl RTerm {
    /// Create a term pointer from a term.
    pub fn new(tm: Term) -> Self {
        Self(Rc::new(tm))
    }

    pub fn symb(s: Symbol) -> Self {
        Self::new(Term::Symb(s))
    }

    pub fn lvl(n: u64) -> Self {
        Self::new(Term::Lvl(n))
    }

    /// Compare the memory addresses of two term pointers.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Apply some arguments to the term, flattening nested applications.
    pub fn apply(self, mut args: Vec<RTerm>) -> Self {
        if args.is_empty() {
            return self;
        }
        if let Term::Appl(head, args1) = &*self {
            let mut args1 = args1.clone();
            args1.append(&mut args);
            return Self::new(Term::Appl(head.clone(), args1));
        }
        Self::new(Term::Appl(self, args))
    }
}

impl Deref for RTerm {
    type Target = Term;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Term> for RTerm {
    fn from(tm: Term) -> Self {
        Self::new(tm)
    }
}

impl Display for RTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Raw display, with symbols shown as bare handles.
///
/// This is used by logging; user-facing output goes through
/// [`Pretty`](crate::fmt::Pretty), which resolves handles to names.
impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Symb(s) => s.fmt(f),
            Self::Appl(head, args) => {
                write!(f, "{}(", head)?;
                let mut args = args.iter();
                if let Some(a) = args.next() {
                    a.fmt(f)?;
                }
                args.try_for_each(|a| write!(f, ", {}", a))?;
                write!(f, ")")
            }
            Self::Abst(x, tm) => write!(f, "(\\{} {})", x, tm),
            Self::Prod(None, a, b) => write!(f, "({} -> {})", a, b),
            Self::Prod(Some(x), a, b) => write!(f, "(({}: {}) -> {})", x, a, b),
            Self::Type(l) => write!(f, "type({})", l),
            Self::Level => write!(f, "builtin.Level"),
            Self::Lvl(n) => write!(f, "{}l", n),
            Self::Succ(l) => write!(f, "succ({})", l),
            Self::Max(a, b) => write!(f, "max({}, {})", a, b),
            Self::Pat(Some(v)) => write!(f, "?{}", v),
            Self::Pat(None) => write!(f, "?"),
            Self::Hole => write!(f, "_"),
        }
    }
}

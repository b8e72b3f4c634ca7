//! Registry-aware printing of terms in surface syntax.

use crate::symbols::Entries;
use crate::{Symbol, Term};
use core::fmt::{self, Display};

/// Name of a symbol: the dotted path for globals, the bare name for locals,
/// and `$n` for scratch handles whose layer is gone.
pub fn name<E: Entries>(s: Symbol, ctx: &E) -> String {
    match ctx.entry(s) {
        None => format!("${}", s.index().wrapping_sub(crate::scratch::BASE)),
        Some(e) if e.local || e.parent.is_none() => e.name.clone(),
        Some(e) => format!("{}.{}", name(e.parent.unwrap(), ctx), e.name),
    }
}

/// Term wrapper whose `Display` resolves symbol handles against a registry.
pub struct Pretty<'a, E> {
    pub tm: &'a Term,
    pub ctx: &'a E,
}

pub fn pretty<'a, E: Entries>(tm: &'a Term, ctx: &'a E) -> Pretty<'a, E> {
    Pretty { tm, ctx }
}

impl<'a, E: Entries> Pretty<'a, E> {
    fn wrap(&self, tm: &'a Term) -> Self {
        Pretty { tm, ctx: self.ctx }
    }

    /// Parenthesize binders and arrows in argument-ish positions.
    fn atomic(&self, tm: &'a Term, f: &mut fmt::Formatter) -> fmt::Result {
        match tm {
            Term::Abst(..) | Term::Prod(..) => write!(f, "({})", self.wrap(tm)),
            _ => self.wrap(tm).fmt(f),
        }
    }
}

impl<'a, E: Entries> Display for Pretty<'a, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ctx = self.ctx;
        match self.tm {
            Term::Symb(s) => name(*s, ctx).fmt(f),
            Term::Appl(head, args) => {
                self.atomic(head, f)?;
                write!(f, "(")?;
                let mut args = args.iter();
                if let Some(a) = args.next() {
                    self.wrap(a).fmt(f)?;
                }
                args.try_for_each(|a| write!(f, ", {}", self.wrap(a)))?;
                write!(f, ")")
            }
            Term::Abst(x, body) => write!(f, "\\{} {}", name(*x, ctx), self.wrap(body)),
            Term::Prod(None, a, b) => {
                self.atomic(a, f)?;
                write!(f, " -> {}", self.wrap(b))
            }
            Term::Prod(Some(x), a, b) => {
                write!(f, "({}: {}) -> {}", name(*x, ctx), self.wrap(a), self.wrap(b))
            }
            Term::Type(l) => write!(f, "type({})", self.wrap(l)),
            Term::Level => write!(f, "builtin.Level"),
            Term::Lvl(n) => write!(f, "{}l", n),
            Term::Succ(l) => write!(f, "succ({})", self.wrap(l)),
            Term::Max(a, b) => write!(f, "max({}, {})", self.wrap(a), self.wrap(b)),
            Term::Pat(Some(v)) => write!(f, "?{}", name(*v, ctx)),
            Term::Pat(None) => write!(f, "?"),
            Term::Hole => write!(f, "_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RTerm, Symbols};

    #[test]
    fn prints_surface_syntax() {
        let mut syms = Symbols::prelude();
        let (nat, _) = syms.create(None, "Nat", false);
        let (zero, _) = syms.create(Some(nat), "zero", false);
        let x = syms.fresh("x");

        let call = RTerm::symb(zero).apply(vec![RTerm::symb(nat)]);
        assert_eq!(pretty(&call, &syms).to_string(), "Nat.zero(Nat)");

        let pi: RTerm = Term::Prod(Some(x), RTerm::symb(nat), RTerm::symb(x)).into();
        assert_eq!(pretty(&pi, &syms).to_string(), "(x: Nat) -> x");

        let arr: RTerm = Term::Prod(None, RTerm::symb(nat), RTerm::symb(nat)).into();
        assert_eq!(pretty(&arr, &syms).to_string(), "Nat -> Nat");

        let lam: RTerm = Term::Abst(x, RTerm::symb(x)).into();
        assert_eq!(pretty(&lam, &syms).to_string(), "\\x x");

        let univ: RTerm = Term::Type(RTerm::lvl(0)).into();
        assert_eq!(pretty(&univ, &syms).to_string(), "type(0l)");
    }
}

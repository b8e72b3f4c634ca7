//! Pattern matching.

use crate::{subst, RTerm, Symbol, Term};
use fnv::FnvHashMap;

/// Assignment of pattern symbols to matched subterms.
pub type Subst = FnvHashMap<Symbol, RTerm>;

/// Match a subject against a pattern, extending the given substitution.
///
/// Pattern holes bind their variable on first sight; a second occurrence
/// of the same variable must match the previous binding structurally
/// (patterns may be nonlinear).
/// Binders match modulo α: the subject's binder symbol is renamed to the
/// pattern's before the bodies are compared.
pub fn matches(pat: &RTerm, subject: &RTerm, subst: &mut Subst) -> bool {
    match (&**pat, &**subject) {
        (Term::Pat(Some(v)), _) => match subst.get(v).cloned() {
            Some(prev) => matches(&prev, subject, subst),
            None => {
                subst.insert(*v, subject.clone());
                true
            }
        },
        (Term::Pat(None), _) => true,
        (Term::Symb(s), Term::Symb(s2)) => s == s2,
        (Term::Appl(f, args), Term::Appl(f2, args2)) => {
            args.len() == args2.len()
                && matches(f, f2, subst)
                && args.iter().zip(args2).all(|(p, a)| matches(p, a, subst))
        }
        (Term::Abst(x, body), Term::Abst(y, body2)) => {
            let body2 = subst::replace_one(body2, *y, &RTerm::symb(*x));
            matches(body, &body2, subst)
        }
        (Term::Prod(arg, a, b), Term::Prod(arg2, a2, b2)) => {
            if !matches(a, a2, subst) {
                return false;
            }
            let b2 = match (arg, arg2) {
                (Some(x), Some(y)) => subst::replace_one(b2, *y, &RTerm::symb(*x)),
                _ => b2.clone(),
            };
            matches(b, &b2, subst)
        }
        (Term::Type(l), Term::Type(l2)) => matches(l, l2, subst),
        (Term::Level, Term::Level) => true,
        (Term::Lvl(n), Term::Lvl(m)) => n == m,
        (Term::Succ(l), Term::Succ(l2)) => matches(l, l2, subst),
        (Term::Succ(l), Term::Lvl(n)) => *n > 0 && matches(l, &RTerm::lvl(n - 1), subst),
        (Term::Max(a, b), Term::Max(a2, b2)) => matches(a, a2, subst) && matches(b, b2, subst),
        (Term::Hole, Term::Hole) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(i: usize) -> Symbol {
        Symbol::new(i)
    }

    fn pat(v: Symbol) -> RTerm {
        Term::Pat(Some(v)).into()
    }

    #[test]
    fn binds_on_first_sight() {
        let f = s(0);
        let v = s(1);
        let a = s(2);
        let lhs = RTerm::symb(f).apply(vec![pat(v)]);
        let tm = RTerm::symb(f).apply(vec![RTerm::symb(a)]);
        let mut sub = Subst::default();
        assert!(matches(&lhs, &tm, &mut sub));
        assert_eq!(sub.get(&v), Some(&RTerm::symb(a)));
    }

    #[test]
    fn nonlinear_occurrences_must_agree() {
        let f = s(0);
        let v = s(1);
        let a = s(2);
        let b = s(3);
        let lhs = RTerm::symb(f).apply(vec![pat(v), pat(v)]);
        let same = RTerm::symb(f).apply(vec![RTerm::symb(a), RTerm::symb(a)]);
        let diff = RTerm::symb(f).apply(vec![RTerm::symb(a), RTerm::symb(b)]);
        assert!(matches(&lhs, &same, &mut Subst::default()));
        assert!(!matches(&lhs, &diff, &mut Subst::default()));
    }

    #[test]
    fn arity_must_agree() {
        let f = s(0);
        let v = s(1);
        let a = s(2);
        let lhs = RTerm::symb(f).apply(vec![pat(v)]);
        let tm = RTerm::symb(f).apply(vec![RTerm::symb(a), RTerm::symb(a)]);
        assert!(!matches(&lhs, &tm, &mut Subst::default()));
    }

    #[test]
    fn abstractions_match_modulo_alpha() {
        let x = s(0);
        let y = s(1);
        let lhs: RTerm = Term::Abst(x, RTerm::symb(x)).into();
        let tm: RTerm = Term::Abst(y, RTerm::symb(y)).into();
        assert!(matches(&lhs, &tm, &mut Subst::default()));
    }

    #[test]
    fn succ_decrements_literals() {
        let v = s(0);
        let lhs: RTerm = Term::Succ(pat(v)).into();
        let mut sub = Subst::default();
        assert!(matches(&lhs, &RTerm::lvl(3), &mut sub));
        assert_eq!(sub.get(&v), Some(&RTerm::lvl(2)));
        assert!(!matches(&lhs, &RTerm::lvl(0), &mut Subst::default()));
    }
}

//! Reduction to the visible normal form, including rewriting.

use crate::symbols::Entries;
use crate::{matching, subst, RTerm, Scratch, Term};

impl<'s> Scratch<'s> {
    /// Reduce a term until no local redex is visible.
    ///
    /// The returned flag reports whether any reduction fired;
    /// the solver uses it to decide whether an equation made progress
    /// or is blocked.
    ///
    /// At every node, in priority order: own-values are inlined,
    /// β-redexes are contracted (flattening application spines),
    /// down-values of the head symbol are tried in definition order
    /// with the first match winning, and closed level arithmetic is folded.
    pub fn expand(&self, tm: &RTerm) -> (RTerm, bool) {
        match &**tm {
            Term::Symb(s) => match self.entry(*s).and_then(|e| e.info.value.as_ref()) {
                Some(v) => {
                    trace!("expand: {} ⟶ {}", s, v);
                    (self.expand(v).0, true)
                }
                None => (tm.clone(), false),
            },
            Term::Appl(head, args) => self.expand_call(tm, head, args),
            Term::Abst(x, body) => {
                let (body2, changed) = self.expand(body);
                if changed {
                    (Term::Abst(*x, body2).into(), true)
                } else {
                    (tm.clone(), false)
                }
            }
            Term::Prod(arg, a, b) => {
                let (a2, ca) = self.expand(a);
                let (b2, cb) = self.expand(b);
                if ca || cb {
                    (Term::Prod(*arg, a2, b2).into(), true)
                } else {
                    (tm.clone(), false)
                }
            }
            Term::Type(l) => {
                let (l2, changed) = self.expand(l);
                if changed {
                    (Term::Type(l2).into(), true)
                } else {
                    (tm.clone(), false)
                }
            }
            Term::Succ(l) => {
                let (l2, changed) = self.expand(l);
                match &*l2 {
                    Term::Lvl(n) => (RTerm::lvl(n + 1), true),
                    _ if changed => (Term::Succ(l2).into(), true),
                    _ => (tm.clone(), false),
                }
            }
            Term::Max(a, b) => {
                let (a2, ca) = self.expand(a);
                let (b2, cb) = self.expand(b);
                match (&*a2, &*b2) {
                    (Term::Lvl(n), Term::Lvl(m)) => (RTerm::lvl(*n.max(m)), true),
                    (Term::Lvl(0), _) => (b2.clone(), true),
                    (_, Term::Lvl(0)) => (a2.clone(), true),
                    _ if ca || cb => (Term::Max(a2, b2).into(), true),
                    _ => (tm.clone(), false),
                }
            }
            Term::Level | Term::Lvl(_) | Term::Pat(_) | Term::Hole => (tm.clone(), false),
        }
    }

    fn expand_call(&self, tm: &RTerm, head: &RTerm, args: &[RTerm]) -> (RTerm, bool) {
        let mut head = head.clone();
        let mut args = args.to_vec();
        let mut changed = false;

        loop {
            let (head2, ch) = self.expand(&head);
            head = head2;
            changed |= ch;
            match &*head {
                Term::Abst(x, body) if !args.is_empty() => {
                    let arg = args.remove(0);
                    head = subst::replace_one(body, *x, &arg);
                    changed = true;
                }
                Term::Appl(inner_head, inner_args) => {
                    let mut args2 = inner_args.clone();
                    args2.append(&mut args);
                    args = args2;
                    head = inner_head.clone();
                    changed = true;
                }
                _ => break,
            }
        }

        if args.is_empty() {
            // all arguments were consumed by β-reduction
            return (head, true);
        }

        for a in args.iter_mut() {
            let (a2, ch) = self.expand(a);
            *a = a2;
            changed |= ch;
        }

        if let Term::Symb(s) = &*head {
            let rules = self.entry(*s).map(|e| e.info.rules.as_slice());
            for rule in rules.unwrap_or(&[]) {
                let pargs = match &*rule.lhs {
                    Term::Appl(_, pargs) => pargs,
                    _ => continue,
                };
                if pargs.len() > args.len() {
                    continue;
                }
                let mut sub = matching::Subst::default();
                if pargs.iter().zip(&args).all(|(p, a)| matching::matches(p, a, &mut sub)) {
                    trace!("rewrite: {} ⟶ {}", rule.lhs, rule.rhs);
                    let rest = args[pargs.len()..].to_vec();
                    let res = subst::replace_many(&rule.rhs, &sub).apply(rest);
                    return (self.expand(&res).0, true);
                }
            }
        }

        if changed {
            (head.apply(args), true)
        } else {
            (tm.clone(), false)
        }
    }
}

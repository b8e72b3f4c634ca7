//! Iterative constraint solving and unification.

use crate::symbols::Entries;
use crate::{subst, Constraint, Diagnostic, RTerm, Scratch, Symbol, Term};
use fnv::{FnvHashMap, FnvHashSet};
use std::mem;

/// Worklist solver for the constraints seeded by the elaborator.
///
/// Each iteration drains the queue in insertion order.
/// Evaluating a constraint either consumes it, posts new (simpler)
/// constraints, or re-queues it unchanged; new constraints join the queue
/// drained by the *next* iteration.
/// Once an iteration makes no progress, one *stuck pass* runs with
/// call-against-call decomposition enabled, which is only sound
/// after all heads have stopped reducing.
pub struct Solver {
    queue: Vec<Constraint>,
    /// permanent symbols the current elaboration may write to
    unlocked: FnvHashSet<Symbol>,
    /// permanent symbols whose entries were mutated during solving
    affected: FnvHashSet<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
    max_iterations: usize,
}

impl Solver {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            queue: Vec::new(),
            unlocked: Default::default(),
            affected: Default::default(),
            diagnostics: Vec::new(),
            max_iterations,
        }
    }

    /// Mark a declaration target as writable for this elaboration.
    pub fn unlock(&mut self, s: Symbol) {
        self.unlocked.insert(s);
    }

    /// Record a permanent symbol as mutated, so that the final check
    /// substitutes inferred metavariable values into its entry.
    pub fn touch(&mut self, s: Symbol) {
        self.affected.insert(s);
    }

    pub fn push(&mut self, c: Constraint) {
        self.queue.push(c);
    }

    /// Directly assign an own-value, as the elaborator does for bare
    /// definitions. Fails only if the assignment would create a cycle.
    pub fn define(&mut self, sc: &mut Scratch, s: Symbol, v: &RTerm) -> bool {
        if occurs(sc, s, v) {
            return false;
        }
        sc.get_mut(s).info.value = Some(v.clone());
        if !sc.is_temp(s) {
            self.affected.insert(s);
        }
        true
    }

    /// Run to a fixed point (or the iteration bound).
    pub fn solve(&mut self, sc: &mut Scratch) {
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                warn!(
                    "iteration bound reached with {} pending constraints",
                    self.queue.len()
                );
                break;
            }
            if self.pass(sc, false) {
                continue;
            }
            if !self.pass(sc, true) {
                break;
            }
        }
    }

    fn pass(&mut self, sc: &mut Scratch, stuck: bool) -> bool {
        let batch = mem::take(&mut self.queue);
        debug!("pass over {} constraints (stuck: {})", batch.len(), stuck);
        let mut changed = false;
        for c in batch {
            changed |= self.eval(sc, c, stuck);
        }
        changed
    }

    fn eval(&mut self, sc: &mut Scratch, c: Constraint, stuck: bool) -> bool {
        trace!("eval: {}", c);
        match c {
            Constraint::Typed { tm, ty } => self.eval_typed(sc, tm, ty),
            Constraint::FnTyped { head, args, ty } => self.eval_fn(sc, head, args, ty),
            Constraint::Equal { lhs, rhs } => self.eval_equal(sc, lhs, rhs, stuck),
            Constraint::ProdEqual { fty, args, out } => self.eval_prod(sc, fty, args, out),
        }
    }

    fn eval_typed(&mut self, sc: &mut Scratch, tm: RTerm, ty: RTerm) -> bool {
        match &*tm {
            Term::Symb(s) | Term::Pat(Some(s)) => self.eval_symbol_typed(sc, *s, ty),
            Term::Appl(head, args) => {
                let (head, args) = (head.clone(), args.clone());
                self.push(Constraint::FnTyped { head, args, ty });
                true
            }
            Term::Abst(x, body) => {
                let input = sc.fresh_meta();
                let output = sc.fresh_meta();
                let name = sc.name_of(*x);
                let local = sc.fresh_local(&name, Some(RTerm::symb(input)));
                let body = subst::replace_one(body, *x, &RTerm::symb(local));
                self.push(Constraint::Typed {
                    tm: body,
                    ty: RTerm::symb(output),
                });
                let pi = Term::Prod(Some(local), RTerm::symb(input), RTerm::symb(output));
                self.push(Constraint::Equal {
                    lhs: pi.into(),
                    rhs: ty,
                });
                true
            }
            Term::Prod(arg, a, b) => {
                let la = sc.fresh_level();
                let lb = sc.fresh_level();
                self.push(Constraint::Typed {
                    tm: a.clone(),
                    ty: Term::Type(RTerm::symb(la)).into(),
                });
                let b = match arg {
                    Some(x) => {
                        let name = sc.name_of(*x);
                        let local = sc.fresh_local(&name, Some(a.clone()));
                        subst::replace_one(b, *x, &RTerm::symb(local))
                    }
                    None => b.clone(),
                };
                self.push(Constraint::Typed {
                    tm: b,
                    ty: Term::Type(RTerm::symb(lb)).into(),
                });
                let max = Term::Max(RTerm::symb(la), RTerm::symb(lb));
                self.push(Constraint::Equal {
                    lhs: Term::Type(max.into()).into(),
                    rhs: ty,
                });
                true
            }
            Term::Type(l) => {
                let succ = Term::Type(Term::Succ(l.clone()).into());
                self.push(Constraint::Equal {
                    lhs: succ.into(),
                    rhs: ty,
                });
                true
            }
            Term::Lvl(_) | Term::Succ(_) | Term::Max(_, _) => {
                self.push(Constraint::Equal {
                    lhs: Term::Level.into(),
                    rhs: ty,
                });
                true
            }
            Term::Level => {
                self.push(Constraint::Equal {
                    lhs: Term::Type(RTerm::lvl(0)).into(),
                    rhs: ty,
                });
                true
            }
            Term::Pat(None) | Term::Hole => true,
        }
    }

    fn eval_symbol_typed(&mut self, sc: &mut Scratch, s: Symbol, ty: RTerm) -> bool {
        if let Some(t) = sc.get(s).info.typ.clone() {
            self.push(Constraint::Equal { lhs: t, rhs: ty });
            return true;
        }
        if self.set_type(sc, s, &ty) {
            if let Some(v) = sc.get(s).info.value.clone() {
                self.push(Constraint::Typed { tm: v, ty });
            }
            return true;
        }
        self.diagnostics
            .push(Diagnostic::UntypedExpression(RTerm::symb(s)));
        true
    }

    fn eval_fn(&mut self, sc: &mut Scratch, head: RTerm, args: Vec<RTerm>, ty: RTerm) -> bool {
        match &*head {
            Term::Symb(s) | Term::Pat(Some(s)) => {
                let s = *s;
                if let Some(t) = sc.get(s).info.typ.clone() {
                    self.push(Constraint::ProdEqual {
                        fty: t,
                        args,
                        out: ty,
                    });
                    return true;
                }
                if !self.type_writable(sc, s) {
                    self.diagnostics
                        .push(Diagnostic::UntypedExpression(RTerm::symb(s)));
                    return true;
                }
                // the head may still receive a type from a pending constraint
                self.push(Constraint::FnTyped {
                    head: head.clone(),
                    args,
                    ty,
                });
                false
            }
            Term::Appl(inner_head, inner_args) => {
                let mut all = inner_args.clone();
                let head = inner_head.clone();
                all.extend(args);
                self.push(Constraint::FnTyped {
                    head,
                    args: all,
                    ty,
                });
                true
            }
            Term::Abst(x, body) => {
                let mut args = args;
                let first = args.remove(0);
                let body = subst::replace_one(body, *x, &first);
                if args.is_empty() {
                    self.push(Constraint::Typed { tm: body, ty });
                } else {
                    self.push(Constraint::FnTyped {
                        head: body,
                        args,
                        ty,
                    });
                }
                true
            }
            Term::Pat(None) | Term::Hole => true,
            _ => {
                self.diagnostics.push(Diagnostic::FnTypeExpected(head.clone()));
                true
            }
        }
    }

    fn eval_equal(&mut self, sc: &mut Scratch, lhs: RTerm, rhs: RTerm, stuck: bool) -> bool {
        let (l, cl) = sc.expand(&lhs);
        let (r, cr) = sc.expand(&rhs);
        let progressed = cl || cr;

        // pattern holes equate like their variables
        let l = match &*l {
            Term::Pat(Some(v)) => RTerm::symb(*v),
            _ => l,
        };
        let r = match &*r {
            Term::Pat(Some(v)) => RTerm::symb(*v),
            _ => r,
        };

        if l == r {
            return true;
        }

        // orientation: a bare symbol goes to the left;
        // among two symbols, prefer a temp on the left
        let swap = match (&*l, &*r) {
            (Term::Symb(a), Term::Symb(b)) => sc.is_temp(*b) && !sc.is_temp(*a),
            (Term::Symb(_), _) => false,
            (_, Term::Symb(_)) => true,
            _ => false,
        };
        let (l, r) = if swap { (r, l) } else { (l, r) };

        match (&*l, &*r) {
            (Term::Symb(a), _) => {
                let a = *a;
                if self.try_assign(sc, a, &r) {
                    if let Some(t) = sc.get(a).info.typ.clone() {
                        self.push(Constraint::Typed {
                            tm: r.clone(),
                            ty: t,
                        });
                    }
                    return true;
                }
                self.requeue_equal(l.clone(), r.clone(), lhs, rhs, progressed, stuck)
            }
            (Term::Abst(x, b1), Term::Abst(y, b2)) => {
                let name = sc.name_of(*x);
                let z = sc.fresh_local(&name, None);
                let b1 = subst::replace_one(b1, *x, &RTerm::symb(z));
                let b2 = subst::replace_one(b2, *y, &RTerm::symb(z));
                self.push(Constraint::Equal { lhs: b1, rhs: b2 });
                true
            }
            (Term::Prod(a1, i1, o1), Term::Prod(a2, i2, o2)) => {
                self.push(Constraint::Equal {
                    lhs: i1.clone(),
                    rhs: i2.clone(),
                });
                let z = sc.fresh_local("x", Some(i1.clone()));
                let o1 = match a1 {
                    Some(x) => subst::replace_one(o1, *x, &RTerm::symb(z)),
                    None => o1.clone(),
                };
                let o2 = match a2 {
                    Some(y) => subst::replace_one(o2, *y, &RTerm::symb(z)),
                    None => o2.clone(),
                };
                self.push(Constraint::Equal { lhs: o1, rhs: o2 });
                true
            }
            (Term::Type(m), Term::Type(n)) => {
                self.push(Constraint::Equal {
                    lhs: m.clone(),
                    rhs: n.clone(),
                });
                true
            }
            (Term::Level, Term::Level) => true,
            (Term::Lvl(m), Term::Lvl(n)) => {
                if m != n {
                    self.diagnostics.push(Diagnostic::Unequal(l.clone(), r.clone()));
                }
                true
            }
            (Term::Succ(x), Term::Succ(y)) => {
                self.push(Constraint::Equal {
                    lhs: x.clone(),
                    rhs: y.clone(),
                });
                true
            }
            (Term::Succ(x), Term::Lvl(n)) | (Term::Lvl(n), Term::Succ(x)) => {
                if *n > 0 {
                    self.push(Constraint::Equal {
                        lhs: x.clone(),
                        rhs: RTerm::lvl(n - 1),
                    });
                } else {
                    self.diagnostics.push(Diagnostic::Unequal(l.clone(), r.clone()));
                }
                true
            }
            (Term::Appl(f1, args1), Term::Appl(f2, args2)) if stuck => {
                if args1.len() == args2.len() {
                    self.push(Constraint::Equal {
                        lhs: f1.clone(),
                        rhs: f2.clone(),
                    });
                    for (a1, a2) in args1.iter().zip(args2) {
                        self.push(Constraint::Equal {
                            lhs: a1.clone(),
                            rhs: a2.clone(),
                        });
                    }
                } else {
                    self.diagnostics.push(Diagnostic::Unequal(l.clone(), r.clone()));
                }
                true
            }
            _ => self.requeue_equal(l.clone(), r.clone(), lhs, rhs, progressed, stuck),
        }
    }

    /// An equation that decomposed no further:
    /// report it in the stuck pass, re-post it expanded if expansion
    /// made progress, re-queue it unchanged otherwise.
    fn requeue_equal(
        &mut self,
        l: RTerm,
        r: RTerm,
        lhs: RTerm,
        rhs: RTerm,
        progressed: bool,
        stuck: bool,
    ) -> bool {
        if stuck {
            self.diagnostics.push(Diagnostic::Unequal(l, r));
            true
        } else if progressed {
            self.push(Constraint::Equal { lhs: l, rhs: r });
            true
        } else {
            self.push(Constraint::Equal { lhs, rhs });
            false
        }
    }

    fn eval_prod(&mut self, sc: &mut Scratch, fty: RTerm, args: Vec<RTerm>, out: RTerm) -> bool {
        let (f, changed) = sc.expand(&fty);
        match &*f {
            Term::Prod(arg, a, b) => {
                let first = args[0].clone();
                self.push(Constraint::Typed {
                    tm: first.clone(),
                    ty: a.clone(),
                });
                let b = match arg {
                    Some(x) => subst::replace_one(b, *x, &first),
                    None => b.clone(),
                };
                if args.len() == 1 {
                    self.push(Constraint::Equal { lhs: b, rhs: out });
                } else {
                    self.push(Constraint::ProdEqual {
                        fty: b,
                        args: args[1..].to_vec(),
                        out,
                    });
                }
                true
            }
            _ if changed => {
                self.push(Constraint::ProdEqual {
                    fty: f.clone(),
                    args,
                    out,
                });
                true
            }
            // a symbol or call may still reduce to a Π once solved
            Term::Symb(_) | Term::Appl(..) | Term::Pat(_) | Term::Hole => {
                self.push(Constraint::ProdEqual { fty, args, out });
                false
            }
            _ => {
                self.diagnostics.push(Diagnostic::FnTypeExpected(f.clone()));
                true
            }
        }
    }

    fn type_writable(&self, sc: &Scratch, s: Symbol) -> bool {
        sc.is_temp(s) || self.unlocked.contains(&s)
    }

    fn set_type(&mut self, sc: &mut Scratch, s: Symbol, ty: &RTerm) -> bool {
        if !self.type_writable(sc, s) || sc.get(s).info.typ.is_some() {
            return false;
        }
        debug!("type: {} : {}", s, ty);
        sc.get_mut(s).info.typ = Some(ty.clone());
        if !sc.is_temp(s) {
            self.affected.insert(s);
        }
        true
    }

    /// Assign an own-value during unification.
    ///
    /// Succeeds only if the symbol has no own-value yet, is a temp or
    /// unlocked non-local symbol, and the value does not refer back to it
    /// through own-values.
    fn try_assign(&mut self, sc: &mut Scratch, s: Symbol, v: &RTerm) -> bool {
        let e = sc.get(s);
        if e.info.value.is_some() || e.local {
            return false;
        }
        if !(sc.is_temp(s) || self.unlocked.contains(&s)) {
            return false;
        }
        if occurs(sc, s, v) {
            return false;
        }
        debug!("assign: {} ≔ {}", s, v);
        sc.get_mut(s).info.value = Some(v.clone());
        if !sc.is_temp(s) {
            self.affected.insert(s);
        }
        true
    }

    /// Final check after iteration has terminated.
    pub fn finish(&mut self, sc: &mut Scratch) {
        // undetermined universe levels collapse to the smallest allowed
        let defaults: Vec<Symbol> = sc
            .temps()
            .filter(|&t| {
                let e = sc.get(t);
                e.info.value.is_none()
                    && match &e.info.typ {
                        Some(ty) => matches!(&*sc.expand(ty).0, Term::Level),
                        None => false,
                    }
            })
            .collect();
        for t in defaults {
            debug!("default: {} ≔ 0l", t);
            sc.get_mut(t).info.value = Some(RTerm::lvl(0));
        }

        for c in mem::take(&mut self.queue) {
            self.diagnostics.push(Diagnostic::UnresolvedConstraint(c));
        }

        let uninferred: Vec<Symbol> = sc
            .temps()
            .filter(|&t| {
                let e = sc.get(t);
                e.info.value.is_none() && !e.local
            })
            .collect();
        if !uninferred.is_empty() {
            self.diagnostics.push(Diagnostic::UninferredVars(uninferred));
        }

        // instantiate temp own-values in every permanent entry we touched
        let mut map = FnvHashMap::default();
        for t in sc.temps() {
            if let Some(v) = sc.get(t).info.value.clone() {
                map.insert(t, v);
            }
        }
        for _ in 0..map.len() {
            let keys: Vec<Symbol> = map.keys().copied().collect();
            let mut changed = false;
            for k in keys {
                let v = map[&k].clone();
                let v2 = subst::replace_many(&v, &map);
                if !v.ptr_eq(&v2) {
                    changed = true;
                    map.insert(k, v2);
                }
            }
            if !changed {
                break;
            }
        }
        let affected: Vec<Symbol> = self.affected.iter().copied().collect();
        for s in affected {
            let e = sc.perm.get_mut(s);
            if let Some(t) = e.info.typ.take() {
                e.info.typ = Some(subst::replace_many(&t, &map));
            }
            if let Some(v) = e.info.value.take() {
                e.info.value = Some(subst::replace_many(&v, &map));
            }
            for rule in e.info.rules.iter_mut() {
                rule.lhs = subst::replace_many(&rule.lhs, &map);
                rule.rhs = subst::replace_many(&rule.rhs, &map);
            }
        }
    }
}

/// Does `s` occur in `tm`, transitively through own-values?
fn occurs(sc: &Scratch, s: Symbol, tm: &RTerm) -> bool {
    fn go(sc: &Scratch, s: Symbol, tm: &RTerm, visited: &mut FnvHashSet<Symbol>) -> bool {
        match &**tm {
            Term::Symb(s2) | Term::Pat(Some(s2)) => {
                if *s2 == s {
                    return true;
                }
                if visited.insert(*s2) {
                    if let Some(v) = sc.entry(*s2).and_then(|e| e.info.value.as_ref()) {
                        return go(sc, s, v, visited);
                    }
                }
                false
            }
            Term::Appl(f, args) => {
                go(sc, s, f, visited) || args.iter().any(|a| go(sc, s, a, visited))
            }
            Term::Abst(_, b) => go(sc, s, b, visited),
            Term::Prod(_, a, b) => go(sc, s, a, visited) || go(sc, s, b, visited),
            Term::Type(l) | Term::Succ(l) => go(sc, s, l, visited),
            Term::Max(a, b) => go(sc, s, a, visited) || go(sc, s, b, visited),
            Term::Level | Term::Lvl(_) | Term::Pat(None) | Term::Hole => false,
        }
    }
    go(sc, s, tm, &mut FnvHashSet::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbols;

    fn equal(lhs: RTerm, rhs: RTerm) -> Constraint {
        Constraint::Equal { lhs, rhs }
    }

    #[test]
    fn level_metas_default_to_zero() {
        let mut syms = Symbols::new();
        let mut sc = Scratch::new(&mut syms);
        let m = sc.fresh_level();
        let mut solver = Solver::new(100);
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(solver.diagnostics.is_empty());
        assert_eq!(sc.get(m).info.value, Some(RTerm::lvl(0)));
    }

    #[test]
    fn successor_equations_decrement() {
        let mut syms = Symbols::new();
        let mut sc = Scratch::new(&mut syms);
        let m = sc.fresh_level();
        let mut solver = Solver::new(100);
        solver.push(equal(Term::Succ(RTerm::symb(m)).into(), RTerm::lvl(3)));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(solver.diagnostics.is_empty());
        assert_eq!(sc.get(m).info.value, Some(RTerm::lvl(2)));
    }

    #[test]
    fn distinct_literals_are_unequal() {
        let mut syms = Symbols::new();
        let mut sc = Scratch::new(&mut syms);
        let mut solver = Solver::new(100);
        solver.push(equal(RTerm::lvl(1), RTerm::lvl(2)));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(matches!(solver.diagnostics[..], [Diagnostic::Unequal(..)]));
    }

    #[test]
    fn locked_symbols_are_not_assigned() {
        let mut syms = Symbols::new();
        let (a, _) = syms.create(None, "a", false);
        let mut sc = Scratch::new(&mut syms);
        let mut solver = Solver::new(100);
        solver.push(equal(RTerm::symb(a), RTerm::lvl(0)));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(matches!(solver.diagnostics[..], [Diagnostic::Unequal(..)]));
        assert!(sc.get(a).info.value.is_none());
    }

    #[test]
    fn unlocked_symbols_are_assigned() {
        let mut syms = Symbols::new();
        let (a, _) = syms.create(None, "a", false);
        let mut sc = Scratch::new(&mut syms);
        let mut solver = Solver::new(100);
        solver.unlock(a);
        solver.push(equal(RTerm::symb(a), RTerm::lvl(0)));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(solver.diagnostics.is_empty());
        assert_eq!(sc.perm.get(a).info.value, Some(RTerm::lvl(0)));
    }

    #[test]
    fn occurs_check_rejects_cycles() {
        let mut syms = Symbols::new();
        let mut sc = Scratch::new(&mut syms);
        let m = sc.fresh_meta();
        let mut solver = Solver::new(100);
        solver.push(equal(
            RTerm::symb(m),
            Term::Succ(RTerm::symb(m)).into(),
        ));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(solver
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Unequal(..))));
    }

    #[test]
    fn unused_metas_are_uninferred() {
        let mut syms = Symbols::new();
        let mut sc = Scratch::new(&mut syms);
        let m = sc.fresh_meta();
        let mut solver = Solver::new(100);
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        match &solver.diagnostics[..] {
            [Diagnostic::UninferredVars(vars)] => assert_eq!(vars[..], [m]),
            d => panic!("unexpected diagnostics: {:?}", d),
        }
    }

    #[test]
    fn finish_substitutes_temps_into_touched_entries() {
        let mut syms = Symbols::new();
        let (a, _) = syms.create(None, "a", false);
        let mut sc = Scratch::new(&mut syms);
        let m = sc.fresh_level();
        let mut solver = Solver::new(100);
        solver.unlock(a);
        solver.push(equal(RTerm::symb(a), Term::Succ(RTerm::symb(m)).into()));
        solver.solve(&mut sc);
        solver.finish(&mut sc);
        assert!(solver.diagnostics.is_empty());
        // m defaulted to 0l and was instantiated in a's own-value
        assert_eq!(
            sc.perm.get(a).info.value,
            Some(Term::Succ(RTerm::lvl(0)).into())
        );
    }
}

//! Elaboration: resolving declarations into the registry and
//! seeding the constraint solver.

use crate::preterm::{Decl, Op, Preterm};
use crate::solver::Solver;
use crate::{parse, Constraint, Diagnostic, RTerm, Rule, Scratch, Symbol, Symbols, Term};
use core::fmt;

/// Scope error, recorded alongside parse errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    UndeclaredSymbol(String),
    Redefinition(String),
    /// the left-hand side of a rewrite declaration is not a call on a symbol
    NoPattern,
    /// rewrite rules may only be added to symbols of the current elaboration
    NonRewritable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UndeclaredSymbol(name) => write!(f, "undeclared symbol: {}", name),
            Self::Redefinition(name) => write!(f, "redefinition of {}", name),
            Self::NoPattern => write!(f, "rewrite left-hand side must be a call on a symbol"),
            Self::NonRewritable(name) => write!(f, "cannot add rewrite rules to {}", name),
        }
    }
}

/// Result of elaborating a source file.
///
/// Parse and scope errors form one list, solver diagnostics the other.
/// `messages` holds all of them rendered in report order.
pub struct Outcome {
    pub parse_errors: Vec<parse::Error>,
    pub scope_errors: Vec<(usize, Error)>,
    pub diagnostics: Vec<Diagnostic>,
    pub messages: Vec<String>,
}

impl Outcome {
    /// No error of any kind was recorded.
    pub fn is_ok(&self) -> bool {
        self.parse_errors.is_empty() && self.scope_errors.is_empty() && self.diagnostics.is_empty()
    }

    /// Every recorded problem, unified into the crate-level
    /// [`Error`](crate::Error).
    pub fn errors(&self) -> Vec<crate::Error> {
        let parse = self.parse_errors.iter().cloned().map(crate::Error::from);
        let scope = self
            .scope_errors
            .iter()
            .map(|(_, e)| crate::Error::from(e.clone()));
        let diags = self.diagnostics.iter().cloned().map(crate::Error::from);
        parse.chain(scope).chain(diags).collect()
    }
}

/// Per-declaration results of the declare pass.
struct DeclInfo {
    /// target symbol for name declarations
    target: Option<Symbol>,
    /// pattern symbols materialised for a rewrite declaration, in order
    patterns: Vec<(String, Symbol)>,
    /// the declare pass failed; skip conversion
    skip: bool,
}

impl DeclInfo {
    fn skip() -> Self {
        Self {
            target: None,
            patterns: Vec::new(),
            skip: true,
        }
    }

    fn new(target: Option<Symbol>) -> Self {
        Self {
            target,
            patterns: Vec::new(),
            skip: false,
        }
    }
}

/// Identifier resolution context during conversion.
struct Ctx<'a> {
    /// enclosing binder arguments, innermost last
    bound: Vec<(String, Symbol)>,
    /// the declaration's pattern symbols
    patterns: &'a [(String, Symbol)],
    /// enclosing declaration scopes, innermost first
    enclosing: Vec<Symbol>,
    /// convert `?x` to pattern holes instead of symbol references
    in_rule_lhs: bool,
}

struct Elab<'s> {
    sc: Scratch<'s>,
    solver: Solver,
    /// permanent symbols created by this elaboration, in creation order
    created: Vec<Symbol>,
    errors: Vec<(usize, Error)>,
}

/// Elaborate a parsed program against the registry.
///
/// All declarations are first declared, then converted and constrained,
/// then the solver runs to a fixed point.
/// If any error or diagnostic was recorded, every symbol created by this
/// elaboration is removed again.
pub fn elaborate(prog: parse::Program, syms: &mut Symbols, max_iterations: usize) -> Outcome {
    let mut elab = Elab {
        sc: Scratch::new(syms),
        solver: Solver::new(max_iterations),
        created: Vec::new(),
        errors: Vec::new(),
    };

    let infos: Vec<DeclInfo> = prog.decls.iter().map(|d| elab.declare(d)).collect();
    for (d, info) in prog.decls.iter().zip(&infos) {
        elab.convert(d, info);
    }

    elab.solver.solve(&mut elab.sc);
    elab.solver.finish(&mut elab.sc);

    let diagnostics = std::mem::take(&mut elab.solver.diagnostics);
    let mut messages: Vec<String> = prog.errors.iter().map(|e| e.to_string()).collect();
    messages.extend(
        elab.errors
            .iter()
            .map(|(line, e)| format!("{} (line {})", e, line)),
    );
    messages.extend(diagnostics.iter().map(|d| d.render(&elab.sc)));

    let failed = !prog.errors.is_empty() || !elab.errors.is_empty() || !diagnostics.is_empty();
    if failed {
        info!("elaboration failed, rolling back {} symbols", elab.created.len());
        for s in elab.created.iter().rev() {
            elab.sc.perm.remove(*s);
        }
    }

    Outcome {
        parse_errors: prog.errors,
        scope_errors: elab.errors,
        diagnostics,
        messages,
    }
}

impl<'s> Elab<'s> {
    fn declare(&mut self, d: &Decl) -> DeclInfo {
        match d.op {
            Op::Check => DeclInfo::new(None),
            Op::Rewrite => match &d.lhs {
                Preterm::Appl(head, _) if matches!(&**head, Preterm::Name(_)) => {
                    let mut info = DeclInfo::new(None);
                    // pattern holes are scoped to the rule, so every rewrite
                    // declaration gets its own hidden parent
                    let parent = self.sc.perm.fresh("?pat");
                    self.created.push(parent);
                    self.collect_patterns(&d.lhs, parent, &mut info.patterns);
                    info
                }
                _ => {
                    self.errors.push((d.line, Error::NoPattern));
                    DeclInfo::skip()
                }
            },
            Op::Declare | Op::Define => match &d.lhs {
                Preterm::Name(path) => {
                    let mut parent = None;
                    let mut target_new = false;
                    for comp in path {
                        let (s, was_new) = self.sc.perm.create(parent, comp, false);
                        if was_new {
                            self.created.push(s);
                        }
                        parent = Some(s);
                        target_new = was_new;
                    }
                    let target = parent.expect("dotted name is nonempty");
                    if !target_new && !self.created.contains(&target) {
                        self.errors.push((d.line, Error::Redefinition(path.join("."))));
                        return DeclInfo::skip();
                    }
                    self.solver.unlock(target);
                    DeclInfo::new(Some(target))
                }
                // other left-hand sides are only constrained, not declared
                _ => DeclInfo::new(None),
            },
        }
    }

    /// Materialise `?name` holes as symbols under the rule's hidden parent.
    fn collect_patterns(
        &mut self,
        t: &Preterm,
        parent: Symbol,
        patterns: &mut Vec<(String, Symbol)>,
    ) {
        match t {
            Preterm::Pat(Some(name)) => {
                if !patterns.iter().any(|(n, _)| n == name) {
                    let (s, _) = self.sc.perm.create(Some(parent), name, true);
                    self.created.push(s);
                    self.solver.unlock(s);
                    patterns.push((name.clone(), s));
                }
            }
            Preterm::Appl(head, args) => {
                self.collect_patterns(head, parent, patterns);
                args.iter()
                    .for_each(|a| self.collect_patterns(a, parent, patterns));
            }
            Preterm::Abst(_, body) => self.collect_patterns(body, parent, patterns),
            Preterm::Prod(_, a, b) => {
                self.collect_patterns(a, parent, patterns);
                self.collect_patterns(b, parent, patterns);
            }
            Preterm::Type(l) => self.collect_patterns(l, parent, patterns),
            Preterm::Name(_) | Preterm::Lvl(_) | Preterm::Pat(None) | Preterm::Hole => {}
        }
    }

    fn convert(&mut self, d: &Decl, info: &DeclInfo) {
        if info.skip {
            return;
        }
        let res = self.convert_decl(d, info);
        if let Err(e) = res {
            self.errors.push((d.line, e));
        }
    }

    fn convert_decl(&mut self, d: &Decl, info: &DeclInfo) -> Result<(), Error> {
        match d.op {
            Op::Declare | Op::Define => {
                let enclosing = match info.target {
                    Some(t) => self.ancestors(t),
                    None => Vec::new(),
                };
                let mut ctx = Ctx {
                    bound: Vec::new(),
                    patterns: &info.patterns,
                    enclosing,
                    in_rule_lhs: false,
                };
                let lhs = self.convert_term(&d.lhs, &mut ctx)?;
                let ty = match &d.typ {
                    Some(t) => {
                        let ty = self.convert_term(t, &mut ctx)?;
                        self.assert_is_type(&ty);
                        ty
                    }
                    None => RTerm::symb(self.sc.fresh_meta()),
                };
                self.solver.push(Constraint::Typed {
                    tm: lhs.clone(),
                    ty: ty.clone(),
                });
                if let Some(r) = &d.rhs {
                    let rhs = self.convert_term(r, &mut ctx)?;
                    let direct = match &*lhs {
                        Term::Symb(s) => self.sc.get(*s).info.value.is_none(),
                        _ => false,
                    };
                    let assigned = match (&*lhs, direct) {
                        (Term::Symb(s), true) => {
                            let s = *s;
                            self.solver.define(&mut self.sc, s, &rhs)
                        }
                        _ => false,
                    };
                    if !assigned {
                        self.solver.push(Constraint::Equal {
                            lhs,
                            rhs: rhs.clone(),
                        });
                    }
                    self.solver.push(Constraint::Typed { tm: rhs, ty });
                }
                Ok(())
            }
            Op::Rewrite => {
                let (head_path, _) = match &d.lhs {
                    Preterm::Appl(head, args) => match &**head {
                        Preterm::Name(path) => (path, args),
                        _ => return Err(Error::NoPattern),
                    },
                    _ => return Err(Error::NoPattern),
                };
                let head = self.resolve_root(head_path)?;
                if !self.created.contains(&head) {
                    return Err(Error::NonRewritable(head_path.join(".")));
                }
                let mut ctx = Ctx {
                    bound: Vec::new(),
                    patterns: &info.patterns,
                    enclosing: self.ancestors(head),
                    in_rule_lhs: true,
                };
                let lhs = self.convert_term(&d.lhs, &mut ctx)?;
                ctx.in_rule_lhs = false;
                let rhs = self.convert_term(d.rhs.as_ref().expect("rewrite has rhs"), &mut ctx)?;

                let m = self.sc.fresh_meta();
                self.solver.push(Constraint::Typed {
                    tm: patterns_as_symbols(&lhs),
                    ty: RTerm::symb(m),
                });
                self.solver.push(Constraint::Typed {
                    tm: rhs.clone(),
                    ty: RTerm::symb(m),
                });

                let patterns = info.patterns.iter().map(|(_, s)| *s).collect();
                self.sc.get_mut(head).info.rules.push(Rule { patterns, lhs, rhs });
                self.solver.touch(head);
                Ok(())
            }
            Op::Check => {
                let mut ctx = Ctx {
                    bound: Vec::new(),
                    patterns: &info.patterns,
                    enclosing: Vec::new(),
                    in_rule_lhs: false,
                };
                let lhs = self.convert_term(&d.lhs, &mut ctx)?;
                let rhs = self.convert_term(d.rhs.as_ref().expect("check has rhs"), &mut ctx)?;
                self.solver.push(Constraint::Equal { lhs, rhs });
                Ok(())
            }
        }
    }

    /// `T : type(?l)` for a fresh level meta: every annotation must be a type.
    fn assert_is_type(&mut self, ty: &RTerm) {
        let l = self.sc.fresh_level();
        self.solver.push(Constraint::Typed {
            tm: ty.clone(),
            ty: Term::Type(RTerm::symb(l)).into(),
        });
    }

    fn convert_term(&mut self, t: &Preterm, ctx: &mut Ctx) -> Result<RTerm, Error> {
        match t {
            Preterm::Name(path) => self.resolve(path, ctx).map(RTerm::symb),
            Preterm::Appl(head, args) => {
                let head = self.convert_term(head, ctx)?;
                let args: Result<Vec<_>, _> =
                    args.iter().map(|a| self.convert_term(a, ctx)).collect();
                Ok(head.apply(args?))
            }
            Preterm::Abst(x, body) => {
                let s = self.fresh_binder(x);
                ctx.bound.push((x.clone(), s));
                let body = self.convert_term(body, ctx);
                ctx.bound.pop();
                Ok(Term::Abst(s, body?).into())
            }
            Preterm::Prod(arg, a, b) => {
                let a = self.convert_term(a, ctx)?;
                match arg {
                    Some(x) => {
                        let s = self.fresh_binder(x);
                        self.sc.get_mut(s).info.typ = Some(a.clone());
                        ctx.bound.push((x.clone(), s));
                        let b = self.convert_term(b, ctx);
                        ctx.bound.pop();
                        Ok(Term::Prod(Some(s), a, b?).into())
                    }
                    None => {
                        let b = self.convert_term(b, ctx)?;
                        Ok(Term::Prod(None, a, b).into())
                    }
                }
            }
            Preterm::Type(l) => {
                let l = self.convert_term(l, ctx)?;
                // the subscript must be a level
                self.solver.push(Constraint::Typed {
                    tm: l.clone(),
                    ty: Term::Level.into(),
                });
                Ok(Term::Type(l).into())
            }
            Preterm::Lvl(n) => Ok(RTerm::lvl(*n)),
            Preterm::Pat(Some(name)) => match ctx.patterns.iter().find(|(n, _)| n == name) {
                Some((_, s)) => Ok(if ctx.in_rule_lhs {
                    Term::Pat(Some(*s)).into()
                } else {
                    RTerm::symb(*s)
                }),
                None => Err(Error::UndeclaredSymbol(format!("?{}", name))),
            },
            Preterm::Pat(None) => Ok(if ctx.in_rule_lhs {
                Term::Pat(None).into()
            } else {
                RTerm::symb(self.sc.fresh_meta())
            }),
            Preterm::Hole => Ok(RTerm::symb(self.sc.fresh_meta())),
        }
    }

    /// Resolve a dotted name: binder arguments first, then the declaration's
    /// pattern variables, then enclosing scopes from innermost out, then root.
    fn resolve(&self, path: &[String], ctx: &Ctx) -> Result<Symbol, Error> {
        let undeclared = || Error::UndeclaredSymbol(path.join("."));
        let mut s = self.resolve_head(&path[0], ctx).ok_or_else(undeclared)?;
        for comp in &path[1..] {
            s = self.sc.perm.lookup(Some(s), comp).ok_or_else(undeclared)?;
        }
        Ok(s)
    }

    fn resolve_head(&self, name: &str, ctx: &Ctx) -> Option<Symbol> {
        if let Some((_, s)) = ctx.bound.iter().rev().find(|(n, _)| n == name) {
            return Some(*s);
        }
        if let Some((_, s)) = ctx.patterns.iter().find(|(n, _)| n == name) {
            return Some(*s);
        }
        for scope in &ctx.enclosing {
            if let Some(s) = self.sc.perm.lookup(Some(*scope), name) {
                return Some(s);
            }
        }
        self.sc.perm.lookup(None, name)
    }

    fn resolve_root(&self, path: &[String]) -> Result<Symbol, Error> {
        let undeclared = || Error::UndeclaredSymbol(path.join("."));
        let mut s = self.sc.perm.lookup(None, &path[0]).ok_or_else(undeclared)?;
        for comp in &path[1..] {
            s = self.sc.perm.lookup(Some(s), comp).ok_or_else(undeclared)?;
        }
        Ok(s)
    }

    fn ancestors(&self, s: Symbol) -> Vec<Symbol> {
        let mut out = Vec::new();
        let mut cur = self.sc.perm.get(s).parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.sc.perm.get(p).parent;
        }
        out
    }

    fn fresh_binder(&mut self, name: &str) -> Symbol {
        let s = self.sc.perm.fresh(name);
        self.created.push(s);
        s
    }
}

/// Read a rule left-hand side as an ordinary term:
/// pattern holes become their variables.
pub(crate) fn patterns_as_symbols(tm: &RTerm) -> RTerm {
    match &**tm {
        Term::Pat(Some(v)) => RTerm::symb(*v),
        Term::Appl(head, args) => {
            let head = patterns_as_symbols(head);
            let args = args.iter().map(patterns_as_symbols).collect();
            Term::Appl(head, args).into()
        }
        Term::Abst(x, body) => Term::Abst(*x, patterns_as_symbols(body)).into(),
        Term::Prod(arg, a, b) => {
            Term::Prod(*arg, patterns_as_symbols(a), patterns_as_symbols(b)).into()
        }
        Term::Type(l) => Term::Type(patterns_as_symbols(l)).into(),
        Term::Succ(l) => Term::Succ(patterns_as_symbols(l)).into(),
        Term::Max(a, b) => Term::Max(patterns_as_symbols(a), patterns_as_symbols(b)).into(),
        _ => tm.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Symbols, Outcome) {
        let mut syms = Symbols::prelude();
        let out = crate::check(src, &mut syms, 100);
        (syms, out)
    }

    const NAT: &str = "Nat: type(0l)\nNat.zero: Nat\nNat.succ: Nat -> Nat\n";

    const NAT_IND: &str = "Nat.ind: (n: builtin.Level) -> (C: Nat -> type(n)) -> C(Nat.zero)
       -> ((x: Nat) -> C(x) -> C(Nat.succ(x))) -> (x: Nat) -> C(x)
Nat.ind(?n, ?C, ?c0, ?cs, Nat.zero) := c0
Nat.ind(?n, ?C, ?c0, ?cs, Nat.succ(?x)) := cs(x, Nat.ind(n, C, c0, cs, x))
Nat.double: Nat -> Nat = Nat.ind(0l, \\x Nat, Nat.zero, \\x\\y Nat.succ(Nat.succ(y)))
";

    #[test]
    fn undeclared_parent_type_is_diagnosed() {
        let (syms, out) = run("Nat.zero: Nat\nNat.succ: Nat -> Nat\n");
        assert!(!out.is_ok());
        assert!(out
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UntypedExpression(_))));
        // the registry was rolled back
        assert_eq!(syms.lookup(None, "Nat"), None);
    }

    #[test]
    fn nat_declarations_are_accepted() {
        let (syms, out) = run(NAT);
        assert!(out.is_ok(), "{:?}", out.messages);
        let nat = syms.lookup(None, "Nat").unwrap();
        let zero = syms.lookup(Some(nat), "zero").unwrap();
        let succ = syms.lookup(Some(nat), "succ").unwrap();
        assert_eq!(
            syms.get(nat).info.typ,
            Some(Term::Type(RTerm::lvl(0)).into())
        );
        assert_eq!(syms.get(zero).info.typ, Some(RTerm::symb(nat)));
        assert_eq!(
            syms.get(succ).info.typ,
            Some(Term::Prod(None, RTerm::symb(nat), RTerm::symb(nat)).into())
        );
    }

    #[test]
    fn induction_and_rewriting_check() {
        let src = format!(
            "{}{}Nat.double(Nat.succ(Nat.zero)) :=== Nat.succ(Nat.succ(Nat.zero))\n",
            NAT, NAT_IND
        );
        let (syms, out) = run(&src);
        assert!(out.is_ok(), "{:?}", out.messages);
        let nat = syms.lookup(None, "Nat").unwrap();
        let ind = syms.lookup(Some(nat), "ind").unwrap();
        assert_eq!(syms.get(ind).info.rules.len(), 2);
    }

    #[test]
    fn failed_check_reports_unequal() {
        let src = format!("{}{}Nat.double(Nat.succ(Nat.zero)) :=== Nat.zero\n", NAT, NAT_IND);
        let (syms, out) = run(&src);
        assert!(out
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Unequal(..))));
        assert_eq!(syms.lookup(None, "Nat"), None);
    }

    #[test]
    fn omitted_levels_default_to_zero() {
        let (syms, out) = run("Id: (T: type(?)) -> T -> T = \\T\\x x\n");
        assert!(out.is_ok(), "{:?}", out.messages);
        let id = syms.lookup(None, "Id").unwrap();
        match syms.get(id).info.typ.as_deref() {
            Some(Term::Prod(Some(_), a, _)) => {
                assert_eq!(*a, RTerm::new(Term::Type(RTerm::lvl(0))))
            }
            t => panic!("unexpected type: {:?}", t),
        }
    }

    #[test]
    fn undeclared_symbols_roll_back() {
        let (syms, out) = run("f: A -> A\n");
        assert!(!out.is_ok());
        assert_eq!(
            out.scope_errors,
            vec![(1, Error::UndeclaredSymbol("A".to_string()))]
        );
        assert_eq!(syms.lookup(None, "f"), None);
        assert_eq!(syms.count(), Symbols::prelude().count());
    }

    #[test]
    fn universe_levels_stratify() {
        let (_, out) = run("U: type(1l) = type(0l)\n");
        assert!(out.is_ok(), "{:?}", out.messages);
        let (_, out) = run("U: type(2l) = type(0l)\n");
        assert!(out
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Unequal(..))));
    }

    #[test]
    fn level_type_lives_in_the_lowest_universe() {
        let (_, out) = run("L: type(0l) = builtin.Level\n");
        assert!(out.is_ok(), "{:?}", out.messages);
    }

    #[test]
    fn nondependent_arrows_equal_unused_dependent_ones() {
        let src = "A: type(0l)\nf: (x: A) -> A\ng: A -> A = f\n";
        let (_, out) = run(src);
        assert!(out.is_ok(), "{:?}", out.messages);
    }

    #[test]
    fn redefinition_is_rejected() {
        let (_, out) = run("builtin.Level: type(0l)\n");
        assert!(matches!(out.scope_errors[..], [(_, Error::Redefinition(_))]));
    }

    #[test]
    fn rules_require_call_lhs() {
        let (_, out) = run("f := 0l\n");
        assert!(matches!(out.scope_errors[..], [(_, Error::NoPattern)]));
    }

    #[test]
    fn hole_names_are_scoped_per_rule() {
        let src = "N: type(0l)\nf: N -> N\nf(?x) := x\nL: builtin.Level -> builtin.Level\nL(?x) := x\n";
        let (syms, out) = run(src);
        assert!(out.is_ok(), "{:?}", out.messages);
        let f = syms.lookup(None, "f").unwrap();
        let l = syms.lookup(None, "L").unwrap();
        let fx = syms.get(f).info.rules[0].patterns[0];
        let lx = syms.get(l).info.rules[0].patterns[0];
        // equal hole names in different rules bind distinct symbols
        assert_ne!(fx, lx);
        assert_eq!(syms.get(fx).info.typ, Some(RTerm::symb(syms.lookup(None, "N").unwrap())));
    }

    #[test]
    fn problems_unify_into_the_common_error_type() {
        let (syms, out) = run("f: A -> A\n");
        let errors = out.errors();
        assert!(matches!(
            errors[..],
            [crate::Error::Scope(Error::UndeclaredSymbol(_))]
        ));
        assert_eq!(errors[0].render(&syms), "undeclared symbol: A");
    }

    #[test]
    fn parse_errors_roll_back_preceding_declarations() {
        let (syms, out) = run("Nat: type(0l)\n=== nonsense ===\n");
        assert!(!out.parse_errors.is_empty());
        assert_eq!(syms.lookup(None, "Nat"), None);
        assert!(!out.is_ok());
    }
}

//! Scratch registry layered over the permanent one.

use crate::symbols::{Entries, Entry, Info, Symbols};
use crate::{RTerm, Symbol, Term};

/// First handle of the scratch layer.
///
/// Temp handles start at a fixed threshold instead of the permanent count,
/// because the permanent registry keeps growing while temps exist
/// (binder and pattern symbols are created during conversion).
/// The partition test stays a single comparison.
pub(crate) const BASE: usize = usize::MAX >> 1;

/// Scratch registry: an array of temp entries on top of a permanent registry.
///
/// Temp entries hold the metavariables of one elaboration;
/// they are dropped with the scratch layer once their inferred values
/// have been substituted into the permanent entries they occur in.
pub struct Scratch<'s> {
    pub perm: &'s mut Symbols,
    temps: Vec<Entry>,
}

impl<'s> Scratch<'s> {
    pub fn new(perm: &'s mut Symbols) -> Self {
        let temps = Vec::new();
        Self { perm, temps }
    }

    pub fn is_temp(&self, s: Symbol) -> bool {
        s.index() >= BASE
    }

    pub fn get(&self, s: Symbol) -> &Entry {
        self.entry(s).expect("dangling symbol")
    }

    pub fn get_mut(&mut self, s: Symbol) -> &mut Entry {
        if s.index() >= BASE {
            &mut self.temps[s.index() - BASE]
        } else {
            self.perm.get_mut(s)
        }
    }

    /// Fresh metavariable: a temp symbol whose missing own-value means "unsolved".
    pub fn fresh_meta(&mut self) -> Symbol {
        self.fresh(None)
    }

    /// Fresh level metavariable: like [`fresh_meta`](Self::fresh_meta),
    /// but already typed by the level type, so that the final check
    /// defaults it to `0l` when it remains unsolved.
    pub fn fresh_level(&mut self) -> Symbol {
        self.fresh(Some(Term::Level.into()))
    }

    /// Fresh local symbol, used for α-renaming at comparison points.
    pub fn fresh_local(&mut self, name: &str, typ: Option<RTerm>) -> Symbol {
        let s = Symbol::new(BASE + self.temps.len());
        let mut e = Entry {
            name: name.to_string(),
            parent: None,
            local: true,
            children: Default::default(),
            info: Info::default(),
        };
        e.info.typ = typ;
        self.temps.push(e);
        s
    }

    fn fresh(&mut self, typ: Option<RTerm>) -> Symbol {
        let name = format!("${}", self.temps.len());
        let s = self.fresh_local(&name, typ);
        self.get_mut(s).local = false;
        s
    }

    /// Name of an entry, tolerating binder handles whose scratch entry
    /// is gone (they can survive inside terms across elaborations).
    pub fn name_of(&self, s: Symbol) -> String {
        match self.entry(s) {
            Some(e) => e.name.clone(),
            None => format!("${}", s.index().wrapping_sub(BASE)),
        }
    }

    /// Iterate over all temp symbols in creation order.
    pub fn temps(&self) -> impl Iterator<Item = Symbol> {
        (0..self.temps.len()).map(|i| Symbol::new(BASE + i))
    }
}

impl<'s> Entries for Scratch<'s> {
    fn entry(&self, s: Symbol) -> Option<&Entry> {
        if s.index() >= BASE {
            self.temps.get(s.index() - BASE)
        } else {
            self.perm.entry(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_partition() {
        let mut perm = Symbols::new();
        let (a, _) = perm.create(None, "a", false);
        let mut sc = Scratch::new(&mut perm);
        let m = sc.fresh_meta();
        assert!(!sc.is_temp(a));
        assert!(sc.is_temp(m));
        // permanent creation after the first temp does not disturb the partition
        let (b, _) = sc.perm.create(None, "b", false);
        assert!(!sc.is_temp(b));
        assert!(!sc.get(m).local);
        assert!(sc.get(m).info.value.is_none());
    }

    #[test]
    fn fresh_level_is_typed() {
        let mut perm = Symbols::new();
        let mut sc = Scratch::new(&mut perm);
        let l = sc.fresh_level();
        assert_eq!(sc.get(l).info.typ, Some(Term::Level.into()));
    }
}

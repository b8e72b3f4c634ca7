//! Permanent registry mapping symbols to their entries.

use crate::{RTerm, Rule, Symbol, Term};
use fnv::FnvHashMap;

/// Variable information attached to a registry entry.
#[derive(Clone, Default)]
pub struct Info {
    /// type of the symbol
    pub typ: Option<RTerm>,
    /// own-value: the symbol's definition, inlined by the expander
    pub value: Option<RTerm>,
    /// down-values: rewrite rules whose left-hand side head is this symbol
    pub rules: Vec<Rule>,
}

/// One registry entry per symbol.
pub struct Entry {
    pub name: String,
    pub parent: Option<Symbol>,
    /// Local symbols are binder-introduced, pattern, or metavariable symbols;
    /// they are not addressable by a dotted path from the root.
    pub local: bool,
    pub children: FnvHashMap<String, Symbol>,
    pub info: Info,
}

impl Entry {
    fn new(name: &str, parent: Option<Symbol>, local: bool) -> Self {
        Self {
            name: name.to_string(),
            parent,
            local,
            children: Default::default(),
            info: Default::default(),
        }
    }
}

/// Read access to entries, implemented by the permanent registry
/// and by the scratch layer on top of it.
pub trait Entries {
    fn entry(&self, s: Symbol) -> Option<&Entry>;
}

/// Permanent registry: a slot table of entries plus a root name map.
///
/// Handles are stable for the lifetime of an entry.
/// Removal frees the slot; removing the most recently created symbols
/// (as rollback after a failed elaboration does) restores the registry
/// to its previous state exactly.
#[derive(Default)]
pub struct Symbols {
    slots: Vec<Option<Entry>>,
    root: FnvHashMap<String, Symbol>,
}

impl Symbols {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registry with the pre-declared built-ins:
    /// `builtin.Level` is the type of universe levels and has type `type(0l)`.
    pub fn prelude() -> Self {
        let mut syms = Self::new();
        let (builtin, _) = syms.create(None, "builtin", false);
        let (level, _) = syms.create(Some(builtin), "Level", false);
        let info = &mut syms.get_mut(level).info;
        info.typ = Some(Term::Type(RTerm::lvl(0)).into());
        info.value = Some(Term::Level.into());
        syms
    }

    /// Number of slots ever allocated (including freed ones).
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Create a child of the given parent (or a root symbol),
    /// returning its handle and whether it was newly created.
    pub fn create(&mut self, parent: Option<Symbol>, name: &str, local: bool) -> (Symbol, bool) {
        if let Some(s) = self.lookup(parent, name) {
            return (s, false);
        }
        let s = self.alloc(Entry::new(name, parent, local));
        match parent {
            Some(p) => self.get_mut(p).children.insert(name.to_string(), s),
            None => self.root.insert(name.to_string(), s),
        };
        (s, true)
    }

    /// Create an anonymous local symbol, registered in no name map.
    ///
    /// Binder symbols are created this way: they must be unique across the
    /// program even when their surface names coincide.
    pub fn fresh(&mut self, name: &str) -> Symbol {
        self.alloc(Entry::new(name, None, true))
    }

    fn alloc(&mut self, e: Entry) -> Symbol {
        let s = Symbol::new(self.slots.len());
        self.slots.push(Some(e));
        s
    }

    /// Look up a child of the given parent (or a root symbol) by name.
    pub fn lookup(&self, parent: Option<Symbol>, name: &str) -> Option<Symbol> {
        match parent {
            Some(p) => self.get(p).children.get(name).copied(),
            None => self.root.get(name).copied(),
        }
    }

    pub fn get(&self, s: Symbol) -> &Entry {
        self.entry(s).expect("dangling symbol")
    }

    pub fn get_mut(&mut self, s: Symbol) -> &mut Entry {
        self.slots
            .get_mut(s.index())
            .and_then(|e| e.as_mut())
            .expect("dangling symbol")
    }

    /// Remove a symbol, unlinking it from its parent and freeing its slot.
    pub fn remove(&mut self, s: Symbol) {
        let e = self.slots[s.index()].take().expect("dangling symbol");
        match e.parent {
            Some(p) => {
                if let Some(pe) = self.slots.get_mut(p.index()).and_then(|e| e.as_mut()) {
                    pe.children.remove(&e.name);
                }
            }
            // anonymous locals share their parentless shape with roots,
            // but are in no name map
            None => {
                if self.root.get(&e.name) == Some(&s) {
                    self.root.remove(&e.name);
                }
            }
        }
        while let Some(None) = self.slots.last() {
            self.slots.pop();
        }
    }

    /// Dotted path of a symbol from the root.
    pub fn path(&self, s: Symbol) -> String {
        let e = self.get(s);
        match e.parent {
            Some(p) => format!("{}.{}", self.path(p), e.name),
            None => e.name.clone(),
        }
    }

    /// Iterate over all live entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Entry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| Some((Symbol::new(i), e.as_ref()?)))
    }
}

impl Entries for Symbols {
    fn entry(&self, s: Symbol) -> Option<&Entry> {
        self.slots.get(s.index()).and_then(|e| e.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lookup_path() {
        let mut syms = Symbols::new();
        let (a, new) = syms.create(None, "a", false);
        assert!(new);
        let (b, new) = syms.create(Some(a), "b", false);
        assert!(new);
        let (b2, new) = syms.create(Some(a), "b", false);
        assert!(!new);
        assert_eq!(b, b2);
        assert_eq!(syms.lookup(Some(a), "b"), Some(b));
        assert_eq!(syms.lookup(None, "b"), None);
        assert_eq!(syms.path(b), "a.b");
    }

    #[test]
    fn remove_restores() {
        let mut syms = Symbols::new();
        let (a, _) = syms.create(None, "a", false);
        let count = syms.count();
        let (b, _) = syms.create(Some(a), "b", false);
        let (c, _) = syms.create(Some(a), "c", false);
        syms.remove(c);
        syms.remove(b);
        assert_eq!(syms.count(), count);
        assert_eq!(syms.lookup(Some(a), "b"), None);
    }

    #[test]
    fn fresh_locals_are_distinct() {
        let mut syms = Symbols::new();
        let x1 = syms.fresh("x");
        let x2 = syms.fresh("x");
        assert_ne!(x1, x2);
        assert!(syms.get(x1).local);
        assert_eq!(syms.lookup(None, "x"), None);
    }

    #[test]
    fn prelude_level() {
        let syms = Symbols::prelude();
        let builtin = syms.lookup(None, "builtin").unwrap();
        let level = syms.lookup(Some(builtin), "Level").unwrap();
        assert_eq!(syms.path(level), "builtin.Level");
        assert_eq!(syms.get(level).info.value, Some(Term::Level.into()));
    }
}

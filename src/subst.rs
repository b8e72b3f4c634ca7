//! Capture-avoiding replacement of symbols by terms.
//!
//! Binder symbols are unique across the whole program, so no α-renaming
//! is performed here; a binder merely masks its own symbol from the
//! substitution while its body is traversed.

use crate::{RTerm, Symbol, Term};
use fnv::FnvHashMap;

/// Replace every free occurrence of `from` by `to`.
pub fn replace_one(tm: &RTerm, from: Symbol, to: &RTerm) -> RTerm {
    let mut map = FnvHashMap::default();
    map.insert(from, to.clone());
    replace_many(tm, &map)
}

/// Replace every free occurrence of each symbol in `map` by its image.
pub fn replace_many(tm: &RTerm, map: &FnvHashMap<Symbol, RTerm>) -> RTerm {
    if map.is_empty() {
        return tm.clone();
    }
    replace(tm, map, &mut Vec::new())
}

fn replace(tm: &RTerm, map: &FnvHashMap<Symbol, RTerm>, mask: &mut Vec<Symbol>) -> RTerm {
    match &**tm {
        Term::Symb(s) => match map.get(s) {
            Some(to) if !mask.contains(s) => to.clone(),
            _ => tm.clone(),
        },
        Term::Appl(head, args) => {
            let head2 = replace(head, map, mask);
            let args2: Vec<_> = args.iter().map(|a| replace(a, map, mask)).collect();
            if head.ptr_eq(&head2) && args.iter().zip(&args2).all(|(a, a2)| a.ptr_eq(a2)) {
                tm.clone()
            } else {
                Term::Appl(head2, args2).into()
            }
        }
        Term::Abst(x, body) => {
            mask.push(*x);
            let body2 = replace(body, map, mask);
            mask.pop();
            if body.ptr_eq(&body2) {
                tm.clone()
            } else {
                Term::Abst(*x, body2).into()
            }
        }
        Term::Prod(arg, a, b) => {
            let a2 = replace(a, map, mask);
            if let Some(x) = arg {
                mask.push(*x);
            }
            let b2 = replace(b, map, mask);
            if arg.is_some() {
                mask.pop();
            }
            if a.ptr_eq(&a2) && b.ptr_eq(&b2) {
                tm.clone()
            } else {
                Term::Prod(*arg, a2, b2).into()
            }
        }
        Term::Type(l) => {
            let l2 = replace(l, map, mask);
            if l.ptr_eq(&l2) {
                tm.clone()
            } else {
                Term::Type(l2).into()
            }
        }
        Term::Succ(l) => {
            let l2 = replace(l, map, mask);
            if l.ptr_eq(&l2) {
                tm.clone()
            } else {
                Term::Succ(l2).into()
            }
        }
        Term::Max(a, b) => {
            let a2 = replace(a, map, mask);
            let b2 = replace(b, map, mask);
            if a.ptr_eq(&a2) && b.ptr_eq(&b2) {
                tm.clone()
            } else {
                Term::Max(a2, b2).into()
            }
        }
        Term::Level | Term::Lvl(_) | Term::Pat(_) | Term::Hole => tm.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(i: usize) -> Symbol {
        Symbol::new(i)
    }

    #[test]
    fn replaces_free_occurrences() {
        let x = s(0);
        let c = s(1);
        let tm = RTerm::symb(x).apply(vec![RTerm::symb(x)]);
        let out = replace_one(&tm, x, &RTerm::symb(c));
        let expected = RTerm::symb(c).apply(vec![RTerm::symb(c)]);
        assert_eq!(out, expected);
    }

    #[test]
    fn binder_masks_its_symbol() {
        let x = s(0);
        let c = s(1);
        // \x x(x) with the binder symbol also in the substitution
        let tm: RTerm = Term::Abst(x, RTerm::symb(x).apply(vec![RTerm::symb(x)])).into();
        let out = replace_one(&tm, x, &RTerm::symb(c));
        assert_eq!(out, tm);
    }

    #[test]
    fn dependent_product_masks_only_output() {
        let x = s(0);
        let c = s(1);
        // (x: x) -> x: the occurrence in the input is free
        let tm: RTerm = Term::Prod(Some(x), RTerm::symb(x), RTerm::symb(x)).into();
        let out = replace_one(&tm, x, &RTerm::symb(c));
        let expected: RTerm = Term::Prod(Some(x), RTerm::symb(c), RTerm::symb(x)).into();
        assert_eq!(out, expected);
    }

    #[test]
    fn sharing_is_preserved_without_change() {
        let x = s(0);
        let c = s(1);
        let tm: RTerm = Term::Abst(x, RTerm::symb(x)).into();
        let out = replace_one(&tm, c, &RTerm::lvl(0));
        assert!(tm.ptr_eq(&out));
    }
}

//! Constraints processed by the solver.

use crate::RTerm;
use core::fmt::{self, Display};

/// A pending obligation in the solver's queue.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// `tm : ty`: the term has the given type.
    Typed { tm: RTerm, ty: RTerm },
    /// `head(args…) : ty`: the head, applied to the arguments,
    /// returns the given type; used while the head's type is unknown.
    FnTyped {
        head: RTerm,
        args: Vec<RTerm>,
        ty: RTerm,
    },
    /// `lhs ≡ rhs`: unification constraint.
    Equal { lhs: RTerm, rhs: RTerm },
    /// `fty, args… ⇒ out`: the function type must normalise to a Π chain
    /// consuming the arguments with the given output.
    ProdEqual {
        fty: RTerm,
        args: Vec<RTerm>,
        out: RTerm,
    },
}

impl Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Typed { tm, ty } => write!(f, "{} : {}", tm, ty),
            Self::FnTyped { head, args, ty } => {
                write!(f, "{}(", head)?;
                let mut args = args.iter();
                if let Some(a) = args.next() {
                    a.fmt(f)?;
                }
                args.try_for_each(|a| write!(f, ", {}", a))?;
                write!(f, ") : {}", ty)
            }
            Self::Equal { lhs, rhs } => write!(f, "{} ≡ {}", lhs, rhs),
            Self::ProdEqual { fty, args, out } => {
                write!(f, "{}", fty)?;
                args.iter().try_for_each(|a| write!(f, ", {}", a))?;
                write!(f, " ⇒ {}", out)
            }
        }
    }
}

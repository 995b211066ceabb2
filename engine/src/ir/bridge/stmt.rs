use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ir::bridge::expr::{ArrayAccess, Expr};
use crate::ir::bridge::shared::Identifier;

/// Target of a heap write
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize)]
pub enum Selector {
    /// `rcvr.field := rhs`
    Field(Identifier),
    /// `rcvr[idx] := rhs`
    Index(Expr),
}

/// A statement, executed along a CFG edge
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize)]
pub enum Stmt {
    Assign {
        lhs: Identifier,
        rhs: Expr,
    },
    Write {
        rcvr: Expr,
        sel: Selector,
        rhs: Expr,
    },
    Throw {
        exn: Expr,
    },
    /// branch guard
    Assume(Expr),
    /// evaluation for side effects only
    Expr(Expr),
    Skip,
}

impl Stmt {
    pub fn assign<I: Into<Identifier>>(lhs: I, rhs: Expr) -> Self {
        Self::Assign {
            lhs: lhs.into(),
            rhs,
        }
    }

    /// The variable defined by this statement, if any
    pub fn defined_var(&self) -> Option<&Identifier> {
        match self {
            Self::Assign { lhs, .. } => Some(lhs),
            Self::Write { .. } | Self::Throw { .. } | Self::Assume(_) | Self::Expr(_) | Self::Skip => {
                None
            }
        }
    }

    /// Every array dereference performed by this statement (reads and writes)
    pub fn array_accesses(&self) -> Vec<ArrayAccess<'_>> {
        let mut found = vec![];
        match self {
            Self::Assign { rhs, .. } => rhs.collect_accesses(&mut found),
            Self::Write { rcvr, sel, rhs } => {
                if let Selector::Index(idx) = sel {
                    found.push(ArrayAccess { rcvr, idx });
                    idx.collect_accesses(&mut found);
                }
                rcvr.collect_accesses(&mut found);
                rhs.collect_accesses(&mut found);
            }
            Self::Throw { exn } => exn.collect_accesses(&mut found),
            Self::Assume(cond) => cond.collect_accesses(&mut found),
            Self::Expr(expr) => expr.collect_accesses(&mut found),
            Self::Skip => (),
        }
        found
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assign { lhs, rhs } => write!(f, "{} := {}", lhs, rhs),
            Self::Write { rcvr, sel, rhs } => match sel {
                Selector::Field(field) => write!(f, "{}.{} := {}", rcvr, field, rhs),
                Selector::Index(idx) => write!(f, "{}[{}] := {}", rcvr, idx, rhs),
            },
            Self::Throw { exn } => write!(f, "throw {}", exn),
            Self::Assume(cond) => write!(f, "assume {}", cond),
            Self::Expr(expr) => write!(f, "{}", expr),
            Self::Skip => write!(f, "skip"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::bridge::expr::Binop;

    #[test]
    fn accesses_cover_reads_and_writes() {
        // a[i] := b[j + 1]
        let stmt = Stmt::Write {
            rcvr: Expr::var("a"),
            sel: Selector::Index(Expr::var("i")),
            rhs: Expr::index(
                Expr::var("b"),
                Expr::binop(Binop::Plus, Expr::var("j"), Expr::int(1)),
            ),
        };
        let accesses = stmt.array_accesses();
        assert_eq!(accesses.len(), 2);
        assert_eq!(accesses[0].rcvr, &Expr::var("a"));
        assert_eq!(accesses[0].idx, &Expr::var("i"));
        assert_eq!(accesses[1].rcvr, &Expr::var("b"));
    }

    #[test]
    fn nested_accesses_are_found() {
        // x := a[b[0]]
        let stmt = Stmt::assign(
            "x",
            Expr::index(Expr::var("a"), Expr::index(Expr::var("b"), Expr::int(0))),
        );
        let accesses = stmt.array_accesses();
        assert_eq!(accesses.len(), 2);
        assert_eq!(accesses[1].rcvr, &Expr::var("b"));
        assert_eq!(stmt.defined_var(), Some(&Identifier::from("x")));
    }

    #[test]
    fn display_is_readable() {
        let stmt = Stmt::Assume(Expr::binop(
            Binop::Lt,
            Expr::var("i"),
            Expr::field(Expr::var("a"), "length"),
        ));
        assert_eq!(stmt.to_string(), "assume i < a.length");
        assert_eq!(Stmt::Skip.to_string(), "skip");
    }
}

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ir::bridge::shared::Identifier;

/// Literal values
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize)]
pub enum Lit {
    Int(i64),
    Bool(bool),
    Null,
}

/// Binary operators
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Binop {
    // arithmetic
    Plus,
    Minus,
    Times,
    Divided,
    Mod,
    // comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    // logical
    And,
    Or,
}

/// Unary operators
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Unop {
    Neg,
    Not,
}

/// Expressions appearing in statements
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize)]
pub enum Expr {
    Var(Identifier),
    Lit(Lit),
    Binop {
        op: Binop,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unop {
        op: Unop,
        operand: Box<Expr>,
    },
    /// `rcvr.field`
    Field {
        rcvr: Box<Expr>,
        field: Identifier,
    },
    /// `rcvr[idx]`
    Index {
        rcvr: Box<Expr>,
        idx: Box<Expr>,
    },
    /// array literal `[e1, ..., en]`
    Array(Vec<Expr>),
    /// call to a named function
    Call {
        callee: Identifier,
        args: Vec<Expr>,
    },
}

/// A `rcvr[idx]` dereference found inside a statement
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub struct ArrayAccess<'a> {
    pub rcvr: &'a Expr,
    pub idx: &'a Expr,
}

impl Binop {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne
        )
    }

    /// The comparison that holds exactly when `self` does not
    pub fn negate(&self) -> Option<Self> {
        let negated = match self {
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            _ => return None,
        };
        Some(negated)
    }

    /// The comparison obtained by swapping the operands
    pub fn mirror(&self) -> Option<Self> {
        let mirrored = match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            _ => return None,
        };
        Some(mirrored)
    }
}

impl Expr {
    pub fn var<I: Into<Identifier>>(name: I) -> Self {
        Self::Var(name.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Lit(Lit::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Lit(Lit::Bool(value))
    }

    pub fn binop(op: Binop, lhs: Expr, rhs: Expr) -> Self {
        Self::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unop(op: Unop, operand: Expr) -> Self {
        Self::Unop {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn field<I: Into<Identifier>>(rcvr: Expr, field: I) -> Self {
        Self::Field {
            rcvr: Box::new(rcvr),
            field: field.into(),
        }
    }

    pub fn index(rcvr: Expr, idx: Expr) -> Self {
        Self::Index {
            rcvr: Box::new(rcvr),
            idx: Box::new(idx),
        }
    }

    /// Collect every array dereference in this expression, outermost first
    pub fn collect_accesses<'a>(&'a self, found: &mut Vec<ArrayAccess<'a>>) {
        match self {
            Self::Var(_) | Self::Lit(_) => (),
            Self::Binop { lhs, rhs, .. } => {
                lhs.collect_accesses(found);
                rhs.collect_accesses(found);
            }
            Self::Unop { operand, .. } => operand.collect_accesses(found),
            Self::Field { rcvr, .. } => rcvr.collect_accesses(found),
            Self::Index { rcvr, idx } => {
                found.push(ArrayAccess {
                    rcvr: &**rcvr,
                    idx: &**idx,
                });
                rcvr.collect_accesses(found);
                idx.collect_accesses(found);
            }
            Self::Array(elems) => elems.iter().for_each(|e| e.collect_accesses(found)),
            Self::Call { args, .. } => args.iter().for_each(|e| e.collect_accesses(found)),
        }
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binop { .. } => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Null => write!(f, "null"),
        }
    }
}

impl Display for Binop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let repr = match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Divided => "/",
            Self::Mod => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        };
        f.write_str(repr)
    }
}

impl Display for Unop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Neg => f.write_str("-"),
            Self::Not => f.write_str("!"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{}", name),
            Self::Lit(lit) => write!(f, "{}", lit),
            Self::Binop { op, lhs, rhs } => {
                lhs.fmt_operand(f)?;
                write!(f, " {} ", op)?;
                rhs.fmt_operand(f)
            }
            Self::Unop { op, operand } => {
                write!(f, "{}", op)?;
                operand.fmt_operand(f)
            }
            Self::Field { rcvr, field } => {
                rcvr.fmt_operand(f)?;
                write!(f, ".{}", field)
            }
            Self::Index { rcvr, idx } => {
                rcvr.fmt_operand(f)?;
                write!(f, "[{}]", idx)
            }
            Self::Array(elems) => {
                let items: Vec<_> = elems.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Call { callee, args } => {
                let items: Vec<_> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", callee, items.join(", "))
            }
        }
    }
}

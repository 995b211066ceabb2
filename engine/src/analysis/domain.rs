use std::fmt::{Debug, Display};

use crate::ir::bridge::expr::{Binop, Unop};
use crate::ir::bridge::stmt::Stmt;

/// An abstract domain of program states, plugged into the demanded graph
pub trait AbstractDomain: Clone + Eq + Debug + Display {
    /// The unconstrained state at a root location.
    ///
    /// Only requested on first demand, never while building a graph.
    fn init() -> Self;

    /// The unreachable state
    fn bottom() -> Self;

    /// Abstract transfer function of a statement; must be monotone and
    /// map contradictory guards and throws to bottom
    fn interpret(&self, stmt: &Stmt) -> Self;

    /// Least upper bound
    fn join(&self, other: &Self) -> Self;

    /// Widening of `self` (accumulated) by `other` (newest contribution)
    fn widen(&self, other: &Self) -> Self;

    /// Partial order test, `self ⊑ other`
    fn implies(&self, other: &Self) -> bool;

    fn is_bot(&self) -> bool;
}

/// Whether a scalar value may be true when used as a condition
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Truthiness {
    True,
    False,
    Either,
    /// the value is bottom
    Neither,
}

impl Truthiness {
    pub fn may_be_true(&self) -> bool {
        matches!(self, Self::True | Self::Either)
    }

    pub fn may_be_false(&self) -> bool {
        matches!(self, Self::False | Self::Either)
    }
}

/// An abstract domain of scalar values
pub trait AbstractValue: Clone + Eq + Debug + Display {
    fn top() -> Self;

    fn bottom() -> Self;

    fn of_int(value: i64) -> Self;

    fn of_bool(value: bool) -> Self;

    fn eval_binop(op: Binop, lhs: &Self, rhs: &Self) -> Self;

    fn eval_unop(op: Unop, operand: &Self) -> Self;

    fn truthiness(&self) -> Truthiness;

    fn join(&self, other: &Self) -> Self;

    fn widen(&self, other: &Self) -> Self;

    fn implies(&self, other: &Self) -> bool;

    fn is_bot(&self) -> bool;
}

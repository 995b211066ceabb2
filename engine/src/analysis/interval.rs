use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::analysis::domain::{AbstractDomain, AbstractValue, Truthiness};
use crate::ir::bridge::expr::{Binop, Expr, Lit, Unop};
use crate::ir::bridge::shared::Identifier;
use crate::ir::bridge::stmt::{Selector, Stmt};

//
// Interval of integers, with infinite bounds
//

#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Debug, Serialize, Deserialize)]
pub enum Interval {
    Bottom,
    /// inclusive bounds, `None` means infinite
    Range {
        lower: Option<i64>,
        upper: Option<i64>,
    },
}

/// A bound extended with both infinities, ordered naturally
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
enum Ext {
    NegInf,
    Fin(i64),
    PosInf,
}

impl Ext {
    fn of_lower(bound: Option<i64>) -> Self {
        bound.map_or(Self::NegInf, Self::Fin)
    }

    fn of_upper(bound: Option<i64>) -> Self {
        bound.map_or(Self::PosInf, Self::Fin)
    }

    fn finite(self) -> Option<i64> {
        match self {
            Self::Fin(v) => Some(v),
            Self::NegInf | Self::PosInf => None,
        }
    }

    fn signum(self) -> i64 {
        match self {
            Self::NegInf => -1,
            Self::Fin(v) => v.signum(),
            Self::PosInf => 1,
        }
    }

    fn infinity(sign: i64) -> Self {
        if sign < 0 {
            Self::NegInf
        } else {
            Self::PosInf
        }
    }

    fn mul(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fin(a), Self::Fin(b)) => match a.checked_mul(b) {
                Some(v) => Self::Fin(v),
                None => Self::infinity(a.signum() * b.signum()),
            },
            _ => match self.signum() * other.signum() {
                0 => Self::Fin(0),
                sign => Self::infinity(sign),
            },
        }
    }
}

fn min_upper(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

fn max_upper(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    a.zip(b).map(|(x, y)| x.max(y))
}

fn min_lower(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    a.zip(b).map(|(x, y)| x.min(y))
}

impl Interval {
    /// The interval `[lower, upper]`, bottom when empty
    pub fn new(lower: Option<i64>, upper: Option<i64>) -> Self {
        match (lower, upper) {
            (Some(l), Some(u)) if l > u => Self::Bottom,
            _ => Self::Range { lower, upper },
        }
    }

    pub fn constant(value: i64) -> Self {
        Self::new(Some(value), Some(value))
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    pub fn at_least(value: i64) -> Self {
        Self::new(Some(value), None)
    }

    pub fn at_most(value: i64) -> Self {
        Self::new(None, Some(value))
    }

    /// `(lower, upper)` when not bottom
    pub fn bounds(&self) -> Option<(Option<i64>, Option<i64>)> {
        match self {
            Self::Bottom => None,
            Self::Range { lower, upper } => Some((*lower, *upper)),
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(
            self,
            Self::Range {
                lower: None,
                upper: None
            }
        )
    }

    pub fn contains(&self, value: i64) -> bool {
        match self {
            Self::Bottom => false,
            Self::Range { lower, upper } => {
                lower.map_or(true, |l| l <= value) && upper.map_or(true, |u| value <= u)
            }
        }
    }

    /// The only value in the interval, if there is exactly one
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Self::Range {
                lower: Some(l),
                upper: Some(u),
            } if l == u => Some(*l),
            _ => None,
        }
    }

    /// Greatest lower bound
    pub fn meet(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (Some((l1, u1)), Some((l2, u2))) => Self::new(l1.max(l2), min_upper(u1, u2)),
            _ => Self::Bottom,
        }
    }

    fn of_truthiness(truth: Truthiness) -> Self {
        match truth {
            Truthiness::True => Self::constant(1),
            Truthiness::False => Self::constant(0),
            Truthiness::Either => Self::new(Some(0), Some(1)),
            Truthiness::Neither => Self::Bottom,
        }
    }

    fn ext_bounds(&self) -> Option<(Ext, Ext)> {
        self.bounds()
            .map(|(l, u)| (Ext::of_lower(l), Ext::of_upper(u)))
    }

    fn add(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (Some((l1, u1)), Some((l2, u2))) => Self::new(
                l1.zip(l2).and_then(|(a, b)| a.checked_add(b)),
                u1.zip(u2).and_then(|(a, b)| a.checked_add(b)),
            ),
            _ => Self::Bottom,
        }
    }

    fn neg(&self) -> Self {
        match self.bounds() {
            Some((l, u)) => Self::new(
                u.and_then(|v| v.checked_neg()),
                l.and_then(|v| v.checked_neg()),
            ),
            None => Self::Bottom,
        }
    }

    fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    fn mul(&self, other: &Self) -> Self {
        let (Some((l1, u1)), Some((l2, u2))) = (self.ext_bounds(), other.ext_bounds()) else {
            return Self::Bottom;
        };
        let corners = [l1.mul(l2), l1.mul(u2), u1.mul(l2), u1.mul(u2)];
        let lo = corners.iter().fold(Ext::PosInf, |acc, c| acc.min(*c));
        let hi = corners.iter().fold(Ext::NegInf, |acc, c| acc.max(*c));
        Self::new(lo.finite(), hi.finite())
    }

    fn div(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::Bottom;
        }
        if other.contains(0) {
            warn!("division by {} may divide by zero, result is unconstrained", other);
            return Self::unbounded();
        }
        let (Some((Some(l1), Some(u1))), Some((Some(l2), Some(u2)))) =
            (self.bounds(), other.bounds())
        else {
            return Self::unbounded();
        };
        let corners = [
            l1.checked_div(l2),
            l1.checked_div(u2),
            u1.checked_div(l2),
            u1.checked_div(u2),
        ];
        let mut lo = i64::MAX;
        let mut hi = i64::MIN;
        for corner in corners {
            match corner {
                Some(v) => {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
                None => return Self::unbounded(),
            }
        }
        Self::new(Some(lo), Some(hi))
    }

    fn rem(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::Bottom;
        }
        if other.contains(0) {
            warn!("remainder by {} may divide by zero, result is unconstrained", other);
            return Self::unbounded();
        }
        let Some((l1, u1)) = self.bounds() else {
            return Self::Bottom;
        };
        let Some((l2, u2)) = other.bounds() else {
            return Self::Bottom;
        };
        // |x % y| < |y|, and the result takes the sign of x
        let magnitude = l2
            .and_then(|l| l.checked_abs())
            .zip(u2.and_then(|u| u.checked_abs()))
            .map(|(a, b)| a.max(b) - 1);
        let non_negative = l1.map_or(false, |l| l >= 0);
        let non_positive = u1.map_or(false, |u| u <= 0);
        if non_negative {
            Self::new(Some(0), min_upper(u1, magnitude))
        } else if non_positive {
            Self::new(l1.max(magnitude.map(|m| -m)), Some(0))
        } else {
            Self::new(magnitude.map(|m| -m), magnitude)
        }
    }

    fn less_than(&self, other: &Self, strict: bool) -> Self {
        let (Some((l1, u1)), Some((l2, u2))) = (self.ext_bounds(), other.ext_bounds()) else {
            return Self::Bottom;
        };
        let (always, never) = if strict {
            (u1 < l2, l1 >= u2)
        } else {
            (u1 <= l2, l1 > u2)
        };
        Self::of_truthiness(if always {
            Truthiness::True
        } else if never {
            Truthiness::False
        } else {
            Truthiness::Either
        })
    }

    fn equals(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::Bottom;
        }
        let truth = match (self.as_constant(), other.as_constant()) {
            (Some(a), Some(b)) if a == b => Truthiness::True,
            _ if self.meet(other).is_bot() => Truthiness::False,
            _ => Truthiness::Either,
        };
        Self::of_truthiness(truth)
    }

    fn logical(&self, other: &Self, conjunction: bool) -> Self {
        use Truthiness::*;
        let truth = match (self.truthiness(), other.truthiness()) {
            (Neither, _) | (_, Neither) => Neither,
            (False, _) | (_, False) if conjunction => False,
            (True, True) if conjunction => True,
            (True, _) | (_, True) if !conjunction => True,
            (False, False) => False,
            _ => Either,
        };
        Self::of_truthiness(truth)
    }

    fn not(&self) -> Self {
        Self::of_truthiness(match self.truthiness() {
            Truthiness::True => Truthiness::False,
            Truthiness::False => Truthiness::True,
            other => other,
        })
    }

    /// Restrict `self` to the values `v` satisfying `v <op> other` for some value of `other`
    fn refine(&self, op: Binop, other: &Self) -> Self {
        let Some((lower, upper)) = other.bounds() else {
            return Self::Bottom;
        };
        let constraint = match op {
            Binop::Lt => Self::new(None, upper.and_then(|u| u.checked_sub(1))),
            Binop::Le => Self::new(None, upper),
            Binop::Gt => Self::new(lower.and_then(|l| l.checked_add(1)), None),
            Binop::Ge => Self::new(lower, None),
            Binop::Eq => other.clone(),
            Binop::Ne => match (self.bounds(), other.as_constant()) {
                (Some((Some(l), u)), Some(c)) if l == c => Self::new(l.checked_add(1), u),
                (Some((l, Some(u))), Some(c)) if u == c => Self::new(l, u.checked_sub(1)),
                _ => Self::unbounded(),
            },
            _ => Self::unbounded(),
        };
        self.meet(&constraint)
    }
}

impl AbstractValue for Interval {
    fn top() -> Self {
        Self::unbounded()
    }

    fn bottom() -> Self {
        Self::Bottom
    }

    fn of_int(value: i64) -> Self {
        Self::constant(value)
    }

    fn of_bool(value: bool) -> Self {
        Self::constant(if value { 1 } else { 0 })
    }

    fn eval_binop(op: Binop, lhs: &Self, rhs: &Self) -> Self {
        if lhs.is_bot() || rhs.is_bot() {
            return Self::Bottom;
        }
        match op {
            Binop::Plus => lhs.add(rhs),
            Binop::Minus => lhs.sub(rhs),
            Binop::Times => lhs.mul(rhs),
            Binop::Divided => lhs.div(rhs),
            Binop::Mod => lhs.rem(rhs),
            Binop::Lt => lhs.less_than(rhs, true),
            Binop::Le => lhs.less_than(rhs, false),
            Binop::Gt => rhs.less_than(lhs, true),
            Binop::Ge => rhs.less_than(lhs, false),
            Binop::Eq => lhs.equals(rhs),
            Binop::Ne => lhs.equals(rhs).not(),
            Binop::And => lhs.logical(rhs, true),
            Binop::Or => lhs.logical(rhs, false),
        }
    }

    fn eval_unop(op: Unop, operand: &Self) -> Self {
        match op {
            Unop::Neg => operand.neg(),
            Unop::Not => operand.not(),
        }
    }

    fn truthiness(&self) -> Truthiness {
        match self.as_constant() {
            _ if self.is_bot() => Truthiness::Neither,
            Some(0) => Truthiness::False,
            _ if self.contains(0) => Truthiness::Either,
            _ => Truthiness::True,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) => other.clone(),
            (_, None) => self.clone(),
            (Some((l1, u1)), Some((l2, u2))) => Self::new(min_lower(l1, l2), max_upper(u1, u2)),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        match (self.bounds(), other.bounds()) {
            (None, _) => other.clone(),
            (_, None) => self.clone(),
            (Some((l1, u1)), Some((l2, u2))) => {
                let lower = if Ext::of_lower(l2) < Ext::of_lower(l1) {
                    None
                } else {
                    l1
                };
                let upper = if Ext::of_upper(u2) > Ext::of_upper(u1) {
                    None
                } else {
                    u1
                };
                Self::new(lower, upper)
            }
        }
    }

    fn implies(&self, other: &Self) -> bool {
        match (self.ext_bounds(), other.ext_bounds()) {
            (None, _) => true,
            (_, None) => false,
            (Some((l1, u1)), Some((l2, u2))) => l2 <= l1 && u1 <= u2,
        }
    }

    fn is_bot(&self) -> bool {
        matches!(self, Self::Bottom)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bottom => write!(f, "bottom"),
            Self::Range { lower, upper } => {
                match lower {
                    None => write!(f, "[-oo, ")?,
                    Some(l) => write!(f, "[{}, ", l)?,
                }
                match upper {
                    None => write!(f, "+oo]"),
                    Some(u) => write!(f, "{}]", u),
                }
            }
        }
    }
}

//
// Non-relational environment of intervals
//

/// Maps variables (and `var.field` facts) to intervals; absent keys are unconstrained
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub enum IntervalState {
    Bottom,
    Env(BTreeMap<Identifier, Interval>),
}

/// The key under which facts about an expression are stored, if it has one
fn key_of(expr: &Expr) -> Option<Identifier> {
    match expr {
        Expr::Var(name) => Some(name.clone()),
        Expr::Field { rcvr, field } => match rcvr.as_ref() {
            Expr::Var(name) => Some(field_key(name, field)),
            _ => None,
        },
        _ => None,
    }
}

fn field_key(var: &Identifier, field: &Identifier) -> Identifier {
    Identifier::from(format!("{}.{}", var, field))
}

impl IntervalState {
    pub fn top() -> Self {
        Self::Env(BTreeMap::new())
    }

    /// The interval bound to `key` (a variable or `var.field`)
    pub fn get(&self, key: &str) -> Interval {
        match self {
            Self::Bottom => Interval::Bottom,
            Self::Env(env) => env
                .get(&Identifier::from(key))
                .cloned()
                .unwrap_or_else(Interval::unbounded),
        }
    }

    /// Bind `key`, collapsing the whole state when the value is bottom
    pub fn set(&mut self, key: Identifier, value: Interval) {
        let Self::Env(env) = self else {
            return;
        };
        if value.is_bot() {
            *self = Self::Bottom;
        } else if value.is_top() {
            env.remove(&key);
        } else {
            env.insert(key, value);
        }
    }

    /// Facts stored under `var.*`, keyed by field name
    fn fields_of(&self, var: &Identifier) -> Vec<(String, Interval)> {
        let Self::Env(env) = self else {
            return vec![];
        };
        let prefix = format!("{}.", var);
        env.iter()
            .filter_map(|(key, value)| {
                key.as_ref()
                    .strip_prefix(&prefix)
                    .map(|field| (field.to_string(), value.clone()))
            })
            .collect()
    }

    fn forget_fields_of(&mut self, var: &Identifier) {
        if let Self::Env(env) = self {
            let prefix = format!("{}.", var);
            env.retain(|key, _| !key.as_ref().starts_with(&prefix));
        }
    }

    /// Evaluate an expression to an interval
    pub fn eval(&self, expr: &Expr) -> Interval {
        if self.is_bot() {
            return Interval::Bottom;
        }
        match expr {
            Expr::Var(name) => self.get(name.as_ref()),
            Expr::Lit(Lit::Int(v)) => Interval::of_int(*v),
            Expr::Lit(Lit::Bool(v)) => Interval::of_bool(*v),
            Expr::Lit(Lit::Null) => Interval::unbounded(),
            Expr::Binop { op, lhs, rhs } => {
                Interval::eval_binop(*op, &self.eval(lhs), &self.eval(rhs))
            }
            Expr::Unop { op, operand } => Interval::eval_unop(*op, &self.eval(operand)),
            Expr::Field { .. } => match key_of(expr) {
                Some(key) => self.get(key.as_ref()),
                None => Interval::unbounded(),
            },
            Expr::Index { .. } | Expr::Array(_) | Expr::Call { .. } => Interval::unbounded(),
        }
    }

    fn assign(&self, lhs: &Identifier, rhs: &Expr) -> Self {
        let value = self.eval(rhs);
        let copied = match rhs {
            Expr::Var(src) => self.fields_of(src),
            Expr::Array(elems) => match i64::try_from(elems.len()) {
                Ok(len) => vec![("length".to_string(), Interval::constant(len))],
                Err(_) => vec![],
            },
            _ => vec![],
        };
        let mut next = self.clone();
        next.forget_fields_of(lhs);
        for (field, fact) in copied {
            next.set(field_key(lhs, &Identifier::from(field)), fact);
        }
        next.set(lhs.clone(), value);
        next
    }

    fn write(&self, rcvr: &Expr, sel: &Selector, rhs: &Expr) -> Self {
        let mut next = self.clone();
        if let (Expr::Var(var), Selector::Field(field)) = (rcvr, sel) {
            next.set(field_key(var, field), self.eval(rhs));
        }
        next
    }

    /// Restrict the state to executions where `cond` evaluates to `polarity`
    fn assume(&self, cond: &Expr, polarity: bool) -> Self {
        if self.is_bot() {
            return Self::Bottom;
        }
        match cond {
            Expr::Unop {
                op: Unop::Not,
                operand,
            } => self.assume(operand, !polarity),
            Expr::Binop {
                op: Binop::And,
                lhs,
                rhs,
            } => {
                if polarity {
                    self.assume(lhs, true).assume(rhs, true)
                } else {
                    self.assume(lhs, false).join(&self.assume(rhs, false))
                }
            }
            Expr::Binop {
                op: Binop::Or,
                lhs,
                rhs,
            } => {
                if polarity {
                    self.assume(lhs, true).join(&self.assume(rhs, true))
                } else {
                    self.assume(lhs, false).assume(rhs, false)
                }
            }
            Expr::Binop { op, lhs, rhs } if op.is_comparison() => {
                let op = if polarity {
                    Some(*op)
                } else {
                    op.negate()
                };
                match op {
                    Some(op) => self.compare(op, lhs, rhs),
                    None => self.clone(),
                }
            }
            _ => {
                let op = if polarity { Binop::Ne } else { Binop::Eq };
                self.compare(op, cond, &Expr::int(0))
            }
        }
    }

    /// Restrict the state with the comparison `lhs <op> rhs`
    fn compare(&self, op: Binop, lhs: &Expr, rhs: &Expr) -> Self {
        let lval = self.eval(lhs);
        let rval = self.eval(rhs);
        match Interval::eval_binop(op, &lval, &rval).truthiness() {
            Truthiness::False | Truthiness::Neither => return Self::Bottom,
            Truthiness::True | Truthiness::Either => (),
        }
        let mut next = self.clone();
        if let Some(key) = key_of(lhs) {
            next.set(key, lval.refine(op, &rval));
        }
        if let (Some(key), Some(mirrored)) = (key_of(rhs), op.mirror()) {
            next.set(key, rval.refine(mirrored, &lval));
        }
        next
    }

    fn combine<F>(&self, other: &Self, merge: F) -> Self
    where
        F: Fn(&Interval, &Interval) -> Interval,
    {
        match (self, other) {
            (Self::Bottom, _) => other.clone(),
            (_, Self::Bottom) => self.clone(),
            (Self::Env(lhs), Self::Env(rhs)) => {
                let mut next = Self::top();
                for (key, value) in lhs {
                    if let Some(theirs) = rhs.get(key) {
                        next.set(key.clone(), merge(value, theirs));
                    }
                }
                next
            }
        }
    }
}

impl AbstractDomain for IntervalState {
    fn init() -> Self {
        Self::top()
    }

    fn bottom() -> Self {
        Self::Bottom
    }

    fn interpret(&self, stmt: &Stmt) -> Self {
        if self.is_bot() {
            return Self::Bottom;
        }
        match stmt {
            Stmt::Assign { lhs, rhs } => self.assign(lhs, rhs),
            Stmt::Write { rcvr, sel, rhs } => self.write(rcvr, sel, rhs),
            Stmt::Throw { .. } => Self::Bottom,
            Stmt::Assume(cond) => self.assume(cond, true),
            Stmt::Expr(_) | Stmt::Skip => self.clone(),
        }
    }

    fn join(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a.join(b))
    }

    fn widen(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a.widen(b))
    }

    fn implies(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bottom, _) => true,
            (_, Self::Bottom) => false,
            (Self::Env(_), Self::Env(theirs)) => theirs
                .iter()
                .all(|(key, value)| self.get(key.as_ref()).implies(value)),
        }
    }

    fn is_bot(&self) -> bool {
        matches!(self, Self::Bottom)
    }
}

impl Display for IntervalState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bottom => write!(f, "bottom"),
            Self::Env(env) => {
                let items: Vec<_> = env
                    .iter()
                    .map(|(key, value)| format!("{} -> {}", key, value))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

use std::fmt::{Display, Formatter};

use crate::ir::bridge::loc::Loc;
use crate::ir::bridge::stmt::Stmt;

/// Deterministic name of a node in the demanded graph
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug)]
pub enum Name {
    /// the abstract state at a location
    State(Loc),
    /// the `idx`-th statement (in statement order) on the CFG edges `src -> dst`
    Stmt { src: Loc, dst: Loc, idx: usize },
}

impl Name {
    /// The abstract state a statement reads from
    pub fn pre_state(&self) -> Option<Name> {
        match self {
            Self::State(_) => None,
            Self::Stmt { src, .. } => Some(Self::State(*src)),
        }
    }

    /// The abstract state a statement flows into
    pub fn post_state(&self) -> Option<Name> {
        match self {
            Self::State(_) => None,
            Self::Stmt { dst, .. } => Some(Self::State(*dst)),
        }
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(loc) => write!(f, "state({})", loc),
            Self::Stmt { src, dst, idx } => write!(f, "stmt({}->{}#{})", src, dst, idx),
        }
    }
}

/// Dependency between two nodes
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Dep {
    /// the statement reads the abstract state
    Pre,
    /// the abstract state is produced by the statement
    Post,
}

impl Display for Dep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// A view of a node
#[derive(Debug)]
pub enum Ref<'a, D> {
    /// immutable once the CFG is fixed
    Stmt { name: Name, stmt: &'a Stmt },
    /// `None` until demanded
    AState { name: Name, state: Option<&'a D> },
}

impl<D> Ref<'_, D> {
    pub fn name(&self) -> Name {
        match self {
            Self::Stmt { name, .. } | Self::AState { name, .. } => *name,
        }
    }
}

/// The outcome of a demand
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum Resolved<D> {
    Stmt(Stmt),
    State(D),
}

impl<D> Resolved<D> {
    pub fn into_state(self) -> Option<D> {
        match self {
            Self::Stmt(_) => None,
            Self::State(state) => Some(state),
        }
    }

    pub fn into_stmt(self) -> Option<Stmt> {
        match self {
            Self::Stmt(stmt) => Some(stmt),
            Self::State(_) => None,
        }
    }
}

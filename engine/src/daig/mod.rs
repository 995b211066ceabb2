use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use dai_shared::logging::Tracer;

use crate::analysis::domain::AbstractDomain;
use crate::error::{EngineError, EngineResult};
use crate::graph::LabeledGraph;
use crate::ir::bridge::cfg::Cfg;
use crate::ir::bridge::loc::{Loc, LocAllocator};
use crate::ir::bridge::stmt::Stmt;

pub use node::{Dep, Name, Ref, Resolved};

mod node;

/// A cached abstract state
#[derive(Clone, Debug)]
struct Cell<D> {
    value: Option<D>,
    /// loop heads not yet converged whose iterate the value was computed from
    pending: BTreeSet<Loc>,
    /// the demand pass that computed the value
    pass: usize,
}

impl<D> Cell<D> {
    fn is_final(&self) -> bool {
        self.value.is_some() && self.pending.is_empty()
    }
}

/// Demand counters
#[derive(Eq, PartialEq, Copy, Clone, Debug, Default)]
pub struct DaigStats {
    /// demands answered from the cache
    pub hits: usize,
    /// abstract states (re)computed
    pub computed: usize,
    /// widening steps at loop heads
    pub widens: usize,
}

/// Demanded abstract interpretation graph over a CFG
pub struct Daig<D: AbstractDomain> {
    /// the program, owned so that it can be edited
    cfg: Cfg,
    /// statement and state nodes, mirroring the CFG
    graph: LabeledGraph<Name, Dep>,
    /// statement of every statement node
    stmts: BTreeMap<Name, Stmt>,
    /// loop heads of the CFG
    heads: BTreeSet<Loc>,
    /// back edges of the CFG as `(src, dst)`
    back: BTreeSet<(Loc, Loc)>,
    /// abstract states demanded so far
    cells: BTreeMap<Loc, Cell<D>>,
    /// loop heads being recomputed in the current pass
    visiting: BTreeSet<Loc>,
    /// current demand pass, bumped by every top-level demand on a state
    pass: usize,
    stats: DaigStats,
}

/// Construction
impl<D: AbstractDomain> Daig<D> {
    /// Build the graph skeleton; no abstract state is computed
    pub fn of_cfg(cfg: Cfg) -> Self {
        let mut daig = Self {
            cfg,
            graph: LabeledGraph::new(),
            stmts: BTreeMap::new(),
            heads: BTreeSet::new(),
            back: BTreeSet::new(),
            cells: BTreeMap::new(),
            visiting: BTreeSet::new(),
            pass: 0,
            stats: DaigStats::default(),
        };
        daig.build_skeleton();
        daig
    }

    fn build_skeleton(&mut self) {
        let mut graph = LabeledGraph::new();
        let mut stmts = BTreeMap::new();

        for loc in self.cfg.locs() {
            graph.add_node(Name::State(loc));
        }

        // parallel edges are ranked by statement for stable names
        let mut parallel: BTreeMap<(Loc, Loc), Vec<&Stmt>> = BTreeMap::new();
        for (src, dst, stmt) in self.cfg.edges() {
            parallel.entry((src, dst)).or_default().push(stmt);
        }
        for ((src, dst), mut group) in parallel {
            group.sort();
            for (idx, stmt) in group.into_iter().enumerate() {
                let name = Name::Stmt { src, dst, idx };
                graph.add_edge(Name::State(src), name, Dep::Pre);
                graph.add_edge(name, Name::State(dst), Dep::Post);
                stmts.insert(name, stmt.clone());
            }
        }

        self.back = self
            .cfg
            .back_edges()
            .into_iter()
            .map(|e| (e.src, e.dst))
            .collect();
        self.heads = self.back.iter().map(|(_, dst)| *dst).collect();
        self.graph = graph;
        self.stmts = stmts;
        debug!(
            "demanded graph built: {} nodes, {} loop heads",
            self.graph.node_count(),
            self.heads.len()
        );
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn stats(&self) -> DaigStats {
        self.stats
    }
}

/// Navigation
impl<D: AbstractDomain> Daig<D> {
    /// All nodes, abstract states first
    pub fn nodes(&self) -> Vec<Ref<'_, D>> {
        self.graph
            .nodes()
            .filter_map(|name| self.lookup(&name))
            .collect()
    }

    pub fn lookup(&self, name: &Name) -> Option<Ref<'_, D>> {
        match name {
            Name::State(loc) => {
                if !self.cfg.contains(*loc) {
                    return None;
                }
                Some(Ref::AState {
                    name: *name,
                    state: self.cached(*loc),
                })
            }
            Name::Stmt { .. } => self.stmts.get(name).map(|stmt| Ref::Stmt { name: *name, stmt }),
        }
    }

    pub fn successors(&self, name: &Name) -> Vec<Name> {
        self.graph.successors(*name)
    }

    pub fn predecessors(&self, name: &Name) -> Vec<Name> {
        self.graph.predecessors(*name)
    }

    /// Every statement node, in name order
    pub fn stmt_refs(&self) -> impl Iterator<Item = (Name, &Stmt)> + '_ {
        self.stmts.iter().map(|(name, stmt)| (*name, stmt))
    }

    /// The cached state at `loc`, final or not
    pub fn cached(&self, loc: Loc) -> Option<&D> {
        self.cells.get(&loc).and_then(|cell| cell.value.as_ref())
    }

    /// Whether the node is resolved and will not change on further demand
    pub fn is_stable(&self, name: &Name) -> bool {
        match name {
            Name::State(loc) => self.cells.get(loc).map_or(false, |cell| cell.is_final()),
            Name::Stmt { .. } => self.stmts.contains_key(name),
        }
    }
}

/// Demand
impl<D: AbstractDomain> Daig<D> {
    /// Resolve a node, computing and caching whatever it depends on.
    ///
    /// A demand on a loop head widens it exactly once; repeat the demand (or use
    /// `get_stable`) until the node is stable.
    pub fn get(&mut self, name: &Name) -> EngineResult<Resolved<D>> {
        match name {
            Name::Stmt { .. } => self
                .stmts
                .get(name)
                .map(|stmt| Resolved::Stmt(stmt.clone()))
                .ok_or_else(|| EngineError::InvariantViolation(format!("no such node {}", name))),
            Name::State(loc) => {
                if !self.cfg.contains(*loc) {
                    return Err(EngineError::InvariantViolation(format!(
                        "no such node {}",
                        name
                    )));
                }
                self.pass += 1;
                let (state, _) = self.demand(*loc)?;
                Ok(Resolved::State(state))
            }
        }
    }

    /// Demand a node until it is stable
    pub fn get_stable(&mut self, name: &Name) -> EngineResult<Resolved<D>> {
        let mut rounds = 0;
        loop {
            let resolved = self.get(name)?;
            rounds += 1;
            if self.is_stable(name) {
                debug!("{} stable after {} round(s)", name, rounds);
                return Ok(resolved);
            }
        }
    }

    /// The stable abstract state at `loc`
    pub fn state_at(&mut self, loc: Loc) -> EngineResult<D> {
        self.get_stable(&Name::State(loc))?
            .into_state()
            .ok_or_else(|| EngineError::InvariantViolation(format!("{} is not a state", loc)))
    }

    fn demand(&mut self, loc: Loc) -> EngineResult<(D, BTreeSet<Loc>)> {
        let tracer = Tracer::new(format!("demand {}", loc));

        // re-entered through a cycle, use the current iterate (bottom if none yet)
        if self.visiting.contains(&loc) {
            tracer.log("iterate");
            let state = self.cached(loc).cloned().unwrap_or_else(D::bottom);
            return Ok((state, BTreeSet::from([loc])));
        }

        // final, or already computed in this pass
        if let Some(cell) = self.cells.get(&loc) {
            if let Some(state) = &cell.value {
                if cell.is_final() || cell.pass == self.pass {
                    tracer.log("hit");
                    self.stats.hits += 1;
                    return Ok((state.clone(), cell.pending.clone()));
                }
            }
        }

        let (state, pending) = if self.heads.contains(&loc) {
            self.compute_head(loc)?
        } else {
            self.compute_plain(loc)?
        };
        tracer.log(&format!("{} (pending {:?})", state, pending));
        self.stats.computed += 1;
        self.cells.insert(
            loc,
            Cell {
                value: Some(state.clone()),
                pending: pending.clone(),
                pass: self.pass,
            },
        );
        Ok((state, pending))
    }

    /// Whether `src -> dst` is a back edge
    fn is_back(&self, src: Loc, dst: Loc) -> bool {
        self.back.contains(&(src, dst))
    }

    /// Join the post-states of the statements flowing into `loc` from sources accepted by `filter`
    fn join_inputs<F>(&mut self, loc: Loc, filter: F) -> EngineResult<(D, BTreeSet<Loc>)>
    where
        F: Fn(Loc) -> bool,
    {
        let inputs: Vec<_> = self
            .graph
            .predecessors(Name::State(loc))
            .into_iter()
            .filter(|name| matches!(name, Name::Stmt { src, .. } if filter(*src)))
            .collect();

        let mut joined = D::bottom();
        let mut pending = BTreeSet::new();
        for name in inputs {
            let Some(Name::State(src)) = name.pre_state() else {
                continue;
            };
            let (pre, deps) = self.demand(src)?;
            let stmt = self.stmts.get(&name).ok_or_else(|| {
                EngineError::InvariantViolation(format!("dangling statement node {}", name))
            })?;
            joined = joined.join(&pre.interpret(stmt));
            pending.extend(deps);
        }
        Ok((joined, pending))
    }

    fn is_root(&self, loc: Loc) -> bool {
        self.cfg
            .predecessors(loc)
            .into_iter()
            .all(|src| self.is_back(src, loc))
    }

    fn compute_plain(&mut self, loc: Loc) -> EngineResult<(D, BTreeSet<Loc>)> {
        if self.is_root(loc) {
            return Ok((D::init(), BTreeSet::new()));
        }
        self.join_inputs(loc, |_| true)
    }

    fn compute_head(&mut self, loc: Loc) -> EngineResult<(D, BTreeSet<Loc>)> {
        let back = self.back.clone();
        let seen = self.cached(loc).cloned();

        // the entering state may itself cycle back here through an outer loop
        self.visiting.insert(loc);
        let result = self.widen_head(loc, &back, seen.clone());
        self.visiting.remove(&loc);
        let (next, prev, mut pending, looping) = result?;
        self.stats.widens += 1;

        // the entering side saw bottom if nothing was cached, so it cannot be trusted yet
        let reentered_unseeded = seen.is_none() && pending.contains(&loc);
        pending.extend(looping);
        pending.remove(&loc);
        if reentered_unseeded || !next.implies(&prev) {
            pending.insert(loc);
        }
        Ok((next, pending))
    }

    /// One widening step at `loc`: the new and previous iterates, with the dependencies of the
    /// entering and looping sides
    fn widen_head(
        &mut self,
        loc: Loc,
        back: &BTreeSet<(Loc, Loc)>,
        seen: Option<D>,
    ) -> EngineResult<(D, D, BTreeSet<Loc>, BTreeSet<Loc>)> {
        let (entering, pending) = if self.is_root(loc) {
            (D::init(), BTreeSet::new())
        } else {
            self.join_inputs(loc, |src| !back.contains(&(src, loc)))?
        };

        // seed the iterate, either from the previous demand or from the entering state
        let prev = seen.unwrap_or_else(|| entering.clone());
        self.cells.insert(
            loc,
            Cell {
                value: Some(prev.clone()),
                pending: BTreeSet::from([loc]),
                pass: self.pass,
            },
        );

        let (looping, deps) = self.join_inputs(loc, |src| back.contains(&(src, loc)))?;
        let next = prev.widen(&entering.join(&looping));
        Ok((next, prev, pending, deps))
    }
}

/// Edits
impl<D: AbstractDomain> Daig<D> {
    /// Drop the cached states of every location reachable from `loc`
    pub fn dirty(&mut self, loc: Loc) {
        let cone = self.cfg.reachable_subgraph(loc);
        let before = self.cells.len();
        self.cells.retain(|l, _| !cone.contains(*l));
        debug!("dirtied {} state(s) from {}", before - self.cells.len(), loc);
    }

    /// Insert a statement into the CFG, keeping the states the edit cannot affect
    pub fn add_stmt_at(
        &mut self,
        alloc: &mut LocAllocator,
        loc: Loc,
        stmt: Stmt,
    ) -> EngineResult<Loc> {
        let fresh = self.cfg.add_stmt_at(alloc, loc, stmt)?;
        self.build_skeleton();
        // only states downstream of the new edge can change
        self.dirty(fresh);
        Ok(fresh)
    }

    /// Render in the dot format, with the cached states
    pub fn to_dot(&self) -> String {
        self.graph.to_dot(
            |name| match name {
                Name::State(loc) => match self.cached(*loc) {
                    None => format!("{}", loc),
                    Some(state) => format!("{}: {}", loc, state),
                },
                Name::Stmt { .. } => match self.stmts.get(name) {
                    None => name.to_string(),
                    Some(stmt) => stmt.to_string(),
                },
            },
            |dep| dep.to_string(),
        )
    }
}

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, EngineResult};
use crate::graph::LabeledGraph;
use crate::ir::bridge::function::Function;
use crate::ir::bridge::loc::{Loc, LocAllocator};
use crate::ir::bridge::stmt::Stmt;

/// An edge closing a cycle in a depth-first traversal; `dst` is a loop head
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct BackEdge {
    pub src: Loc,
    pub dst: Loc,
}

/// For each location inside some natural loop, the heads of all loops containing it
#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub struct LoopMembership(BTreeMap<Loc, BTreeSet<Loc>>);

impl LoopMembership {
    /// Loop heads containing `loc`, empty when `loc` is in no loop
    pub fn heads_of(&self, loc: Loc) -> BTreeSet<Loc> {
        self.0.get(&loc).cloned().unwrap_or_default()
    }

    pub fn is_in_loop(&self, loc: Loc) -> bool {
        self.0.contains_key(&loc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Loc, &BTreeSet<Loc>)> {
        self.0.iter()
    }
}

/// A control-flow graph: locations as nodes, statements on edges
#[derive(Clone, Default)]
pub struct Cfg {
    graph: LabeledGraph<Loc, Stmt>,
    /// functions whose entry points live in this graph
    fns: Vec<Function>,
}

impl Cfg {
    /// A graph without any location
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart location allocation and build `entry -[skip]-> exit`
    pub fn empty(alloc: &mut LocAllocator) -> Self {
        alloc.reset();
        let mut cfg = Self::new();
        cfg.add_edge(Loc::Entry, Loc::Exit, Stmt::Skip);
        cfg
    }

    pub fn add_loc(&mut self, loc: Loc) {
        self.graph.add_node(loc);
    }

    pub fn add_edge(&mut self, src: Loc, dst: Loc, stmt: Stmt) {
        self.graph.add_edge(src, dst, stmt);
    }

    pub fn add_fn(&mut self, func: Function) {
        self.graph.add_node(func.entry());
        self.graph.add_node(func.exit());
        self.fns.push(func);
    }

    pub fn fns(&self) -> &[Function] {
        &self.fns
    }

    pub fn contains(&self, loc: Loc) -> bool {
        self.graph.contains(&loc)
    }

    pub fn num_locs(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn locs(&self) -> impl Iterator<Item = Loc> + '_ {
        self.graph.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Loc, Loc, &Stmt)> + '_ {
        self.graph.edges()
    }

    pub fn out_edges(&self, loc: Loc) -> Vec<(Loc, &Stmt)> {
        self.graph.out_edges(loc)
    }

    pub fn in_edges(&self, loc: Loc) -> Vec<(Loc, &Stmt)> {
        self.graph.in_edges(loc)
    }

    pub fn successors(&self, loc: Loc) -> Vec<Loc> {
        self.graph.successors(loc)
    }

    pub fn predecessors(&self, loc: Loc) -> Vec<Loc> {
        self.graph.predecessors(loc)
    }

    /// Whether `loc` is the sentinel exit or the exit of a function
    pub fn is_exit(&self, loc: Loc) -> bool {
        loc == Loc::Exit || self.fns.iter().any(|f| f.exit() == loc)
    }
}

/// Loop structure
impl Cfg {
    pub fn back_edges(&self) -> Vec<BackEdge> {
        self.graph
            .back_edges()
            .into_iter()
            .map(|(src, dst)| BackEdge { src, dst })
            .collect()
    }

    pub fn loop_heads(&self) -> BTreeSet<Loc> {
        self.back_edges().into_iter().map(|e| e.dst).collect()
    }

    /// Locations reaching the back edge's source without passing through its destination.
    ///
    /// The loop head itself is never part of the result, which keeps "is a loop head" and
    /// "is inside a loop" disjoint. A self-loop has an empty body.
    pub fn natural_loop(&self, edge: &BackEdge) -> BTreeSet<Loc> {
        let BackEdge { src, dst } = *edge;
        let mut body = BTreeSet::new();
        if src == dst {
            return body;
        }
        body.insert(src);
        let mut frontier = vec![src];
        while let Some(loc) = frontier.pop() {
            for pred in self.predecessors(loc) {
                if pred != src && pred != dst && body.insert(pred) {
                    frontier.push(pred);
                }
            }
        }
        body
    }

    pub fn containing_loop_heads(&self) -> LoopMembership {
        let mut membership: BTreeMap<Loc, BTreeSet<Loc>> = BTreeMap::new();
        for edge in self.back_edges() {
            for loc in self.natural_loop(&edge) {
                membership.entry(loc).or_default().insert(edge.dst);
            }
        }
        LoopMembership(membership)
    }

    /// Partition locations into (forward in-degree <= 1, forward in-degree >= 2)
    pub fn locs_by_forward_indegree(&self) -> (BTreeSet<Loc>, BTreeSet<Loc>) {
        let back: BTreeSet<_> = self
            .back_edges()
            .into_iter()
            .map(|e| (e.src, e.dst))
            .collect();
        let mut non_joins = BTreeSet::new();
        let mut joins = BTreeSet::new();
        for loc in self.locs() {
            let degree = self
                .predecessors(loc)
                .into_iter()
                .filter(|pred| !back.contains(&(*pred, loc)))
                .count();
            if degree <= 1 {
                non_joins.insert(loc);
            } else {
                joins.insert(loc);
            }
        }
        (non_joins, joins)
    }
}

/// Editing
impl Cfg {
    /// Whether `add_stmt_at` places the new statement before `loc` (instead of after)
    pub fn splices_before(&self, loc: Loc) -> bool {
        self.is_exit(loc) || self.loop_heads().contains(&loc)
    }

    /// Insert `stmt` on a fresh edge at `loc`, keeping every other edge connected.
    ///
    /// Before a loop head or an exit, the forward in-edges of `loc` move onto a fresh
    /// location which flows into `loc` through `stmt`; back edges keep targeting `loc`.
    /// Everywhere else, the out-edges of `loc` move onto a fresh location reached from
    /// `loc` through `stmt`. Returns the fresh location.
    pub fn add_stmt_at(
        &mut self,
        alloc: &mut LocAllocator,
        loc: Loc,
        stmt: Stmt,
    ) -> EngineResult<Loc> {
        if !self.contains(loc) {
            return Err(EngineError::InvariantViolation(format!(
                "cannot insert a statement at unknown location {}",
                loc
            )));
        }

        let fresh = alloc.fresh();
        if self.splices_before(loc) {
            let back: BTreeSet<_> = self
                .back_edges()
                .into_iter()
                .filter(|e| e.dst == loc)
                .map(|e| e.src)
                .collect();
            self.graph
                .redirect_in_edges(loc, fresh, |src| !back.contains(&src));
            self.graph.add_edge(fresh, loc, stmt);
        } else {
            self.graph.redirect_out_edges(loc, fresh);
            self.graph.add_edge(loc, fresh, stmt);
        }
        Ok(fresh)
    }

    /// Restrict to the locations reachable from `from`
    pub fn reachable_subgraph(&self, from: Loc) -> Self {
        let keep = self.graph.reachable_from(from);
        let fns = self
            .fns
            .iter()
            .filter(|f| keep.contains(&f.entry()))
            .cloned()
            .collect();
        Self {
            graph: self.graph.restrict(&keep),
            fns,
        }
    }

    /// Render in the dot format (debugging only)
    pub fn to_dot(&self) -> String {
        self.graph.to_dot(|loc| loc.to_string(), |stmt| stmt.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ir::bridge::expr::{Binop, Expr};

    /// entry -[x := 0]-> l1 -[assume x < 10]-> l2 -[x := x + 1]-> l1 -[assume x >= 10]-> exit
    pub(crate) fn counting_loop(alloc: &mut LocAllocator) -> (Cfg, Loc, Loc) {
        alloc.reset();
        let l1 = alloc.fresh();
        let l2 = alloc.fresh();
        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, l1, Stmt::assign("x", Expr::int(0)));
        cfg.add_edge(
            l1,
            l2,
            Stmt::Assume(Expr::binop(Binop::Lt, Expr::var("x"), Expr::int(10))),
        );
        cfg.add_edge(
            l2,
            l1,
            Stmt::assign(
                "x",
                Expr::binop(Binop::Plus, Expr::var("x"), Expr::int(1)),
            ),
        );
        cfg.add_edge(
            l1,
            Loc::Exit,
            Stmt::Assume(Expr::binop(Binop::Ge, Expr::var("x"), Expr::int(10))),
        );
        (cfg, l1, l2)
    }

    fn edge_list(cfg: &Cfg, skip: &[Loc]) -> Vec<(Loc, Loc, String)> {
        let mut edges: Vec<_> = cfg
            .edges()
            .filter(|(src, dst, _)| !skip.contains(src) && !skip.contains(dst))
            .map(|(src, dst, stmt)| (src, dst, stmt.to_string()))
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn empty_cfg() {
        let mut alloc = LocAllocator::new(0);
        alloc.fresh();
        let cfg = Cfg::empty(&mut alloc);
        assert_eq!(alloc.allocated(), 0);
        assert_eq!(cfg.num_locs(), 2);
        assert_eq!(cfg.out_edges(Loc::Entry), vec![(Loc::Exit, &Stmt::Skip)]);
        assert!(cfg.back_edges().is_empty());
    }

    #[test]
    fn loop_detection() {
        let mut alloc = LocAllocator::new(0);
        let (cfg, l1, l2) = counting_loop(&mut alloc);
        assert_eq!(cfg.back_edges(), vec![BackEdge { src: l2, dst: l1 }]);
        assert_eq!(cfg.loop_heads(), BTreeSet::from([l1]));

        let body = cfg.natural_loop(&BackEdge { src: l2, dst: l1 });
        assert_eq!(body, BTreeSet::from([l2]));

        let membership = cfg.containing_loop_heads();
        assert_eq!(membership.heads_of(l2), BTreeSet::from([l1]));
        assert!(membership.heads_of(l1).is_empty());
        assert!(!membership.is_in_loop(Loc::Exit));
    }

    #[test]
    fn nested_loops_accumulate_heads() {
        let mut alloc = LocAllocator::new(0);
        let h1 = alloc.fresh();
        let h2 = alloc.fresh();
        let b = alloc.fresh();
        let c = alloc.fresh();
        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, h1, Stmt::Skip);
        cfg.add_edge(h1, h2, Stmt::Skip);
        cfg.add_edge(h2, b, Stmt::Skip);
        cfg.add_edge(b, h2, Stmt::Skip);
        cfg.add_edge(h2, c, Stmt::Skip);
        cfg.add_edge(c, h1, Stmt::Skip);
        cfg.add_edge(h1, Loc::Exit, Stmt::Skip);

        assert_eq!(cfg.loop_heads(), BTreeSet::from([h1, h2]));
        for edge in cfg.back_edges() {
            assert!(!cfg.natural_loop(&edge).contains(&edge.dst));
        }
        assert_eq!(
            cfg.natural_loop(&BackEdge { src: c, dst: h1 }),
            BTreeSet::from([h2, b, c])
        );

        let membership = cfg.containing_loop_heads();
        assert_eq!(membership.heads_of(b), BTreeSet::from([h1, h2]));
        assert_eq!(membership.heads_of(h2), BTreeSet::from([h1]));
        assert_eq!(membership.heads_of(c), BTreeSet::from([h1]));
        assert!(membership.heads_of(h1).is_empty());
    }

    #[test]
    fn self_loop_has_empty_body() {
        let mut alloc = LocAllocator::new(0);
        let l = alloc.fresh();
        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, l, Stmt::Skip);
        cfg.add_edge(l, l, Stmt::Skip);
        cfg.add_edge(l, Loc::Exit, Stmt::Skip);
        let back = cfg.back_edges();
        assert_eq!(back, vec![BackEdge { src: l, dst: l }]);
        assert!(cfg.natural_loop(&back[0]).is_empty());
    }

    /// Locations reachable from the successors of `head` without entering `head` again
    fn reachable_avoiding(cfg: &Cfg, head: Loc) -> BTreeSet<Loc> {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![head];
        while let Some(loc) = frontier.pop() {
            for succ in cfg.successors(loc) {
                if succ != head && seen.insert(succ) {
                    frontier.push(succ);
                }
            }
        }
        seen
    }

    #[test]
    fn natural_loops_hang_off_their_heads() {
        let mut alloc = LocAllocator::new(0);
        let h1 = alloc.fresh();
        let h2 = alloc.fresh();
        let a = alloc.fresh();
        let b = alloc.fresh();
        let c = alloc.fresh();
        let d = alloc.fresh();
        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, h1, Stmt::Skip);
        cfg.add_edge(h1, a, Stmt::Skip);
        cfg.add_edge(h1, Loc::Exit, Stmt::Skip);
        // branch inside the outer loop, then an inner loop with an early exit
        cfg.add_edge(a, h2, Stmt::Skip);
        cfg.add_edge(a, c, Stmt::Skip);
        cfg.add_edge(h2, b, Stmt::Skip);
        cfg.add_edge(b, h2, Stmt::Skip);
        cfg.add_edge(b, d, Stmt::Skip);
        cfg.add_edge(h2, c, Stmt::Skip);
        cfg.add_edge(c, h1, Stmt::Skip);
        cfg.add_edge(d, Loc::Exit, Stmt::Skip);

        let back = cfg.back_edges();
        assert_eq!(back.len(), 2);
        for edge in back {
            let body = cfg.natural_loop(&edge);
            assert!(body.contains(&edge.src));
            let reachable = reachable_avoiding(&cfg, edge.dst);
            for loc in &body {
                assert!(reachable.contains(loc), "{} in the loop of {}", loc, edge.dst);
            }
        }
        assert_eq!(
            cfg.natural_loop(&BackEdge { src: c, dst: h1 }),
            BTreeSet::from([a, h2, b, c])
        );
        assert_eq!(cfg.natural_loop(&BackEdge { src: b, dst: h2 }), BTreeSet::from([b]));
    }

    #[test]
    fn join_points_ignore_back_edges() {
        let mut alloc = LocAllocator::new(0);
        let (cfg, l1, l2) = counting_loop(&mut alloc);
        let (non_joins, joins) = cfg.locs_by_forward_indegree();
        assert!(joins.is_empty());
        assert_eq!(non_joins, BTreeSet::from([Loc::Entry, Loc::Exit, l1, l2]));

        // if (c) then a else b; join
        let a = alloc.fresh();
        let b = alloc.fresh();
        let mut diamond = Cfg::new();
        diamond.add_edge(Loc::Entry, a, Stmt::Assume(Expr::var("c")));
        diamond.add_edge(Loc::Entry, b, Stmt::Skip);
        diamond.add_edge(a, Loc::Exit, Stmt::Skip);
        diamond.add_edge(b, Loc::Exit, Stmt::Skip);
        let (_, joins) = diamond.locs_by_forward_indegree();
        assert_eq!(joins, BTreeSet::from([Loc::Exit]));
    }

    #[test]
    fn insertion_after_ordinary_location() {
        let mut alloc = LocAllocator::new(0);
        let (mut cfg, l1, l2) = counting_loop(&mut alloc);
        let before = edge_list(&cfg, &[l2]);
        let (locs, edges) = (cfg.num_locs(), cfg.num_edges());

        let stmt = Stmt::assign("y", Expr::int(1));
        let fresh = cfg.add_stmt_at(&mut alloc, l2, stmt.clone()).unwrap();
        assert_eq!(cfg.num_locs(), locs + 1);
        assert_eq!(cfg.num_edges(), edges + 1);
        assert_eq!(cfg.out_edges(l2), vec![(fresh, &stmt)]);
        assert_eq!(cfg.successors(fresh), vec![l1]);
        assert_eq!(edge_list(&cfg, &[l2, fresh]), before);
        assert_eq!(cfg.loop_heads(), BTreeSet::from([l1]));
    }

    #[test]
    fn insertion_before_loop_head_keeps_the_head() {
        let mut alloc = LocAllocator::new(0);
        let (mut cfg, l1, l2) = counting_loop(&mut alloc);
        let before = edge_list(&cfg, &[l1]);

        let stmt = Stmt::assign("y", Expr::int(1));
        let fresh = cfg.add_stmt_at(&mut alloc, l1, stmt.clone()).unwrap();
        assert_eq!(cfg.successors(Loc::Entry), vec![fresh]);
        assert_eq!(cfg.out_edges(fresh), vec![(l1, &stmt)]);
        let mut preds = cfg.predecessors(l1);
        preds.sort();
        assert_eq!(preds, vec![l2, fresh]);
        assert_eq!(cfg.loop_heads(), BTreeSet::from([l1]));
        assert_eq!(cfg.back_edges(), vec![BackEdge { src: l2, dst: l1 }]);
        assert_eq!(edge_list(&cfg, &[l1, fresh]), before);
    }

    #[test]
    fn insertion_before_exit() {
        let mut alloc = LocAllocator::new(0);
        let (mut cfg, l1, _) = counting_loop(&mut alloc);
        let fresh = cfg
            .add_stmt_at(&mut alloc, Loc::Exit, Stmt::Skip)
            .unwrap();
        assert_eq!(cfg.predecessors(Loc::Exit), vec![fresh]);
        assert_eq!(cfg.predecessors(fresh), vec![l1]);
        assert!(cfg.out_edges(Loc::Exit).is_empty());
    }

    #[test]
    fn insertion_at_unknown_location_fails() {
        let mut alloc = LocAllocator::new(0);
        let mut cfg = Cfg::empty(&mut alloc);
        let stray = Loc::Id(99);
        assert!(matches!(
            cfg.add_stmt_at(&mut alloc, stray, Stmt::Skip),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn reachable_subgraph_drops_the_rest() {
        let mut alloc = LocAllocator::new(0);
        let (cfg, l1, l2) = counting_loop(&mut alloc);
        let sub = cfg.reachable_subgraph(l2);
        assert_eq!(sub.num_locs(), 3);
        assert!(sub.contains(l1));
        assert!(!sub.contains(Loc::Entry));
        assert_eq!(sub.back_edges().len(), 1);
    }

    #[test]
    fn dot_lists_statements() {
        let mut alloc = LocAllocator::new(0);
        let (cfg, _, _) = counting_loop(&mut alloc);
        let dot = cfg.to_dot();
        assert!(dot.contains("x := x + 1"));
        assert!(dot.contains("label = \"entry\""));
    }
}

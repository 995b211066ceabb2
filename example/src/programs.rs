use dai_engine::ir::bridge::cfg::Cfg;
use dai_engine::ir::bridge::expr::{Binop, Expr};
use dai_engine::ir::bridge::function::Function;
use dai_engine::ir::bridge::loc::{Loc, LocAllocator};
use dai_engine::ir::bridge::shared::Identifier;
use dai_engine::ir::bridge::stmt::{Selector, Stmt};

/// Common trait for demo programs
pub trait DemoProgram {
    /// Obtain the program name
    fn name() -> &'static str;

    /// Build the CFG of `main`
    fn build(alloc: &mut LocAllocator) -> Cfg;
}

fn array_of(len: i64) -> Expr {
    Expr::Array((0..len).map(Expr::int).collect())
}

fn cmp(op: Binop, var: &str, bound: i64) -> Stmt {
    Stmt::Assume(Expr::binop(op, Expr::var(var), Expr::int(bound)))
}

fn increment(var: &str) -> Stmt {
    Stmt::assign(var, Expr::binop(Binop::Plus, Expr::var(var), Expr::int(1)))
}

/// Register `main` over the edges already in `cfg`
fn finish(mut cfg: Cfg, formals: &[&str]) -> Cfg {
    let stmts: Vec<Stmt> = cfg.edges().map(|(_, _, stmt)| stmt.clone()).collect();
    let func = Function::new(
        Identifier::from("main"),
        formals.iter().map(|f| Identifier::from(*f)).collect(),
        Loc::Entry,
        Loc::Exit,
        &stmts,
    );
    cfg.add_fn(func);
    cfg
}

/// `for (i = 0; i <guard> bound; i++) a[i] = i;` over an array of length 5
fn filling_loop(alloc: &mut LocAllocator, guard: Binop, bound: i64) -> Cfg {
    alloc.reset();
    let init = alloc.fresh();
    let head = alloc.fresh();
    let body = alloc.fresh();
    let written = alloc.fresh();

    let mut cfg = Cfg::new();
    cfg.add_edge(Loc::Entry, init, Stmt::assign("a", array_of(5)));
    cfg.add_edge(init, head, Stmt::assign("i", Expr::int(0)));
    cfg.add_edge(head, body, cmp(guard, "i", bound));
    cfg.add_edge(
        body,
        written,
        Stmt::Write {
            rcvr: Expr::var("a"),
            sel: Selector::Index(Expr::var("i")),
            rhs: Expr::var("i"),
        },
    );
    cfg.add_edge(written, head, increment("i"));
    let exit_guard = guard.negate().unwrap_or(Binop::Ge);
    cfg.add_edge(head, Loc::Exit, cmp(exit_guard, "i", bound));
    finish(cfg, &[])
}

/// Fills an array of length 5 within bounds
pub struct SafeLoop;

impl DemoProgram for SafeLoop {
    fn name() -> &'static str {
        "safe-loop"
    }

    fn build(alloc: &mut LocAllocator) -> Cfg {
        filling_loop(alloc, Binop::Lt, 5)
    }
}

/// Fills one slot past the end of an array of length 5
pub struct OffByOne;

impl DemoProgram for OffByOne {
    fn name() -> &'static str {
        "off-by-one"
    }

    fn build(alloc: &mut LocAllocator) -> Cfg {
        filling_loop(alloc, Binop::Le, 5)
    }
}

/// Reads `a[0 - 1]`
pub struct NegativeIndex;

impl DemoProgram for NegativeIndex {
    fn name() -> &'static str {
        "negative-index"
    }

    fn build(alloc: &mut LocAllocator) -> Cfg {
        alloc.reset();
        let l1 = alloc.fresh();
        let l2 = alloc.fresh();

        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, l1, Stmt::assign("a", array_of(3)));
        cfg.add_edge(
            l1,
            l2,
            Stmt::assign("i", Expr::binop(Binop::Minus, Expr::int(0), Expr::int(1))),
        );
        cfg.add_edge(
            l2,
            Loc::Exit,
            Stmt::assign("x", Expr::index(Expr::var("a"), Expr::var("i"))),
        );
        finish(cfg, &[])
    }
}

/// Reads `a[n]` for an unconstrained argument `n`
pub struct UnknownIndex;

impl DemoProgram for UnknownIndex {
    fn name() -> &'static str {
        "unknown-index"
    }

    fn build(alloc: &mut LocAllocator) -> Cfg {
        alloc.reset();
        let l1 = alloc.fresh();

        let mut cfg = Cfg::new();
        cfg.add_edge(Loc::Entry, l1, Stmt::assign("a", array_of(3)));
        cfg.add_edge(
            l1,
            Loc::Exit,
            Stmt::assign("x", Expr::index(Expr::var("a"), Expr::var("n"))),
        );
        finish(cfg, &["n"])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn filling_loops_have_one_head() {
        let mut alloc = LocAllocator::new(0);
        for cfg in [SafeLoop::build(&mut alloc), OffByOne::build(&mut alloc)] {
            assert_eq!(cfg.loop_heads(), BTreeSet::from([Loc::Id(1)]));
            assert_eq!(cfg.num_locs(), 6);
            assert_eq!(cfg.fns()[0].locals().len(), 2);
        }
    }

    #[test]
    fn straight_line_demos() {
        let mut alloc = LocAllocator::new(0);
        let cfg = UnknownIndex::build(&mut alloc);
        assert!(cfg.back_edges().is_empty());
        assert!(cfg.fns()[0].locals().contains(&Identifier::from("x")));
        assert!(!cfg.fns()[0].locals().contains(&Identifier::from("n")));
    }
}

use std::fmt::{Display, Formatter};

use log::debug;
use serde::Serialize;

use dai_engine::analysis::domain::AbstractDomain;
use dai_engine::analysis::interval::{Interval, IntervalState};
use dai_engine::daig::{Daig, Name};
use dai_engine::error::{EngineError, EngineResult};
use dai_engine::ir::bridge::expr::{ArrayAccess, Expr};
use dai_engine::ir::bridge::loc::Loc;
use dai_engine::ir::bridge::stmt::Stmt;

/// Classification of one array dereference
#[derive(Eq, PartialEq, Copy, Clone, Debug, Serialize)]
pub enum Verdict {
    /// always within `[0, length)`
    Safe,
    /// provably negative lower bound, or a lower bound at or past every possible length
    Unsafe,
    /// may or may not be out of bounds
    Unknown,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Unsafe => write!(f, "unsafe"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An array dereference with its verdict
#[derive(Clone, Debug, Serialize)]
pub struct Finding {
    pub src: Loc,
    pub dst: Loc,
    pub access: String,
    pub verdict: Verdict,
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}: {} is {}",
            self.src, self.dst, self.access, self.verdict
        )
    }
}

/// Checks every array dereference against the stable interval facts before it
pub struct BoundsChecker<'a> {
    daig: &'a mut Daig<IntervalState>,
}

impl<'a> BoundsChecker<'a> {
    pub fn new(daig: &'a mut Daig<IntervalState>) -> Self {
        Self { daig }
    }

    pub fn check(self) -> EngineResult<Vec<Finding>> {
        let Self { daig } = self;

        let stmts: Vec<(Name, Stmt)> = daig
            .stmt_refs()
            .map(|(name, stmt)| (name, stmt.clone()))
            .collect();

        let mut findings = vec![];
        for (name, stmt) in stmts {
            let accesses = stmt.array_accesses();
            if accesses.is_empty() {
                continue;
            }
            let (src, dst) = match name {
                Name::Stmt { src, dst, .. } => (src, dst),
                Name::State(_) => {
                    return Err(EngineError::InvariantViolation(format!(
                        "{} is not a statement",
                        name
                    )))
                }
            };
            let pre = daig.state_at(src)?;
            for access in accesses {
                let verdict = classify(&pre, &access);
                debug!("{} in {}: {}", access.idx, name, verdict);
                findings.push(Finding {
                    src,
                    dst,
                    access: format!("{}[{}]", access.rcvr, access.idx),
                    verdict,
                });
            }
        }
        Ok(findings)
    }
}

fn classify(pre: &IntervalState, access: &ArrayAccess<'_>) -> Verdict {
    if pre.is_bot() {
        return Verdict::Safe;
    }
    let Expr::Var(array) = access.rcvr else {
        return Verdict::Unknown;
    };

    let index = pre.eval(access.idx);
    let Some((idx_lo, idx_hi)) = index.bounds() else {
        return Verdict::Safe;
    };
    let length: Interval = pre.get(&format!("{}.length", array));
    let (len_lo, len_hi) = length.bounds().unwrap_or((None, None));

    // a reachable negative index, or one past any possible length
    if idx_lo.map_or(false, |lo| lo < 0) {
        return Verdict::Unsafe;
    }
    if let (Some(lo), Some(len)) = (idx_lo, len_hi) {
        if lo >= len {
            return Verdict::Unsafe;
        }
    }

    match (idx_lo, idx_hi, len_lo) {
        (Some(lo), Some(hi), Some(len)) if lo >= 0 && hi < len => Verdict::Safe,
        _ => Verdict::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::{DemoProgram, NegativeIndex, OffByOne, SafeLoop, UnknownIndex};
    use dai_engine::flow::shared::Context;

    fn verdicts<P: DemoProgram>() -> Vec<Verdict> {
        let mut ctxt = Context::new();
        let cfg = P::build(ctxt.alloc());
        let mut daig = Daig::of_cfg(cfg);
        BoundsChecker::new(&mut daig)
            .check()
            .unwrap()
            .into_iter()
            .map(|f| f.verdict)
            .collect()
    }

    #[test]
    fn demos() {
        assert_eq!(verdicts::<SafeLoop>(), vec![Verdict::Safe]);
        assert_eq!(verdicts::<OffByOne>(), vec![Verdict::Unknown]);
        assert_eq!(verdicts::<NegativeIndex>(), vec![Verdict::Unsafe]);
        assert_eq!(verdicts::<UnknownIndex>(), vec![Verdict::Unknown]);
    }

    fn state(facts: &[(&str, Interval)]) -> IntervalState {
        let mut state = IntervalState::top();
        for (key, value) in facts {
            state.set((*key).into(), value.clone());
        }
        state
    }

    #[test]
    fn classification() {
        let rcvr = Expr::var("a");
        let idx = Expr::var("i");
        let access = ArrayAccess {
            rcvr: &rcvr,
            idx: &idx,
        };
        let len = ("a.length", Interval::constant(4));

        let safe = state(&[len.clone(), ("i", Interval::new(Some(0), Some(3)))]);
        assert_eq!(classify(&safe, &access), Verdict::Safe);

        let past_end = state(&[len.clone(), ("i", Interval::at_least(4))]);
        assert_eq!(classify(&past_end, &access), Verdict::Unsafe);

        let straddling = state(&[len.clone(), ("i", Interval::new(Some(-1), Some(2)))]);
        assert_eq!(classify(&straddling, &access), Verdict::Unsafe);

        let unbounded = state(&[len.clone(), ("i", Interval::at_most(2))]);
        assert_eq!(classify(&unbounded, &access), Verdict::Unknown);

        let no_length = state(&[("i", Interval::constant(0))]);
        assert_eq!(classify(&no_length, &access), Verdict::Unknown);

        assert_eq!(classify(&IntervalState::Bottom, &access), Verdict::Safe);

        let nested = Expr::field(Expr::var("o"), "arr");
        let compound = ArrayAccess {
            rcvr: &nested,
            idx: &idx,
        };
        assert_eq!(classify(&safe, &compound), Verdict::Unknown);
    }
}

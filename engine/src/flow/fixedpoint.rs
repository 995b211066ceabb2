use std::collections::BTreeMap;

use log::debug;

use crate::analysis::domain::AbstractDomain;
use crate::daig::{Daig, Name};
use crate::error::EngineResult;
use crate::ir::bridge::loc::Loc;

/// The states of the targets after one round of demand
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct Snapshot<D> {
    pub states: BTreeMap<Loc, D>,
    /// whether every target is stable
    pub stable: bool,
}

/// Demand a set of locations repeatedly until they are all stable
pub struct FlowFixedpoint<'a, D: AbstractDomain> {
    /// Graph to demand on (carried across rounds)
    daig: &'a mut Daig<D>,
    /// Locations of interest
    targets: Vec<Loc>,
    /// Maximum number of rounds (if set)
    depth: Option<usize>,
}

/// Entrypoints
impl<'a, D: AbstractDomain> FlowFixedpoint<'a, D> {
    pub fn new(daig: &'a mut Daig<D>, targets: Vec<Loc>, depth: Option<usize>) -> Self {
        Self {
            daig,
            targets,
            depth,
        }
    }

    /// Demand on every location of the graph
    pub fn everywhere(daig: &'a mut Daig<D>, depth: Option<usize>) -> Self {
        let targets = daig.cfg().locs().collect();
        Self::new(daig, targets, depth)
    }

    pub fn execute(self) -> EngineResult<Vec<Snapshot<D>>> {
        let Self {
            daig,
            targets,
            depth,
        } = self;

        let mut history: Vec<Snapshot<D>> = vec![];
        loop {
            // limit the number of rounds if requested
            if depth.map_or(false, |limit| history.len() >= limit) {
                debug!("[{}] round limit reached", history.len());
                break;
            }
            let step = history.len() + 1;

            // demand whatever is not final yet
            for loc in &targets {
                let name = Name::State(*loc);
                if !daig.is_stable(&name) {
                    daig.get(&name)?;
                }
            }

            // later demands may refine earlier targets within the round
            let states: BTreeMap<_, _> = targets
                .iter()
                .filter_map(|loc| daig.cached(*loc).map(|state| (*loc, state.clone())))
                .collect();
            let stable = targets.iter().all(|loc| daig.is_stable(&Name::State(*loc)));
            debug!("[{}] {} target(s) demanded, stable: {}", step, targets.len(), stable);

            history.push(Snapshot { states, stable });
            if stable {
                break;
            }
        }
        debug!("[{}] fixedpoint demand done", history.len());

        // return the full trace
        Ok(history)
    }
}

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{EngineError, EngineResult, Unsupported};
use crate::ir::adapter;
use crate::ir::bridge::cfg::Cfg;
use crate::ir::bridge::function::Function;
use crate::ir::bridge::loc::{Loc, LocAllocator};
use crate::ir::bridge::shared::Identifier;

/// A validated program: one CFG holding every function
pub struct Program {
    cfg: Cfg,
    /// label to location
    labels: BTreeMap<String, Loc>,
}

impl Program {
    pub fn convert(
        program: &adapter::program::Program,
        alloc: &mut LocAllocator,
    ) -> EngineResult<Self> {
        let adapter::program::Program { functions } = program;
        if functions.is_empty() {
            return Err(EngineError::InvalidProgram(
                "program without functions".to_string(),
            ));
        }

        // locations are only unique within one analysis
        alloc.reset();
        let mut labels = BTreeMap::new();
        labels.insert("entry".to_string(), Loc::Entry);
        labels.insert("exit".to_string(), Loc::Exit);

        let mut cfg = Cfg::new();
        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        let mut names = BTreeSet::new();
        let mut exits = BTreeSet::new();

        for func in functions {
            let adapter::program::Function {
                name,
                formals,
                entry,
                exit,
                edges,
            } = func;

            if !names.insert(name.as_str()) {
                return Err(EngineError::InvalidProgram(format!(
                    "duplicated function {}",
                    name
                )));
            }
            if entry == exit {
                return Err(EngineError::InvalidProgram(format!(
                    "function {} enters and exits at {}",
                    name, entry
                )));
            }

            // every label belongs to exactly one function
            let mentioned = [entry, exit]
                .into_iter()
                .chain(edges.iter().flat_map(|e| [&e.src, &e.dst]));
            for label in mentioned {
                if label.is_empty() {
                    return Err(EngineError::InvalidProgram(format!(
                        "empty location label in function {}",
                        name
                    )));
                }
                match owners.get(label.as_str()) {
                    Some(owner) if *owner != name.as_str() => {
                        return Err(EngineError::NotSupportedYet(
                            Unsupported::InterproceduralEdge,
                        ));
                    }
                    Some(_) => (),
                    None => {
                        owners.insert(label.as_str(), name.as_str());
                        labels
                            .entry(label.clone())
                            .or_insert_with(|| alloc.fresh());
                    }
                }
            }

            let loc_of = |label: &String| {
                labels.get(label).copied().ok_or_else(|| {
                    EngineError::InvariantViolation(format!("label {} is not allocated", label))
                })
            };
            let entry_loc = loc_of(entry)?;
            let exit_loc = loc_of(exit)?;
            for edge in edges {
                cfg.add_edge(loc_of(&edge.src)?, loc_of(&edge.dst)?, edge.stmt.clone());
            }
            exits.insert(exit_loc);

            let func = Function::new(
                Identifier::from(name),
                formals.iter().map(Identifier::from).collect(),
                entry_loc,
                exit_loc,
                edges.iter().map(|e| &e.stmt),
            );
            debug!(
                "function {} converted with {} local(s)",
                func.name(),
                func.locals().len()
            );
            cfg.add_fn(func);
        }

        // only exits may be dead ends
        for loc in cfg.locs() {
            if !loc.is_sentinel() && !exits.contains(&loc) && cfg.successors(loc).is_empty() {
                let label = labels
                    .iter()
                    .find(|(_, l)| **l == loc)
                    .map_or_else(|| loc.to_string(), |(k, _)| k.clone());
                return Err(EngineError::InvalidProgram(format!(
                    "location {} has no successor",
                    label
                )));
            }
        }

        Ok(Self { cfg, labels })
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn into_cfg(self) -> Cfg {
        self.cfg
    }

    pub fn loc_of(&self, label: &str) -> Option<Loc> {
        self.labels.get(label).copied()
    }

    pub fn label_of(&self, loc: Loc) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, l)| **l == loc)
            .map(|(label, _)| label.as_str())
    }

    /// Labels with their locations, in label order
    pub fn labels(&self) -> impl Iterator<Item = (&str, Loc)> + '_ {
        self.labels.iter().map(|(label, loc)| (label.as_str(), *loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(content: &str) -> EngineResult<Program> {
        let adapted: adapter::program::Program = serde_json::from_str(content).unwrap();
        let mut alloc = LocAllocator::new(0);
        Program::convert(&adapted, &mut alloc)
    }

    #[test]
    fn labels_become_locations() {
        let program = convert(
            r#"{"functions": [{
                "name": "main",
                "formals": ["n"],
                "edges": [
                    {"src": "entry", "dst": "head", "stmt": {"Assign": {"lhs": "i", "rhs": {"Lit": {"Int": 0}}}}},
                    {"src": "head", "dst": "exit", "stmt": "Skip"}
                ]
            }]}"#,
        )
        .unwrap();
        assert_eq!(program.loc_of("entry"), Some(Loc::Entry));
        assert_eq!(program.loc_of("head"), Some(Loc::Id(0)));
        assert_eq!(program.label_of(Loc::Id(0)), Some("head"));
        let func = &program.cfg().fns()[0];
        assert_eq!(func.name().as_ref(), "main");
        assert!(func.locals().contains(&Identifier::from("i")));
        assert_eq!(program.cfg().num_edges(), 2);
    }

    #[test]
    fn functions_cannot_share_locations() {
        let result = convert(
            r#"{"functions": [
                {"name": "f", "entry": "f0", "exit": "f1", "edges": [{"src": "f0", "dst": "f1", "stmt": "Skip"}]},
                {"name": "g", "entry": "g0", "exit": "g1", "edges": [{"src": "g0", "dst": "f1", "stmt": "Skip"}]}
            ]}"#,
        );
        assert!(matches!(
            result,
            Err(EngineError::NotSupportedYet(Unsupported::InterproceduralEdge))
        ));
    }

    #[test]
    fn malformed_programs_are_rejected() {
        let dead_end = convert(
            r#"{"functions": [{"name": "main", "edges": [
                {"src": "entry", "dst": "stuck", "stmt": "Skip"}
            ]}]}"#,
        );
        assert!(matches!(dead_end, Err(EngineError::InvalidProgram(_))));

        let duplicated = convert(
            r#"{"functions": [
                {"name": "f", "entry": "a", "exit": "b", "edges": [{"src": "a", "dst": "b", "stmt": "Skip"}]},
                {"name": "f", "entry": "c", "exit": "d", "edges": [{"src": "c", "dst": "d", "stmt": "Skip"}]}
            ]}"#,
        );
        assert!(matches!(duplicated, Err(EngineError::InvalidProgram(_))));

        assert!(matches!(
            convert(r#"{"functions": []}"#),
            Err(EngineError::InvalidProgram(_))
        ));
    }
}

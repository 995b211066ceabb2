use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::analysis::interval::IntervalState;
use crate::daig::Daig;
use crate::error::{EngineError, EngineResult};
use crate::flow::fixedpoint::{FlowFixedpoint, Snapshot};
use crate::flow::shared::Context;
use crate::ir::bridge::loc::Loc;
use crate::ir::bridge::program::Program;

pub mod fixedpoint;
pub mod shared;

/// Analyze a program file with intervals
pub struct Workflow {
    /// Program file
    input: PathBuf,
    /// Labels to demand on (everywhere if empty)
    focus: Vec<String>,
    /// Maximum number of demand rounds
    depth: Option<usize>,
}

/// What a workflow leaves behind
pub struct Report {
    pub program: Program,
    pub daig: Daig<IntervalState>,
    pub trace: Vec<Snapshot<IntervalState>>,
}

impl Workflow {
    pub fn new(input: PathBuf, depth: Option<usize>) -> Self {
        Self {
            input,
            focus: vec![],
            depth,
        }
    }

    /// Only demand the state at this label
    pub fn focus(mut self, label: String) -> Self {
        self.focus.push(label);
        self
    }

    pub fn execute(self, ctxt: &mut Context) -> EngineResult<Report> {
        let Self {
            input,
            focus,
            depth,
        } = self;

        // loading
        let program = ctxt.load(&input)?;
        let mut daig = Daig::of_cfg(program.cfg().clone());
        debug!("[0] program loaded");

        // targets
        let targets = if focus.is_empty() {
            program.cfg().locs().collect()
        } else {
            focus
                .iter()
                .map(|label| {
                    program.loc_of(label).ok_or_else(|| {
                        EngineError::InvalidProgram(format!("no location labelled {}", label))
                    })
                })
                .collect::<EngineResult<Vec<_>>>()?
        };

        // demand
        let trace = FlowFixedpoint::new(&mut daig, targets, depth).execute()?;
        if !trace.last().map_or(false, |s| s.stable) {
            warn!("demand stopped after {} round(s) before stabilizing", trace.len());
        }

        Ok(Report {
            program,
            daig,
            trace,
        })
    }
}

impl Report {
    pub fn is_stable(&self) -> bool {
        self.trace.last().map_or(false, |s| s.stable)
    }

    /// The last known states, keyed by label
    pub fn states(&self) -> BTreeMap<String, IntervalState> {
        let Some(last) = self.trace.last() else {
            return BTreeMap::new();
        };
        last.states
            .iter()
            .map(|(loc, state)| (self.describe(*loc), state.clone()))
            .collect()
    }

    fn describe(&self, loc: Loc) -> String {
        self.program
            .label_of(loc)
            .map_or_else(|| loc.to_string(), |label| label.to_string())
    }

    /// Dump both graphs in the dot format into `output`
    pub fn dump_dot(&self, output: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(output)?;
        let path_cfg = output.join("cfg.dot");
        fs::write(&path_cfg, self.daig.cfg().to_dot())?;
        let path_daig = output.join("daig.dot");
        fs::write(&path_daig, self.daig.to_dot())?;
        Ok((path_cfg, path_daig))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::analysis::interval::Interval;

    const PROGRAM: &str = r#"{"functions": [{"name": "main", "edges": [
        {"src": "entry", "dst": "head", "stmt": {"Assign": {"lhs": "i", "rhs": {"Lit": {"Int": 0}}}}},
        {"src": "head", "dst": "body", "stmt": {"Assume": {"Binop": {"op": "Lt", "lhs": {"Var": "i"}, "rhs": {"Lit": {"Int": 3}}}}}},
        {"src": "body", "dst": "head", "stmt": {"Assign": {"lhs": "i", "rhs": {"Binop": {"op": "Plus", "lhs": {"Var": "i"}, "rhs": {"Lit": {"Int": 1}}}}}}},
        {"src": "head", "dst": "exit", "stmt": {"Assume": {"Binop": {"op": "Ge", "lhs": {"Var": "i"}, "rhs": {"Lit": {"Int": 3}}}}}}
    ]}]}"#;

    #[test]
    fn focused_workflow() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("program.json");
        fs::write(&input, PROGRAM).unwrap();

        let mut ctxt = Context::new();
        let report = Workflow::new(input, None)
            .focus("exit".to_string())
            .execute(&mut ctxt)
            .unwrap();
        assert!(report.is_stable());
        let states = report.states();
        assert_eq!(states.len(), 1);
        assert_eq!(states["exit"].get("i"), Interval::at_least(3));

        let output = temp.path().join("graphs");
        let (path_cfg, path_daig) = report.dump_dot(&output).unwrap();
        assert!(fs::read_to_string(path_cfg).unwrap().starts_with("digraph"));
        assert!(fs::read_to_string(path_daig).unwrap().contains("i -> [0, +oo]"));
    }

    #[test]
    fn unknown_focus_is_rejected() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("program.json");
        fs::write(&input, PROGRAM).unwrap();

        let mut ctxt = Context::new();
        let result = Workflow::new(input, None)
            .focus("nowhere".to_string())
            .execute(&mut ctxt);
        assert!(matches!(result, Err(EngineError::InvalidProgram(_))));
    }
}

use std::path::PathBuf;

pub use error::EngineError;

use crate::error::EngineResult;
use crate::flow::shared::Context;
use crate::flow::{Report, Workflow};

pub mod analysis;
pub mod daig;
pub mod error;
pub mod flow;
pub mod graph;
pub mod ir;

/// Main entrypoint
pub fn analyze(input: PathBuf, depth: Option<usize>) -> EngineResult<Report> {
    let mut ctxt = Context::new();
    Workflow::new(input, depth).execute(&mut ctxt)
}

use std::fs;
use std::path::Path;

use log::debug;

use dai_shared::config::DEFAULT_SEED;

use crate::error::{EngineError, EngineResult};
use crate::ir::bridge::loc::LocAllocator;
use crate::ir::{adapter, bridge};

/// Context for all workflows
pub struct Context {
    /// Allocator of locations, shared by everything built in this context
    alloc: LocAllocator,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_seed(*DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            alloc: LocAllocator::new(seed),
        }
    }

    pub fn alloc(&mut self) -> &mut LocAllocator {
        &mut self.alloc
    }

    /// Deserialize a program from its JSON representation
    pub fn parse(&mut self, content: &str) -> EngineResult<bridge::program::Program> {
        let program_adapted: adapter::program::Program =
            serde_json::from_str(content).map_err(|e| {
                EngineError::ProgramLoadingError(format!("Error during deserialization: {}", e))
            })?;
        bridge::program::Program::convert(&program_adapted, &mut self.alloc)
    }

    /// Load a program from a JSON file
    pub fn load(&mut self, input: &Path) -> EngineResult<bridge::program::Program> {
        let content = fs::read_to_string(input).map_err(|e| {
            EngineError::ProgramLoadingError(format!(
                "unable to read {}: {}",
                input.display(),
                e
            ))
        })?;
        let program = self.parse(&content)?;
        debug!(
            "program loaded from {}: {} location(s)",
            input.display(),
            program.cfg().num_locs()
        );
        Ok(program)
    }
}

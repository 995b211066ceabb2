use std::error::Error;
use std::fmt::{Display, Formatter};

/// A list of program shapes not supported
#[derive(Debug, Clone)]
pub enum Unsupported {
    InterproceduralEdge,
}

impl Display for Unsupported {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InterproceduralEdge => {
                write!(f, "control flow between functions")
            }
        }
    }
}

/// A custom error message for the analysis engine
#[derive(Debug, Clone)]
pub enum EngineError {
    /// Error during the loading of a serialized program
    ProgramLoadingError(String),
    /// The program is not well-formed
    InvalidProgram(String),
    /// A persisted abstract state cannot be decoded
    CorruptedState(String),
    /// Operation not supported yet
    NotSupportedYet(Unsupported),
    /// Invariant violation
    InvariantViolation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProgramLoadingError(msg) => {
                write!(f, "[dai::loading] {}", msg)
            }
            Self::InvalidProgram(msg) => {
                write!(f, "[dai::program] {}", msg)
            }
            Self::CorruptedState(msg) => {
                write!(f, "[dai::state] {}", msg)
            }
            Self::NotSupportedYet(item) => {
                write!(f, "[dai::unsupported] {}", item)
            }
            Self::InvariantViolation(msg) => {
                write!(f, "[dai::invariant] {}", msg)
            }
        }
    }
}

impl Error for EngineError {}

use serde::{Deserialize, Serialize};

use crate::ir::bridge::stmt::Stmt;

/// A serialized program
#[derive(Serialize, Deserialize)]
pub struct Program {
    /// function definitions
    pub functions: Vec<Function>,
}

/// A serialized function, locations are named by labels
#[derive(Serialize, Deserialize)]
pub struct Function {
    /// name of the function
    pub name: String,
    /// formal parameters
    #[serde(default)]
    pub formals: Vec<String>,
    /// label of the entry location
    #[serde(default = "default_entry")]
    pub entry: String,
    /// label of the exit location
    #[serde(default = "default_exit")]
    pub exit: String,
    /// body of the function
    pub edges: Vec<Edge>,
}

/// A statement between two labelled locations
#[derive(Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub stmt: Stmt,
}

fn default_entry() -> String {
    "entry".to_string()
}

fn default_exit() -> String {
    "exit".to_string()
}

pub mod cfg;
pub mod expr;
pub mod function;
pub mod loc;
pub mod program;
pub mod shared;
pub mod stmt;

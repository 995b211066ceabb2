//
// Abstract domains and the values they carry
//
pub mod domain;
pub mod interval;
pub mod persist;

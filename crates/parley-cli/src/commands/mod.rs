//! Command implementations

pub mod eval;

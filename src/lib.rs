//! Parley
//!
//! Multi-task evaluation engine for conversational models. This package
//! re-exports the [`parley_eval`] library; the `parley` binary lives in the
//! `parley-cli` crate.

pub use parley_eval::*;

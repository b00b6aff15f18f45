// src/state/mod.rs

//! Persistent builder state.
//!
//! - [`unit_info`] holds the per-unit record (version, signature, global flag).
//! - [`builder_state`] is the root aggregate: the unit records, the dependency
//!   graph they are indexed by, and the diff against a prior state.

pub mod builder_state;
pub mod unit_info;

pub use builder_state::{BuilderState, StateDelta};
pub use unit_info::UnitInfo;

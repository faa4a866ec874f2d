//! State module for tracking the progress of units of work
//!
//! `UnitState` models the retry lifecycle of one catalog or listing fetch.

mod unit_state;

pub use unit_state::UnitState;

//! Batch apply engine - plan display and execution with UI integration

pub mod differ;
pub mod executor;

pub use executor::{ApplyOptions, apply, plan};

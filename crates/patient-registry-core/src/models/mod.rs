//! Domain models for the patient registry.

mod ids;
mod patient;

pub use ids::*;
pub use patient::*;

//! Export functionality for the patient roster.

mod patients;

pub use patients::*;

//! Patient Registry Core Library
//!
//! Registration-side logic for a hospital patient registry whose roster lives
//! in an external Patient Directory Service.
//!
//! # Architecture
//!
//! ```text
//!                  Registration form
//!                         │
//!              ┌──────────▼──────────┐
//!              │      Allocator      │  IP<date>-<rand>, SN<date>-<seq>
//!              └───┬─────────────┬───┘
//!        today-count│             │on failure
//!                   ▼             ▼
//!        Patient Directory   Fallback counter
//!            (HTTP)          (SQLite, per device)
//!                   ▲
//!                   │ register / list / delete
//!        ┌──────────┴──────────┐
//!        │ Roster filter/export│
//!        └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`]: Identifiers (DateKey, IpNumber, SerialNumber) and patient records
//! - [`allocator`]: Identifier allocation with clock and counter-store seams
//! - [`db`]: SQLite store for device-local state
//! - [`directory`]: Async seam to the Patient Directory Service
//! - [`registration`]: Submit/commit/conflict workflow for one form
//! - [`roster`]: Roster filtering and summary
//! - [`export`]: CSV and JSON roster export

pub mod allocator;
pub mod db;
pub mod directory;
pub mod export;
pub mod models;
pub mod registration;
pub mod roster;

// Re-export commonly used types
pub use allocator::{
    Allocation, Allocator, Clock, CounterStore, FallbackCounter, FixedClock, MemoryCounterStore,
    SerialSource, SystemClock,
};
pub use db::Database;
pub use directory::{DirectoryError, DirectoryResult, PatientDirectory};
pub use models::{
    DateKey, IpNumber, PatientDetails, PatientRecord, RegistrationRequest, SerialNumber,
    ServiceReply,
};
pub use registration::{Registered, RegistrationError, RegistrationSession};
pub use roster::{RosterFilter, RosterSummary};

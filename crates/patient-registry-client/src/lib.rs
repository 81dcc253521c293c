//! HTTP client for the Patient Directory Service.
//!
//! This crate provides the network side of the patient registry: a reqwest
//! implementation of [`patient_registry_core::PatientDirectory`] and the
//! configuration used by the `patient-registry` command-line front-end.

pub mod config;
pub mod http;

pub use config::{ClientConfig, ConfigError, ConfigLayer};
pub use http::HttpDirectory;

//! Seam to the external Patient Directory Service.
//!
//! The service owns the patient roster; this crate only reads the daily
//! registration count, submits registrations and passes roster reads and
//! deletions through. Transport lives in `patient-registry-client`.

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PatientRecord, RegistrationRequest, ServiceReply};

/// Directory service errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Could not reach the service at all
    #[error("Directory service unreachable: {0}")]
    Transport(String),

    /// Non-success HTTP status, with the server's `message` if it sent one
    #[error("Directory service returned HTTP {status}")]
    Status { status: u16, message: Option<String> },

    /// Response body missing fields or not the expected shape
    #[error("Malformed directory response: {0}")]
    Malformed(String),

    /// The service answered `success: false`
    #[error("Directory service rejected request: {0}")]
    Rejected(String),

    /// Patient id that cannot name a single record
    #[error("Invalid patient id: {0:?}")]
    InvalidId(String),
}

impl DirectoryError {
    /// Message supplied by the service itself, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            DirectoryError::Status { message, .. } => message.as_deref(),
            DirectoryError::Rejected(message) => Some(message),
            _ => None,
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Operations consumed from the Patient Directory Service.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// `GET /patients/today-count`: registrations already recorded today.
    async fn today_count(&self) -> DirectoryResult<u32>;

    /// `POST /patients/register`.
    async fn register(&self, request: &RegistrationRequest) -> DirectoryResult<ServiceReply>;

    /// `GET /patients`.
    async fn list_patients(&self) -> DirectoryResult<Vec<PatientRecord>>;

    /// `DELETE /patients/{id}`.
    async fn delete_patient(&self, id: &str) -> DirectoryResult<()>;

    /// `GET /health`; any failure counts as down.
    async fn health(&self) -> bool;
}

#[async_trait]
impl<T: PatientDirectory + ?Sized> PatientDirectory for &T {
    async fn today_count(&self) -> DirectoryResult<u32> {
        (**self).today_count().await
    }

    async fn register(&self, request: &RegistrationRequest) -> DirectoryResult<ServiceReply> {
        (**self).register(request).await
    }

    async fn list_patients(&self) -> DirectoryResult<Vec<PatientRecord>> {
        (**self).list_patients().await
    }

    async fn delete_patient(&self, id: &str) -> DirectoryResult<()> {
        (**self).delete_patient(id).await
    }

    async fn health(&self) -> bool {
        (**self).health().await
    }
}

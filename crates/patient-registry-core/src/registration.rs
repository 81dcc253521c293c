//! Registration workflow around one pre-filled form.
//!
//! A session holds the identifiers currently shown on the form. Submitting
//! takes `&mut self`, so a second allocation or commit cannot interleave with
//! an in-flight submission for the same form.

use thiserror::Error;
use tracing::{info, warn};

use crate::allocator::{Allocation, Allocator, Clock, CounterStore, FallbackCounter, SerialSource};
use crate::directory::{DirectoryError, PatientDirectory};
use crate::models::{IpNumber, PatientDetails, RegistrationRequest, SerialNumber, ValidationError};

/// Message used when the service rejects without saying why.
pub const DEFAULT_REJECTION: &str = "Failed to register patient";

/// Registration errors.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The serial number was already taken; the form now holds a fresh pair.
    #[error("Serial number conflict. Please try registering again.")]
    SerialConflict {
        rejected: SerialNumber,
        message: String,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("Failed to register patient. Please try again.")]
    Failed(#[source] DirectoryError),
}

impl RegistrationError {
    /// Whether resubmitting the same details may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistrationError::SerialConflict { .. } | RegistrationError::Failed(_)
        )
    }
}

/// A registration the directory service confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct Registered {
    pub ip_number: IpNumber,
    pub serial_number: SerialNumber,
    pub source: SerialSource,
    /// Fallback counter after the commit, `None` if it could not be saved
    pub counter: Option<FallbackCounter>,
    pub message: Option<String>,
    /// Pair now pre-filled for the next patient
    pub next: Allocation,
}

/// One registration form and the identifiers pre-filled into it.
pub struct RegistrationSession<D, S, C> {
    allocator: Allocator<D, S, C>,
    current: Allocation,
}

impl<D, S, C> RegistrationSession<D, S, C>
where
    D: PatientDirectory,
    S: CounterStore,
    C: Clock,
{
    /// Open a form, allocating its first identifier pair.
    pub async fn open(allocator: Allocator<D, S, C>) -> Self {
        let current = allocator.allocate().await;
        Self { allocator, current }
    }

    /// Identifiers currently on the form.
    pub fn current(&self) -> &Allocation {
        &self.current
    }

    pub fn allocator(&self) -> &Allocator<D, S, C> {
        &self.allocator
    }

    /// Re-allocate the form's identifiers without submitting.
    pub async fn refresh(&mut self) -> &Allocation {
        self.current = self.allocator.allocate().await;
        &self.current
    }

    /// Submit the form with the given patient details.
    ///
    /// On success the fallback counter is advanced and the form is re-filled
    /// for the next patient. On a serial-number conflict the form is re-filled
    /// and the counter is left alone.
    pub async fn submit(&mut self, details: &PatientDetails) -> Result<Registered, RegistrationError> {
        let request = RegistrationRequest::new(
            self.current.ip_number,
            self.current.serial_number,
            details,
        )?;

        let reply = match self.allocator.directory().register(&request).await {
            Ok(reply) => reply,
            Err(err) => return Err(self.classify_failure(err).await),
        };

        if !reply.success {
            let message = reply
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
            return Err(self.classify_failure(DirectoryError::Rejected(message)).await);
        }

        let counter = match self.allocator.commit(self.allocator.today()) {
            Ok(counter) => Some(counter),
            Err(e) => {
                warn!(error = %e, "Registration confirmed but fallback counter was not saved");
                None
            }
        };

        let next = self.allocator.allocate().await;
        let used = std::mem::replace(&mut self.current, next);

        info!(
            ip_number = %used.ip_number,
            serial_number = %used.serial_number,
            source = ?used.source,
            "Patient registered"
        );

        Ok(Registered {
            ip_number: used.ip_number,
            serial_number: used.serial_number,
            source: used.source,
            counter,
            message: reply.message,
            next: self.current,
        })
    }

    async fn classify_failure(&mut self, err: DirectoryError) -> RegistrationError {
        match err.server_message().map(str::to_string) {
            Some(message) if cites_serial_number(&message) => {
                let rejected = self.current.serial_number;
                self.refresh().await;
                warn!(
                    rejected = %rejected,
                    replacement = %self.current.serial_number,
                    "Serial number conflict, form re-allocated"
                );
                RegistrationError::SerialConflict { rejected, message }
            }
            Some(message) => RegistrationError::Rejected(message),
            None => {
                warn!(error = %err, "Registration request failed");
                RegistrationError::Failed(err)
            }
        }
    }
}

/// Whether a service message is about the serial number.
pub fn cites_serial_number(message: &str) -> bool {
    message.to_lowercase().contains("serial number")
}

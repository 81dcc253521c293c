//! Patient models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::{IpNumber, SerialNumber};

/// Oldest age the registration form accepts.
pub const MAX_AGE: u32 = 120;

/// Length of a valid phone number (digits only).
pub const PHONE_DIGITS: usize = 10;

/// Local validation failures, reported before anything is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all required fields (missing: {})", .0.join(", "))]
    MissingRequiredFields(Vec<&'static str>),

    #[error("Age must be between 0 and 120, got {0}")]
    AgeOutOfRange(u32),

    #[error("Phone number must be exactly 10 digits: {0}")]
    InvalidPhoneNumber(String),
}

/// Details typed in by registration staff.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    /// Full name (required)
    pub patient_name: String,
    /// Age in years (required)
    pub age: Option<u32>,
    /// Place of residence (required)
    pub place: String,
    /// Phone number, 10 digits when given
    pub phone_number: Option<String>,
    /// Free-form referral information
    pub referral: Option<String>,
}

impl PatientDetails {
    /// Create details with the required fields filled in.
    pub fn new(patient_name: impl Into<String>, age: u32, place: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            age: Some(age),
            place: place.into(),
            phone_number: None,
            referral: None,
        }
    }

    /// Check required fields and field formats.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.patient_name.trim().is_empty() {
            missing.push("patientName");
        }
        if self.age.is_none() {
            missing.push("age");
        }
        if self.place.trim().is_empty() {
            missing.push("place");
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequiredFields(missing));
        }

        if let Some(age) = self.age.filter(|age| *age > MAX_AGE) {
            return Err(ValidationError::AgeOutOfRange(age));
        }

        // Same normalization the request body gets
        if let Some(phone) = non_empty(self.phone_number.as_deref()) {
            let valid = phone.len() == PHONE_DIGITS && phone.bytes().all(|b| b.is_ascii_digit());
            if !valid {
                return Err(ValidationError::InvalidPhoneNumber(phone));
            }
        }

        Ok(())
    }
}

/// Body of `POST /patients/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub ip_number: IpNumber,
    pub serial_number: SerialNumber,
    pub patient_name: String,
    pub age: u32,
    pub place: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
}

impl RegistrationRequest {
    /// Build a request from generated identifiers and validated details.
    pub fn new(
        ip_number: IpNumber,
        serial_number: SerialNumber,
        details: &PatientDetails,
    ) -> Result<Self, ValidationError> {
        details.validate()?;
        let age = details
            .age
            .ok_or_else(|| ValidationError::MissingRequiredFields(vec!["age"]))?;

        Ok(Self {
            ip_number,
            serial_number,
            patient_name: details.patient_name.trim().to_string(),
            age,
            place: details.place.trim().to_string(),
            phone_number: non_empty(details.phone_number.as_deref()),
            referral: non_empty(details.referral.as_deref()),
        })
    }
}

/// Reply to a registration or deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A patient as listed by the directory service.
///
/// Everything except the id is optional; older records are missing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub ip_number: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub age: Option<String>,
    #[serde(default)]
    pub place: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub registration_date: Option<DateTime<Utc>>,
}

impl PatientRecord {
    /// Phone number with braces and any non-digit, non-`+` characters removed.
    pub fn clean_phone_number(&self) -> Option<String> {
        self.phone_number
            .as_deref()
            .map(clean_phone_number)
            .filter(|p| !p.is_empty())
    }
}

/// Strip everything but digits and `+` from a stored phone number.
pub fn clean_phone_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

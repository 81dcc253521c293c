//! Registration identifiers: date keys, IP numbers and serial numbers.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier parse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid date key: {0}")]
    InvalidDateKey(String),

    #[error("Invalid IP number: {0}")]
    InvalidIpNumber(String),

    #[error("Invalid serial number: {0}")]
    InvalidSerialNumber(String),
}

/// Calendar date rendered as `YYYYMMDD`.
///
/// Scopes both the generated identifiers and the device-local fallback counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdentifierError::InvalidDateKey(s.to_string());

        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: i32 = s[0..4].parse().map_err(|_| invalid())?;
        let month: u32 = s[4..6].parse().map_err(|_| invalid())?;
        let day: u32 = s[6..8].parse().map_err(|_| invalid())?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(invalid)
    }
}

/// Display identifier assigned to a new patient: `IP<DateKey>-<3 digits>`.
///
/// The suffix is random, so two registrations on the same day may share an
/// IP number. Nothing here tries to prevent that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNumber {
    date: DateKey,
    suffix: u16,
}

impl IpNumber {
    /// Largest suffix that fits in three digits.
    pub const MAX_SUFFIX: u16 = 999;

    /// Build an IP number; the suffix is wrapped into `0..=999`.
    pub fn new(date: DateKey, suffix: u16) -> Self {
        Self {
            date,
            suffix: suffix % (Self::MAX_SUFFIX + 1),
        }
    }

    pub fn date(&self) -> DateKey {
        self.date
    }

    pub fn suffix(&self) -> u16 {
        self.suffix
    }
}

impl fmt::Display for IpNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IP{}-{:03}", self.date, self.suffix)
    }
}

impl FromStr for IpNumber {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdentifierError::InvalidIpNumber(s.to_string());

        let (date, suffix) = split_identifier(s, "IP").ok_or_else(invalid)?;
        if suffix.len() != 3 {
            return Err(invalid());
        }

        Ok(Self {
            date: date.parse().map_err(|_| invalid())?,
            suffix: suffix.parse().map_err(|_| invalid())?,
        })
    }
}

/// Daily sequential identifier: `SN<DateKey>-<sequence>`.
///
/// The sequence is 1-based and zero-padded to at least three digits.
/// Parsing accepts only that canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber {
    date: DateKey,
    sequence: u32,
}

impl SerialNumber {
    pub fn new(date: DateKey, sequence: u32) -> Self {
        Self { date, sequence }
    }

    pub fn date(&self) -> DateKey {
        self.date
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SN{}-{:03}", self.date, self.sequence)
    }
}

impl FromStr for SerialNumber {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdentifierError::InvalidSerialNumber(s.to_string());

        let (date, digits) = split_identifier(s, "SN").ok_or_else(invalid)?;
        let sequence: u32 = digits.parse().map_err(|_| invalid())?;

        // Sequences start at 1 and only the canonical padding is accepted
        if sequence == 0 || format!("{:03}", sequence) != digits {
            return Err(invalid());
        }

        Ok(Self {
            date: date.parse().map_err(|_| invalid())?,
            sequence,
        })
    }
}

/// Split `<prefix><8 digits>-<digits>` into its date and numeric parts.
fn split_identifier<'a>(s: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = s.strip_prefix(prefix)?;
    let (date, number) = rest.split_once('-')?;
    if date.len() != 8 || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((date, number))
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(DateKey);
string_serde!(IpNumber);
string_serde!(SerialNumber);

#[cfg(test)]
mod tests {
    use super::*;

    fn may_first() -> DateKey {
        DateKey::from_date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn test_date_key_format() {
        assert_eq!(may_first().to_string(), "20240501");
    }

    #[test]
    fn test_date_key_parse() {
        assert_eq!("20240501".parse::<DateKey>().unwrap(), may_first());
        assert!("2024051".parse::<DateKey>().is_err());
        assert!("20241301".parse::<DateKey>().is_err());
        assert!("2024-5-1".parse::<DateKey>().is_err());
        assert!("".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_ip_number_padding() {
        let ip = IpNumber::new(may_first(), 7);
        assert_eq!(ip.to_string(), "IP20240501-007");

        let wrapped = IpNumber::new(may_first(), 1_007);
        assert_eq!(wrapped.suffix(), 7);
    }

    #[test]
    fn test_ip_number_parse() {
        let ip: IpNumber = "IP20240501-042".parse().unwrap();
        assert_eq!(ip.suffix(), 42);
        assert_eq!(ip.date(), may_first());

        assert!("IP20240501-42".parse::<IpNumber>().is_err());
        assert!("IP20240501-1000".parse::<IpNumber>().is_err());
        assert!("SN20240501-042".parse::<IpNumber>().is_err());
    }

    #[test]
    fn test_serial_number_padding() {
        assert_eq!(SerialNumber::new(may_first(), 1).to_string(), "SN20240501-001");
        assert_eq!(SerialNumber::new(may_first(), 42).to_string(), "SN20240501-042");
        // Past 999 the sequence simply widens
        assert_eq!(
            SerialNumber::new(may_first(), 1_000).to_string(),
            "SN20240501-1000"
        );
    }

    #[test]
    fn test_serial_number_parse() {
        let serial: SerialNumber = "SN20240501-006".parse().unwrap();
        assert_eq!(serial.sequence(), 6);
        assert_eq!(serial.date(), may_first());

        assert!("SN20240501-06".parse::<SerialNumber>().is_err());
        assert!("SN20240501-".parse::<SerialNumber>().is_err());
        assert!("SN20240501006".parse::<SerialNumber>().is_err());

        let wide: SerialNumber = "SN20240501-1000".parse().unwrap();
        assert_eq!(wide.sequence(), 1_000);
    }

    #[test]
    fn test_serial_number_parse_is_canonical() {
        assert!("SN20240501-000".parse::<SerialNumber>().is_err());
        assert!("SN20240501-0000".parse::<SerialNumber>().is_err());
        assert!("SN20240501-0006".parse::<SerialNumber>().is_err());

        for text in ["SN20240501-001", "SN20240501-999", "SN20240501-12345"] {
            let serial: SerialNumber = text.parse().unwrap();
            assert_eq!(serial.to_string(), text);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let serial = SerialNumber::new(may_first(), 3);
        let json = serde_json::to_string(&serial).unwrap();
        assert_eq!(json, "\"SN20240501-003\"");

        let back: SerialNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, serial);

        assert!(serde_json::from_str::<IpNumber>("\"nope\"").is_err());
    }
}

//! Roster filtering and summary over patients listed by the directory.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

/// Narrowing filters over the roster. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterFilter {
    pub ip_number: Option<String>,
    pub patient_name: Option<String>,
    pub serial_number: Option<String>,
    pub place: Option<String>,
    pub phone_number: Option<String>,
    /// Registered on or after this local date
    pub start_date: Option<NaiveDate>,
    /// Registered on or before this local date
    pub end_date: Option<NaiveDate>,
}

impl RosterFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the filter using the machine's local time zone.
    pub fn apply<'a>(&self, records: &'a [PatientRecord]) -> Vec<&'a PatientRecord> {
        self.apply_in(records, &Local)
    }

    /// Apply the filter, judging registration dates in `tz`.
    pub fn apply_in<'a, Tz: TimeZone>(
        &self,
        records: &'a [PatientRecord],
        tz: &Tz,
    ) -> Vec<&'a PatientRecord> {
        records.iter().filter(|r| self.matches(r, tz)).collect()
    }

    fn matches<Tz: TimeZone>(&self, record: &PatientRecord, tz: &Tz) -> bool {
        contains_ignore_case(&self.ip_number, &record.ip_number)
            && contains_ignore_case(&self.patient_name, &record.patient_name)
            && contains_ignore_case(&self.serial_number, &record.serial_number)
            && contains_ignore_case(&self.place, &record.place)
            && contains(&self.phone_number, &record.phone_number)
            && self.within_dates(record.registration_date, tz)
    }

    fn within_dates<Tz: TimeZone>(&self, registered: Option<DateTime<Utc>>, tz: &Tz) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        let Some(day) = registered.map(|dt| local_date(dt, tz)) else {
            return false;
        };
        self.start_date.map_or(true, |start| day >= start)
            && self.end_date.map_or(true, |end| day <= end)
    }
}

fn contains_ignore_case(needle: &Option<String>, haystack: &Option<String>) -> bool {
    match needle.as_deref().filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack
            .as_deref()
            .is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase())),
    }
}

fn contains(needle: &Option<String>, haystack: &Option<String>) -> bool {
    match needle.as_deref().filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack.as_deref().is_some_and(|h| h.contains(needle)),
    }
}

fn local_date<Tz: TimeZone>(dt: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    dt.with_timezone(tz).date_naive()
}

/// Sort newest registration first; undated records go last.
pub fn sort_newest_first(records: &mut [PatientRecord]) {
    records.sort_by(|a, b| b.registration_date.cmp(&a.registration_date));
}

/// Headline numbers for the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub total: usize,
    /// Registered on or after the start of `today`
    pub today: usize,
}

impl RosterSummary {
    pub fn compute<Tz: TimeZone>(records: &[PatientRecord], today: NaiveDate, tz: &Tz) -> Self {
        let today_count = records
            .iter()
            .filter_map(|r| r.registration_date)
            .filter(|dt| local_date(*dt, tz) >= today)
            .count();

        Self {
            total: records.len(),
            today: today_count,
        }
    }
}

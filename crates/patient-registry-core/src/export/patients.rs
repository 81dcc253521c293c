//! Roster export to CSV and JSON.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

/// CSV header, in column order.
pub const CSV_HEADER: &str =
    "IP Number,Serial Number,Patient Name,Age,Place,Phone Number,Referral,Registration Date";

/// One exported patient row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub ip_number: String,
    pub serial_number: String,
    pub patient_name: String,
    pub age: String,
    pub place: String,
    pub phone_number: String,
    pub referral: String,
    /// Local registration date (`YYYY-MM-DD`), empty when unknown
    pub registration_date: String,
}

impl ExportRow {
    /// Flatten a record, rendering its registration date in `tz`.
    pub fn from_record<Tz: TimeZone>(record: &PatientRecord, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            ip_number: text(&record.ip_number),
            serial_number: text(&record.serial_number),
            patient_name: text(&record.patient_name),
            age: text(&record.age),
            place: text(&record.place),
            phone_number: record.clean_phone_number().unwrap_or_default(),
            referral: text(&record.referral),
            registration_date: record
                .registration_date
                .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

/// A batch of exported roster rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterExport {
    /// Export timestamp
    pub exported_at: String,
    pub rows: Vec<ExportRow>,
}

impl RosterExport {
    /// Export records with dates in the machine's local time zone.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        Self::from_records_in(records, &Local, Utc::now())
    }

    pub fn from_records_in<'a, Tz: TimeZone>(
        records: impl IntoIterator<Item = &'a PatientRecord>,
        tz: &Tz,
        exported_at: DateTime<Utc>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            exported_at: exported_at.to_rfc3339(),
            rows: records
                .into_iter()
                .map(|r| ExportRow::from_record(r, tz))
                .collect(),
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str(CSV_HEADER);
        csv.push('\n');

        for row in &self.rows {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                escape_csv(&row.ip_number),
                escape_csv(&row.serial_number),
                escape_csv(&row.patient_name),
                escape_csv(&row.age),
                escape_csv(&row.place),
                escape_csv(&row.phone_number),
                escape_csv(&row.referral),
                escape_csv(&row.registration_date),
            ));
        }

        csv
    }
}

/// Default download name for a CSV export made on `date`.
pub fn default_file_name(date: NaiveDate) -> String {
    format!("patients_export_{}.csv", date.format("%Y-%m-%d"))
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

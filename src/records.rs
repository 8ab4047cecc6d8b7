//! Records exchanged with the backend collaborator.
//!
//! Incoming records keep their dates and times as raw strings, and each
//! entry is deserialized on its own, so a single malformed entry is reported
//! as a `DataError` and skipped instead of failing the whole payload.

use crate::error::DataError;
use crate::models::{Appointment, AppointmentStatus, AvailabilityWindow, PatientContact};
use chrono::{NaiveDate, NaiveTime};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    /// Set when the raw record did not have the expected shape.
    #[serde(skip)]
    pub rejected: Option<String>,
}

impl AvailabilityRecord {
    /// Decode into a window, falling back to `doctor_id` when the record omits it.
    pub fn decode(&self, doctor_id: &str) -> Result<AvailabilityWindow, DataError> {
        check_shape(&self.id, self.rejected.as_deref())?;
        let id = require_id(&self.id)?;
        let date = parse_date(&id, self.date.as_deref())?;
        let start = parse_time(&id, "start_time", self.start_time.as_deref())?;
        let end = parse_time(&id, "end_time", self.end_time.as_deref())?;
        if end < start {
            return Err(DataError::new(id, "end_time precedes start_time"));
        }

        Ok(AvailabilityWindow {
            doctor_id: self.doctor_id.clone().unwrap_or_else(|| doctor_id.to_string()),
            id,
            date,
            start,
            end,
        })
    }
}

impl From<&AvailabilityWindow> for AvailabilityRecord {
    fn from(window: &AvailabilityWindow) -> Self {
        AvailabilityRecord {
            id: window.id.clone(),
            doctor_id: Some(window.doctor_id.clone()),
            date: Some(window.date.format(DATE_FORMAT).to_string()),
            start_time: Some(window.start.format(TIME_FORMAT).to_string()),
            end_time: Some(window.end.format(TIME_FORMAT).to_string()),
            rejected: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub doctor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub patient: Option<PatientContact>,
    #[serde(skip)]
    pub rejected: Option<String>,
}

impl AppointmentRecord {
    pub fn decode(&self, doctor_id: &str) -> Result<Appointment, DataError> {
        check_shape(&self.id, self.rejected.as_deref())?;
        let id = require_id(&self.id)?;
        let patient_id = self
            .patient_id
            .clone()
            .ok_or_else(|| DataError::new(id.clone(), "missing patient_id"))?;
        let date = parse_date(&id, self.date.as_deref())?;
        let start = parse_time(&id, "start_time", self.start_time.as_deref())?;
        let end = parse_time(&id, "end_time", self.end_time.as_deref())?;
        if end <= start {
            return Err(DataError::new(id, "end_time must follow start_time"));
        }
        let status = match self.status.as_deref() {
            Some(raw) => AppointmentStatus::from_string(raw).map_err(|e| DataError::new(id.clone(), e))?,
            None => return Err(DataError::new(id, "missing status")),
        };

        Ok(Appointment {
            doctor_id: self.doctor_id.clone().unwrap_or_else(|| doctor_id.to_string()),
            id,
            patient_id,
            date,
            start,
            end,
            status,
            patient: self.patient.clone(),
        })
    }
}

impl From<&Appointment> for AppointmentRecord {
    fn from(apt: &Appointment) -> Self {
        AppointmentRecord {
            id: apt.id.clone(),
            doctor_id: Some(apt.doctor_id.clone()),
            patient_id: Some(apt.patient_id.clone()),
            date: Some(apt.date.format(DATE_FORMAT).to_string()),
            start_time: Some(apt.start.format(TIME_FORMAT).to_string()),
            end_time: Some(apt.end.format(TIME_FORMAT).to_string()),
            status: Some(apt.status.as_str().to_string()),
            patient: apt.patient.clone(),
            rejected: None,
        }
    }
}

/// Records that can stand in for a raw entry that failed to deserialize.
trait RawRecord: DeserializeOwned {
    fn rejected(id: String, reason: String) -> Self;
}

impl RawRecord for AvailabilityRecord {
    fn rejected(id: String, reason: String) -> Self {
        AvailabilityRecord {
            id,
            rejected: Some(reason),
            ..Default::default()
        }
    }
}

impl RawRecord for AppointmentRecord {
    fn rejected(id: String, reason: String) -> Self {
        AppointmentRecord {
            id,
            rejected: Some(reason),
            ..Default::default()
        }
    }
}

/// Values decoded from a batch of records, with the records that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub skipped: Vec<DataError>,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Decoded {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Decoded<T> {
    fn collect<R>(records: &[R], decode: impl Fn(&R) -> Result<T, DataError>) -> Self {
        let mut decoded = Decoded::default();
        for record in records {
            match decode(record) {
                Ok(item) => decoded.items.push(item),
                Err(err) => decoded.skipped.push(err),
            }
        }
        decoded
    }
}

pub fn decode_windows(records: &[AvailabilityRecord], doctor_id: &str) -> Decoded<AvailabilityWindow> {
    Decoded::collect(records, |r| r.decode(doctor_id))
}

pub fn decode_appointments(records: &[AppointmentRecord], doctor_id: &str) -> Decoded<Appointment> {
    Decoded::collect(records, |r| r.decode(doctor_id))
}

/// Calendar payload for the signed-in doctor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarData {
    #[serde(default, deserialize_with = "lenient_records")]
    pub appointments: Vec<AppointmentRecord>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub availability: Vec<AvailabilityRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// New availability for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySubmission {
    pub date: NaiveDate,
    pub slots: Vec<SlotRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCreated {
    #[serde(deserialize_with = "lenient_records")]
    pub slots: Vec<AvailabilityRecord>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelConfirmation {
    pub id: String,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSummary {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Published availability of one doctor, as seen by a patient.
///
/// Both maps are keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAvailability {
    #[serde(default, deserialize_with = "lenient_record_map")]
    pub availability: BTreeMap<String, Vec<AvailabilityRecord>>,
    #[serde(default, rename = "bookedAppointments", deserialize_with = "lenient_record_map")]
    pub booked_appointments: BTreeMap<String, Vec<AppointmentRecord>>,
    #[serde(default)]
    pub doctor: DoctorSummary,
}

/// Decoded form of `DoctorAvailability`, grouped by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctorSchedule {
    pub doctor: DoctorSummary,
    pub availability: BTreeMap<NaiveDate, Vec<AvailabilityWindow>>,
    pub booked: BTreeMap<NaiveDate, Vec<Appointment>>,
    pub skipped: Vec<DataError>,
}

impl DoctorAvailability {
    /// Records without their own date inherit the date of the map key.
    pub fn decode(&self) -> DoctorSchedule {
        let doctor_id = self.doctor.id.as_str();
        let mut schedule = DoctorSchedule {
            doctor: self.doctor.clone(),
            ..DoctorSchedule::default()
        };

        for (key, records) in &self.availability {
            for record in records {
                let mut record = record.clone();
                record.date.get_or_insert_with(|| key.clone());
                match record.decode(doctor_id) {
                    Ok(window) => schedule.availability.entry(window.date).or_default().push(window),
                    Err(err) => schedule.skipped.push(err),
                }
            }
        }

        for (key, records) in &self.booked_appointments {
            for record in records {
                let mut record = record.clone();
                record.date.get_or_insert_with(|| key.clone());
                match record.decode(doctor_id) {
                    Ok(apt) => schedule.booked.entry(apt.date).or_default().push(apt),
                    Err(err) => schedule.skipped.push(err),
                }
            }
        }

        schedule
    }
}

pub fn decode_calendar(json: &str) -> Result<CalendarData, DataError> {
    serde_json::from_str(json).map_err(|e| DataError::payload(e.to_string()))
}

pub fn decode_doctor_availability(json: &str) -> Result<DoctorAvailability, DataError> {
    serde_json::from_str(json).map_err(|e| DataError::payload(e.to_string()))
}

fn check_shape(id: &str, rejected: Option<&str>) -> Result<(), DataError> {
    match rejected {
        Some(reason) if id.trim().is_empty() => Err(DataError::payload(reason)),
        Some(reason) => Err(DataError::new(id.trim(), reason)),
        None => Ok(()),
    }
}

fn require_id(raw: &str) -> Result<String, DataError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(DataError::payload("record without id"));
    }
    Ok(id.to_string())
}

fn parse_date(id: &str, raw: Option<&str>) -> Result<NaiveDate, DataError> {
    let raw = raw.ok_or_else(|| DataError::new(id, "missing date"))?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| DataError::new(id, format!("invalid date '{}': {}", raw, e)))
}

/// Accepts `HH:MM:SS` and `HH:MM`.
fn parse_time(id: &str, field: &str, raw: Option<&str>) -> Result<NaiveTime, DataError> {
    let raw = raw.ok_or_else(|| DataError::new(id, format!("missing {}", field)))?;
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|e| DataError::new(id, format!("invalid {} '{}': {}", field, raw, e)))
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn raw_record<R: RawRecord>(value: Value) -> R {
    let id = match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    serde_json::from_value(value).unwrap_or_else(|e| R::rejected(id, e.to_string()))
}

fn lenient_records<'de, D, R>(deserializer: D) -> Result<Vec<R>, D::Error>
where
    D: Deserializer<'de>,
    R: RawRecord,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.into_iter().map(raw_record).collect())
}

fn lenient_record_map<'de, D, R>(deserializer: D) -> Result<BTreeMap<String, Vec<R>>, D::Error>
where
    D: Deserializer<'de>,
    R: RawRecord,
{
    let map = BTreeMap::<String, Vec<Value>>::deserialize(deserializer)?;
    Ok(map
        .into_iter()
        .map(|(date, values)| (date, values.into_iter().map(raw_record).collect()))
        .collect())
}

fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = lenient_id(deserializer)?;
    Ok(if id.is_empty() { None } else { Some(id) })
}

//! Data models for the scheduling engine.
//!
//! This module defines the core data structures used throughout the crate:
//! - Interval: Half-open time range on a single calendar date
//! - AvailabilityWindow: Open time declared by a doctor
//! - BookableUnit: Fixed-size slice of a window offered to patients
//! - Appointment: A patient's booking against a doctor
//! - BookingRequest: Payload submitted when a patient books a unit

use crate::error::ValidationError;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)` on one date.
///
/// Field order gives the derived ordering: date, then start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Interval {
    /// Create a new interval with validation.
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidRange);
        }
        Ok(Interval { date, start, end })
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this interval overlaps with another.
    ///
    /// Intervals on different dates never overlap; touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }

    /// Check if a point in time falls within this interval.
    pub fn contains(&self, point: NaiveDateTime) -> bool {
        point.date() == self.date && self.start <= point.time() && point.time() < self.end
    }

    /// A range counts as past as soon as either boundary precedes `now`.
    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        self.start_at() < now || self.end_at() < now
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.date.format("%Y-%m-%d"),
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Open time declared by a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    #[serde(rename = "start_time")]
    pub start: NaiveTime,
    #[serde(rename = "end_time")]
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    pub fn span(&self) -> Interval {
        Interval {
            date: self.date,
            start: self.start,
            end: self.end,
        }
    }
}

/// A slice of an availability window that a patient can book.
///
/// Derived on every fetch and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableUnit {
    pub id: String,
    pub window_id: String,
    pub date: NaiveDate,
    #[serde(rename = "start_time")]
    pub start: NaiveTime,
    #[serde(rename = "end_time")]
    pub end: NaiveTime,
}

impl BookableUnit {
    pub fn new(window_id: &str, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        BookableUnit {
            id: format!("{}-{}", window_id, start.format("%H:%M")),
            window_id: window_id.to_string(),
            date,
            start,
            end,
        }
    }

    pub fn span(&self) -> Interval {
        Interval {
            date: self.date,
            start: self.start,
            end: self.end,
        }
    }
}

/// Appointment status. `Pending` is both the initial and the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Canceled,
}

impl AppointmentStatus {
    /// Convert a string to an AppointmentStatus value.
    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "canceled" | "cancelled" => Ok(AppointmentStatus::Canceled),
            _ => Err(format!(
                "Invalid status: '{}'. Must be one of: pending, canceled",
                value
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Canceled => "canceled",
        }
    }
}

/// Contact details of the patient shown on a doctor's appointment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatientContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_no: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    #[serde(rename = "start_time")]
    pub start: NaiveTime,
    #[serde(rename = "end_time")]
    pub end: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub patient: Option<PatientContact>,
}

impl Appointment {
    pub fn span(&self) -> Interval {
        Interval {
            date: self.date,
            start: self.start,
            end: self.end,
        }
    }

    /// Whether the appointment still holds its time range.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Canceled
    }
}

/// Booking payload sent to the backend. Always created as `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
}

impl BookingRequest {
    pub fn span(&self) -> Interval {
        Interval {
            date: self.date,
            start: self.start_time,
            end: self.end_time,
        }
    }
}

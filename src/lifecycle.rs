//! Appointment status transitions.
//!
//! `create` yields a pending booking request for a unit that is still offered.
//! `cancel` moves a future pending appointment to canceled, which is terminal.
//! A canceled appointment no longer blocks its unit, so the range reappears
//! on the next slice.

use crate::error::ValidationError;
use crate::models::{Appointment, AppointmentStatus, BookableUnit, BookingRequest};
use crate::slicer::BookingBoard;
use chrono::NaiveDateTime;

pub struct AppointmentStateMachine;

impl AppointmentStateMachine {
    /// Build the pending booking for `unit`.
    ///
    /// The unit must be part of the current slicer output and must not have started.
    pub fn create(
        unit: &BookableUnit,
        doctor_id: &str,
        patient_id: &str,
        offered: &BookingBoard,
        now: NaiveDateTime,
    ) -> Result<BookingRequest, ValidationError> {
        let still_offered = offered
            .find(&unit.id)
            .map_or(false, |current| current.span() == unit.span());
        if !still_offered {
            return Err(ValidationError::UnitUnavailable);
        }
        if unit.span().is_past(now) {
            return Err(ValidationError::PastSlot);
        }

        Ok(BookingRequest {
            doctor_id: doctor_id.to_string(),
            patient_id: patient_id.to_string(),
            date: unit.date,
            start_time: unit.start,
            end_time: unit.end,
            status: AppointmentStatus::Pending,
        })
    }

    /// Cancel an appointment on behalf of its doctor.
    pub fn cancel(
        appointment: &Appointment,
        doctor_id: &str,
        now: NaiveDateTime,
    ) -> Result<Appointment, ValidationError> {
        if appointment.doctor_id != doctor_id {
            return Err(ValidationError::NotOwner);
        }
        if appointment.status == AppointmentStatus::Canceled {
            return Err(ValidationError::AlreadyCanceled);
        }
        if appointment.span().start_at() < now {
            return Err(ValidationError::TooLate);
        }

        Ok(Appointment {
            status: AppointmentStatus::Canceled,
            ..appointment.clone()
        })
    }
}

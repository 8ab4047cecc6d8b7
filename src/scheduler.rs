//! Orchestration of doctor and patient actions.
//!
//! `PortalScheduler` runs each user action as one request/response cycle
//! against the backend: client-side validation first, then the request, then
//! a refetch so the local snapshot is never patched by hand. A conflict
//! reported by the backend always triggers a refetch before the error is
//! returned. Once the backend has committed a change, a failed refetch only
//! drops the snapshot; the committed result is still returned.

use crate::backend::PortalBackend;
use crate::calendar::{CalendarEvent, DoctorCalendar};
use crate::error::{DataError, PortalError, ValidationError};
use crate::guard::OverlapGuard;
use crate::lifecycle::AppointmentStateMachine;
use crate::models::{Appointment, AvailabilityWindow, BookableUnit, Interval};
use crate::records::{decode_windows, AvailabilitySubmission, Decoded, DoctorSummary, SlotRange};
use crate::slicer::{AvailabilitySlicer, BookingBoard};
use chrono::NaiveDateTime;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Doctor,
    Patient,
}

/// The signed-in user on whose behalf requests are issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

impl Session {
    pub fn doctor(user_id: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            role: Role::Doctor,
        }
    }

    pub fn patient(user_id: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            role: Role::Patient,
        }
    }

    fn require(&self, role: Role) -> Result<&str, ValidationError> {
        if self.role != role {
            return Err(ValidationError::NotOwner);
        }
        Ok(&self.user_id)
    }
}

/// Bookable units of one doctor as last fetched by a patient.
#[derive(Debug, Clone, Default)]
pub struct LoadedBoard {
    pub doctor: DoctorSummary,
    pub board: BookingBoard,
    pub skipped: Vec<DataError>,
}

pub struct PortalScheduler<B: PortalBackend> {
    backend: B,
    slicer: AvailabilitySlicer,
    calendar: Option<DoctorCalendar>,
    board: Option<LoadedBoard>,
}

impl<B: PortalBackend> PortalScheduler<B> {
    pub fn new(backend: B, slicer: AvailabilitySlicer) -> Self {
        PortalScheduler {
            backend,
            slicer,
            calendar: None,
            board: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn calendar(&self) -> Option<&DoctorCalendar> {
        self.calendar.as_ref()
    }

    pub fn board(&self) -> Option<&LoadedBoard> {
        self.board.as_ref()
    }

    /// Events of the loaded doctor calendar, projected fresh.
    pub fn calendar_events(&self) -> Vec<CalendarEvent> {
        self.calendar.as_ref().map(DoctorCalendar::events).unwrap_or_default()
    }

    fn refresh_calendar(&mut self, doctor_id: &str) -> Result<&DoctorCalendar, PortalError> {
        let data = self.backend.fetch_calendar(doctor_id)?;
        let mut calendar = DoctorCalendar::new(doctor_id);
        calendar.replace(&data);
        Ok(self.calendar.insert(calendar))
    }

    fn ensure_calendar(&mut self, doctor_id: &str) -> Result<(), PortalError> {
        let loaded = self
            .calendar
            .as_ref()
            .map_or(false, |c| c.doctor_id == doctor_id);
        if !loaded {
            self.refresh_calendar(doctor_id)?;
        }
        Ok(())
    }

    /// Fetch the signed-in doctor's calendar, replacing the local snapshot.
    pub fn load_calendar(&mut self, session: &Session) -> Result<&DoctorCalendar, PortalError> {
        let doctor_id = session.require(Role::Doctor)?;
        let calendar = self.refresh_calendar(doctor_id)?;
        info!(%calendar, skipped = calendar.skipped().len(), "calendar loaded");
        Ok(calendar)
    }

    /// Publish a new availability window for the signed-in doctor.
    pub fn add_availability(
        &mut self,
        session: &Session,
        proposed: Interval,
        now: NaiveDateTime,
    ) -> Result<Vec<AvailabilityWindow>, PortalError> {
        let doctor_id = session.require(Role::Doctor)?;
        self.ensure_calendar(doctor_id)?;

        let existing = self
            .calendar
            .as_ref()
            .map(|c| c.windows_on(proposed.date))
            .unwrap_or_default();
        OverlapGuard::validate_new_availability(&proposed, &existing, now)?;

        let submission = AvailabilitySubmission {
            date: proposed.date,
            slots: vec![SlotRange {
                start_time: proposed.start,
                end_time: proposed.end,
            }],
        };
        let created = match self.backend.submit_availability(doctor_id, &submission) {
            Ok(created) => created,
            Err(err) => return Err(self.after_calendar_failure(doctor_id, err.into())),
        };

        let windows = decode_windows(&created.slots, doctor_id);
        info!(doctor_id, %proposed, created = windows.items.len(), "availability added");
        self.settle_calendar(doctor_id);
        Ok(windows.items)
    }

    pub fn delete_availability(&mut self, session: &Session, window_id: &str) -> Result<(), PortalError> {
        let doctor_id = session.require(Role::Doctor)?;
        if let Err(err) = self.backend.delete_availability(doctor_id, window_id) {
            return Err(self.after_calendar_failure(doctor_id, err.into()));
        }

        info!(doctor_id, window_id, "availability deleted");
        self.settle_calendar(doctor_id);
        Ok(())
    }

    /// Cancel one of the signed-in doctor's appointments.
    pub fn cancel_appointment(
        &mut self,
        session: &Session,
        appointment_id: &str,
        now: NaiveDateTime,
    ) -> Result<Appointment, PortalError> {
        let doctor_id = session.require(Role::Doctor)?;
        self.ensure_calendar(doctor_id)?;

        let lookup = |calendar: Option<&DoctorCalendar>| {
            calendar.and_then(|c| c.appointment(appointment_id)).cloned()
        };
        // booked after the snapshot was taken
        let appointment = match lookup(self.calendar.as_ref()) {
            Some(apt) => apt,
            None => lookup(Some(self.refresh_calendar(doctor_id)?)).ok_or_else(|| {
                PortalError::Conflict(format!("appointment {} not found", appointment_id))
            })?,
        };
        let canceled = AppointmentStateMachine::cancel(&appointment, doctor_id, now)?;

        if let Err(err) = self.backend.cancel_appointment(doctor_id, appointment_id) {
            return Err(self.after_calendar_failure(doctor_id, err.into()));
        }

        info!(doctor_id, appointment_id, span = %canceled.span(), "appointment canceled");
        self.settle_calendar(doctor_id);
        Ok(canceled)
    }

    /// Refetch after a committed change; on failure the snapshot is dropped as stale.
    fn settle_calendar(&mut self, doctor_id: &str) {
        if let Err(err) = self.refresh_calendar(doctor_id).map(|_| ()) {
            warn!(doctor_id, error = %err, "calendar refresh after commit failed");
            self.calendar = None;
        }
    }

    fn after_calendar_failure(&mut self, doctor_id: &str, err: PortalError) -> PortalError {
        warn!(doctor_id, error = %err, "calendar request failed");
        if err.requires_refresh() {
            if let Err(refresh_err) = self.refresh_calendar(doctor_id) {
                warn!(doctor_id, error = %refresh_err, "calendar refresh failed");
            }
        }
        err
    }

    /// Fetch a doctor's published availability and slice it into bookable units.
    pub fn load_booking_board(&mut self, doctor_id: &str) -> Result<&LoadedBoard, PortalError> {
        let published = self.backend.fetch_doctor_availability(doctor_id)?;
        let schedule = published.decode();
        for err in &schedule.skipped {
            warn!(doctor_id, error = %err, "skipping availability record");
        }

        let board = self.slicer.slice_schedule(&schedule.availability, &schedule.booked);
        info!(doctor_id, units = board.total_units(), "booking board loaded");

        Ok(self.board.insert(LoadedBoard {
            doctor: schedule.doctor,
            board,
            skipped: schedule.skipped,
        }))
    }

    /// Pick a unit from the loaded board.
    pub fn select_slot(&self, unit_id: &str, now: NaiveDateTime) -> Result<BookableUnit, PortalError> {
        let unit = self
            .board
            .as_ref()
            .and_then(|b| b.board.find(unit_id))
            .cloned()
            .ok_or(ValidationError::UnitUnavailable)?;
        OverlapGuard::validate_slot_selection(&unit, now)?;
        Ok(unit)
    }

    /// Book a unit from the loaded board for the signed-in patient.
    pub fn book(
        &mut self,
        session: &Session,
        unit_id: &str,
        now: NaiveDateTime,
    ) -> Result<Appointment, PortalError> {
        let patient_id = session.require(Role::Patient)?;
        let unit = self.select_slot(unit_id, now)?;
        let loaded = self.board.as_ref().ok_or(ValidationError::UnitUnavailable)?;
        let doctor_id = loaded.doctor.id.clone();

        let request =
            AppointmentStateMachine::create(&unit, &doctor_id, patient_id, &loaded.board, now)?;

        let record = match self.backend.submit_booking(&request) {
            Ok(record) => record,
            Err(err) => {
                let err = PortalError::from(err);
                warn!(%doctor_id, patient_id, unit_id, error = %err, "booking failed");
                if err.requires_refresh() {
                    if let Err(refresh_err) = self.load_booking_board(&doctor_id) {
                        warn!(%doctor_id, error = %refresh_err, "booking board refresh failed");
                    }
                }
                return Err(err);
            }
        };

        let appointment = match record.decode(&doctor_id) {
            Ok(apt) => apt,
            Err(err) => {
                warn!(%doctor_id, error = %err, "malformed booking response");
                Appointment {
                    id: record.id.clone(),
                    doctor_id: request.doctor_id.clone(),
                    patient_id: request.patient_id.clone(),
                    date: request.date,
                    start: request.start_time,
                    end: request.end_time,
                    status: request.status,
                    patient: None,
                }
            }
        };
        info!(appointment_id = %appointment.id, patient_id, span = %appointment.span(), "appointment booked");
        self.settle_board(&doctor_id);
        Ok(appointment)
    }

    fn settle_board(&mut self, doctor_id: &str) {
        if let Err(err) = self.load_booking_board(doctor_id).map(|_| ()) {
            warn!(doctor_id, error = %err, "booking board refresh after commit failed");
            self.board = None;
        }
    }

    /// All appointments of the signed-in patient, canceled ones included.
    pub fn patient_appointments(&self, session: &Session) -> Result<Decoded<Appointment>, PortalError> {
        let patient_id = session.require(Role::Patient)?;
        let records = self.backend.fetch_patient_appointments(patient_id)?;

        let mut decoded = Decoded::default();
        for record in &records {
            let result = match record.doctor_id.as_deref() {
                Some(doctor_id) => record.decode(doctor_id),
                None => Err(DataError::new(record.id.clone(), "missing doctor_id")),
            };
            match result {
                Ok(apt) => decoded.items.push(apt),
                Err(err) => {
                    warn!(patient_id, error = %err, "skipping appointment record");
                    decoded.skipped.push(err);
                }
            }
        }
        decoded.items.sort_by_key(|a| a.span());
        Ok(decoded)
    }
}

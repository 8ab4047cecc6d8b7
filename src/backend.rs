//! Backend collaborator interface and an in-memory store.
//!
//! The backend is the only source of truth. Client-side checks are a fast
//! path; the store re-validates every write and arbitrates concurrent
//! bookings of the same time range.

use crate::error::BackendError;
use crate::models::{
    Appointment, AppointmentStatus, AvailabilityWindow, BookingRequest, Interval, PatientContact,
};
use crate::records::{
    AppointmentRecord, AvailabilityCreated, AvailabilityRecord, AvailabilitySubmission,
    CalendarData, CancelConfirmation, DoctorAvailability, DoctorSummary,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// Requests the scheduling core issues on behalf of a doctor or patient.
pub trait PortalBackend: Send + Sync {
    fn fetch_calendar(&self, doctor_id: &str) -> Result<CalendarData, BackendError>;

    fn submit_availability(
        &self,
        doctor_id: &str,
        submission: &AvailabilitySubmission,
    ) -> Result<AvailabilityCreated, BackendError>;

    fn delete_availability(&self, doctor_id: &str, window_id: &str) -> Result<(), BackendError>;

    fn cancel_appointment(
        &self,
        doctor_id: &str,
        appointment_id: &str,
    ) -> Result<CancelConfirmation, BackendError>;

    fn fetch_doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, BackendError>;

    fn submit_booking(&self, request: &BookingRequest) -> Result<AppointmentRecord, BackendError>;

    fn fetch_patient_appointments(&self, patient_id: &str) -> Result<Vec<AppointmentRecord>, BackendError>;
}

impl<T: PortalBackend + ?Sized> PortalBackend for Arc<T> {
    fn fetch_calendar(&self, doctor_id: &str) -> Result<CalendarData, BackendError> {
        (**self).fetch_calendar(doctor_id)
    }

    fn submit_availability(
        &self,
        doctor_id: &str,
        submission: &AvailabilitySubmission,
    ) -> Result<AvailabilityCreated, BackendError> {
        (**self).submit_availability(doctor_id, submission)
    }

    fn delete_availability(&self, doctor_id: &str, window_id: &str) -> Result<(), BackendError> {
        (**self).delete_availability(doctor_id, window_id)
    }

    fn cancel_appointment(
        &self,
        doctor_id: &str,
        appointment_id: &str,
    ) -> Result<CancelConfirmation, BackendError> {
        (**self).cancel_appointment(doctor_id, appointment_id)
    }

    fn fetch_doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, BackendError> {
        (**self).fetch_doctor_availability(doctor_id)
    }

    fn submit_booking(&self, request: &BookingRequest) -> Result<AppointmentRecord, BackendError> {
        (**self).submit_booking(request)
    }

    fn fetch_patient_appointments(&self, patient_id: &str) -> Result<Vec<AppointmentRecord>, BackendError> {
        (**self).fetch_patient_appointments(patient_id)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    doctors: HashMap<String, String>,
    patients: HashMap<String, PatientContact>,
    windows: Vec<AvailabilityWindow>,
    appointments: Vec<Appointment>,
    offline: bool,
}

impl StoreState {
    fn require_doctor(&self, doctor_id: &str) -> Result<&str, BackendError> {
        self.doctors
            .get(doctor_id)
            .map(String::as_str)
            .ok_or_else(|| BackendError::NotFound(format!("doctor {}", doctor_id)))
    }

    fn doctor_windows(&self, doctor_id: &str) -> impl Iterator<Item = &AvailabilityWindow> {
        let doctor_id = doctor_id.to_string();
        self.windows.iter().filter(move |w| w.doctor_id == doctor_id)
    }

    fn appointment_record(&self, apt: &Appointment) -> AppointmentRecord {
        let mut record = AppointmentRecord::from(apt);
        record.patient = self.patients.get(&apt.patient_id).cloned();
        record
    }
}

/// Thread-safe in-memory backend enforcing the authoritative checks.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<StoreState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, BackendError> {
        let state = self
            .state
            .lock()
            .map_err(|_| BackendError::Transport("store lock poisoned".to_string()))?;
        if state.offline {
            return Err(BackendError::Transport("backend unavailable".to_string()));
        }
        Ok(state)
    }

    pub fn register_doctor(&self, doctor_id: &str, name: &str) -> Result<(), BackendError> {
        self.lock()?
            .doctors
            .insert(doctor_id.to_string(), name.to_string());
        Ok(())
    }

    pub fn register_patient(&self, patient_id: &str, contact: PatientContact) -> Result<(), BackendError> {
        self.lock()?.patients.insert(patient_id.to_string(), contact);
        Ok(())
    }

    /// Simulate a network outage; every request fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offline = offline;
    }
}

impl PortalBackend for InMemoryBackend {
    fn fetch_calendar(&self, doctor_id: &str) -> Result<CalendarData, BackendError> {
        let state = self.lock()?;
        state.require_doctor(doctor_id)?;

        Ok(CalendarData {
            appointments: state
                .appointments
                .iter()
                .filter(|a| a.doctor_id == doctor_id)
                .map(|a| state.appointment_record(a))
                .collect(),
            availability: state.doctor_windows(doctor_id).map(AvailabilityRecord::from).collect(),
        })
    }

    fn submit_availability(
        &self,
        doctor_id: &str,
        submission: &AvailabilitySubmission,
    ) -> Result<AvailabilityCreated, BackendError> {
        let mut state = self.lock()?;
        state.require_doctor(doctor_id)?;

        let mut accepted: Vec<AvailabilityWindow> = Vec::new();
        for slot in &submission.slots {
            let span = Interval::new(submission.date, slot.start_time, slot.end_time)
                .map_err(|e| BackendError::Conflict(e.to_string()))?;

            let clash = state
                .doctor_windows(doctor_id)
                .chain(accepted.iter())
                .find(|w| w.span().overlaps(&span))
                .map(|w| w.id.clone());
            if let Some(existing) = clash {
                warn!(doctor_id, %span, existing = %existing, "rejected overlapping availability");
                return Err(BackendError::Conflict(format!(
                    "{} overlaps existing availability {}",
                    span, existing
                )));
            }

            accepted.push(AvailabilityWindow {
                id: Uuid::new_v4().to_string(),
                doctor_id: doctor_id.to_string(),
                date: span.date,
                start: span.start,
                end: span.end,
            });
        }

        info!(doctor_id, count = accepted.len(), "availability created");
        let slots = accepted.iter().map(AvailabilityRecord::from).collect();
        state.windows.extend(accepted);

        Ok(AvailabilityCreated {
            slots,
            message: Some("Availability added successfully".to_string()),
        })
    }

    fn delete_availability(&self, doctor_id: &str, window_id: &str) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let before = state.windows.len();
        state
            .windows
            .retain(|w| !(w.id == window_id && w.doctor_id == doctor_id));

        if state.windows.len() == before {
            return Err(BackendError::NotFound(format!("availability {}", window_id)));
        }
        info!(doctor_id, window_id, "availability deleted");
        Ok(())
    }

    fn cancel_appointment(
        &self,
        doctor_id: &str,
        appointment_id: &str,
    ) -> Result<CancelConfirmation, BackendError> {
        let mut state = self.lock()?;
        let apt = state
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id && a.doctor_id == doctor_id)
            .ok_or_else(|| BackendError::NotFound(format!("appointment {}", appointment_id)))?;

        if apt.status == AppointmentStatus::Canceled {
            return Err(BackendError::Conflict(format!(
                "appointment {} is already canceled",
                appointment_id
            )));
        }
        apt.status = AppointmentStatus::Canceled;

        info!(doctor_id, appointment_id, "appointment canceled");
        Ok(CancelConfirmation {
            id: appointment_id.to_string(),
            status: AppointmentStatus::Canceled,
        })
    }

    fn fetch_doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, BackendError> {
        let state = self.lock()?;
        let name = state.require_doctor(doctor_id)?.to_string();

        let mut availability: BTreeMap<String, Vec<AvailabilityRecord>> = BTreeMap::new();
        for window in state.doctor_windows(doctor_id) {
            availability
                .entry(window.date.format("%Y-%m-%d").to_string())
                .or_default()
                .push(AvailabilityRecord::from(window));
        }

        let mut booked_appointments: BTreeMap<String, Vec<AppointmentRecord>> = BTreeMap::new();
        for apt in state
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.is_active())
        {
            booked_appointments
                .entry(apt.date.format("%Y-%m-%d").to_string())
                .or_default()
                .push(AppointmentRecord::from(apt));
        }

        Ok(DoctorAvailability {
            availability,
            booked_appointments,
            doctor: DoctorSummary {
                id: doctor_id.to_string(),
                name,
            },
        })
    }

    fn submit_booking(&self, request: &BookingRequest) -> Result<AppointmentRecord, BackendError> {
        let mut state = self.lock()?;
        state.require_doctor(&request.doctor_id)?;
        if !state.patients.contains_key(&request.patient_id) {
            return Err(BackendError::NotFound(format!("patient {}", request.patient_id)));
        }
        if request.status != AppointmentStatus::Pending {
            return Err(BackendError::Conflict("bookings must start as pending".to_string()));
        }

        let span = Interval::new(request.date, request.start_time, request.end_time)
            .map_err(|e| BackendError::Conflict(e.to_string()))?;

        let offered = state.doctor_windows(&request.doctor_id).any(|w| {
            let window = w.span();
            window.date == span.date && window.start <= span.start && span.end <= window.end
        });
        if !offered {
            warn!(doctor_id = %request.doctor_id, %span, "booking outside published availability");
            return Err(BackendError::Conflict(format!("{} is no longer offered", span)));
        }

        let taken = state.appointments.iter().any(|a| {
            a.doctor_id == request.doctor_id && a.is_active() && a.span().overlaps(&span)
        });
        if taken {
            warn!(doctor_id = %request.doctor_id, %span, "double booking rejected");
            return Err(BackendError::Conflict(format!("{} is already booked", span)));
        }

        let apt = Appointment {
            id: Uuid::new_v4().to_string(),
            doctor_id: request.doctor_id.clone(),
            patient_id: request.patient_id.clone(),
            date: span.date,
            start: span.start,
            end: span.end,
            status: AppointmentStatus::Pending,
            patient: None,
        };
        info!(appointment_id = %apt.id, patient_id = %apt.patient_id, %span, "appointment booked");

        let record = state.appointment_record(&apt);
        state.appointments.push(apt);
        Ok(record)
    }

    fn fetch_patient_appointments(&self, patient_id: &str) -> Result<Vec<AppointmentRecord>, BackendError> {
        let state = self.lock()?;
        let mut appointments: Vec<&Appointment> = state
            .appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .collect();
        appointments.sort_by_key(|a| a.span());

        Ok(appointments.into_iter().map(|a| state.appointment_record(a)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SlotRange;
    use chrono::{NaiveDate, NaiveTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 4, 8).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn backend() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.register_doctor("d1", "Dr. Smith").unwrap();
        backend
            .register_patient(
                "p1",
                PatientContact {
                    name: "John Smith".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        backend
    }

    fn submit(backend: &InMemoryBackend, start: NaiveTime, end: NaiveTime) -> Result<AvailabilityCreated, BackendError> {
        backend.submit_availability(
            "d1",
            &AvailabilitySubmission {
                date: day(),
                slots: vec![SlotRange {
                    start_time: start,
                    end_time: end,
                }],
            },
        )
    }

    fn booking(start: NaiveTime, end: NaiveTime) -> BookingRequest {
        BookingRequest {
            doctor_id: "d1".into(),
            patient_id: "p1".into(),
            date: day(),
            start_time: start,
            end_time: end,
            status: AppointmentStatus::Pending,
        }
    }

    #[test]
    fn server_rejects_overlapping_availability() {
        let backend = backend();
        submit(&backend, at(9, 0), at(11, 0)).unwrap();
        assert!(matches!(
            submit(&backend, at(10, 0), at(12, 0)),
            Err(BackendError::Conflict(_))
        ));
        assert!(submit(&backend, at(11, 0), at(12, 0)).is_ok());
    }

    #[test]
    fn server_rejects_double_booking_by_overlap() {
        let backend = backend();
        submit(&backend, at(9, 0), at(11, 0)).unwrap();
        backend.submit_booking(&booking(at(9, 0), at(10, 0))).unwrap();

        assert!(matches!(
            backend.submit_booking(&booking(at(9, 0), at(10, 0))),
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            backend.submit_booking(&booking(at(9, 30), at(10, 30))),
            Err(BackendError::Conflict(_))
        ));
        assert!(backend.submit_booking(&booking(at(10, 0), at(11, 0))).is_ok());
    }

    #[test]
    fn booking_outside_availability_is_refused() {
        let backend = backend();
        submit(&backend, at(9, 0), at(10, 0)).unwrap();
        assert!(matches!(
            backend.submit_booking(&booking(at(9, 30), at(10, 30))),
            Err(BackendError::Conflict(_))
        ));
    }

    #[test]
    fn canceled_appointments_leave_booked_list() {
        let backend = backend();
        submit(&backend, at(9, 0), at(10, 0)).unwrap();
        let record = backend.submit_booking(&booking(at(9, 0), at(10, 0))).unwrap();
        assert_eq!(record.patient.map(|p| p.name), Some("John Smith".to_string()));

        let confirmation = backend.cancel_appointment("d1", &record.id).unwrap();
        assert_eq!(confirmation.status, AppointmentStatus::Canceled);
        assert!(matches!(
            backend.cancel_appointment("d1", &record.id),
            Err(BackendError::Conflict(_))
        ));

        let published = backend.fetch_doctor_availability("d1").unwrap();
        assert!(published.booked_appointments.is_empty());
        assert_eq!(backend.fetch_patient_appointments("p1").unwrap().len(), 1);
    }

    #[test]
    fn delete_unknown_window_is_not_found() {
        let backend = backend();
        assert!(matches!(
            backend.delete_availability("d1", "missing"),
            Err(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn offline_backend_reports_transport_error() {
        let backend = backend();
        backend.set_offline(true);
        assert!(matches!(
            backend.fetch_calendar("d1"),
            Err(BackendError::Transport(_))
        ));
        backend.set_offline(false);
        assert!(backend.fetch_calendar("d1").is_ok());
    }
}

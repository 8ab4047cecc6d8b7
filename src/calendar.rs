//! Doctor calendar view model.
//!
//! `CalendarProjector` merges availability windows and appointments into one
//! ordered event list with a display style per event. `DoctorCalendar` is the
//! doctor's locally held snapshot; it is replaced wholesale after every fetch
//! and projects fresh events on each call.

use crate::error::DataError;
use crate::models::{Appointment, AppointmentStatus, AvailabilityWindow, Interval};
use crate::records::{decode_appointments, decode_windows, CalendarData};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::warn;

/// Display style of a calendar event, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventStyle {
    CanceledAppointment,
    ActiveAppointment,
    Availability,
}

impl EventStyle {
    pub const LEGEND: [EventStyle; 3] = [
        EventStyle::ActiveAppointment,
        EventStyle::Availability,
        EventStyle::CanceledAppointment,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EventStyle::CanceledAppointment => "canceled-appointment",
            EventStyle::ActiveAppointment => "appointment",
            EventStyle::Availability => "availability",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EventStyle::CanceledAppointment => "Canceled",
            EventStyle::ActiveAppointment => "Appointment",
            EventStyle::Availability => "Available Slot",
        }
    }

    pub fn legend_label(&self) -> &'static str {
        match self {
            EventStyle::CanceledAppointment => "Canceled Appointment",
            EventStyle::ActiveAppointment => "Appointment",
            EventStyle::Availability => "Available Slot",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            EventStyle::CanceledAppointment => "#6c757d",
            EventStyle::ActiveAppointment => "#dc3545",
            EventStyle::Availability => "#17a2b8",
        }
    }

    pub fn strikethrough(&self) -> bool {
        matches!(self, EventStyle::CanceledAppointment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    Availability(AvailabilityWindow),
    Appointment(Appointment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub source: EventSource,
    pub style: EventStyle,
}

impl CalendarEvent {
    pub fn id(&self) -> &str {
        match &self.source {
            EventSource::Availability(w) => &w.id,
            EventSource::Appointment(a) => &a.id,
        }
    }

    pub fn span(&self) -> Interval {
        match &self.source {
            EventSource::Availability(w) => w.span(),
            EventSource::Appointment(a) => a.span(),
        }
    }
}

/// What selecting an event on the calendar offers the doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    /// Canceled appointments are shown for history only.
    Locked,
    /// Started or elapsed appointment: nothing to do.
    NoAction,
    OfferCancel { appointment_id: String },
    OfferDelete { window_id: String },
}

/// Events plus the records that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<DataError>,
}

pub struct CalendarProjector;

impl CalendarProjector {
    pub fn style_for(source: &EventSource) -> EventStyle {
        match source {
            EventSource::Appointment(a) if a.status == AppointmentStatus::Canceled => {
                EventStyle::CanceledAppointment
            }
            EventSource::Appointment(_) => EventStyle::ActiveAppointment,
            EventSource::Availability(_) => EventStyle::Availability,
        }
    }

    /// Merge windows and appointments into chronological events.
    ///
    /// Events sharing a start are ordered by style precedence.
    pub fn project(windows: &[AvailabilityWindow], appointments: &[Appointment]) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = appointments
            .iter()
            .cloned()
            .map(EventSource::Appointment)
            .chain(windows.iter().cloned().map(EventSource::Availability))
            .map(|source| CalendarEvent {
                style: Self::style_for(&source),
                source,
            })
            .collect();

        events.sort_by(|a, b| {
            a.span()
                .start_at()
                .cmp(&b.span().start_at())
                .then(a.style.cmp(&b.style))
                .then(a.span().end.cmp(&b.span().end))
        });
        events
    }

    /// Decode raw calendar records and project them, skipping malformed ones.
    pub fn project_records(data: &CalendarData, doctor_id: &str) -> Projection {
        let windows = decode_windows(&data.availability, doctor_id);
        let appointments = decode_appointments(&data.appointments, doctor_id);

        let mut skipped = appointments.skipped;
        skipped.extend(windows.skipped);
        for err in &skipped {
            warn!(error = %err, "skipping calendar record");
        }

        Projection {
            events: Self::project(&windows.items, &appointments.items),
            skipped,
        }
    }

    pub fn action_for(event: &CalendarEvent, now: NaiveDateTime) -> EventAction {
        match &event.source {
            EventSource::Appointment(a) if a.status == AppointmentStatus::Canceled => EventAction::Locked,
            EventSource::Appointment(a) if a.span().start_at() < now => EventAction::NoAction,
            EventSource::Appointment(a) => EventAction::OfferCancel {
                appointment_id: a.id.clone(),
            },
            EventSource::Availability(w) => EventAction::OfferDelete {
                window_id: w.id.clone(),
            },
        }
    }
}

/// Snapshot of one doctor's availability and appointments.
#[derive(Debug, Clone)]
pub struct DoctorCalendar {
    pub doctor_id: String,
    windows: HashMap<String, AvailabilityWindow>,
    appointments: HashMap<String, Appointment>,
    skipped: Vec<DataError>,
}

impl DoctorCalendar {
    pub fn new(doctor_id: impl Into<String>) -> Self {
        DoctorCalendar {
            doctor_id: doctor_id.into(),
            windows: HashMap::new(),
            appointments: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Replace the snapshot with freshly fetched data.
    pub fn replace(&mut self, data: &CalendarData) {
        let windows = decode_windows(&data.availability, &self.doctor_id);
        let appointments = decode_appointments(&data.appointments, &self.doctor_id);

        self.windows = windows.items.into_iter().map(|w| (w.id.clone(), w)).collect();
        self.appointments = appointments.items.into_iter().map(|a| (a.id.clone(), a)).collect();

        self.skipped = appointments.skipped;
        self.skipped.extend(windows.skipped);
        for err in &self.skipped {
            warn!(doctor_id = %self.doctor_id, error = %err, "skipping calendar record");
        }
    }

    /// Records dropped by the last `replace`.
    pub fn skipped(&self) -> &[DataError] {
        &self.skipped
    }

    /// Get all availability windows sorted by start.
    pub fn windows(&self) -> Vec<AvailabilityWindow> {
        let mut windows: Vec<AvailabilityWindow> = self.windows.values().cloned().collect();
        windows.sort_by_key(|w| w.span());
        windows
    }

    /// Get all appointments, canceled ones included, sorted by time.
    pub fn appointments(&self) -> Vec<Appointment> {
        let mut appointments: Vec<Appointment> = self.appointments.values().cloned().collect();
        appointments.sort_by_key(|a| a.span());
        appointments
    }

    pub fn windows_on(&self, date: NaiveDate) -> Vec<AvailabilityWindow> {
        self.windows().into_iter().filter(|w| w.date == date).collect()
    }

    pub fn appointments_on(&self, date: NaiveDate) -> Vec<Appointment> {
        self.appointments().into_iter().filter(|a| a.date == date).collect()
    }

    pub fn window(&self, window_id: &str) -> Option<&AvailabilityWindow> {
        self.windows.get(window_id)
    }

    pub fn appointment(&self, appointment_id: &str) -> Option<&Appointment> {
        self.appointments.get(appointment_id)
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        CalendarProjector::project(&self.windows(), &self.appointments())
    }
}

impl std::fmt::Display for DoctorCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DoctorCalendar({}, windows={}, appointments={})",
            self.doctor_id,
            self.windows.len(),
            self.appointments.len()
        )
    }
}

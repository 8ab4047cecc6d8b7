//! Availability and appointment scheduling engine for a clinic portal.
//!
//! Doctors publish availability windows; patients book fixed-size units sliced
//! from those windows. The crate validates proposed windows and selections,
//! slices windows into bookable units, drives appointment cancellation, and
//! projects calendar events. Persistence lives behind [`backend::PortalBackend`].

pub mod backend;
pub mod calendar;
pub mod config;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod models;
pub mod records;
pub mod scheduler;
pub mod slicer;

pub use backend::{InMemoryBackend, PortalBackend};
pub use calendar::{CalendarEvent, CalendarProjector, DoctorCalendar, EventAction, EventStyle};
pub use config::PortalConfig;
pub use error::{BackendError, ConfigError, DataError, PortalError, ValidationError};
pub use guard::OverlapGuard;
pub use lifecycle::AppointmentStateMachine;
pub use models::{Appointment, AppointmentStatus, AvailabilityWindow, BookableUnit, Interval};
pub use scheduler::{PortalScheduler, Session};
pub use slicer::{AvailabilitySlicer, BookingBoard};

//! Slicing of availability windows into bookable units.
//!
//! A window is cut into consecutive units of a fixed duration, the last unit
//! clamped to the window end. Units whose range exactly matches an active
//! appointment are then removed.

use crate::error::ConfigError;
use crate::models::{Appointment, AvailabilityWindow, BookableUnit};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_SLOT_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilitySlicer {
    unit: Duration,
}

impl Default for AvailabilitySlicer {
    fn default() -> Self {
        AvailabilitySlicer {
            unit: Duration::minutes(DEFAULT_SLOT_MINUTES),
        }
    }
}

impl AvailabilitySlicer {
    pub fn new(unit_minutes: i64) -> Result<Self, ConfigError> {
        if unit_minutes <= 0 {
            return Err(ConfigError::NonPositiveSlot(unit_minutes));
        }
        let unit = Duration::try_minutes(unit_minutes).ok_or(ConfigError::SlotOutOfRange(unit_minutes))?;
        Ok(AvailabilitySlicer { unit })
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Cut a window into units without looking at bookings.
    ///
    /// An empty or inverted window yields nothing. A unit that would run past
    /// midnight is clamped to the window end like any other final unit.
    pub fn split(&self, window: &AvailabilityWindow) -> Vec<BookableUnit> {
        let mut units = Vec::new();
        let mut current = window.start;

        while current < window.end {
            let (next, wrapped) = current.overflowing_add_signed(self.unit);
            let unit_end = if wrapped != 0 || next >= window.end {
                window.end
            } else {
                next
            };

            units.push(BookableUnit::new(&window.id, window.date, current, unit_end));
            current = unit_end;
        }

        units
    }

    /// Units of `window` still open for booking.
    ///
    /// Only a booked appointment with the exact same range as a unit removes it;
    /// partial overlaps are ignored and canceled appointments never block.
    pub fn slice(&self, window: &AvailabilityWindow, booked: &[Appointment]) -> Vec<BookableUnit> {
        self.split(window)
            .into_iter()
            .filter(|unit| !is_booked(unit, booked))
            .collect()
    }

    /// Slice every published window of a doctor, grouped by date.
    pub fn slice_schedule(
        &self,
        availability: &BTreeMap<NaiveDate, Vec<AvailabilityWindow>>,
        booked: &BTreeMap<NaiveDate, Vec<Appointment>>,
    ) -> BookingBoard {
        let mut days = BTreeMap::new();

        for (date, windows) in availability {
            let booked_on_date = booked.get(date).map(Vec::as_slice).unwrap_or(&[]);

            let mut units: Vec<BookableUnit> = windows
                .iter()
                .flat_map(|window| self.slice(window, booked_on_date))
                .collect();
            units.sort_by_key(|u| (u.start, u.end));

            if !units.is_empty() {
                days.insert(*date, units);
            }
        }

        let board = BookingBoard { days };
        debug!(
            dates = board.days.len(),
            units = board.total_units(),
            "sliced booking board"
        );
        board
    }
}

fn is_booked(unit: &BookableUnit, booked: &[Appointment]) -> bool {
    booked.iter().any(|apt| {
        apt.is_active() && apt.date == unit.date && apt.start == unit.start && apt.end == unit.end
    })
}

/// Bookable units of one doctor, grouped by date in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingBoard {
    days: BTreeMap<NaiveDate, Vec<BookableUnit>>,
}

impl BookingBoard {
    /// True when there is nothing to offer; callers show "No available slots".
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.days.keys()
    }

    pub fn units_on(&self, date: NaiveDate) -> &[BookableUnit] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn units(&self) -> impl Iterator<Item = &BookableUnit> {
        self.days.values().flatten()
    }

    pub fn total_units(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn find(&self, unit_id: &str) -> Option<&BookableUnit> {
        self.units().find(|u| u.id == unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::NaiveTime;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 6).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(id: &str, start: NaiveTime, end: NaiveTime) -> AvailabilityWindow {
        AvailabilityWindow {
            id: id.to_string(),
            doctor_id: "d1".to_string(),
            date: day(),
            start,
            end,
        }
    }

    fn booking(start: NaiveTime, end: NaiveTime, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: format!("a-{}", start.format("%H%M")),
            doctor_id: "d1".to_string(),
            patient_id: "p1".to_string(),
            date: day(),
            start,
            end,
            status,
            patient: None,
        }
    }

    fn ranges(units: &[BookableUnit]) -> Vec<(NaiveTime, NaiveTime)> {
        units.iter().map(|u| (u.start, u.end)).collect()
    }

    #[test]
    fn rejects_non_positive_unit() {
        assert_eq!(AvailabilitySlicer::new(0), Err(ConfigError::NonPositiveSlot(0)));
        assert!(AvailabilitySlicer::new(-15).is_err());
        assert_eq!(
            AvailabilitySlicer::new(i64::MAX),
            Err(ConfigError::SlotOutOfRange(i64::MAX))
        );
        assert_eq!(AvailabilitySlicer::default().unit(), Duration::minutes(60));
    }

    #[test]
    fn last_unit_is_clamped() {
        let slicer = AvailabilitySlicer::default();
        let units = slicer.split(&window("w1", at(9, 0), at(11, 30)));
        assert_eq!(
            ranges(&units),
            vec![(at(9, 0), at(10, 0)), (at(10, 0), at(11, 0)), (at(11, 0), at(11, 30))]
        );
        assert_eq!(units[2].id, "w1-11:00");
    }

    #[test]
    fn units_tile_the_window_for_various_sizes() {
        let w = window("w1", at(8, 10), at(12, 55));
        let total = (w.end - w.start).num_minutes();

        for minutes in [1, 7, 15, 30, 45, 60, 90, 240, 600] {
            let slicer = AvailabilitySlicer::new(minutes).unwrap();
            let units = slicer.split(&w);

            let expected = (total + minutes - 1) / minutes;
            assert_eq!(units.len() as i64, expected, "unit size {minutes}");
            assert_eq!(units.first().map(|u| u.start), Some(w.start));
            assert_eq!(units.last().map(|u| u.end), Some(w.end));
            for pair in units.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
                assert!(!pair[0].span().overlaps(&pair[1].span()));
            }
            for unit in &units {
                assert!(unit.end - unit.start <= Duration::minutes(minutes));
            }
        }
    }

    #[test]
    fn empty_window_yields_nothing() {
        let slicer = AvailabilitySlicer::default();
        assert!(slicer.split(&window("w1", at(9, 0), at(9, 0))).is_empty());
        assert!(slicer.split(&window("w1", at(10, 0), at(9, 0))).is_empty());
    }

    #[test]
    fn unit_crossing_midnight_is_clamped() {
        let slicer = AvailabilitySlicer::new(90).unwrap();
        let end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        let units = slicer.split(&window("w1", at(22, 0), end));
        assert_eq!(ranges(&units), vec![(at(22, 0), at(23, 30)), (at(23, 30), end)]);
    }

    #[test]
    fn exact_booking_removes_unit() {
        let slicer = AvailabilitySlicer::default();
        let booked = vec![booking(at(9, 0), at(10, 0), AppointmentStatus::Pending)];
        let units = slicer.slice(&window("w1", at(9, 0), at(11, 0)), &booked);
        assert_eq!(ranges(&units), vec![(at(10, 0), at(11, 0))]);
    }

    #[test]
    fn partial_overlap_does_not_remove_unit() {
        let slicer = AvailabilitySlicer::default();
        let booked = vec![booking(at(9, 30), at(10, 30), AppointmentStatus::Pending)];
        let units = slicer.slice(&window("w1", at(9, 0), at(11, 0)), &booked);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn canceled_booking_does_not_block() {
        let slicer = AvailabilitySlicer::default();
        let booked = vec![booking(at(9, 0), at(10, 0), AppointmentStatus::Canceled)];
        let units = slicer.slice(&window("w1", at(9, 0), at(11, 0)), &booked);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn schedule_groups_by_date_and_drops_full_days() {
        let slicer = AvailabilitySlicer::default();
        let next = day().succ_opt().unwrap();

        let mut full = window("w2", at(14, 0), at(15, 0));
        full.date = next;
        let mut taken = booking(at(14, 0), at(15, 0), AppointmentStatus::Pending);
        taken.date = next;

        let mut availability = BTreeMap::new();
        availability.insert(
            day(),
            vec![window("w3", at(13, 0), at(14, 0)), window("w1", at(9, 0), at(10, 0))],
        );
        availability.insert(next, vec![full]);

        let mut booked = BTreeMap::new();
        booked.insert(next, vec![taken]);

        let board = slicer.slice_schedule(&availability, &booked);
        assert_eq!(board.dates().copied().collect::<Vec<_>>(), vec![day()]);
        assert_eq!(
            ranges(board.units_on(day())),
            vec![(at(9, 0), at(10, 0)), (at(13, 0), at(14, 0))]
        );
        assert!(board.units_on(next).is_empty());
        assert_eq!(board.find("w3-13:00").map(|u| u.start), Some(at(13, 0)));
        assert_eq!(board.total_units(), 2);
    }

    #[test]
    fn fully_booked_schedule_is_empty() {
        let slicer = AvailabilitySlicer::default();
        let mut availability = BTreeMap::new();
        availability.insert(day(), vec![window("w1", at(9, 0), at(10, 0))]);
        let mut booked = BTreeMap::new();
        booked.insert(day(), vec![booking(at(9, 0), at(10, 0), AppointmentStatus::Pending)]);

        let board = slicer.slice_schedule(&availability, &booked);
        assert!(board.is_empty());
        assert_eq!(board.total_units(), 0);
    }
}

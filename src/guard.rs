//! Pre-submission checks for new availability and slot selections.
//!
//! These are advisory: the backend re-validates every write.

use crate::error::ValidationError;
use crate::models::{AvailabilityWindow, BookableUnit, Interval};
use chrono::NaiveDateTime;

pub struct OverlapGuard;

impl OverlapGuard {
    /// Validate a window a doctor wants to publish.
    ///
    /// Checked in order: past boundary, empty range, overlap with any existing
    /// window on the same date.
    pub fn validate_new_availability(
        proposed: &Interval,
        existing: &[AvailabilityWindow],
        now: NaiveDateTime,
    ) -> Result<(), ValidationError> {
        if proposed.is_past(now) {
            return Err(ValidationError::PastWindow);
        }
        if proposed.is_empty() {
            return Err(ValidationError::InvalidRange);
        }

        if let Some(window) = existing.iter().find(|w| proposed.overlaps(&w.span())) {
            return Err(ValidationError::Overlap {
                existing_id: window.id.clone(),
            });
        }

        Ok(())
    }

    /// Validate a unit a patient picked before a booking is submitted.
    pub fn validate_slot_selection(
        slot: &BookableUnit,
        now: NaiveDateTime,
    ) -> Result<(), ValidationError> {
        if slot.span().is_past(now) {
            return Err(ValidationError::PastSlot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn early_morning() -> NaiveDateTime {
        day().and_time(at(6, 0))
    }

    fn proposed(start: NaiveTime, end: NaiveTime) -> Interval {
        Interval { date: day(), start, end }
    }

    fn existing() -> Vec<AvailabilityWindow> {
        vec![AvailabilityWindow {
            id: "w1".to_string(),
            doctor_id: "d1".to_string(),
            date: day(),
            start: at(10, 0),
            end: at(11, 0),
        }]
    }

    fn overlap() -> Result<(), ValidationError> {
        Err(ValidationError::Overlap {
            existing_id: "w1".to_string(),
        })
    }

    #[test]
    fn rejects_all_overlap_configurations() {
        let cases = [
            proposed(at(10, 15), at(10, 45)), // nested
            proposed(at(9, 0), at(12, 0)),    // enclosing
            proposed(at(9, 0), at(10, 30)),   // left partial
            proposed(at(10, 30), at(11, 30)), // right partial
            proposed(at(10, 0), at(11, 0)),   // identical
        ];
        for case in &cases {
            assert_eq!(
                OverlapGuard::validate_new_availability(case, &existing(), early_morning()),
                overlap(),
                "{case}"
            );
        }
    }

    #[test]
    fn accepts_adjacent_windows() {
        for case in [proposed(at(9, 0), at(10, 0)), proposed(at(11, 0), at(12, 0))] {
            assert_eq!(
                OverlapGuard::validate_new_availability(&case, &existing(), early_morning()),
                Ok(())
            );
        }
    }

    #[test]
    fn ignores_windows_on_other_dates() {
        let mut other = proposed(at(10, 0), at(11, 0));
        other.date = day().succ_opt().unwrap();
        assert_eq!(
            OverlapGuard::validate_new_availability(&other, &existing(), early_morning()),
            Ok(())
        );
    }

    #[test]
    fn past_start_rejected_regardless_of_end() {
        let now = day().and_time(at(9, 30));
        let window = proposed(at(9, 0), at(18, 0));
        assert_eq!(
            OverlapGuard::validate_new_availability(&window, &[], now),
            Err(ValidationError::PastWindow)
        );

        let inverted = proposed(at(9, 0), at(8, 0));
        assert_eq!(
            OverlapGuard::validate_new_availability(&inverted, &[], now),
            Err(ValidationError::PastWindow)
        );
    }

    #[test]
    fn empty_window_rejected() {
        let window = proposed(at(12, 0), at(12, 0));
        assert_eq!(
            OverlapGuard::validate_new_availability(&window, &[], early_morning()),
            Err(ValidationError::InvalidRange)
        );
    }

    #[test]
    fn slot_selection_rejects_started_slot() {
        let unit = BookableUnit::new("w1", day(), at(10, 0), at(11, 0));
        assert_eq!(OverlapGuard::validate_slot_selection(&unit, early_morning()), Ok(()));
        assert_eq!(
            OverlapGuard::validate_slot_selection(&unit, day().and_time(at(10, 0))),
            Ok(())
        );
        assert_eq!(
            OverlapGuard::validate_slot_selection(&unit, day().and_time(at(10, 1))),
            Err(ValidationError::PastSlot)
        );
    }
}

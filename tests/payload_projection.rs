use chrono::{NaiveDate, NaiveTime};
use clinic_slots::records::{decode_calendar, decode_doctor_availability};
use clinic_slots::{AvailabilitySlicer, CalendarProjector, EventAction, EventStyle};

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn calendar_payload_projects_and_skips_bad_records() {
    let json = r#"{
        "appointments": [
            {"id": 1, "patient_id": 4, "date": "2031-05-02", "start_time": "10:00:00",
             "end_time": "11:00:00", "status": "canceled"},
            {"id": 2, "patient_id": 4, "date": "2031-05-02", "start_time": "09:00:00",
             "end_time": "10:00:00", "status": "pending"},
            {"id": 3, "patient_id": 4, "date": "not-a-date", "start_time": "09:00:00",
             "end_time": "10:00:00", "status": "pending"}
        ],
        "availability": [
            {"id": "w1", "date": "2031-05-02", "start_time": "09:00:00", "end_time": "12:00:00"}
        ]
    }"#;

    let data = decode_calendar(json).unwrap();
    let projection = CalendarProjector::project_records(&data, "d1");

    assert_eq!(projection.skipped.len(), 1);
    assert_eq!(projection.skipped[0].record_id.as_deref(), Some("3"));

    let styles: Vec<_> = projection.events.iter().map(|e| e.style).collect();
    assert_eq!(
        styles,
        vec![
            EventStyle::ActiveAppointment,
            EventStyle::Availability,
            EventStyle::CanceledAppointment,
        ]
    );

    let now = NaiveDate::from_ymd_opt(2031, 5, 1).unwrap().and_time(at(8, 0));
    let actions: Vec<_> = projection
        .events
        .iter()
        .map(|e| CalendarProjector::action_for(e, now))
        .collect();
    assert_eq!(
        actions,
        vec![
            EventAction::OfferCancel {
                appointment_id: "2".to_string()
            },
            EventAction::OfferDelete {
                window_id: "w1".to_string()
            },
            EventAction::Locked,
        ]
    );
}

#[test]
fn doctor_availability_payload_slices_into_board() {
    let json = r#"{
        "availability": {
            "2031-05-02": [
                {"id": 10, "date": "2031-05-02", "start_time": "09:00:00", "end_time": "11:30:00"}
            ],
            "2031-05-03": [
                {"id": 11, "date": "2031-05-03", "start_time": "14:00:00", "end_time": "15:00:00"}
            ]
        },
        "bookedAppointments": {
            "2031-05-03": [
                {"id": 20, "patient_id": 4, "date": "2031-05-03", "start_time": "14:00:00",
                 "end_time": "15:00:00", "status": "pending"}
            ]
        },
        "doctor": {"id": "d1", "name": "Dr. Smith"}
    }"#;

    let schedule = decode_doctor_availability(json).unwrap().decode();
    let board = AvailabilitySlicer::default().slice_schedule(&schedule.availability, &schedule.booked);

    let first = NaiveDate::from_ymd_opt(2031, 5, 2).unwrap();
    assert_eq!(board.dates().copied().collect::<Vec<_>>(), vec![first]);
    let spans: Vec<_> = board.units_on(first).iter().map(|u| (u.start, u.end)).collect();
    assert_eq!(
        spans,
        vec![
            (at(9, 0), at(10, 0)),
            (at(10, 0), at(11, 0)),
            (at(11, 0), at(11, 30)),
        ]
    );
    assert!(board.find("10-11:00").is_some());
}

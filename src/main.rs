//! Command-line interface for the clinic scheduling engine.
//!
//! Provides an interactive menu for publishing doctor availability, booking
//! and canceling appointments, and viewing the doctor calendar, backed by the
//! in-memory store.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clinic_slots::calendar::{CalendarProjector, EventAction, EventSource, EventStyle};
use clinic_slots::models::{Interval, PatientContact};
use clinic_slots::{
    AvailabilitySlicer, InMemoryBackend, PortalConfig, PortalError, PortalScheduler, Session, ValidationError,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

struct ClinicCLI {
    scheduler: PortalScheduler<InMemoryBackend>,
    doctor: Option<Session>,
    patient: Option<Session>,
    running: bool,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn short_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

impl ClinicCLI {
    fn new(slicer: AvailabilitySlicer) -> Self {
        ClinicCLI {
            scheduler: PortalScheduler::new(InMemoryBackend::new(), slicer),
            doctor: None,
            patient: None,
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       CLINIC APPOINTMENT PORTAL");
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!("1. Register doctor and patient");
        println!("2. Add availability (doctor)");
        println!("3. View calendar (doctor)");
        println!("4. Delete availability (doctor)");
        println!("5. Cancel appointment (doctor)");
        println!("6. View available slots (patient)");
        println!("7. Book appointment (patient)");
        println!("8. My appointments (patient)");
        println!("9. Run demo");
        println!("10. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => {
                println!("\nGoodbye!");
                std::process::exit(0);
            }
            Ok(_) => {}
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i32>) -> i32 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<i32>() {
                return value;
            }
            println!("Please enter a valid number");
        }
    }

    fn get_date_input(&self, prompt: &str) -> NaiveDate {
        let tomorrow = (Local::now() + Duration::days(1)).date_naive();
        let default = tomorrow.format("%Y-%m-%d").to_string();
        loop {
            let input = self.get_input(prompt, Some(&default));
            if let Ok(date) = NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
                return date;
            }
            println!("Please enter a date as YYYY-MM-DD");
        }
    }

    fn get_time_input(&self, prompt: &str, default: &str) -> NaiveTime {
        loop {
            let input = self.get_input(prompt, Some(default));
            if let Ok(time) = NaiveTime::parse_from_str(&input, "%H:%M") {
                return time;
            }
            println!("Please enter a time as HH:MM");
        }
    }

    fn report(&self, err: &PortalError) {
        println!("\nError: {}", err.message());
        if err.requires_refresh() {
            println!("The data was out of date and has been refreshed.");
        }
    }

    fn register_users(&mut self) {
        println!("\n--- Register Doctor and Patient ---");

        let doctor_name = self.get_input("Doctor name", Some("Dr. Smith"));
        let patient_name = self.get_input("Patient name", Some("John Smith"));
        let patient_email = self.get_input("Patient email", Some("john@email.com"));
        let patient_phone = self.get_input("Patient phone", Some("555-0100"));

        let doctor_id = short_id();
        let patient_id = short_id();
        let contact = PatientContact {
            name: patient_name.clone(),
            email: Some(patient_email),
            phone_no: Some(patient_phone),
        };

        let backend = self.scheduler.backend();
        let result = backend
            .register_doctor(&doctor_id, &doctor_name)
            .and_then(|_| backend.register_patient(&patient_id, contact));
        match result {
            Ok(()) => {
                println!("\nRegistered {} (id {})", doctor_name, doctor_id);
                println!("Registered {} (id {})", patient_name, patient_id);
                self.doctor = Some(Session::doctor(doctor_id));
                self.patient = Some(Session::patient(patient_id));
            }
            Err(e) => println!("Error registering users: {}", e),
        }
    }

    fn require_doctor(&self) -> Option<Session> {
        if self.doctor.is_none() {
            println!("\nPlease register users first (option 1)");
        }
        self.doctor.clone()
    }

    fn require_patient(&self) -> Option<Session> {
        if self.patient.is_none() {
            println!("\nPlease register users first (option 1)");
        }
        self.patient.clone()
    }

    fn add_availability(&mut self) {
        let Some(doctor) = self.require_doctor() else { return };

        println!("\n--- Add Availability ---");
        let date = self.get_date_input("Date");
        let start = self.get_time_input("Start time", "09:00");
        let end = self.get_time_input("End time", "12:00");

        let proposed = Interval { date, start, end };
        match self.scheduler.add_availability(&doctor, proposed, now()) {
            Ok(windows) => {
                for window in windows {
                    println!("\nAvailability added: {}", window.span());
                }
            }
            Err(e) => self.report(&e),
        }
    }

    fn view_calendar(&mut self) {
        let Some(doctor) = self.require_doctor() else { return };

        if let Err(e) = self.scheduler.load_calendar(&doctor).map(|_| ()) {
            self.report(&e);
            return;
        }

        println!("\nLegend:");
        for style in EventStyle::LEGEND {
            println!("  [{}] {}", style.color(), style.legend_label());
        }

        let events = self.scheduler.calendar_events();
        if events.is_empty() {
            println!("\nNothing on the calendar");
            return;
        }

        let mut current_date = None;
        for event in &events {
            let span = event.span();
            if Some(span.date) != current_date {
                current_date = Some(span.date);
                println!("\n{}:", span.date.format("%A, %Y-%m-%d"));
            }

            let detail = match &event.source {
                EventSource::Appointment(apt) => apt
                    .patient
                    .as_ref()
                    .map(|p| format!(" - {}", p.name))
                    .unwrap_or_default(),
                EventSource::Availability(_) => String::new(),
            };
            let title = if event.style.strikethrough() {
                format!("~{}~", event.style.title())
            } else {
                event.style.title().to_string()
            };
            println!(
                "  {} - {} {}{}",
                span.start.format("%H:%M"),
                span.end.format("%H:%M"),
                title,
                detail
            );
        }
    }

    fn delete_availability(&mut self) {
        let Some(doctor) = self.require_doctor() else { return };

        if let Err(e) = self.scheduler.load_calendar(&doctor).map(|_| ()) {
            self.report(&e);
            return;
        }
        let windows = self
            .scheduler
            .calendar()
            .map(|c| c.windows())
            .unwrap_or_default();
        if windows.is_empty() {
            println!("\nNo availability to delete");
            return;
        }

        println!("\n--- Delete Availability ---");
        for (i, window) in windows.iter().enumerate() {
            println!("  {}. {}", i + 1, window.span());
        }

        let choice = self.get_int_input("Select availability to delete (0 to go back)", Some(0));
        if choice <= 0 || choice as usize > windows.len() {
            return;
        }

        let window = &windows[choice as usize - 1];
        match self.scheduler.delete_availability(&doctor, &window.id) {
            Ok(()) => println!("\nThe availability slot has been deleted."),
            Err(e) => self.report(&e),
        }
    }

    fn cancel_appointment(&mut self) {
        let Some(doctor) = self.require_doctor() else { return };

        if let Err(e) = self.scheduler.load_calendar(&doctor).map(|_| ()) {
            self.report(&e);
            return;
        }

        let current = now();
        let cancellable: Vec<_> = self
            .scheduler
            .calendar_events()
            .into_iter()
            .filter_map(|event| match CalendarProjector::action_for(&event, current) {
                EventAction::OfferCancel { appointment_id } => Some((appointment_id, event)),
                _ => None,
            })
            .collect();

        if cancellable.is_empty() {
            println!("\nNo appointments to cancel");
            return;
        }

        println!("\n--- Cancel Appointment ---");
        for (i, (_, event)) in cancellable.iter().enumerate() {
            println!("  {}. {}", i + 1, event.span());
        }

        let choice = self.get_int_input("Select appointment to cancel (0 to go back)", Some(0));
        if choice <= 0 || choice as usize > cancellable.len() {
            return;
        }

        let (appointment_id, _) = &cancellable[choice as usize - 1];
        match self.scheduler.cancel_appointment(&doctor, appointment_id, now()) {
            Ok(apt) => {
                println!("\nThe appointment has been canceled.");
                println!("{} is now available again", apt.span());
            }
            Err(e) => self.report(&e),
        }
    }

    fn load_board(&mut self) -> bool {
        let Some(doctor) = self.require_doctor() else { return false };
        if let Err(e) = self.scheduler.load_booking_board(&doctor.user_id).map(|_| ()) {
            self.report(&e);
            return false;
        }
        true
    }

    fn view_available_slots(&mut self) {
        if !self.load_board() {
            return;
        }
        let Some(loaded) = self.scheduler.board() else { return };

        println!("\n--- Book an Appointment with {} ---", loaded.doctor.name);
        if loaded.board.is_empty() {
            println!("\nNo available slots");
            return;
        }

        for date in loaded.board.dates() {
            println!("\n{}:", date.format("%A, %Y-%m-%d"));
            for unit in loaded.board.units_on(*date) {
                println!(
                    "  {} - {}  ({})",
                    unit.start.format("%H:%M"),
                    unit.end.format("%H:%M"),
                    unit.id
                );
            }
        }
    }

    fn book_appointment(&mut self) {
        let Some(patient) = self.require_patient() else { return };
        if !self.load_board() {
            return;
        }

        let units: Vec<_> = self
            .scheduler
            .board()
            .map(|b| b.board.units().cloned().collect())
            .unwrap_or_default();
        if units.is_empty() {
            println!("\nNo available slots");
            return;
        }

        println!("\n--- Book Appointment ---");
        for (i, unit) in units.iter().enumerate() {
            println!("  {}. {}", i + 1, unit.span());
        }

        let choice = self.get_int_input("Select a time slot (0 to go back)", Some(0));
        if choice <= 0 || choice as usize > units.len() {
            return;
        }

        let unit = &units[choice as usize - 1];
        match self.scheduler.book(&patient, &unit.id, now()) {
            Ok(apt) => println!("\nYour appointment has been booked for {}", apt.span()),
            Err(e) => self.report(&e),
        }
    }

    fn view_patient_appointments(&mut self) {
        let Some(patient) = self.require_patient() else { return };

        match self.scheduler.patient_appointments(&patient) {
            Ok(decoded) if decoded.items.is_empty() => println!("\nNo appointments found."),
            Ok(decoded) => {
                println!("\n--- My Appointments ({}) ---", decoded.items.len());
                for apt in &decoded.items {
                    println!("  {}  {}", apt.span(), apt.status.as_str());
                }
            }
            Err(e) => self.report(&e),
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo ---");

        let backend = InMemoryBackend::new();
        let setup = backend.register_doctor("demo-doctor", "Dr. Demo").and_then(|_| {
            backend.register_patient(
                "demo-patient",
                PatientContact {
                    name: "Jane Doe".to_string(),
                    email: Some("jane@email.com".to_string()),
                    phone_no: None,
                },
            )
        });
        if let Err(e) = setup {
            println!("Error preparing demo: {}", e);
            return;
        }

        let mut scheduler = PortalScheduler::new(backend, AvailabilitySlicer::default());
        let tomorrow = (Local::now() + Duration::days(1)).date_naive();

        if let Err(e) = demo_scenario(&mut scheduler, tomorrow) {
            self.report(&e);
        }
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(9));

            match choice {
                1 => self.register_users(),
                2 => self.add_availability(),
                3 => self.view_calendar(),
                4 => self.delete_availability(),
                5 => self.cancel_appointment(),
                6 => self.view_available_slots(),
                7 => self.book_appointment(),
                8 => self.view_patient_appointments(),
                9 => self.run_demo(),
                10 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

fn print_units(scheduler: &PortalScheduler<InMemoryBackend>) {
    let units: Vec<String> = scheduler
        .board()
        .map(|b| b.board.units().map(|u| u.span().to_string()).collect())
        .unwrap_or_default();
    println!("  Bookable: [{}]", units.join(", "));
}

/// Publish, book, cancel and re-slice one window.
fn demo_scenario(
    scheduler: &mut PortalScheduler<InMemoryBackend>,
    date: NaiveDate,
) -> Result<(), PortalError> {
    let doctor = Session::doctor("demo-doctor");
    let patient = Session::patient("demo-patient");
    let hm = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0).ok_or(ValidationError::InvalidRange);

    let window = Interval::new(date, hm(9, 0)?, hm(11, 0)?)?;
    scheduler.add_availability(&doctor, window, now())?;
    println!("Doctor published {}", window);

    let overlapping = Interval::new(date, hm(10, 30)?, hm(12, 0)?)?;
    if let Err(e) = scheduler.add_availability(&doctor, overlapping, now()) {
        println!("Doctor proposed {}: {}", overlapping, e);
    }

    scheduler.load_booking_board("demo-doctor")?;
    print_units(scheduler);

    let first = scheduler
        .board()
        .and_then(|b| b.board.units().next())
        .map(|u| u.id.clone())
        .unwrap_or_default();
    let apt = scheduler.book(&patient, &first, now())?;
    println!("Jane Doe booked {}", apt.span());
    print_units(scheduler);

    scheduler.cancel_appointment(&doctor, &apt.id, now())?;
    println!("Doctor canceled {}", apt.span());
    scheduler.load_booking_board("demo-doctor")?;
    print_units(scheduler);
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(&config.log_filter);

    let slicer = match config.slicer() {
        Ok(slicer) => slicer,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let mut cli = ClinicCLI::new(slicer);
    cli.run();
}

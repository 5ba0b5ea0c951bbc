// 🔎 Derived Views - read-only lookups across collections
//
// Patients are linked to records and appointments by name, so every join
// below is a string comparison on the patient name.

use crate::entities::{slot_times, Appointment, ClinicalRecord, Patient};
use crate::finance::{summarize, FinanceSummary};
use crate::store::ClinicStore;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// Number of upcoming sessions listed on the dashboard
pub const DASHBOARD_UPCOMING: usize = 4;

// ============================================================================
// PATIENTS & RECORDS
// ============================================================================

/// Records written for `patient_name`, in store order (newest first)
pub fn records_for_patient<'a>(
    records: &'a [ClinicalRecord],
    patient_name: &str,
) -> Vec<&'a ClinicalRecord> {
    records.iter().filter(|r| r.patient == patient_name).collect()
}

/// Case-insensitive substring match on the patient name
pub fn search_patients<'a>(patients: &'a [Patient], term: &str) -> Vec<&'a Patient> {
    let needle = term.trim().to_lowercase();
    patients
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect()
}

/// Like `search_patients`, but also matches the pathology
pub fn search_patients_clinical<'a>(patients: &'a [Patient], term: &str) -> Vec<&'a Patient> {
    let needle = term.trim().to_lowercase();
    patients
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle) || p.pathology.to_lowercase().contains(&needle)
        })
        .collect()
}

// ============================================================================
// AGENDA
// ============================================================================

/// The appointment booked at `date` `time`, if any.
///
/// When a slot was double-booked the first one in store order wins.
pub fn appointment_at<'a>(
    appointments: &'a [Appointment],
    date: NaiveDate,
    time: NaiveTime,
) -> Option<&'a Appointment> {
    appointments
        .iter()
        .find(|a| a.date == date && a.time == time)
}

/// All appointments on `date`, ordered by time
pub fn appointments_on(appointments: &[Appointment], date: NaiveDate) -> Vec<&Appointment> {
    let mut day: Vec<&Appointment> = appointments.iter().filter(|a| a.date == date).collect();
    day.sort_by_key(|a| a.time);
    day
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot<'a> {
    #[serde(serialize_with = "serialize_hhmm")]
    pub time: NaiveTime,
    pub appointment: Option<&'a Appointment>,
}

fn serialize_hhmm<S: serde::Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&time.format("%H:%M").to_string())
}

/// The fixed slot grid for `date`, each slot paired with its booking
pub fn day_schedule(appointments: &[Appointment], date: NaiveDate) -> Vec<Slot<'_>> {
    slot_times()
        .into_iter()
        .map(|time| Slot {
            time,
            appointment: appointment_at(appointments, date, time),
        })
        .collect()
}

/// Appointments on or after `from`, ordered by (date, time), at most `limit`
pub fn upcoming(appointments: &[Appointment], from: NaiveDate, limit: usize) -> Vec<&Appointment> {
    let mut next: Vec<&Appointment> = appointments.iter().filter(|a| a.date >= from).collect();
    next.sort_by_key(|a| (a.date, a.time));
    next.truncate(limit);
    next
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary<'a> {
    pub active_patients: usize,
    pub scheduled_sessions: usize,
    pub sessions_today: usize,
    pub total_records: usize,
    pub finance: FinanceSummary,
    pub upcoming: Vec<&'a Appointment>,
}

pub fn dashboard(store: &ClinicStore, today: NaiveDate) -> DashboardSummary<'_> {
    DashboardSummary {
        active_patients: store.patients().iter().filter(|p| p.is_active()).count(),
        scheduled_sessions: store.appointments().len(),
        sessions_today: store.appointments().iter().filter(|a| a.date == today).count(),
        total_records: store.records().len(),
        finance: summarize(store.transactions()),
        upcoming: upcoming(store.appointments(), today, DASHBOARD_UPCOMING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        parse_time, AppointmentStatus, NewAppointment, NewPatient, PatientPatch, PatientStatus,
        SessionType,
    };
    use crate::storage::KvStorage;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn book(store: &mut ClinicStore, date: NaiveDate, time: &str, patient: &str) -> Appointment {
        store
            .add_appointment(NewAppointment {
                date,
                time: parse_time(time).unwrap(),
                patient: patient.to_string(),
                session_type: SessionType::Progress,
                status: AppointmentStatus::Pending,
            })
            .unwrap()
    }

    fn store() -> ClinicStore {
        ClinicStore::load(KvStorage::open_in_memory().unwrap(), day(4)).unwrap()
    }

    #[test]
    fn test_records_linked_by_name() {
        let store = store();
        assert_eq!(records_for_patient(store.records(), "Ana Silva").len(), 1);
        assert!(records_for_patient(store.records(), "Carlos Mendes").is_empty());
        assert!(records_for_patient(store.records(), "ana silva").is_empty());
    }

    #[test]
    fn test_patient_search() {
        let store = store();

        assert_eq!(search_patients(store.patients(), "ANA").len(), 1);
        assert_eq!(search_patients(store.patients(), "").len(), 2);
        assert!(search_patients(store.patients(), "lomb").is_empty());

        let found = search_patients_clinical(store.patients(), "lomb");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ana Silva");
    }

    #[test]
    fn test_slot_lookup_is_keyed_by_date() {
        let mut store = store();
        book(&mut store, day(5), "09:00", "Carlos Mendes");

        let nine = parse_time("09:00").unwrap();
        assert_eq!(
            appointment_at(store.appointments(), day(4), nine).unwrap().patient,
            "Ana Silva"
        );
        assert_eq!(
            appointment_at(store.appointments(), day(5), nine).unwrap().patient,
            "Carlos Mendes"
        );
        assert!(appointment_at(store.appointments(), day(6), nine).is_none());
    }

    #[test]
    fn test_day_schedule_grid() {
        let mut store = store();
        book(&mut store, day(4), "16:00", "Carlos Mendes");

        let grid = day_schedule(store.appointments(), day(4));
        assert_eq!(grid.len(), 10);
        let booked: Vec<String> = grid
            .iter()
            .filter(|s| s.appointment.is_some())
            .map(|s| s.time.format("%H:%M").to_string())
            .collect();
        assert_eq!(booked, vec!["09:00", "16:00"]);
    }

    #[test]
    fn test_appointments_on_sorted_by_time() {
        let mut store = store();
        book(&mut store, day(4), "17:00", "Carlos Mendes");
        book(&mut store, day(4), "08:00", "Carlos Mendes");

        let times: Vec<String> = appointments_on(store.appointments(), day(4))
            .iter()
            .map(|a| a.time_label())
            .collect();
        assert_eq!(times, vec!["08:00", "09:00", "17:00"]);
    }

    #[test]
    fn test_upcoming_skips_past_and_limits() {
        let mut store = store();
        book(&mut store, day(1), "08:00", "Carlos Mendes");
        for time in ["10:00", "11:00", "13:00", "14:00"] {
            book(&mut store, day(5), time, "Carlos Mendes");
        }

        let next = upcoming(store.appointments(), day(4), DASHBOARD_UPCOMING);
        assert_eq!(next.len(), 4);
        assert_eq!(next[0].date, day(4));
        assert!(next.iter().all(|a| a.date >= day(4)));
    }

    #[test]
    fn test_dashboard_counts() {
        let mut store = store();
        store
            .update_patient(
                "2",
                PatientPatch {
                    status: Some(PatientStatus::Inactive),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .add_patient(NewPatient {
                name: "Joana Lima".to_string(),
                age: 0,
                phone: String::new(),
                status: PatientStatus::Active,
                last_visit: day(4),
                pathology: String::new(),
            })
            .unwrap();

        let summary = dashboard(&store, day(4));
        assert_eq!(summary.active_patients, 2);
        assert_eq!(summary.scheduled_sessions, 1);
        assert_eq!(summary.sessions_today, 1);
        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.finance.balance, -2350.0);
        assert_eq!(summary.upcoming.len(), 1);
    }
}

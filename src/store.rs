// 🗂️ Clinic Store - in-memory collections mirrored to local storage
//
// Every mutation rewrites the whole affected collection under its key.
// Nothing is cached between the in-memory Vec and the stored document.

use crate::entities::{
    parse_time, Appointment, AppointmentPatch, AppointmentStatus, ClinicalRecord, Direction,
    NewAppointment, NewPatient, NewRecord, NewTransaction, Patient, PatientPatch, PatientStatus,
    PaymentMethod, RecordKind, RecordPatch, SessionType, Transaction, TransactionPatch,
};
use crate::storage::{
    KvStorage, KEY_APPOINTMENTS, KEY_PATIENTS, KEY_RECORDS, KEY_TRANSACTIONS,
};
use anyhow::Result;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No entity of `kind` with this id
    NotFound { kind: &'static str, id: String },
    /// Another patient already uses this name
    DuplicatePatientName(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { kind, id } => write!(f, "{} '{}' not found", kind, id),
            StoreError::DuplicatePatientName(name) => {
                write!(f, "a patient named '{}' already exists", name)
            }
        }
    }
}

impl std::error::Error for StoreError {}

fn not_found(kind: &'static str, id: &str) -> anyhow::Error {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
    .into()
}

// ============================================================================
// SEED DATA
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn seed_patients() -> Vec<Patient> {
    vec![
        Patient {
            id: "1".to_string(),
            name: "Ana Silva".to_string(),
            age: 34,
            phone: "(11) 98765-4321".to_string(),
            status: PatientStatus::Active,
            last_visit: date(2023, 10, 10),
            pathology: "Lombalgia".to_string(),
        },
        Patient {
            id: "2".to_string(),
            name: "Carlos Mendes".to_string(),
            age: 45,
            phone: "(11) 91234-5678".to_string(),
            status: PatientStatus::Active,
            last_visit: date(2023, 10, 11),
            pathology: "Pós-operatório LCA".to_string(),
        },
    ]
}

fn seed_records() -> Vec<ClinicalRecord> {
    vec![ClinicalRecord {
        id: "1".to_string(),
        patient: "Ana Silva".to_string(),
        date: date(2023, 10, 12),
        kind: RecordKind::Progress,
        author: "Dr. Gerson Bruno".to_string(),
        summary: "Paciente relata melhora de 50% na dor lombar.".to_string(),
        assessment: None,
    }]
}

fn seed_transactions() -> Vec<Transaction> {
    vec![
        Transaction {
            id: "1".to_string(),
            description: "Sessão - Ana Silva".to_string(),
            category: "Receita".to_string(),
            amount: 150.0,
            date: date(2023, 10, 12),
            method: PaymentMethod::Pix,
            direction: Direction::Inflow,
        },
        Transaction {
            id: "2".to_string(),
            description: "Aluguel Clínica".to_string(),
            category: "Despesa Fixa".to_string(),
            amount: 2500.0,
            date: date(2023, 10, 10),
            method: PaymentMethod::Boleto,
            direction: Direction::Outflow,
        },
    ]
}

fn seed_appointments(today: NaiveDate) -> Vec<Appointment> {
    parse_time("09:00")
        .map(|time| Appointment {
            id: "1".to_string(),
            date: today,
            time,
            patient: "Ana Silva".to_string(),
            session_type: SessionType::InitialAssessment,
            status: AppointmentStatus::Confirmed,
        })
        .into_iter()
        .collect()
}

// ============================================================================
// CLINIC STORE
// ============================================================================

pub struct ClinicStore {
    storage: KvStorage,
    patients: Vec<Patient>,
    records: Vec<ClinicalRecord>,
    transactions: Vec<Transaction>,
    appointments: Vec<Appointment>,
}

impl ClinicStore {
    /// Load every collection from `storage`.
    ///
    /// A key that was never written yields the demo data; the seed
    /// appointment is placed on `today`.
    pub fn load(storage: KvStorage, today: NaiveDate) -> Result<Self> {
        let patients = load_or(&storage, KEY_PATIENTS, seed_patients)?;
        let records = load_or(&storage, KEY_RECORDS, seed_records)?;
        let transactions = load_or(&storage, KEY_TRANSACTIONS, seed_transactions)?;
        let appointments = load_or(&storage, KEY_APPOINTMENTS, || seed_appointments(today))?;

        log::info!(
            "loaded {} patients, {} records, {} transactions, {} appointments",
            patients.len(),
            records.len(),
            transactions.len(),
            appointments.len()
        );

        let store = ClinicStore {
            storage,
            patients,
            records,
            transactions,
            appointments,
        };
        store.persist_all()?;
        Ok(store)
    }

    /// Replace everything with the demo data
    pub fn reset(&mut self, today: NaiveDate) -> Result<()> {
        self.patients = seed_patients();
        self.records = seed_records();
        self.transactions = seed_transactions();
        self.appointments = seed_appointments(today);
        log::warn!("store reset to demo data");
        self.persist_all()
    }

    pub fn storage(&self) -> &KvStorage {
        &self.storage
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn persist_all(&self) -> Result<()> {
        self.persist_patients()?;
        self.persist_records()?;
        self.persist_transactions()?;
        self.persist_appointments()
    }

    fn persist_patients(&self) -> Result<()> {
        self.storage.set_json(KEY_PATIENTS, &self.patients)
    }

    fn persist_records(&self) -> Result<()> {
        self.storage.set_json(KEY_RECORDS, &self.records)
    }

    fn persist_transactions(&self) -> Result<()> {
        self.storage.set_json(KEY_TRANSACTIONS, &self.transactions)
    }

    fn persist_appointments(&self) -> Result<()> {
        self.storage.set_json(KEY_APPOINTMENTS, &self.appointments)
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn records(&self) -> &[ClinicalRecord] {
        &self.records
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn patient_by_name(&self, name: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.name == name)
    }

    pub fn record(&self, id: &str) -> Option<&ClinicalRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn appointment(&self, id: &str) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    // ------------------------------------------------------------------------
    // Patients
    // ------------------------------------------------------------------------

    /// Records and appointments point at patients by name, so two patients
    /// may never share one.
    fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> Result<()> {
        let taken = self
            .patients
            .iter()
            .any(|p| p.name == name && Some(p.id.as_str()) != except_id);
        if taken {
            return Err(StoreError::DuplicatePatientName(name.to_string()).into());
        }
        Ok(())
    }

    /// Append a patient
    pub fn add_patient(&mut self, new: NewPatient) -> Result<Patient> {
        self.ensure_name_free(&new.name, None)?;
        let patient = Patient::new(new);
        self.patients.push(patient.clone());
        self.persist_patients()?;
        log::info!("added patient {}", patient.id);
        Ok(patient)
    }

    /// Merge `patch` onto the patient.
    ///
    /// A name change is carried over to every record and appointment that
    /// referenced the old name.
    pub fn update_patient(&mut self, id: &str, patch: PatientPatch) -> Result<Patient> {
        if let Some(name) = &patch.name {
            self.ensure_name_free(name, Some(id))?;
        }

        let patient = self
            .patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("patient", id))?;

        let old_name = patient.name.clone();
        patch.apply(patient);
        let updated = patient.clone();
        self.persist_patients()?;

        if updated.name != old_name {
            self.relink_patient_name(&old_name, &updated.name)?;
        }

        Ok(updated)
    }

    fn relink_patient_name(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        let mut records_changed = 0;
        for record in self.records.iter_mut().filter(|r| r.patient == old_name) {
            record.patient = new_name.to_string();
            records_changed += 1;
        }

        let mut appointments_changed = 0;
        for appt in self.appointments.iter_mut().filter(|a| a.patient == old_name) {
            appt.patient = new_name.to_string();
            appointments_changed += 1;
        }

        if records_changed > 0 {
            self.persist_records()?;
        }
        if appointments_changed > 0 {
            self.persist_appointments()?;
        }

        log::info!(
            "renamed '{}' to '{}': {} records, {} appointments relinked",
            old_name,
            new_name,
            records_changed,
            appointments_changed
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Clinical records
    // ------------------------------------------------------------------------

    /// Insert a record at the front (newest first)
    pub fn add_record(&mut self, new: NewRecord) -> Result<ClinicalRecord> {
        let record = ClinicalRecord::new(new);
        self.records.insert(0, record.clone());
        self.persist_records()?;
        log::info!("added record {} for '{}'", record.id, record.patient);
        Ok(record)
    }

    pub fn update_record(&mut self, id: &str, patch: RecordPatch) -> Result<ClinicalRecord> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("record", id))?;
        patch.apply(record);
        let updated = record.clone();
        self.persist_records()?;
        Ok(updated)
    }

    pub fn delete_record(&mut self, id: &str) -> Result<ClinicalRecord> {
        let pos = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found("record", id))?;
        let removed = self.records.remove(pos);
        self.persist_records()?;
        log::info!("deleted record {}", id);
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Insert a transaction at the front (newest first)
    pub fn add_transaction(&mut self, new: NewTransaction) -> Result<Transaction> {
        let tx = Transaction::new(new);
        self.transactions.insert(0, tx.clone());
        self.persist_transactions()?;
        log::info!(
            "added {} transaction {} ({:.2})",
            tx.direction.as_str(),
            tx.id,
            tx.amount
        );
        Ok(tx)
    }

    pub fn update_transaction(&mut self, id: &str, patch: TransactionPatch) -> Result<Transaction> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("transaction", id))?;
        patch.apply(tx);
        let updated = tx.clone();
        self.persist_transactions()?;
        Ok(updated)
    }

    pub fn delete_transaction(&mut self, id: &str) -> Result<Transaction> {
        let pos = self
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("transaction", id))?;
        let removed = self.transactions.remove(pos);
        self.persist_transactions()?;
        log::info!("deleted transaction {}", id);
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Appointments
    // ------------------------------------------------------------------------

    /// Append an appointment. Overlapping slots are allowed.
    pub fn add_appointment(&mut self, new: NewAppointment) -> Result<Appointment> {
        let appt = Appointment::new(new);
        self.appointments.push(appt.clone());
        self.persist_appointments()?;
        log::info!(
            "booked {} {} for '{}'",
            appt.date,
            appt.time_label(),
            appt.patient
        );
        Ok(appt)
    }

    pub fn update_appointment(&mut self, id: &str, patch: AppointmentPatch) -> Result<Appointment> {
        let appt = self
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("appointment", id))?;
        patch.apply(appt);
        let updated = appt.clone();
        self.persist_appointments()?;
        Ok(updated)
    }

    pub fn delete_appointment(&mut self, id: &str) -> Result<Appointment> {
        let pos = self
            .appointments
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| not_found("appointment", id))?;
        let removed = self.appointments.remove(pos);
        self.persist_appointments()?;
        log::info!("deleted appointment {}", id);
        Ok(removed)
    }
}

fn load_or<T, F>(storage: &KvStorage, key: &str, seed: F) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    F: FnOnce() -> Vec<T>,
{
    match storage.get_json::<Vec<T>>(key)? {
        Some(items) => Ok(items),
        None => {
            log::debug!("no data under '{}', using demo data", key);
            Ok(seed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Assessment;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn fresh_store() -> ClinicStore {
        ClinicStore::load(KvStorage::open_in_memory().unwrap(), today()).unwrap()
    }

    fn new_transaction(description: &str, amount: f64, direction: Direction) -> NewTransaction {
        NewTransaction {
            description: description.to_string(),
            category: "Consulta".to_string(),
            amount,
            date: today(),
            method: PaymentMethod::Pix,
            direction,
        }
    }

    #[test]
    fn test_empty_storage_loads_demo_data() {
        let store = fresh_store();

        assert_eq!(store.patients().len(), 2);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.transactions().len(), 2);
        assert_eq!(store.appointments().len(), 1);
        assert_eq!(store.appointments()[0].date, today());
    }

    #[test]
    fn test_stored_collections_win_over_demo_data() {
        let storage = KvStorage::open_in_memory().unwrap();
        storage.set_json(KEY_PATIENTS, &Vec::<Patient>::new()).unwrap();

        let store = ClinicStore::load(storage, today()).unwrap();
        assert!(store.patients().is_empty());
        assert_eq!(store.records().len(), 1);
    }

    #[test]
    fn test_every_change_is_written_through() {
        let storage = KvStorage::open_in_memory().unwrap();
        let mut store = ClinicStore::load(storage.clone(), today()).unwrap();

        store
            .add_patient(NewPatient {
                name: "Marta Souza".to_string(),
                age: 52,
                phone: String::new(),
                status: PatientStatus::Active,
                last_visit: today(),
                pathology: "Tendinite".to_string(),
            })
            .unwrap();

        let stored: Vec<Patient> = storage.get_json(KEY_PATIENTS).unwrap().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].name, "Marta Souza");

        let reloaded = ClinicStore::load(storage, today()).unwrap();
        assert_eq!(reloaded.patients(), store.patients());
    }

    #[test]
    fn test_transactions_and_records_are_prepended() {
        let mut store = fresh_store();

        let tx = store
            .add_transaction(new_transaction("Pacote Mensal", 600.0, Direction::Inflow))
            .unwrap();
        assert_eq!(store.transactions()[0].id, tx.id);

        let record = store
            .add_record(NewRecord {
                patient: "Carlos Mendes".to_string(),
                date: today(),
                kind: RecordKind::Progress,
                author: "Dr. Gerson Bruno".to_string(),
                summary: "Ganho de ADM em flexão.".to_string(),
                assessment: None,
            })
            .unwrap();
        assert_eq!(store.records()[0].id, record.id);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut store = fresh_store();

        let err = store.delete_transaction("missing").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound {
                kind: "transaction",
                id: "missing".to_string()
            })
        );

        assert!(store
            .update_patient("missing", PatientPatch::default())
            .is_err());
        assert_eq!(store.transactions().len(), 2);
    }

    #[test]
    fn test_rename_relinks_records_and_appointments() {
        let mut store = fresh_store();

        store
            .update_patient(
                "1",
                PatientPatch {
                    name: Some("Ana Silva Costa".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(store.records().iter().all(|r| r.patient == "Ana Silva Costa"));
        assert_eq!(store.appointments()[0].patient, "Ana Silva Costa");

        let stored: Vec<ClinicalRecord> = store.storage().get_json(KEY_RECORDS).unwrap().unwrap();
        assert_eq!(stored[0].patient, "Ana Silva Costa");
    }

    #[test]
    fn test_update_and_delete_appointment() {
        let mut store = fresh_store();
        let id = store.appointments()[0].id.clone();

        let updated = store
            .update_appointment(
                &id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Cancelled);
        assert_eq!(updated.patient, "Ana Silva");

        store.delete_appointment(&id).unwrap();
        assert!(store.appointments().is_empty());
    }

    #[test]
    fn test_reset_restores_demo_data() {
        let mut store = fresh_store();
        store.delete_transaction("1").unwrap();
        store.delete_transaction("2").unwrap();
        assert!(store.transactions().is_empty());

        store.reset(today()).unwrap();
        assert_eq!(store.transactions().len(), 2);
    }

    fn marta() -> NewPatient {
        NewPatient {
            name: "Marta Souza".to_string(),
            age: 52,
            phone: String::new(),
            status: PatientStatus::Active,
            last_visit: today(),
            pathology: "Tendinite".to_string(),
        }
    }

    #[test]
    fn test_duplicate_patient_name_rejected_on_add() {
        let mut store = fresh_store();
        store.add_patient(marta()).unwrap();

        let err = store.add_patient(marta()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::DuplicatePatientName("Marta Souza".to_string()))
        );
        assert_eq!(store.patients().len(), 3);
    }

    #[test]
    fn test_rename_onto_existing_patient_keeps_histories_apart() {
        let mut store = fresh_store();
        store
            .add_record(NewRecord {
                patient: "Carlos Mendes".to_string(),
                date: today(),
                kind: RecordKind::Progress,
                author: "Dr. Gerson Bruno".to_string(),
                summary: "Evolução do Carlos".to_string(),
                assessment: None,
            })
            .unwrap();

        let err = store
            .update_patient(
                "1",
                PatientPatch {
                    name: Some("Carlos Mendes".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DuplicatePatientName(_))
        ));

        assert_eq!(store.patient("1").unwrap().name, "Ana Silva");
        let carlos: Vec<&str> = store
            .records()
            .iter()
            .filter(|r| r.patient == "Carlos Mendes")
            .map(|r| r.summary.as_str())
            .collect();
        assert_eq!(carlos, vec!["Evolução do Carlos"]);
    }

    #[test]
    fn test_patient_may_keep_its_own_name() {
        let mut store = fresh_store();
        let updated = store
            .update_patient(
                "1",
                PatientPatch {
                    name: Some("Ana Silva".to_string()),
                    age: Some(35),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.age, 35);
    }

    #[test]
    fn test_update_record_replaces_assessment() {
        let mut store = fresh_store();

        let updated = store
            .update_record(
                "1",
                RecordPatch {
                    kind: Some(RecordKind::InitialAssessment),
                    assessment: Some(Assessment {
                        chief_complaint: Some("Dor lombar".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.kind, RecordKind::InitialAssessment);
        assert!(updated.has_assessment());
        assert_eq!(updated.date, date(2023, 10, 12));

        let cleared = store
            .update_record(
                "1",
                RecordPatch {
                    kind: Some(RecordKind::Discharge),
                    clear_assessment: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.assessment.is_none());

        let stored: Vec<ClinicalRecord> = store.storage().get_json(KEY_RECORDS).unwrap().unwrap();
        assert_eq!(stored[0].kind, RecordKind::Discharge);
    }

    #[test]
    fn test_update_transaction_keeps_original_date() {
        let mut store = fresh_store();

        let updated = store
            .update_transaction(
                "2",
                TransactionPatch {
                    amount: Some(2700.0),
                    description: Some("Aluguel Clínica (reajuste)".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.amount, 2700.0);
        assert_eq!(updated.date, date(2023, 10, 10));
        assert_eq!(updated.direction, Direction::Outflow);
        assert_eq!(store.transaction("2").unwrap().amount, 2700.0);
    }

    #[test]
    fn test_corrupt_collection_fails_load() {
        let storage = KvStorage::open_in_memory().unwrap();
        storage.set_json(KEY_RECORDS, "not a list").unwrap();

        let err = ClinicStore::load(storage.clone(), today()).err().unwrap();
        assert!(format!("{:#}", err).contains(KEY_RECORDS));
        assert_eq!(
            storage.get_raw(KEY_RECORDS).unwrap().as_deref(),
            Some("\"not a list\"")
        );
    }
}

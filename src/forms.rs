// 📝 Forms - turn raw user input into entities
// Errors are collected per field so a front end can show them all at once.

use crate::entities::{
    parse_time, Appointment, AppointmentPatch, AppointmentStatus, Assessment, ClinicalRecord,
    Direction, NewAppointment, NewPatient, NewRecord, NewTransaction, Patient, PatientPatch,
    PatientStatus, PaymentMethod, RecordKind, RecordPatch, SessionType, Transaction,
    TransactionPatch, SLOT_TIMES,
};
use crate::finance::{format_brl, is_preset_category, parse_amount, CUSTOM_CATEGORY};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary used when an initial assessment is saved with only the structured fields
pub const STRUCTURED_ASSESSMENT_SUMMARY: &str =
    "Avaliação Inicial Estruturada (Vide Campos detalhados)";

/// Author recorded when nobody is logged in
pub const EXTERNAL_AUTHOR: &str = "Fisioterapeuta Externo";

// ============================================================================
// FIELD ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

pub type FormResult<T> = Result<T, Vec<FieldError>>;

/// All field errors joined on one line, for CLI output
pub fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accepts `DD/MM/YYYY` or ISO `YYYY-MM-DD`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// ============================================================================
// PARTIAL EDITS
// ============================================================================

/// Apply a JSON merge patch (`changes`) on top of the form filled from the
/// stored entity. Keys absent from `changes` keep their stored value.
pub fn merge_form<F>(current: &F, changes: Value) -> FormResult<F>
where
    F: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(current)
        .map_err(|e| vec![FieldError::new("body", e.to_string())])?;
    if !changes.is_object() {
        return Err(vec![FieldError::new("body", "Expected a JSON object")]);
    }
    merge_value(&mut merged, changes);
    serde_json::from_value(merged).map_err(|e| vec![FieldError::new("body", e.to_string())])
}

fn merge_value(target: &mut Value, changes: Value) {
    match (target, changes) {
        (Value::Object(target), Value::Object(changes)) => {
            for (key, value) in changes {
                let nested = value.is_object() && target.get(&key).map_or(false, Value::is_object);
                if nested {
                    if let Some(slot) = target.get_mut(&key) {
                        merge_value(slot, value);
                    }
                } else {
                    target.insert(key, value);
                }
            }
        }
        (target, changes) => *target = changes,
    }
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "Required field is empty"));
    }
}

fn find_patient<'a>(
    errors: &mut Vec<FieldError>,
    patients: &'a [Patient],
    patient_id: &str,
) -> Option<&'a Patient> {
    let found = patients.iter().find(|p| p.id == patient_id);
    if found.is_none() {
        errors.push(FieldError::new("patient", "Select a patient"));
    }
    found
}

// ============================================================================
// PATIENT FORM
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientForm {
    pub name: String,
    /// Free text; anything that is not a whole number counts as 0
    pub age: String,
    pub phone: String,
    pub pathology: String,
    pub status: String,
    /// Blank means today
    pub last_visit: String,
}

impl PatientForm {
    pub fn from_patient(patient: &Patient) -> Self {
        PatientForm {
            name: patient.name.clone(),
            age: patient.age.to_string(),
            phone: patient.phone.clone(),
            pathology: patient.pathology.clone(),
            status: patient.status.as_str().to_string(),
            last_visit: format_date(patient.last_visit),
        }
    }

    fn validate(&self, today: NaiveDate) -> FormResult<NewPatient> {
        let mut errors = Vec::new();
        required(&mut errors, "name", &self.name);

        let status = if self.status.trim().is_empty() {
            PatientStatus::Active
        } else {
            PatientStatus::parse(&self.status).unwrap_or_else(|| {
                errors.push(FieldError::new("status", "Expected Ativo or Inativo"));
                PatientStatus::Active
            })
        };

        let last_visit = if self.last_visit.trim().is_empty() {
            today
        } else {
            parse_date(&self.last_visit).unwrap_or_else(|| {
                errors.push(FieldError::new("lastVisit", "Expected DD/MM/YYYY"));
                today
            })
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewPatient {
            name: self.name.trim().to_string(),
            age: self.age.trim().parse().unwrap_or(0),
            phone: self.phone.trim().to_string(),
            status,
            last_visit,
            pathology: self.pathology.trim().to_string(),
        })
    }

    pub fn to_new(&self, today: NaiveDate) -> FormResult<NewPatient> {
        self.validate(today)
    }

    /// Every field of the form overwrites the stored patient; build the form
    /// with `from_patient` + `merge_form` for a partial edit
    pub fn to_patch(&self, today: NaiveDate) -> FormResult<PatientPatch> {
        let new = self.validate(today)?;
        Ok(PatientPatch {
            name: Some(new.name),
            age: Some(new.age),
            phone: Some(new.phone),
            status: Some(new.status),
            last_visit: Some(new.last_visit),
            pathology: Some(new.pathology),
        })
    }
}

// ============================================================================
// TRANSACTION FORM
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionForm {
    pub direction: Direction,
    pub description: String,
    /// A preset category or `Outra...`
    #[serde(default)]
    pub category: String,
    /// Used when `category` is `Outra...`
    #[serde(default)]
    pub custom_category: String,
    pub amount: String,
    #[serde(default)]
    pub method: String,
}

impl TransactionForm {
    /// Empty form for a new entry, with the first preset category selected
    pub fn blank(direction: Direction) -> Self {
        TransactionForm {
            direction,
            description: String::new(),
            category: crate::finance::preset_categories(direction)
                .first()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            custom_category: String::new(),
            amount: String::new(),
            method: PaymentMethod::Pix.as_str().to_string(),
        }
    }

    /// Form pre-filled for editing; unknown categories go to the custom field
    pub fn from_transaction(tx: &Transaction) -> Self {
        let preset = is_preset_category(tx.direction, &tx.category);
        TransactionForm {
            direction: tx.direction,
            description: tx.description.clone(),
            category: if preset {
                tx.category.clone()
            } else {
                CUSTOM_CATEGORY.to_string()
            },
            custom_category: if preset { String::new() } else { tx.category.clone() },
            amount: format_brl(tx.amount).trim_start_matches("R$ ").to_string(),
            method: tx.method.as_str().to_string(),
        }
    }

    fn validate(&self) -> FormResult<(String, String, f64, PaymentMethod)> {
        let mut errors = Vec::new();
        required(&mut errors, "description", &self.description);

        let category = if self.category == CUSTOM_CATEGORY {
            required(&mut errors, "customCategory", &self.custom_category);
            self.custom_category.trim().to_string()
        } else {
            required(&mut errors, "category", &self.category);
            self.category.trim().to_string()
        };

        let amount = match parse_amount(&self.amount) {
            Ok(amount) => amount,
            Err(e) => {
                errors.push(FieldError::new("amount", e.to_string()));
                0.0
            }
        };

        let method = if self.method.trim().is_empty() {
            PaymentMethod::Pix
        } else {
            PaymentMethod::parse(&self.method).unwrap_or_else(|| {
                errors.push(FieldError::new("method", "Unknown payment method"));
                PaymentMethod::Pix
            })
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok((self.description.trim().to_string(), category, amount, method))
    }

    /// New entry dated `today`
    pub fn to_new(&self, today: NaiveDate) -> FormResult<NewTransaction> {
        let (description, category, amount, method) = self.validate()?;
        Ok(NewTransaction {
            description,
            category,
            amount,
            date: today,
            method,
            direction: self.direction,
        })
    }

    /// Edit keeps the original date
    pub fn to_patch(&self) -> FormResult<TransactionPatch> {
        let (description, category, amount, method) = self.validate()?;
        Ok(TransactionPatch {
            description: Some(description),
            category: Some(category),
            amount: Some(amount),
            date: None,
            method: Some(method),
            direction: Some(self.direction),
        })
    }
}

// ============================================================================
// CLINICAL RECORD FORM
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordForm {
    pub patient_id: String,
    pub kind: RecordKind,
    pub summary: String,
    pub assessment: Option<Assessment>,
}

impl RecordForm {
    pub fn from_record(record: &ClinicalRecord, patient_id: &str) -> Self {
        RecordForm {
            patient_id: patient_id.to_string(),
            kind: record.kind,
            summary: record.summary.clone(),
            assessment: record.assessment.clone(),
        }
    }

    fn summary_for_kind(&self) -> String {
        let summary = self.summary.trim();
        if self.kind == RecordKind::InitialAssessment && summary.is_empty() {
            STRUCTURED_ASSESSMENT_SUMMARY.to_string()
        } else {
            summary.to_string()
        }
    }

    /// Only initial assessments keep the structured form
    fn assessment_for_kind(&self) -> Option<Assessment> {
        if self.kind == RecordKind::InitialAssessment {
            self.assessment.clone().filter(|a| !a.is_empty())
        } else {
            None
        }
    }

    /// Record for the selected patient, written by `author` (or an external
    /// physiotherapist when nobody is logged in)
    pub fn to_new(
        &self,
        patients: &[Patient],
        author: Option<&str>,
        today: NaiveDate,
    ) -> FormResult<NewRecord> {
        let mut errors = Vec::new();
        let patient = find_patient(&mut errors, patients, &self.patient_id);

        let summary = self.summary_for_kind();
        if summary.is_empty() {
            errors.push(FieldError::new("summary", "Required field is empty"));
        }

        match patient {
            Some(patient) if errors.is_empty() => Ok(NewRecord {
                patient: patient.name.clone(),
                date: today,
                kind: self.kind,
                author: author.unwrap_or(EXTERNAL_AUTHOR).to_string(),
                summary,
                assessment: self.assessment_for_kind(),
            }),
            _ => Err(errors),
        }
    }

    /// Edit: kind, summary and assessment; patient, date and author stay
    pub fn to_patch(&self) -> FormResult<RecordPatch> {
        let summary = self.summary_for_kind();
        if summary.is_empty() {
            return Err(vec![FieldError::new("summary", "Required field is empty")]);
        }

        let assessment = self.assessment_for_kind();
        Ok(RecordPatch {
            kind: Some(self.kind),
            summary: Some(summary),
            clear_assessment: assessment.is_none(),
            assessment,
            ..Default::default()
        })
    }
}

// ============================================================================
// APPOINTMENT FORM
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentForm {
    pub patient_id: String,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub status: AppointmentStatus,
}

impl AppointmentForm {
    pub fn from_appointment(appt: &Appointment, patient_id: &str) -> Self {
        AppointmentForm {
            patient_id: patient_id.to_string(),
            date: appt.date,
            time: appt.time_label(),
            session_type: appt.session_type,
            status: appt.status,
        }
    }

    fn validate<'a>(&self, patients: &'a [Patient]) -> FormResult<(&'a Patient, chrono::NaiveTime)> {
        let mut errors = Vec::new();
        let patient = find_patient(&mut errors, patients, &self.patient_id);

        let time = if SLOT_TIMES.iter().any(|slot| *slot == self.time.trim()) {
            parse_time(&self.time)
        } else {
            None
        };
        if time.is_none() {
            errors.push(FieldError::new(
                "time",
                format!("Pick one of {}", SLOT_TIMES.join(", ")),
            ));
        }

        match (patient, time) {
            (Some(patient), Some(time)) if errors.is_empty() => Ok((patient, time)),
            _ => Err(errors),
        }
    }

    pub fn to_new(&self, patients: &[Patient]) -> FormResult<NewAppointment> {
        let (patient, time) = self.validate(patients)?;
        Ok(NewAppointment {
            date: self.date,
            time,
            patient: patient.name.clone(),
            session_type: self.session_type,
            status: self.status,
        })
    }

    pub fn to_patch(&self, patients: &[Patient]) -> FormResult<AppointmentPatch> {
        let (patient, time) = self.validate(patients)?;
        Ok(AppointmentPatch {
            date: Some(self.date),
            time: Some(time),
            patient: Some(patient.name.clone()),
            session_type: Some(self.session_type),
            status: Some(self.status),
        })
    }
}

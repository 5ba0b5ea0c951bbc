// 🧑 Patient Entity
//
// Other collections point at a patient by NAME, not by id. Renaming a
// patient therefore has to be propagated by the store (see store.rs).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// PATIENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientStatus {
    /// Under treatment
    #[default]
    #[serde(rename = "Ativo")]
    Active,

    /// Discharged or no longer attending
    #[serde(rename = "Inativo")]
    Inactive,
}

impl PatientStatus {
    pub const ALL: [PatientStatus; 2] = [PatientStatus::Active, PatientStatus::Inactive];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "Ativo",
            PatientStatus::Inactive => "Inativo",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

// ============================================================================
// PATIENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub phone: String,
    pub status: PatientStatus,
    pub last_visit: NaiveDate,
    pub pathology: String,
}

/// A patient before it has been assigned an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: PatientStatus,
    pub last_visit: NaiveDate,
    #[serde(default)]
    pub pathology: String,
}

impl Patient {
    /// Create a patient with a fresh UUID
    pub fn new(new: NewPatient) -> Self {
        Patient {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            age: new.age,
            phone: new.phone,
            status: new.status,
            last_visit: new.last_visit,
            pathology: new.pathology,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PatientStatus::Active
    }
}

// ============================================================================
// PARTIAL UPDATE
// ============================================================================

/// Fields to overwrite on an existing patient; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub status: Option<PatientStatus>,
    pub last_visit: Option<NaiveDate>,
    pub pathology: Option<String>,
}

impl PatientPatch {
    pub fn apply(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if let Some(age) = self.age {
            patient.age = age;
        }
        if let Some(phone) = self.phone {
            patient.phone = phone;
        }
        if let Some(status) = self.status {
            patient.status = status;
        }
        if let Some(last_visit) = self.last_visit {
            patient.last_visit = last_visit;
        }
        if let Some(pathology) = self.pathology {
            patient.pathology = pathology;
        }
    }
}

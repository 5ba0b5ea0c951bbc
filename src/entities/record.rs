// 📋 Clinical Record Entity
// Dated note about a patient, optionally carrying a structured initial assessment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// RECORD KIND
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// First visit, usually with a filled `Assessment`
    #[serde(rename = "Avaliação Inicial")]
    InitialAssessment,

    /// Follow-up session note
    #[default]
    #[serde(rename = "Evolução")]
    Progress,

    /// Discharge
    #[serde(rename = "Alta")]
    Discharge,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::InitialAssessment,
        RecordKind::Progress,
        RecordKind::Discharge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::InitialAssessment => "Avaliação Inicial",
            RecordKind::Progress => "Evolução",
            RecordKind::Discharge => "Alta",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

// ============================================================================
// STRUCTURED ASSESSMENT
// ============================================================================

/// Initial assessment form. Every field is free text and optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assessment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illness_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    /// Inspection, palpation, strength, range of motion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_exam: Option<String>,
    /// Specific functional tests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional_assessment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,
}

impl Assessment {
    /// (label, value) pairs in form order, for rendering
    pub fn fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("Queixa Principal", self.chief_complaint.as_deref()),
            ("História da Doença Atual", self.illness_history.as_deref()),
            ("Medicamentos em Uso", self.medications.as_deref()),
            ("Exame Físico", self.physical_exam.as_deref()),
            ("Avaliação Funcional", self.functional_assessment.as_deref()),
            ("Diagnóstico Fisioterapêutico", self.diagnosis.as_deref()),
            ("Objetivos do Tratamento", self.goals.as_deref()),
            ("Plano de Tratamento", self.treatment_plan.as_deref()),
        ]
    }

    /// True when no field carries any non-blank text
    pub fn is_empty(&self) -> bool {
        self.fields()
            .iter()
            .all(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
    }
}

// ============================================================================
// CLINICAL RECORD ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    pub id: String,
    /// Patient name, as entered when the record was written
    pub patient: String,
    pub date: NaiveDate,
    pub kind: RecordKind,
    /// Physiotherapist who wrote the note
    pub author: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub patient: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub kind: RecordKind,
    pub author: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub assessment: Option<Assessment>,
}

impl ClinicalRecord {
    pub fn new(new: NewRecord) -> Self {
        ClinicalRecord {
            id: uuid::Uuid::new_v4().to_string(),
            patient: new.patient,
            date: new.date,
            kind: new.kind,
            author: new.author,
            summary: new.summary,
            assessment: new.assessment,
        }
    }

    pub fn has_assessment(&self) -> bool {
        self.assessment.as_ref().map_or(false, |a| !a.is_empty())
    }
}

/// Fields to overwrite on an existing record.
///
/// `assessment` replaces the structured form; `clear_assessment` drops it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordPatch {
    pub patient: Option<String>,
    pub date: Option<NaiveDate>,
    pub kind: Option<RecordKind>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub assessment: Option<Assessment>,
    pub clear_assessment: bool,
}

impl RecordPatch {
    pub fn apply(self, record: &mut ClinicalRecord) {
        if let Some(patient) = self.patient {
            record.patient = patient;
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(author) = self.author {
            record.author = author;
        }
        if let Some(summary) = self.summary {
            record.summary = summary;
        }
        if self.clear_assessment {
            record.assessment = None;
        } else if let Some(assessment) = self.assessment {
            record.assessment = Some(assessment);
        }
    }
}

// 📅 Appointment Entity
// A session booked on a date and time slot for a patient (by name).

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Slots offered by the agenda, in display order (lunch break at 12:00)
pub const SLOT_TIMES: [&str; 10] = [
    "08:00", "09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00",
];

/// Parse an `HH:MM` clock time
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M").ok()
}

/// The agenda slot grid as clock times
pub fn slot_times() -> Vec<NaiveTime> {
    SLOT_TIMES.iter().filter_map(|t| parse_time(t)).collect()
}

/// Serde adapter storing times as `HH:MM`
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
    }
}

mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => super::hhmm::serialize(t, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_time(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw))
            }),
            None => Ok(None),
        }
    }
}

// ============================================================================
// SESSION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[default]
    #[serde(rename = "Avaliação Inicial")]
    InitialAssessment,

    /// General physiotherapy / follow-up
    #[serde(rename = "Evolução")]
    Progress,

    #[serde(rename = "Pilates Clínico")]
    ClinicalPilates,

    #[serde(rename = "Acupuntura")]
    Acupuncture,
}

impl SessionType {
    pub const ALL: [SessionType; 4] = [
        SessionType::InitialAssessment,
        SessionType::Progress,
        SessionType::ClinicalPilates,
        SessionType::Acupuncture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::InitialAssessment => "Avaliação Inicial",
            SessionType::Progress => "Evolução",
            SessionType::ClinicalPilates => "Pilates Clínico",
            SessionType::Acupuncture => "Acupuntura",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

// ============================================================================
// APPOINTMENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "Confirmado")]
    Confirmed,

    /// Awaiting confirmation
    #[serde(rename = "Pendente")]
    Pending,

    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::Pending,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Confirmed => "Confirmado",
            AppointmentStatus::Pending => "Pendente",
            AppointmentStatus::Cancelled => "Cancelado",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(label.trim()))
    }

    /// Confirmed → Pending → Cancelled → Confirmed
    pub fn next(&self) -> Self {
        match self {
            AppointmentStatus::Confirmed => AppointmentStatus::Pending,
            AppointmentStatus::Pending => AppointmentStatus::Cancelled,
            AppointmentStatus::Cancelled => AppointmentStatus::Confirmed,
        }
    }
}

// ============================================================================
// APPOINTMENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    /// Patient name
    pub patient: String,
    pub session_type: SessionType,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub patient: String,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn new(new: NewAppointment) -> Self {
        Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            date: new.date,
            time: new.time,
            patient: new.patient,
            session_type: new.session_type,
            status: new.status,
        }
    }

    pub fn time_label(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentPatch {
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm_opt", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    pub patient: Option<String>,
    pub session_type: Option<SessionType>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentPatch {
    pub fn apply(self, appt: &mut Appointment) {
        if let Some(date) = self.date {
            appt.date = date;
        }
        if let Some(time) = self.time {
            appt.time = time;
        }
        if let Some(patient) = self.patient {
            appt.patient = patient;
        }
        if let Some(session_type) = self.session_type {
            appt.session_type = session_type;
        }
        if let Some(status) = self.status {
            appt.status = status;
        }
    }
}

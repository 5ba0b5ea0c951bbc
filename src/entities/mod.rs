// Entity Models
//
// Plain records held by the clinic store. Every entity has:
// - a UUID assigned on creation
// - a `New*` shape (the entity before it has an id)
// - a `*Patch` shape for partial updates
//
// Records and appointments refer to patients by name.

pub mod appointment;
pub mod patient;
pub mod record;
pub mod transaction;

pub use appointment::{
    parse_time, slot_times, Appointment, AppointmentPatch, AppointmentStatus, NewAppointment,
    SessionType, SLOT_TIMES,
};
pub use patient::{NewPatient, Patient, PatientPatch, PatientStatus};
pub use record::{Assessment, ClinicalRecord, NewRecord, RecordKind, RecordPatch};
pub use transaction::{Direction, NewTransaction, PaymentMethod, Transaction, TransactionPatch};

// FisioClinic - Core Library
// Exposes all modules for use in CLI, TUI, API server, and tests

pub mod storage;  // Local key-value mirror (SQLite)
pub mod entities; // Patient, ClinicalRecord, Transaction, Appointment
pub mod store;    // In-memory collections + persistence
pub mod views;    // Searches, agenda grid, dashboard
pub mod finance;  // Cash flow, categories, CSV export
pub mod forms;    // Input validation
pub mod auth;     // Local user profiles
pub mod report;   // Printable clinical record
pub mod config;   // clap args + logging setup

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use storage::KvStorage;
pub use entities::{
    Appointment, AppointmentPatch, AppointmentStatus, Assessment, ClinicalRecord, Direction,
    NewAppointment, NewPatient, NewRecord, NewTransaction, Patient, PatientPatch, PatientStatus,
    PaymentMethod, RecordKind, RecordPatch, SessionType, Transaction, TransactionPatch,
};
pub use store::{ClinicStore, StoreError};
pub use views::{dashboard, day_schedule, records_for_patient, DashboardSummary, Slot};
pub use finance::{export_csv, format_brl, parse_amount, summarize, FinanceSummary};
pub use forms::{
    merge_form, AppointmentForm, FieldError, PatientForm, RecordForm, TransactionForm,
};
pub use report::printable_record;
pub use auth::{AuthError, AuthState, UserProfile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fisio_clinic::config::{init_logging, today, DataArgs};
use fisio_clinic::entities::{AppointmentStatus, RecordKind, SessionType};
use fisio_clinic::finance::{
    filter_by_category, is_preset_category, summarize, CUSTOM_CATEGORY,
};
use fisio_clinic::forms::{describe, format_date, parse_date};
use fisio_clinic::views::{day_schedule, records_for_patient, search_patients};
use fisio_clinic::{
    export_csv, format_brl, printable_record, AppointmentForm, Assessment, AuthState, ClinicStore,
    Direction, FieldError, KvStorage, PatientForm, RecordForm, TransactionForm,
};

#[derive(Parser, Debug)]
#[command(name = "fisio-clinic", version, about = "FisioClinic - physiotherapy clinic admin")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive terminal UI (default)
    Tui,
    /// Replace all clinic data with the demo data
    Reset,
    /// Start a session; new records are signed by this user
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// List patients
    Patients {
        /// Case-insensitive name filter
        #[arg(long)]
        q: Option<String>,
    },
    /// Register a patient
    AddPatient(PatientArgs),
    /// Change a patient; omitted flags keep their value
    EditPatient {
        id: String,
        #[command(flatten)]
        fields: PatientArgs,
    },
    /// Show a patient's clinical records
    Records {
        /// Patient name, exactly as registered
        patient: String,
    },
    /// Write a clinical record for a patient, dated today
    AddRecord {
        #[arg(long)]
        patient_id: String,
        /// Avaliação Inicial, Evolução or Alta
        #[arg(long, default_value = "Evolução")]
        kind: String,
        #[arg(long)]
        summary: Option<String>,
        #[command(flatten)]
        assessment: AssessmentArgs,
    },
    /// Change a record's kind, summary or assessment fields
    EditRecord {
        id: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[command(flatten)]
        assessment: AssessmentArgs,
    },
    /// Printable report for one record
    PrintRecord {
        id: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Slot grid for one day
    Agenda {
        /// YYYY-MM-DD or DD/MM/YYYY; defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Book a session in a free slot
    Book(AppointmentArgs),
    /// Move or change an appointment; omitted flags keep their value
    EditAppointment {
        id: String,
        #[command(flatten)]
        fields: AppointmentArgs,
    },
    /// Cash-flow summary and transactions
    Finance {
        #[arg(long)]
        category: Option<String>,
    },
    /// Write every transaction to a CSV report
    Export {
        out: PathBuf,
    },
    /// Record a new inflow or outflow dated today
    AddTransaction {
        #[arg(long)]
        description: String,
        /// `150`, `150.50` or `1.234,56`
        #[arg(long)]
        amount: String,
        /// entrada/saida (or in/out)
        #[arg(long)]
        direction: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        method: Option<String>,
    },
    /// Change a transaction; its date never changes
    EditTransaction {
        id: String,
        #[command(flatten)]
        fields: TransactionArgs,
    },
}

#[derive(Args, Debug, Default)]
struct PatientArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    pathology: Option<String>,
    /// Ativo or Inativo
    #[arg(long)]
    status: Option<String>,
    /// DD/MM/YYYY
    #[arg(long)]
    last_visit: Option<String>,
}

/// Structured initial-assessment fields
#[derive(Args, Debug, Default)]
struct AssessmentArgs {
    #[arg(long)]
    complaint: Option<String>,
    #[arg(long)]
    history: Option<String>,
    #[arg(long)]
    medications: Option<String>,
    #[arg(long)]
    exam: Option<String>,
    #[arg(long)]
    functional: Option<String>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    goals: Option<String>,
    #[arg(long)]
    plan: Option<String>,
}

#[derive(Args, Debug, Default)]
struct AppointmentArgs {
    #[arg(long)]
    patient_id: Option<String>,
    /// YYYY-MM-DD or DD/MM/YYYY
    #[arg(long)]
    date: Option<String>,
    /// One of the agenda slots, e.g. 14:00
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    session_type: Option<String>,
    /// Confirmado, Pendente or Cancelado
    #[arg(long)]
    status: Option<String>,
}

#[derive(Args, Debug, Default)]
struct TransactionArgs {
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    /// entrada/saida (or in/out)
    #[arg(long)]
    direction: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    method: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Tui);

    // The TUI owns the terminal; keep log lines off it unless RUST_LOG asks
    init_logging(if matches!(command, Command::Tui) { "off" } else { "warn" });

    let storage = KvStorage::open(&cli.data.data)?;
    let mut store = ClinicStore::load(storage.clone(), today())?;
    let mut auth = AuthState::load(storage)?;

    match command {
        Command::Tui => run_ui_mode(store, auth)?,
        Command::Reset => {
            store.reset(today())?;
            println!("✓ Clinic data reset to the demo set");
        }
        Command::Login { email, password } => {
            if !auth.login(&email, &password)? {
                return Err(anyhow!("invalid login or password"));
            }
            if let Some(user) = auth.current_user() {
                println!("✓ Logged in as {}", user.name);
            }
        }
        Command::Logout => {
            auth.logout()?;
            println!("✓ Logged out");
        }
        Command::Patients { q } => run_patients(&store, q.as_deref().unwrap_or("")),
        Command::AddPatient(fields) => {
            let form = patient_form(PatientForm::default(), fields);
            let patient = store.add_patient(form.to_new(today()).map_err(invalid)?)?;
            println!("✓ Patient {} registered ({})", patient.name, patient.id);
        }
        Command::EditPatient { id, fields } => {
            let current = store
                .patient(&id)
                .ok_or_else(|| anyhow!("patient '{}' not found", id))?;
            let form = patient_form(PatientForm::from_patient(current), fields);
            let patient = store.update_patient(&id, form.to_patch(today()).map_err(invalid)?)?;
            println!("✓ Patient {} updated", patient.name);
        }
        Command::Records { patient } => run_records(&store, &patient),
        Command::AddRecord {
            patient_id,
            kind,
            summary,
            assessment,
        } => {
            let base = RecordForm {
                patient_id,
                ..Default::default()
            };
            let form = record_form(base, Some(&kind), summary, assessment)?;
            let author = auth.current_user().map(|u| u.name.as_str());
            let new = form
                .to_new(store.patients(), author, today())
                .map_err(invalid)?;
            let record = store.add_record(new)?;
            println!("✓ {} for {} saved ({})", record.kind.as_str(), record.patient, record.id);
        }
        Command::EditRecord {
            id,
            kind,
            summary,
            assessment,
        } => {
            let current = store
                .record(&id)
                .ok_or_else(|| anyhow!("record '{}' not found", id))?;
            let patient_id = store
                .patient_by_name(&current.patient)
                .map(|p| p.id.clone())
                .unwrap_or_default();
            let base = RecordForm::from_record(current, &patient_id);
            let form = record_form(base, kind.as_deref(), summary, assessment)?;
            let record = store.update_record(&id, form.to_patch().map_err(invalid)?)?;
            println!("✓ Record {} updated", record.id);
        }
        Command::PrintRecord { id, out } => {
            let record = store
                .record(&id)
                .ok_or_else(|| anyhow!("record '{}' not found", id))?;
            let text = printable_record(
                record,
                store.patient_by_name(&record.patient),
                auth.current_user(),
            );
            match out {
                Some(path) => {
                    fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("✓ Record written to {:?}", path);
                }
                None => print!("{}", text),
            }
        }
        Command::Agenda { date } => run_agenda(&store, date.as_deref())?,
        Command::Book(fields) => {
            let base = AppointmentForm {
                patient_id: String::new(),
                date: today(),
                time: String::new(),
                session_type: SessionType::default(),
                status: AppointmentStatus::default(),
            };
            let form = appointment_form(base, fields)?;
            let appt = store.add_appointment(form.to_new(store.patients()).map_err(invalid)?)?;
            println!(
                "✓ {} {} booked for {} ({})",
                format_date(appt.date),
                appt.time_label(),
                appt.patient,
                appt.id
            );
        }
        Command::EditAppointment { id, fields } => {
            let current = store
                .appointment(&id)
                .ok_or_else(|| anyhow!("appointment '{}' not found", id))?;
            let patient_id = store
                .patient_by_name(&current.patient)
                .map(|p| p.id.clone())
                .unwrap_or_default();
            let form = appointment_form(AppointmentForm::from_appointment(current, &patient_id), fields)?;
            let patch = form.to_patch(store.patients()).map_err(invalid)?;
            let appt = store.update_appointment(&id, patch)?;
            println!(
                "✓ {} {} {} - {}",
                format_date(appt.date),
                appt.time_label(),
                appt.patient,
                appt.status.as_str()
            );
        }
        Command::Finance { category } => run_finance(&store, category.as_deref()),
        Command::Export { out } => run_export(&store, &out)?,
        Command::AddTransaction {
            description,
            amount,
            direction,
            category,
            method,
        } => {
            let direction = parse_direction(&direction)?;
            let form = transaction_form(
                TransactionForm::blank(direction),
                TransactionArgs {
                    description: Some(description),
                    amount: Some(amount),
                    direction: None,
                    category,
                    method,
                },
            )?;
            let tx = store.add_transaction(form.to_new(today()).map_err(invalid)?)?;
            println!(
                "✓ {} {} - {} ({})",
                tx.direction.as_str(),
                format_brl(tx.amount),
                tx.description,
                tx.category
            );
        }
        Command::EditTransaction { id, fields } => {
            let current = store
                .transaction(&id)
                .ok_or_else(|| anyhow!("transaction '{}' not found", id))?;
            let form = transaction_form(TransactionForm::from_transaction(current), fields)?;
            let tx = store.update_transaction(&id, form.to_patch().map_err(invalid)?)?;
            println!(
                "✓ {} {} - {} ({})",
                format_date(tx.date),
                format_brl(tx.signed_amount()),
                tx.description,
                tx.category
            );
        }
    }

    Ok(())
}

fn invalid(errors: Vec<FieldError>) -> anyhow::Error {
    anyhow!(describe(&errors))
}

fn parse_direction(text: &str) -> Result<Direction> {
    Direction::parse(text).ok_or_else(|| anyhow!("unknown direction '{}' (use entrada or saida)", text))
}

// ============================================================================
// FLAGS ONTO FORMS
// ============================================================================

fn patient_form(mut form: PatientForm, fields: PatientArgs) -> PatientForm {
    let PatientArgs {
        name,
        age,
        phone,
        pathology,
        status,
        last_visit,
    } = fields;
    if let Some(name) = name {
        form.name = name;
    }
    if let Some(age) = age {
        form.age = age;
    }
    if let Some(phone) = phone {
        form.phone = phone;
    }
    if let Some(pathology) = pathology {
        form.pathology = pathology;
    }
    if let Some(status) = status {
        form.status = status;
    }
    if let Some(last_visit) = last_visit {
        form.last_visit = last_visit;
    }
    form
}

impl AssessmentArgs {
    /// Filled flags overwrite their field; the rest keep the stored text
    fn apply(self, assessment: &mut Assessment) {
        let pairs = [
            (self.complaint, &mut assessment.chief_complaint),
            (self.history, &mut assessment.illness_history),
            (self.medications, &mut assessment.medications),
            (self.exam, &mut assessment.physical_exam),
            (self.functional, &mut assessment.functional_assessment),
            (self.diagnosis, &mut assessment.diagnosis),
            (self.goals, &mut assessment.goals),
            (self.plan, &mut assessment.treatment_plan),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = Some(value).filter(|v| !v.trim().is_empty());
            }
        }
    }
}

fn record_form(
    mut form: RecordForm,
    kind: Option<&str>,
    summary: Option<String>,
    assessment: AssessmentArgs,
) -> Result<RecordForm> {
    if let Some(kind) = kind {
        form.kind = RecordKind::parse(kind).ok_or_else(|| {
            anyhow!("unknown record kind '{}' (Avaliação Inicial, Evolução or Alta)", kind)
        })?;
    }
    if let Some(summary) = summary {
        form.summary = summary;
    }
    let mut merged = form.assessment.take().unwrap_or_default();
    assessment.apply(&mut merged);
    form.assessment = Some(merged).filter(|a| !a.is_empty());
    Ok(form)
}

fn appointment_form(mut form: AppointmentForm, fields: AppointmentArgs) -> Result<AppointmentForm> {
    if let Some(patient_id) = fields.patient_id {
        form.patient_id = patient_id;
    }
    if let Some(text) = fields.date {
        form.date = parse_date(&text).ok_or_else(|| anyhow!("invalid date '{}'", text))?;
    }
    if let Some(time) = fields.time {
        form.time = time;
    }
    if let Some(text) = fields.session_type {
        form.session_type =
            SessionType::parse(&text).ok_or_else(|| anyhow!("unknown session type '{}'", text))?;
    }
    if let Some(text) = fields.status {
        form.status = AppointmentStatus::parse(&text)
            .ok_or_else(|| anyhow!("unknown status '{}' (Confirmado, Pendente or Cancelado)", text))?;
    }
    Ok(form)
}

fn transaction_form(mut form: TransactionForm, fields: TransactionArgs) -> Result<TransactionForm> {
    if let Some(text) = fields.direction {
        form.direction = parse_direction(&text)?;
    }
    if let Some(description) = fields.description {
        form.description = description;
    }
    if let Some(amount) = fields.amount {
        form.amount = amount;
    }
    if let Some(method) = fields.method {
        form.method = method;
    }
    if let Some(category) = fields.category {
        if is_preset_category(form.direction, &category) {
            form.category = category;
            form.custom_category.clear();
        } else {
            form.category = CUSTOM_CATEGORY.to_string();
            form.custom_category = category;
        }
    }
    Ok(form)
}

// ============================================================================
// LISTINGS
// ============================================================================

fn run_patients(store: &ClinicStore, term: &str) {
    let found = search_patients(store.patients(), term);
    println!("👥 {} patient(s)", found.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for p in found {
        println!(
            "{:<36}  {:<24} {:>3}  {:<16} {:<8} {}  {}",
            p.id,
            p.name,
            p.age,
            p.phone,
            p.status.as_str(),
            format_date(p.last_visit),
            p.pathology
        );
    }
}

fn run_records(store: &ClinicStore, patient: &str) {
    let records = records_for_patient(store.records(), patient);
    println!("📋 {} - {} record(s)", patient, records.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for record in records {
        println!(
            "\n{}  {}  ({})  [{}]",
            format_date(record.date),
            record.kind.as_str(),
            record.author,
            record.id
        );
        println!("  {}", record.summary);
        if let Some(assessment) = &record.assessment {
            for (label, value) in assessment.fields() {
                if let Some(value) = value {
                    println!("  • {}: {}", label, value);
                }
            }
        }
    }
}

fn run_agenda(store: &ClinicStore, date: Option<&str>) -> Result<()> {
    let date = match date {
        Some(text) => parse_date(text).ok_or_else(|| anyhow!("invalid date '{}'", text))?,
        None => today(),
    };

    println!("📅 Agenda {}", format_date(date));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for slot in day_schedule(store.appointments(), date) {
        match slot.appointment {
            Some(appt) => println!(
                "{}  {:<24} {:<18} {:<10} {}",
                slot.time.format("%H:%M"),
                appt.patient,
                appt.session_type.as_str(),
                appt.status.as_str(),
                appt.id
            ),
            None => println!("{}  -", slot.time.format("%H:%M")),
        }
    }
    Ok(())
}

fn run_finance(store: &ClinicStore, category: Option<&str>) {
    let summary = summarize(store.transactions());
    println!("💵 Finance");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Income:   {}", format_brl(summary.income));
    println!("Expenses: {}", format_brl(summary.expenses));
    println!("Balance:  {}", format_brl(summary.balance));
    println!();

    for tx in filter_by_category(store.transactions(), category) {
        println!(
            "{}  {:<30} {:<20} {:<18} {:>14}  {}",
            format_date(tx.date),
            tx.description,
            tx.category,
            tx.method.as_str(),
            format_brl(tx.signed_amount()),
            tx.id
        );
    }
}

fn run_export(store: &ClinicStore, out: &Path) -> Result<()> {
    let file = File::create(out).with_context(|| format!("Failed to create {:?}", out))?;
    let rows = export_csv(store.transactions(), file)?;
    println!("✓ Exported {} transactions to {:?}", rows, out);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: ClinicStore, auth: AuthState) -> Result<()> {
    let mut app = ui::App::new(store, auth, today());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: ClinicStore, _auth: AuthState) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the HTTP API: cargo run --bin fisio-server --features server");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fisio_clinic::entities::PatientStatus;

    fn store() -> ClinicStore {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        ClinicStore::load(KvStorage::open_in_memory().unwrap(), day).unwrap()
    }

    #[test]
    fn test_cli_parses_edit_commands() {
        let cli = Cli::try_parse_from([
            "fisio-clinic",
            "edit-record",
            "1",
            "--kind",
            "Avaliação Inicial",
            "--complaint",
            "Dor lombar",
        ])
        .unwrap();
        match cli.command {
            Some(Command::EditRecord { id, kind, assessment, .. }) => {
                assert_eq!(id, "1");
                assert_eq!(kind.as_deref(), Some("Avaliação Inicial"));
                assert_eq!(assessment.complaint.as_deref(), Some("Dor lombar"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["fisio-clinic", "book", "--patient-id", "2", "--time", "14:00"])
            .unwrap();
        assert!(matches!(cli.command, Some(Command::Book(AppointmentArgs { .. }))));
    }

    #[test]
    fn test_edit_patient_keeps_omitted_fields() {
        let store = store();
        let current = store.patient("1").unwrap();
        let form = patient_form(
            PatientForm::from_patient(current),
            PatientArgs {
                phone: Some("(11) 5555-0000".to_string()),
                ..Default::default()
            },
        );

        let patch = form.to_patch(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()).unwrap();
        assert_eq!(patch.phone.as_deref(), Some("(11) 5555-0000"));
        assert_eq!(patch.last_visit, Some(current.last_visit));
        assert_eq!(patch.age, Some(34));
        assert_eq!(patch.status, Some(PatientStatus::Active));
    }

    #[test]
    fn test_record_flags_fill_assessment() {
        let store = store();
        let form = record_form(
            RecordForm {
                patient_id: "1".to_string(),
                ..Default::default()
            },
            Some("avaliação inicial"),
            None,
            AssessmentArgs {
                complaint: Some("Dor lombar ao sentar".to_string()),
                plan: Some("Cinesioterapia".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let new = form.to_new(store.patients(), Some("Gerson Bruno"), day).unwrap();
        assert_eq!(new.kind, RecordKind::InitialAssessment);
        let assessment = new.assessment.unwrap();
        assert_eq!(assessment.chief_complaint.as_deref(), Some("Dor lombar ao sentar"));
        assert_eq!(assessment.treatment_plan.as_deref(), Some("Cinesioterapia"));

        assert!(record_form(RecordForm::default(), Some("Consulta"), None, AssessmentArgs::default()).is_err());
    }

    #[test]
    fn test_edit_record_merges_assessment_fields() {
        let base = RecordForm {
            patient_id: "1".to_string(),
            kind: RecordKind::InitialAssessment,
            summary: String::new(),
            assessment: Some(Assessment {
                chief_complaint: Some("Dor lombar".to_string()),
                goals: Some("Correr".to_string()),
                ..Default::default()
            }),
        };
        let form = record_form(
            base,
            None,
            None,
            AssessmentArgs {
                goals: Some(String::new()),
                diagnosis: Some("Lombalgia mecânica".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let assessment = form.assessment.unwrap();
        assert_eq!(assessment.chief_complaint.as_deref(), Some("Dor lombar"));
        assert_eq!(assessment.goals, None);
        assert_eq!(assessment.diagnosis.as_deref(), Some("Lombalgia mecânica"));
    }

    #[test]
    fn test_edit_appointment_flags() {
        let store = store();
        let current = store.appointment("1").unwrap();
        let form = appointment_form(
            AppointmentForm::from_appointment(current, "1"),
            AppointmentArgs {
                time: Some("15:00".to_string()),
                status: Some("pendente".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let patch = form.to_patch(store.patients()).unwrap();
        assert_eq!(patch.patient.as_deref(), Some("Ana Silva"));
        assert_eq!(patch.date, Some(current.date));
        assert_eq!(patch.status, Some(AppointmentStatus::Pending));
        assert_eq!(patch.session_type, Some(current.session_type));

        let bad = appointment_form(
            AppointmentForm::from_appointment(current, "1"),
            AppointmentArgs {
                date: Some("amanhã".to_string()),
                ..Default::default()
            },
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_edit_transaction_keeps_date_and_moves_category() {
        let mut store = store();
        let current = store.transaction("1").unwrap().clone();
        let form = transaction_form(
            TransactionForm::from_transaction(&current),
            TransactionArgs {
                amount: Some("180,00".to_string()),
                category: Some("Pilates".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let tx = store.update_transaction("1", form.to_patch().unwrap()).unwrap();
        assert_eq!(tx.amount, 180.0);
        assert_eq!(tx.category, "Pilates");
        assert_eq!(tx.date, current.date);

        let form = transaction_form(
            TransactionForm::blank(Direction::Outflow),
            TransactionArgs {
                direction: Some("talvez".to_string()),
                ..Default::default()
            },
        );
        assert!(form.is_err());
    }
}

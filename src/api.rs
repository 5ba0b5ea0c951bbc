// 🌐 HTTP API - JSON surface over the clinic store (feature `server`)
//
// Every response is wrapped as `{ success, data, error? }`.

use crate::auth::{AuthError, AuthState, NewUser, ProfilePatch, PublicProfile};
use crate::config::today;
use crate::finance::{by_category, categories_in_use, filter_by_category, summarize};
use crate::forms::{
    merge_form, parse_date, AppointmentForm, FieldError, PatientForm, RecordForm, TransactionForm,
};
use crate::report::printable_record;
use crate::store::{ClinicStore, StoreError};
use crate::views::{appointments_on, dashboard, day_schedule, records_for_patient, search_patients};
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ClinicStore>>,
    pub auth: Arc<Mutex<AuthState>>,
}

impl AppState {
    pub fn new(store: ClinicStore, auth: AuthState) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            auth: Arc::new(Mutex::new(auth)),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, ClinicStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("store lock poisoned".to_string()))
    }

    fn auth(&self) -> Result<MutexGuard<'_, AuthState>, ApiError> {
        self.auth
            .lock()
            .map_err(|_| ApiError::Internal("auth lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Invalid(Vec<FieldError>),
    Conflict(String),
    /// Wrong login or password
    Unauthorized,
    /// Clinic data asked for without a session
    LoginRequired,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, data) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail, serde_json::Value::Null),
            ApiError::Invalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                crate::forms::describe(&errors),
                serde_json::to_value(&errors).unwrap_or_default(),
            ),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, detail, serde_json::Value::Null),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Invalid login or password".to_string(),
                serde_json::Value::Null,
            ),
            ApiError::LoginRequired => (
                StatusCode::UNAUTHORIZED,
                "Login required".to_string(),
                serde_json::Value::Null,
            ),
            ApiError::Internal(detail) => {
                log::error!("API internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    serde_json::Value::Null,
                )
            }
        };

        let body = ApiResponse {
            success: false,
            data,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Invalid(errors)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::NotFound { .. }) => return ApiError::NotFound(err.to_string()),
            Some(StoreError::DuplicatePatientName(_)) => return ApiError::Conflict(err.to_string()),
            None => {}
        }
        match err.downcast_ref::<AuthError>() {
            Some(AuthError::EmailTaken(_)) => ApiError::Conflict(err.to_string()),
            Some(AuthError::MissingField(field)) => {
                ApiError::Invalid(vec![FieldError::new(field, "Required field is empty")])
            }
            None => ApiError::Internal(format!("{:#}", err)),
        }
    }
}

type ApiResult = Result<Response, ApiError>;

fn not_found(kind: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} '{}' not found", kind, id))
}

// ============================================================================
// SESSION GATE
// ============================================================================

/// Clinic routes answer 401 until someone logs in
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authenticated = match state.auth() {
        Ok(auth) => auth.is_authenticated(),
        Err(err) => return err.into_response(),
    };
    if !authenticated {
        return ApiError::LoginRequired.into_response();
    }
    next.run(request).await
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn parse_date_param(field: &str, text: &str) -> Result<chrono::NaiveDate, ApiError> {
    parse_date(text)
        .ok_or_else(|| ApiError::Invalid(vec![FieldError::new(field, "Expected YYYY-MM-DD")]))
}

// ============================================================================
// PATIENT HANDLERS
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/patients?q= - List patients, optionally filtered by name
async fn list_patients(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult {
    let store = state.store()?;
    let term = query.q.unwrap_or_default();
    Ok(ok(search_patients(store.patients(), &term)))
}

/// POST /api/patients
async fn create_patient(State(state): State<AppState>, Json(form): Json<PatientForm>) -> ApiResult {
    let new = form.to_new(today())?;
    let patient = state.store()?.add_patient(new)?;
    Ok(created(patient))
}

/// PATCH /api/patients/:id - Only the fields present in the body change
async fn update_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> ApiResult {
    let mut store = state.store()?;
    let current = store.patient(&id).ok_or_else(|| not_found("patient", &id))?;
    let form = merge_form(&PatientForm::from_patient(current), changes)?;
    let patch = form.to_patch(today())?;
    let patient = store.update_patient(&id, patch)?;
    Ok(ok(patient))
}

/// GET /api/patients/:id/records
async fn patient_records(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let store = state.store()?;
    let patient = store.patient(&id).ok_or_else(|| not_found("patient", &id))?;
    Ok(ok(records_for_patient(store.records(), &patient.name)))
}

// ============================================================================
// RECORD HANDLERS
// ============================================================================

/// GET /api/records
async fn list_records(State(state): State<AppState>) -> ApiResult {
    let store = state.store()?;
    Ok(ok(store.records()))
}

/// POST /api/records - Authored by the logged-in user
async fn create_record(State(state): State<AppState>, Json(form): Json<RecordForm>) -> ApiResult {
    let author = state.auth()?.current_user().map(|u| u.name.clone());
    let mut store = state.store()?;
    let new = form.to_new(store.patients(), author.as_deref(), today())?;
    let record = store.add_record(new)?;
    Ok(created(record))
}

/// PATCH /api/records/:id - Kind, summary and assessment; absent keys stay
async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> ApiResult {
    let mut store = state.store()?;
    let current = store.record(&id).ok_or_else(|| not_found("record", &id))?;
    let patient_id = store
        .patient_by_name(&current.patient)
        .map(|p| p.id.clone())
        .unwrap_or_default();
    let form = merge_form(&RecordForm::from_record(current, &patient_id), changes)?;
    let patch = form.to_patch()?;
    let record = store.update_record(&id, patch)?;
    Ok(ok(record))
}

/// GET /api/records/:id/print - Plain-text report signed by the current user
async fn print_record(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let signer = state.auth()?.current_user().cloned();
    let store = state.store()?;
    let record = store.record(&id).ok_or_else(|| not_found("record", &id))?;
    let text = printable_record(record, store.patient_by_name(&record.patient), signer.as_ref());
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

/// DELETE /api/records/:id
async fn delete_record(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let record = state.store()?.delete_record(&id)?;
    Ok(ok(record))
}

// ============================================================================
// FINANCE HANDLERS
// ============================================================================

/// GET /api/transactions?category=
async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult {
    let store = state.store()?;
    Ok(ok(filter_by_category(store.transactions(), query.category.as_deref())))
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    Json(form): Json<TransactionForm>,
) -> ApiResult {
    let new = form.to_new(today())?;
    let tx = state.store()?.add_transaction(new)?;
    Ok(created(tx))
}

/// PATCH /api/transactions/:id - The entry keeps its original date
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> ApiResult {
    let mut store = state.store()?;
    let current = store.transaction(&id).ok_or_else(|| not_found("transaction", &id))?;
    let form = merge_form(&TransactionForm::from_transaction(current), changes)?;
    let patch = form.to_patch()?;
    let tx = store.update_transaction(&id, patch)?;
    Ok(ok(tx))
}

/// DELETE /api/transactions/:id
async fn delete_transaction(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let tx = state.store()?.delete_transaction(&id)?;
    Ok(ok(tx))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinanceReport {
    summary: crate::finance::FinanceSummary,
    by_category: Vec<crate::finance::CategoryTotal>,
    categories: Vec<String>,
}

/// GET /api/finance/summary
async fn finance_summary(State(state): State<AppState>) -> ApiResult {
    let store = state.store()?;
    let txs = store.transactions();
    Ok(ok(FinanceReport {
        summary: summarize(txs),
        by_category: by_category(txs),
        categories: categories_in_use(txs),
    }))
}

// ============================================================================
// AGENDA HANDLERS
// ============================================================================

/// GET /api/appointments?date= - All appointments, or one day's sorted by time
async fn list_appointments(State(state): State<AppState>, Query(query): Query<DateQuery>) -> ApiResult {
    let store = state.store()?;
    match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(text) => {
            let date = parse_date_param("date", text)?;
            Ok(ok(appointments_on(store.appointments(), date)))
        }
        None => Ok(ok(store.appointments())),
    }
}

/// POST /api/appointments
async fn create_appointment(
    State(state): State<AppState>,
    Json(form): Json<AppointmentForm>,
) -> ApiResult {
    let mut store = state.store()?;
    let new = form.to_new(store.patients())?;
    let appt = store.add_appointment(new)?;
    Ok(created(appt))
}

/// PATCH /api/appointments/:id
async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> ApiResult {
    let mut store = state.store()?;
    let current = store.appointment(&id).ok_or_else(|| not_found("appointment", &id))?;
    let patient_id = store
        .patient_by_name(&current.patient)
        .map(|p| p.id.clone())
        .unwrap_or_default();
    let form = merge_form(&AppointmentForm::from_appointment(current, &patient_id), changes)?;
    let patch = form.to_patch(store.patients())?;
    let appt = store.update_appointment(&id, patch)?;
    Ok(ok(appt))
}

/// DELETE /api/appointments/:id
async fn delete_appointment(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let appt = state.store()?.delete_appointment(&id)?;
    Ok(ok(appt))
}

/// GET /api/agenda/:date - The slot grid for one day
async fn agenda(State(state): State<AppState>, Path(date): Path<String>) -> ApiResult {
    let date = parse_date_param("date", &date)?;
    let store = state.store()?;
    Ok(ok(day_schedule(store.appointments(), date)))
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<AppState>) -> ApiResult {
    let store = state.store()?;
    Ok(ok(dashboard(&store, today())))
}

// ============================================================================
// SESSION HANDLERS
// ============================================================================

/// POST /api/login
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult {
    let mut auth = state.auth()?;
    if !auth.login(&req.email, &req.password)? {
        return Err(ApiError::Unauthorized);
    }
    let profile = auth.current_user().map(PublicProfile::from);
    Ok(ok(profile))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>) -> ApiResult {
    state.auth()?.logout()?;
    Ok(ok("OK"))
}

/// GET /api/profile - The logged-in user, or null
async fn get_profile(State(state): State<AppState>) -> ApiResult {
    let auth = state.auth()?;
    Ok(ok(auth.current_user().map(PublicProfile::from)))
}

/// PATCH /api/profile
async fn update_profile(State(state): State<AppState>, Json(patch): Json<ProfilePatch>) -> ApiResult {
    let updated = state.auth()?.update_profile(patch)?;
    match updated {
        Some(user) => Ok(ok(PublicProfile::from(&user))),
        None => Err(ApiError::LoginRequired),
    }
}

/// POST /api/users - Register a new profile
async fn register(State(state): State<AppState>, Json(new): Json<NewUser>) -> ApiResult {
    let user = state.auth()?.register(new)?;
    Ok(created(PublicProfile::from(&user)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// The `/api` routes; the server binary nests this and adds static pages.
/// Session and registration routes are open, everything else needs a login.
pub fn api_router(state: AppState) -> Router {
    let clinic = Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", patch(update_patient))
        .route("/patients/:id/records", get(patient_records))
        .route("/records", get(list_records).post(create_record))
        .route("/records/:id", patch(update_record).delete(delete_record))
        .route("/records/:id/print", get(print_record))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/:id",
            patch(update_transaction).delete(delete_transaction),
        )
        .route("/finance/summary", get(finance_summary))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/:id",
            patch(update_appointment).delete(delete_appointment),
        )
        .route("/agenda/:date", get(agenda))
        .route("/dashboard", get(get_dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/users", post(register))
        .merge(clinic)
        .with_state(state)
}

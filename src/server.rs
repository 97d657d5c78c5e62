use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data::{
    AssignmentEntry, ClassroomId, ConstraintRecord, Department, DepartmentId, FormId, StaffId,
    SubjectId,
};
use crate::error::{ServiceError, StoreError, ValidationError};
use crate::forms::ChoiceForm;
use crate::selection::SubjectSelection;
use crate::service::{GenerationReport, TimetableService};
use crate::store::{GenerationLogEntry, InMemoryStore};
use crate::views::{ClassroomTimetable, StaffTimetable, StudentView};

pub type SharedService = Arc<TimetableService<InMemoryStore>>;

type ApiResult<T> = Result<Json<T>, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Config(_) => StatusCode::BAD_REQUEST,
            ServiceError::Validation(err) => match err {
                ValidationError::UnknownStaff(_) | ValidationError::UnknownForm(_) => {
                    StatusCode::NOT_FOUND
                }
                ValidationError::SelectionLocked { .. }
                | ValidationError::FormNotOpen { .. }
                | ValidationError::InvalidFormTransition { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            ServiceError::Store(StoreError::UnknownDepartment(_))
            | ServiceError::NotGenerated(_)
            | ServiceError::UnknownStaff(_)
            | ServiceError::UnknownClassroom(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionRequest {
    subject_ids: Vec<SubjectId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFormRequest {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionRequest {
    staff_id: StaffId,
    subject_ids: Vec<SubjectId>,
    #[serde(default)]
    notes: String,
}

async fn upsert_department(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
    Json(mut department): Json<Department>,
) -> Result<StatusCode, ServiceError> {
    department.id = department_id;
    service.upsert_department(department)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_constraints(
    State(service): State<SharedService>,
    Json(records): Json<Vec<ConstraintRecord>>,
) -> Result<StatusCode, ServiceError> {
    service.replace_constraints(records)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn generate_handler(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<GenerationReport> {
    service.generate(department_id).await.map(Json)
}

async fn entries_handler(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<Vec<AssignmentEntry>> {
    service.entries(department_id).map(Json)
}

async fn student_view(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<StudentView> {
    service.student_view(department_id).map(Json)
}

async fn staff_view(
    State(service): State<SharedService>,
    Path((department_id, staff_id)): Path<(DepartmentId, StaffId)>,
) -> ApiResult<StaffTimetable> {
    service.staff_view(department_id, staff_id).map(Json)
}

async fn classroom_view(
    State(service): State<SharedService>,
    Path((department_id, classroom_id)): Path<(DepartmentId, ClassroomId)>,
) -> ApiResult<ClassroomTimetable> {
    service.classroom_view(department_id, classroom_id).map(Json)
}

async fn lab_view(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<BTreeMap<ClassroomId, ClassroomTimetable>> {
    service.lab_view(department_id).map(Json)
}

async fn generation_log(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
) -> ApiResult<Vec<GenerationLogEntry>> {
    service.generation_log(department_id).map(Json)
}

async fn select_handler(
    State(service): State<SharedService>,
    Path((department_id, staff_id)): Path<(DepartmentId, StaffId)>,
    Json(request): Json<SelectionRequest>,
) -> ApiResult<SubjectSelection> {
    service
        .select_subjects(department_id, staff_id, &request.subject_ids)
        .map(Json)
}

async fn create_form(
    State(service): State<SharedService>,
    Path(department_id): Path<DepartmentId>,
    Json(request): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<ChoiceForm>), ServiceError> {
    let form = service.create_form(department_id, request.title, request.description)?;
    Ok((StatusCode::CREATED, Json(form)))
}

async fn open_form(
    State(service): State<SharedService>,
    Path((department_id, form_id)): Path<(DepartmentId, FormId)>,
) -> ApiResult<ChoiceForm> {
    service.open_form(department_id, form_id).map(Json)
}

async fn close_form(
    State(service): State<SharedService>,
    Path((department_id, form_id)): Path<(DepartmentId, FormId)>,
) -> ApiResult<ChoiceForm> {
    service.close_form(department_id, form_id).map(Json)
}

async fn submit_handler(
    State(service): State<SharedService>,
    Path((department_id, form_id)): Path<(DepartmentId, FormId)>,
    Json(request): Json<SubmissionRequest>,
) -> Result<StatusCode, ServiceError> {
    let replaced = service.submit_preferences(
        department_id,
        form_id,
        request.staff_id,
        request.subject_ids,
        request.notes,
    )?;
    Ok(if replaced { StatusCode::OK } else { StatusCode::CREATED })
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/v1/constraints", put(replace_constraints))
        .route("/v1/departments/:dept", put(upsert_department))
        .route("/v1/departments/:dept/timetable/generate", post(generate_handler))
        .route("/v1/departments/:dept/timetable/entries", get(entries_handler))
        .route("/v1/departments/:dept/timetable/student", get(student_view))
        .route("/v1/departments/:dept/timetable/staff/:staff", get(staff_view))
        .route(
            "/v1/departments/:dept/timetable/classrooms/:room",
            get(classroom_view),
        )
        .route("/v1/departments/:dept/timetable/lab", get(lab_view))
        .route("/v1/departments/:dept/timetable/logs", get(generation_log))
        .route(
            "/v1/departments/:dept/staff/:staff/selection",
            post(select_handler),
        )
        .route("/v1/departments/:dept/forms", post(create_form))
        .route("/v1/departments/:dept/forms/:form/open", post(open_form))
        .route("/v1/departments/:dept/forms/:form/close", post(close_form))
        .route(
            "/v1/departments/:dept/forms/:form/submissions",
            post(submit_handler),
        )
        .with_state(service)
}

pub async fn run_server(
    listen_addr: std::net::SocketAddr,
    service: SharedService,
) -> std::io::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use dept_timetable::server::router;
use dept_timetable::service::TimetableService;
use dept_timetable::store::InMemoryStore;

fn app() -> Router {
    let service = TimetableService::new(Arc::new(InMemoryStore::new()), Duration::from_secs(10));
    router(Arc::new(service))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

fn department() -> Value {
    json!({
        "id": 1,
        "name": "Computer Science",
        "config": {
            "workingDays": ["Mon", "Tue", "Wed", "Thu", "Fri"],
            "periodsPerDay": 6,
            "startTime": "09:00",
            "endTime": "16:00"
        },
        "staff": [
            {"id": 1, "name": "S1", "role": "professor"},
            {"id": 2, "name": "S2", "role": "assistant_professor"}
        ],
        "subjects": [
            {"id": 10, "name": "A", "code": "CS-A", "credits": 3},
            {"id": 20, "name": "B", "code": "CS-B", "credits": 3},
            {"id": 30, "name": "C", "code": "CS-C", "credits": 3}
        ],
        "classrooms": [
            {"id": 100, "name": "Hardware Lab", "capacity": 40}
        ]
    })
}

fn constraints() -> Value {
    json!([
        {"departmentId": 1, "role": "professor", "maxSubjects": 1, "maxHoursPerWeek": 8},
        {"role": "assistant_professor", "maxSubjects": 2, "maxHoursPerWeek": 8}
    ])
}

async fn seed(app: &Router) {
    let (status, _) = call(app, Method::PUT, "/v1/departments/1", Some(department())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(app, Method::PUT, "/v1/constraints", Some(constraints())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

fn facts(entries: &Value) -> BTreeSet<(String, u64, u64, u64, u64)> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["day"].as_str().unwrap().to_string(),
                e["timeSlot"].as_u64().unwrap(),
                e["classroomId"].as_u64().unwrap(),
                e["staffId"].as_u64().unwrap(),
                e["subjectId"].as_u64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn generate_through_selection_and_views() {
    let app = app();
    seed(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/departments/1/staff/1/selection",
        Some(json!({"subjectIds": [10]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"state": "locked", "subjects": [10]}));

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/departments/1/staff/1/selection",
        Some(json!({"subjectIds": [20]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/departments/1/staff/2/selection",
        Some(json!({"subjectIds": [20, 30]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = call(&app, Method::POST, "/v1/departments/1/timetable/generate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["entries"].as_array().unwrap().len(), 14);
    assert_eq!(
        report["shortfalls"],
        json!([{
            "staffId": 2,
            "subjectId": 30,
            "requiredHours": 6,
            "assignedHours": 2,
            "reason": "hourCap"
        }])
    );

    // no double booking
    let entries = report["entries"].as_array().unwrap();
    let rooms: HashSet<_> = entries
        .iter()
        .map(|e| (e["day"].clone().to_string(), e["timeSlot"].as_u64(), e["classroomId"].as_u64()))
        .collect();
    assert_eq!(rooms.len(), entries.len());

    let (status, raw) = call(&app, Method::GET, "/v1/departments/1/timetable/entries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(facts(&raw), facts(&report["entries"]));

    let (status, student) = call(&app, Method::GET, "/v1/departments/1/timetable/student", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(student["schedule"]["Mon"]["1"][0]["staff"], "S1");
    assert_eq!(student["schedule"]["Wed"]["2"][0]["subject"], "C");
    assert_eq!(student["periods"]["6"], json!({"label": "Period 6", "start": "14:00", "end": "15:00"}));

    let (status, staff) = call(&app, Method::GET, "/v1/departments/1/timetable/staff/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staff["name"], "S2");
    assert_eq!(staff["schedule"]["Tue"].as_object().unwrap().len(), 6);

    let (status, room) = call(&app, Method::GET, "/v1/departments/1/timetable/classrooms/100", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["kind"], "lab");

    let (status, labs) = call(&app, Method::GET, "/v1/departments/1/timetable/lab", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(labs["100"], room);

    let (status, logs) = call(&app, Method::GET, "/v1/departments/1/timetable/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs[0]["status"], "committed");
    assert_eq!(logs[0]["entriesCount"], 14);

    let (status, again) = call(&app, Method::POST, "/v1/departments/1/timetable/generate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["views"], report["views"]);
    assert_eq!(again["run"], 2);
}

#[tokio::test]
async fn choice_form_flow() {
    let app = app();
    seed(&app).await;

    let (status, form) = call(
        &app,
        Method::POST,
        "/v1/departments/1/forms",
        Some(json!({"title": "Odd semester"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(form["status"], "draft");

    let submit = json!({"staffId": 2, "subjectIds": [30, 20]});
    let (status, _) = call(&app, Method::POST, "/v1/departments/1/forms/1/submissions", Some(submit.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, form) = call(&app, Method::POST, "/v1/departments/1/forms/1/open", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["status"], "open");

    let (status, _) = call(&app, Method::POST, "/v1/departments/1/forms/1/submissions", Some(submit.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, Method::POST, "/v1/departments/1/forms/1/submissions", Some(submit)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, form) = call(&app, Method::POST, "/v1/departments/1/forms/1/close", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["submissions"].as_object().unwrap().len(), 1);

    let (status, _) = call(&app, Method::POST, "/v1/departments/1/forms/1/open", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = call(&app, Method::POST, "/v1/departments/1/timetable/generate", None).await;
    assert_eq!(status, StatusCode::OK);
    // S2 prefers C first: six hours of C, then two of B
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries.iter().filter(|e| e["subjectId"] == 30).count(), 6);
    assert_eq!(entries.iter().filter(|e| e["subjectId"] == 20).count(), 2);
    assert_eq!(report["unscheduled"], json!([{"staffId": 1, "reason": "noPreferences"}]));
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let app = app();

    let (status, _) = call(&app, Method::POST, "/v1/departments/9/timetable/generate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    seed(&app).await;
    let (status, _) = call(&app, Method::GET, "/v1/departments/1/timetable/student", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/v1/constraints",
        Some(json!([{"departmentId": 1, "role": "professor", "maxSubjects": -1, "maxHoursPerWeek": 8}])),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = call(&app, Method::POST, "/v1/departments/1/timetable/generate", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("maxSubjects"));

    // a department push must not unlock a selection
    call(&app, Method::PUT, "/v1/constraints", Some(constraints())).await;
    let select = |subject: u32| Some(json!({"subjectIds": [subject]}));
    let uri = "/v1/departments/1/staff/1/selection";
    assert_eq!(call(&app, Method::POST, uri, select(10)).await.0, StatusCode::OK);
    let (status, _) = call(&app, Method::PUT, "/v1/departments/1", Some(department())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(call(&app, Method::POST, uri, select(20)).await.0, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/departments/1/staff/99/selection",
        Some(json!({"subjectIds": [10]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

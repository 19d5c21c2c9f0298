use api_rest::{app, build_state};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lis_core::{CoreConfig, EntityId, TransitionPolicy};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router() -> Router {
    app(build_state(CoreConfig::default(), None).expect("state"))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    actor: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_vec(&v).expect("encode body")),
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

fn id_of(body: &Value) -> String {
    body["data"]["id"]
        .as_str()
        .expect("data.id should be a string")
        .to_string()
}

/// Seeds a user, a patient, one test and an order. Returns (actor, test, order).
async fn seed(app: &Router) -> (String, String, String) {
    let (status, user) = call(
        app,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "name": "Sam Bench", "email": "sam@lab.example", "role": "lab_technician" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{user}");
    let actor = id_of(&user);

    let (status, patient) = call(
        app,
        Method::POST,
        "/api/v1/patients",
        Some(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1985-12-10",
            "gender": "female",
        })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{patient}");

    let (status, test) = call(
        app,
        Method::POST,
        "/api/v1/tests",
        Some(json!({
            "code": "glu",
            "name": "Glucose",
            "sample_type": "blood",
            "price": 20.0,
            "normal_range": { "min": 3.9, "max": 5.5, "unit": "mmol/L" },
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{test}");
    assert_eq!(test["data"]["code"], "GLU");

    let (status, order) = call(
        app,
        Method::POST,
        "/api/v1/orders",
        Some(json!({ "patient": id_of(&patient), "tests": [id_of(&test)] })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["data"]["total_amount"], 20.0);

    (actor, id_of(&test), id_of(&order))
}

#[tokio::test]
async fn health_is_open() {
    let (status, body) = call(&router(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn unknown_patient_uses_error_envelope() {
    let uri = format!("/api/v1/patients/{}", EntityId::new());
    let (status, body) = call(&router(), Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().expect("message").contains("patient"));
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let (status, body) = call(
        &router(),
        Method::GET,
        "/api/v1/orders/not-an-id",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn writes_require_an_actor() {
    let app = router();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/patients",
        Some(json!({ "first_name": "A", "last_name": "B", "date_of_birth": "1990-01-01" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().expect("message").contains("x-actor-id"));
}

#[tokio::test]
async fn configured_api_key_is_enforced() {
    let app = app(build_state(CoreConfig::default(), Some("secret".into())).expect("state"));

    let (status, body) = call(&app, Method::GET, "/api/v1/tests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/tests")
                .header("x-api-key", "secret")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sample_collection_moves_order_forward() {
    let app = router();
    let (actor, test, order) = seed(&app).await;
    let (_, order_body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/orders/{order}"),
        None,
        None,
    )
    .await;
    let patient = order_body["data"]["patient"].as_str().expect("patient").to_string();

    let (status, sample) = call(
        &app,
        Method::POST,
        "/api/v1/samples",
        Some(json!({
            "order": order,
            "patient": patient,
            "tests": [test],
            "sample_type": "blood",
            "priority": "stat",
        })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{sample}");
    assert_eq!(sample["data"]["collection_status"], "pending");

    let (_, pending) = call(&app, Method::GET, "/api/v1/samples/pending", None, None).await;
    assert_eq!(pending["data"].as_array().expect("array").len(), 1);

    let (status, collected) = call(
        &app,
        Method::PATCH,
        &format!("/api/v1/samples/{}/status", id_of(&sample)),
        Some(json!({ "status": "collected" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{collected}");
    assert!(collected["data"]["expiry_date"].is_string());

    let (_, order_body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/orders/{order}"),
        None,
        None,
    )
    .await;
    assert_eq!(order_body["data"]["status"], "sample_collected");

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!("/api/v1/orders/{order}/status"),
        Some(json!({ "status": "pending" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (_, stats) = call(&app, Method::GET, "/api/v1/samples/stats", None, None).await;
    assert_eq!(stats["data"][0]["status"], "collected");
    assert_eq!(stats["data"][0]["count"], 1);
}

#[tokio::test]
async fn results_flow_to_an_amended_report() {
    let app = router();
    let (actor, test, order) = seed(&app).await;

    let (status, result) = call(
        &app,
        Method::POST,
        "/api/v1/results",
        Some(json!({
            "order": order,
            "test": test,
            "value": "7.8 mmol/L",
            "value_type": "number",
        })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{result}");
    assert_eq!(result["data"]["is_abnormal"], true);
    assert_eq!(result["data"]["status"], "completed");
    let result_id = id_of(&result);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/results",
        Some(json!({ "order": order, "test": test, "value": 5, "value_type": "number" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, bulk) = call(
        &app,
        Method::POST,
        "/api/v1/results/bulk-verify",
        Some(json!({ "ids": [result_id, EntityId::new().to_string()] })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{bulk}");
    assert_eq!(bulk["data"], json!({ "matched": 1, "modified": 1 }));

    let (status, report) = call(
        &app,
        Method::POST,
        "/api/v1/reports",
        Some(json!({
            "order": order,
            "doctor": actor,
            "results": [result_id],
            "interpretation": "Raised fasting glucose",
        })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{report}");
    let report_id = id_of(&report);
    let number = report["data"]["report_number"]
        .as_str()
        .expect("number")
        .to_string();

    for step in ["submit", "approve"] {
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/reports/{report_id}/{step}"),
            None,
            Some(&actor),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{step}: {body}");
    }
    let (status, delivered) = call(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{report_id}/deliver"),
        Some(json!({ "delivered_to": "gp@clinic.example" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{delivered}");
    assert_eq!(delivered["data"]["status"], "delivered");

    let (status, amended) = call(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{report_id}/amend"),
        Some(json!({ "reason": "units corrected", "comments": "Repeat fasting sample" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{amended}");
    assert_eq!(amended["data"]["report_number"], format!("{number}-V2"));
    assert_eq!(amended["data"]["status"], "draft");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{report_id}/amend"),
        Some(json!({ "reason": "again" })),
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, chain) = call(
        &app,
        Method::GET,
        &format!("/api/v1/reports/{}/chain", id_of(&amended)),
        None,
        None,
    )
    .await;
    let versions: Vec<u64> = chain["data"]
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["version"].as_u64().expect("version"))
        .collect();
    assert_eq!(versions, [1, 2]);
}

#[tokio::test]
async fn strict_policy_rejects_report_shortcuts() {
    let cfg = CoreConfig::new(None, TransitionPolicy::Strict, 7).expect("config");
    let app = app(build_state(cfg, None).expect("state"));
    let (actor, _, order) = seed(&app).await;

    let (_, report) = call(
        &app,
        Method::POST,
        "/api/v1/reports",
        Some(json!({ "order": order, "doctor": actor })),
        Some(&actor),
    )
    .await;
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/reports/{}/approve", id_of(&report)),
        None,
        Some(&actor),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("draft"));
}

//! End-to-end tests against the full router, security layers included.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use std::sync::Arc;

use securebiz::models::{NewCredential, Role};
use securebiz::{
    AppConfig, AppState, CredentialStore, Environment, MemoryStore, SecretPolicy, SigningSecret,
    SESSION_COOKIE,
};
use uuid::Uuid;

const SECRET: &str = "Zq8vK2mX7pL4nR9tW3yB6cH1jF5dG0sA";

fn test_app() -> Router {
    test_app_with_store().0
}

fn test_app_with_store() -> (Router, Arc<MemoryStore>) {
    let secret = SigningSecret::new(SECRET, &SecretPolicy::default()).unwrap();
    let config = AppConfig::builder(secret)
        .environment(Environment::Test)
        .bcrypt_cost(4)
        .build()
        .unwrap();
    let store = MemoryStore::with_reference_data().shared();
    let app = securebiz::app(AppState::with_store(config, store.clone()).unwrap());
    (app, store)
}

struct Reply {
    status: StatusCode,
    session: Option<String>,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    // "session=<token>; HttpOnly; ..." -> "session=<token>"
    let session = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(String::from);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        session,
        body,
    }
}

async fn register(app: &Router, email: &str, company: &str) -> (String, Value) {
    let reply = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "name": "Ada",
            "email": email,
            "password": "password123",
            "company": company,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    (reply.session.unwrap(), reply.body["data"].clone())
}

async fn login(app: &Router, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.session.unwrap()
}

async fn first_module_id(app: &Router) -> Value {
    let reply = send(app, Method::GET, "/training/modules", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.body["data"][0]["id"].clone()
}

async fn add_asset(app: &Router, cookie: &str, name: &str) -> Value {
    let reply = send(
        app,
        Method::POST,
        "/assets",
        Some(cookie),
        Some(json!({ "name": name, "type": "server", "ipAddress": "10.0.0.5" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["data"].clone()
}

#[tokio::test]
async fn register_then_login_returns_same_organization() {
    let app = test_app();
    let (_, registered) = register(&app, "a@b.com", "Acme").await;
    assert_eq!(registered["email"], "a@b.com");
    assert_eq!(registered["role"], "Owner");

    let reply = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "password123" })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["id"], registered["id"]);
    assert_eq!(reply.body["data"]["organizationId"], registered["organizationId"]);

    let cookie = reply.session.unwrap();
    let me = send(&app, Method::GET, "/auth/session", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "a@b.com");
}

#[tokio::test]
async fn login_failures_look_identical() {
    let app = test_app();
    register(&app, "a@b.com", "Acme").await;

    let wrong_password = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "wrongpass1" })),
    )
    .await;
    let unknown_email = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@b.com", "password": "password123" })),
    )
    .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);

    // identical apart from each request's own correlation id
    let strip = |mut body: Value| {
        body.as_object_mut().unwrap().remove("requestId");
        body
    };
    assert_eq!(strip(wrong_password.body.clone()), strip(unknown_email.body));
    assert_eq!(wrong_password.body["error"], "Invalid email or password");
    assert!(wrong_password.session.is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app();
    register(&app, "a@b.com", "Acme").await;

    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "name": "Bob",
            "email": "A@b.com",
            "password": "password123",
            "company": "Other",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"], "Email already in use");
    assert_eq!(reply.body["field"], "email");
}

#[tokio::test]
async fn validation_failure_uses_envelope() {
    let app = test_app();
    let reply = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "name": "Ada",
            "email": "a@b.com",
            "password": "password123",
            "company": "A",
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"], "Company name must be at least 2 characters");
    assert_eq!(reply.body["field"], "company");
}

#[tokio::test]
async fn privileged_routes_require_session() {
    let app = test_app();
    for uri in ["/assets", "/threats", "/compliance/status", "/dashboard", "/auth/session"] {
        let reply = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(reply.body["success"], false);
        assert_eq!(reply.body["error"], "Unauthorized");
    }

    let forged = format!("{SESSION_COOKIE}=not-a-token");
    let reply = send(&app, Method::GET, "/assets", Some(&forged), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = test_app();
    let (cookie, _) = register(&app, "a@b.com", "Acme").await;

    let reply = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);

    // the old token is refused even if the client kept it
    let reply = send(&app, Method::GET, "/auth/session", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(&app, Method::POST, "/auth/logout", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn assets_are_listed_newest_first_and_deletable() {
    let app = test_app();
    let (cookie, _) = register(&app, "a@b.com", "Acme").await;

    let first = add_asset(&app, &cookie, "db-01").await;
    let second = add_asset(&app, &cookie, "web-01").await;

    let reply = send(&app, Method::GET, "/assets", Some(&cookie), None).await;
    let assets = reply.body["data"].as_array().unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0]["id"], second["id"]);
    assert_eq!(assets[1]["id"], first["id"]);

    let uri = format!("/assets/{}", first["id"].as_str().unwrap());
    let reply = send(&app, Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(&app, Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&app, Method::GET, "/assets", Some(&cookie), None).await;
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn organizations_are_isolated() {
    let app = test_app();
    let (acme, _) = register(&app, "a@acme.com", "Acme").await;
    let (globex, _) = register(&app, "b@globex.com", "Globex").await;

    // assets
    let asset = add_asset(&app, &acme, "db-01").await;
    let reply = send(&app, Method::GET, "/assets", Some(&globex), None).await;
    assert_eq!(reply.body["data"], json!([]));

    let uri = format!("/assets/{}", asset["id"].as_str().unwrap());
    let reply = send(&app, Method::DELETE, &uri, Some(&globex), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = send(&app, Method::GET, "/assets", Some(&acme), None).await;
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 1);

    // threats
    let reply = send(
        &app,
        Method::POST,
        "/threats",
        Some(&acme),
        Some(json!({
            "eventType": "login_attempt",
            "severity": "High",
            "source": "vpn",
            "description": "Repeated failed logins",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let threat_id = reply.body["data"]["id"].as_str().unwrap().to_string();

    let reply = send(&app, Method::GET, "/threats", Some(&globex), None).await;
    assert_eq!(reply.body["data"], json!([]));

    let uri = format!("/threats/{threat_id}/status");
    let reply = send(
        &app,
        Method::PUT,
        &uri,
        Some(&globex),
        Some(json!({ "status": "Resolved" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    // compliance
    let frameworks = send(&app, Method::GET, "/compliance/frameworks", None, None).await;
    let requirement_id = frameworks.body["data"][0]["requirements"][0]["id"].clone();
    let reply = send(
        &app,
        Method::PUT,
        "/compliance/status",
        Some(&acme),
        Some(json!({ "requirementId": requirement_id, "status": "Completed" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let reply = send(&app, Method::GET, "/compliance/status", Some(&acme), None).await;
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 1);
    let reply = send(&app, Method::GET, "/compliance/status", Some(&globex), None).await;
    assert_eq!(reply.body["data"], json!([]));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(headers.contains_key("x-correlation-id"));
}

#[tokio::test]
async fn error_envelope_carries_correlation_id() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/assets")
                .header("x-correlation-id", "corr-401")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-correlation-id"], "corr-401");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["requestId"], "corr-401");
}

#[tokio::test]
async fn malformed_path_and_query_use_envelope() {
    let app = test_app();
    let (cookie, _) = register(&app, "a@b.com", "Acme").await;

    let reply = send(&app, Method::DELETE, "/assets/not-a-uuid", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"], "Invalid path parameter");

    let reply = send(
        &app,
        Method::PUT,
        "/threats/zzz/status",
        Some(&cookie),
        Some(json!({ "status": "Resolved" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "Invalid path parameter");

    let reply = send(&app, Method::GET, "/training/progress?userId=zzz", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"], "Invalid query string");
}

#[tokio::test]
async fn scan_without_body_runs_full_scan() {
    let app = test_app();
    let (cookie, _) = register(&app, "a@b.com", "Acme").await;

    let reply = send(&app, Method::POST, "/scans", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["data"]["scanType"], "full");
    assert_eq!(reply.body["data"]["status"], "In Progress");

    let reply = send(
        &app,
        Method::POST,
        "/scans",
        Some(&cookie),
        Some(json!({ "scanType": "network" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["data"]["scanType"], "network");

    let reply = send(
        &app,
        Method::POST,
        "/scans",
        Some(&cookie),
        Some(json!({ "scanType": "everything" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);

    let reply = send(&app, Method::GET, "/scans", Some(&cookie), None).await;
    let scans = reply.body["data"].as_array().unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0]["scanType"], "network");
}

#[tokio::test]
async fn training_progress_is_scoped_to_organization() {
    let app = test_app();
    let (acme, ada) = register(&app, "a@acme.com", "Acme").await;
    let (_, grace) = register(&app, "g@globex.com", "Globex").await;
    let module_id = first_module_id(&app).await;

    let reply = send(
        &app,
        Method::POST,
        "/training/start",
        Some(&acme),
        Some(json!({ "moduleId": module_id })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["data"]["status"], "In Progress");

    let reply = send(&app, Method::GET, "/training/progress", Some(&acme), None).await;
    let entries = reply.body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["moduleId"], module_id);
    assert_eq!(entries[0]["module"]["id"], module_id);

    let own = format!("/training/progress?userId={}", ada["id"].as_str().unwrap());
    let reply = send(&app, Method::GET, &own, Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 1);

    let foreign = format!("/training/progress?userId={}", grace["id"].as_str().unwrap());
    let reply = send(&app, Method::GET, &foreign, Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "User not found");

    let unknown = format!("/training/progress?userId={}", Uuid::new_v4());
    let reply = send(&app, Method::GET, &unknown, Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn training_assignment_stays_inside_organization() {
    let app = test_app();
    let (acme, ada) = register(&app, "a@acme.com", "Acme").await;
    let (_, grace) = register(&app, "g@globex.com", "Globex").await;
    let module_id = first_module_id(&app).await;

    let reply = send(
        &app,
        Method::POST,
        "/training/assign",
        Some(&acme),
        Some(json!({ "moduleId": module_id, "userIds": [ada["id"], grace["id"]] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "User not found");
    assert_eq!(reply.body["field"], "userIds");

    // nothing was assigned by the rejected request
    let reply = send(&app, Method::GET, "/training/progress", Some(&acme), None).await;
    assert_eq!(reply.body["data"], json!([]));

    let reply = send(
        &app,
        Method::POST,
        "/training/assign",
        Some(&acme),
        Some(json!({ "moduleId": module_id, "userIds": [ada["id"], ada["id"]] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["data"]["moduleId"], module_id);
    assert_eq!(reply.body["data"]["assigned"], 1);

    let reply = send(
        &app,
        Method::POST,
        "/training/assign",
        Some(&acme),
        Some(json!({ "moduleId": module_id, "userIds": [ada["id"]] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["data"]["assigned"], 0);

    let reply = send(&app, Method::GET, "/training/progress", Some(&acme), None).await;
    let entries = reply.body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "Not Started");
}

#[tokio::test]
async fn members_cannot_assign_training() {
    let (app, store) = test_app_with_store();
    let (owner, ada) = register(&app, "a@acme.com", "Acme").await;

    let member = store
        .create_credential(NewCredential {
            name: "Mel".into(),
            email: "mel@acme.com".into(),
            password_hash: securebiz::password::hash_password("password123", 4).unwrap(),
            organization_id: ada["organizationId"].as_str().unwrap().parse().unwrap(),
            role: Role::Member,
        })
        .await
        .unwrap();
    let member_cookie = login(&app, "mel@acme.com").await;
    let module_id = first_module_id(&app).await;

    let reply = send(
        &app,
        Method::POST,
        "/training/assign",
        Some(&member_cookie),
        Some(json!({ "moduleId": module_id, "userIds": [member.id] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"], "Access denied");

    let reply = send(
        &app,
        Method::POST,
        "/training/assign",
        Some(&owner),
        Some(json!({ "moduleId": module_id, "userIds": [member.id] })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    // same-organization colleagues can read each other's progress
    let uri = format!("/training/progress?userId={}", member.id);
    let reply = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn compliance_report_counts_every_requirement() {
    let app = test_app();
    let (cookie, registered) = register(&app, "a@b.com", "Acme").await;

    let frameworks = send(&app, Method::GET, "/compliance/frameworks", None, None).await;
    let requirements: Vec<Value> = frameworks.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|f| f["requirements"].as_array().unwrap().clone())
        .collect();
    assert_eq!(requirements.len(), 14);

    for (requirement, status) in [(&requirements[0], "Completed"), (&requirements[1], "In Progress")] {
        let reply = send(
            &app,
            Method::PUT,
            "/compliance/status",
            Some(&cookie),
            Some(json!({ "requirementId": requirement["id"], "status": status })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    }

    let reply = send(&app, Method::POST, "/compliance/report", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let report = &reply.body["data"];
    assert_eq!(report["totalRequirements"], 14);
    assert_eq!(report["completed"], 1);
    assert_eq!(report["inProgress"], 1);
    assert_eq!(report["notStarted"], 12);
    assert!(report["reportUrl"]
        .as_str()
        .unwrap()
        .ends_with(registered["organizationId"].as_str().unwrap()));
}

#[tokio::test]
async fn dashboard_summarizes_own_organization() {
    let app = test_app();
    let (acme, _) = register(&app, "a@acme.com", "Acme").await;
    let (globex, _) = register(&app, "g@globex.com", "Globex").await;

    let asset = add_asset(&app, &acme, "db-01").await;
    let reply = send(
        &app,
        Method::POST,
        "/vulnerabilities",
        Some(&acme),
        Some(json!({
            "assetId": asset["id"],
            "name": "OpenSSL outdated",
            "description": "Upgrade required",
            "severity": "High",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

    let reply = send(
        &app,
        Method::POST,
        "/threats",
        Some(&acme),
        Some(json!({
            "eventType": "malware_detection",
            "severity": "Medium",
            "source": "edr",
            "description": "Quarantined binary",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);

    let reply = send(&app, Method::POST, "/scans", Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = send(&app, Method::GET, "/dashboard", Some(&acme), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let summary = &reply.body["data"];
    assert_eq!(summary["assets"], 1);
    assert_eq!(summary["openVulnerabilities"]["high"], 1);
    assert_eq!(summary["activeThreats"], 1);
    assert_eq!(summary["scansInProgress"], 1);
    assert_eq!(summary["complianceTotal"], 14);
    assert_eq!(summary["complianceCompleted"], 0);
    assert_eq!(summary["trainingTotal"], 6);

    let reply = send(&app, Method::GET, "/dashboard", Some(&globex), None).await;
    let summary = &reply.body["data"];
    assert_eq!(summary["assets"], 0);
    assert_eq!(summary["activeThreats"], 0);
    assert_eq!(summary["scansInProgress"], 0);
}

//! The API client against an in-process recorder that logs every request it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use foerderportal_backend::client::{
    ClientError, PortalClient, RefreshTokenProvider, StaticTokenProvider,
};
use foerderportal_backend::models::application::ApplicationStatus;
use foerderportal_backend::utils::content_disposition;
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    authorization: Option<String>,
    body: Bytes,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

/// Document id for which the recorder announces a filename.
const NAMED_DOCUMENT: &str = "6f1c2d3e-4a5b-4c6d-8e7f-901a2b3c4d5e";

fn application_json(status: &str, reason: Option<&str>) -> JsonValue {
    json!({
        "id": Uuid::new_v4(),
        "form_id": null,
        "title": "Zuschuss Jugendfreizeit",
        "description": null,
        "amount": null,
        "applicant_id": Uuid::new_v4(),
        "applicant_name": "Anna Berg",
        "status": status,
        "submitted_at": "2026-03-01T10:00:00Z",
        "edited_at": null,
        "reviewed_at": "2026-03-02T09:30:00Z",
        "reviewer_id": null,
        "rejection_reason": reason,
        "form_snapshot": {
            "form_id": Uuid::new_v4(),
            "title": "Jugendfreizeit",
            "description": "",
            "category": "Jugend",
            "version": 1,
            "fields": []
        },
        "answers": {},
        "answers_canonical": true
    })
}

async fn record(
    State(log): State<Log>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    log.lock().unwrap().push(Recorded {
        method,
        path: path.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if path == TOKEN_PATH {
        return token_grant(&body);
    }
    if path.ends_with("/status") {
        let sent: JsonValue = serde_json::from_slice(&body).unwrap_or(JsonValue::Null);
        let status = sent["status"].as_str().unwrap_or("IN_REVIEW");
        return Json(application_json(status, sent["reason"].as_str())).into_response();
    }
    if path.ends_with("/withdraw") {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Status transition APPROVED -> WITHDRAWN is not allowed" })),
        )
            .into_response();
    }
    if path.ends_with(&format!("{}/download", NAMED_DOCUMENT)) {
        return (
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition::attachment("Förderantrag März.pdf"),
                ),
            ],
            Bytes::from_static(b"%PDF-1.7"),
        )
            .into_response();
    }
    if path.ends_with("/download") {
        return Bytes::from_static(b"raw").into_response();
    }
    Json(json!({})).into_response()
}

const TOKEN_PATH: &str = "/oauth/token";

fn form_params(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Refresh grant: `revoked` is refused; client `short-lived` gets tokens inside the expiry margin.
fn token_grant(body: &[u8]) -> Response {
    let params = form_params(body);
    let refresh_token = params.get("refresh_token").cloned().unwrap_or_default();
    if refresh_token == "revoked" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_grant" }))).into_response();
    }
    let expires_in = match params.get("client_id").map(String::as_str) {
        Some("short-lived") => 10,
        _ => 3600,
    };
    Json(json!({
        "access_token": format!("access-for-{}", refresh_token),
        "expires_in": expires_in,
        "refresh_token": format!("{}-next", refresh_token)
    }))
    .into_response()
}

fn refreshing_client(base: &str, client_id: &str, refresh_token: &str) -> PortalClient<RefreshTokenProvider> {
    let tokens = RefreshTokenProvider::new(
        format!("{}{}", base, TOKEN_PATH),
        client_id,
        refresh_token,
        "https://foerderportal-api",
        "openid profile email",
    );
    PortalClient::new(base, tokens)
}

async fn recorder() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(record).with_state(log.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), log)
}

fn client(base: &str) -> PortalClient<StaticTokenProvider> {
    PortalClient::new(base, StaticTokenProvider::new("reviewer-token"))
}

#[tokio::test]
async fn rejection_sends_exactly_one_patch_with_reason() {
    let (base, log) = recorder().await;
    let id = Uuid::new_v4();

    let application = client(&base)
        .update_status(id, ApplicationStatus::Rejected, Some("incomplete documents"))
        .await
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    let request = &log[0];
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.path, format!("/api/review/applications/{}/status", id));
    assert_eq!(request.authorization.as_deref(), Some("Bearer reviewer-token"));
    let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, json!({ "status": "REJECTED", "reason": "incomplete documents" }));

    assert_eq!(application.status, "REJECTED");
    assert_eq!(application.rejection_reason.as_deref(), Some("incomplete documents"));
}

#[tokio::test]
async fn approval_omits_the_reason() {
    let (base, log) = recorder().await;

    client(&base)
        .update_status(Uuid::new_v4(), ApplicationStatus::Approved, Some("looks good"))
        .await
        .unwrap();

    let log = log.lock().unwrap();
    let body: JsonValue = serde_json::from_slice(&log[0].body).unwrap();
    assert_eq!(body, json!({ "status": "APPROVED" }));
}

#[tokio::test]
async fn rejection_without_reason_never_reaches_the_server() {
    let (base, log) = recorder().await;

    let result = client(&base)
        .update_status(Uuid::new_v4(), ApplicationStatus::Rejected, Some("  "))
        .await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_upload_never_reaches_the_server() {
    let (base, log) = recorder().await;

    let result = client(&base)
        .upload_document(Uuid::new_v4(), "scan.pdf", vec![0u8; 11 * 1024 * 1024])
        .await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn token_failure_aborts_before_any_request() {
    let (base, log) = recorder().await;
    let client = PortalClient::new(&base, StaticTokenProvider::new(""));

    let result = client.me().await;

    assert!(matches!(result, Err(ClientError::Token(_))));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_surface_status_and_body() {
    let (base, _log) = recorder().await;

    let result = client(&base).withdraw_application(Uuid::new_v4()).await;

    match result {
        Err(ClientError::Http { status, body }) => {
            assert_eq!(status, 409);
            assert!(body.contains("not allowed"));
        }
        other => panic!("expected an HTTP error, got {:?}", other.map(|a| a.id)),
    }
}

#[tokio::test]
async fn download_uses_the_announced_filename() {
    let (base, _log) = recorder().await;
    let app = Uuid::new_v4();

    let file = client(&base)
        .download_document(app, Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(file.filename, "download");
    assert_eq!(&file.bytes[..], b"raw");

    let named = client(&base)
        .download_document(app, Uuid::parse_str(NAMED_DOCUMENT).unwrap())
        .await
        .unwrap();
    assert_eq!(named.filename, "Förderantrag März.pdf");
    assert_eq!(named.content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn refreshed_token_is_reused_until_shortly_before_expiry() {
    let (base, log) = recorder().await;
    let client = refreshing_client(&base, "portal-cli", "initial");

    client.delete_form(Uuid::new_v4()).await.unwrap();
    client.delete_form(Uuid::new_v4()).await.unwrap();

    let log = log.lock().unwrap();
    let paths: Vec<&str> = log.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths.iter().filter(|p| **p == TOKEN_PATH).count(), 1);
    assert_eq!(log.len(), 3);

    let grant = form_params(&log[0].body);
    assert_eq!(grant["grant_type"], "refresh_token");
    assert_eq!(grant["client_id"], "portal-cli");
    assert_eq!(grant["refresh_token"], "initial");
    assert_eq!(grant["audience"], "https://foerderportal-api");
    assert_eq!(grant["scope"], "openid profile email");

    for request in &log[1..] {
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.authorization.as_deref(), Some("Bearer access-for-initial"));
    }
}

#[tokio::test]
async fn rotated_refresh_token_replaces_the_old_one() {
    let (base, log) = recorder().await;
    let client = refreshing_client(&base, "short-lived", "initial");

    client.delete_form(Uuid::new_v4()).await.unwrap();
    client.delete_form(Uuid::new_v4()).await.unwrap();

    let log = log.lock().unwrap();
    let grants: Vec<HashMap<String, String>> = log
        .iter()
        .filter(|r| r.path == TOKEN_PATH)
        .map(|r| form_params(&r.body))
        .collect();
    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0]["refresh_token"], "initial");
    assert_eq!(grants[1]["refresh_token"], "initial-next");
    assert_eq!(
        log.last().unwrap().authorization.as_deref(),
        Some("Bearer access-for-initial-next")
    );
}

#[tokio::test]
async fn refused_refresh_sends_no_api_request() {
    let (base, log) = recorder().await;
    let client = refreshing_client(&base, "portal-cli", "revoked");

    let result = client.delete_form(Uuid::new_v4()).await;
    assert!(matches!(result, Err(ClientError::Token(_))));

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].path, TOKEN_PATH);
}

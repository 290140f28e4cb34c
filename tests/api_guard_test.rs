//! Requests that must be refused before any database access. The router runs on a
//! pool that cannot connect, so reaching the database would surface as a 500.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use common::{app_without_db, body_json, config, json_request, token};

#[tokio::test]
async fn health_is_public() {
    let app = app_without_db(config());
    let response = app
        .oneshot(json_request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = app_without_db(config());
    let response = app
        .oneshot(json_request("GET", "/api/applications/my", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_for_another_audience_is_unauthorized() {
    let mut cfg = config();
    cfg.jwt_audience = Some("https://other-api".into());
    let app = app_without_db(cfg);
    let response = app
        .oneshot(json_request(
            "GET",
            "/api/drafts",
            Some(&token("auth0|anna", "ANTRAGSTELLER")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn applicants_cannot_reach_reviewer_routes() {
    let app = app_without_db(config());
    let applicant = token("auth0|anna", "ANTRAGSTELLER");

    for (method, uri) in [
        ("GET", "/api/forms".to_string()),
        ("GET", "/api/review/applications".to_string()),
        ("POST", format!("/api/review/applications/{}/approve", Uuid::new_v4())),
        ("GET", "/api/users".to_string()),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(method, &uri, Some(&applicant), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn rejection_without_reason_is_refused() {
    let app = app_without_db(config());
    let reviewer = token("auth0|sb", "SACHBEARBEITER");
    let uri = format!("/api/review/applications/{}/status", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &uri,
            Some(&reviewer),
            Some(json!({ "status": "REJECTED", "reason": "   " })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("rejection reason"));

    let reject_uri = format!("/api/review/applications/{}/reject", Uuid::new_v4());
    let response = app
        .oneshot(json_request("POST", &reject_uri, Some(&reviewer), Some(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn form_with_duplicate_field_names_is_refused() {
    let app = app_without_db(config());
    let reviewer = token("auth0|sb", "ADMIN");

    let payload = json!({
        "title": "Zuschuss Vereinsarbeit",
        "fields": [
            { "name": "email", "type": "EMAIL", "label": "E-Mail", "display_order": 1 },
            { "name": "email", "type": "TEXT", "label": "E-Mail (2)", "display_order": 2 }
        ]
    });
    let response = app
        .oneshot(json_request("POST", "/api/forms", Some(&reviewer), Some(payload)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid form schema");
    let details = body["details"].as_array().unwrap();
    assert!(details.iter().any(|d| d["field"] == "email"));
}

#[tokio::test]
async fn out_of_range_list_parameters_are_refused() {
    let app = app_without_db(config());
    let reviewer = token("auth0|sb", "SACHBEARBEITER");

    for uri in [
        "/api/review/applications?page=9223372036854775807",
        "/api/forms?page=9223372036854775807&per_page=100",
        "/api/review/applications?to=%2B262142-12-31",
    ] {
        let response = app
            .clone()
            .oneshot(json_request("GET", uri, Some(&reviewer), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn oversized_upload_is_refused() {
    let app = app_without_db(config());
    let applicant = token("auth0|anna", "ANTRAGSTELLER");

    let boundary = "X-FOERDERPORTAL-BOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"scan.pdf\"\r\nContent-Type: application/pdf\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"%PDF-1.7\n");
    body.resize(body.len() + 11 * 1024 * 1024, b'0');
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/applications/{}/documents", Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {}", applicant))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn public_routes_are_rate_limited() {
    let mut cfg = config();
    cfg.public_rps = 2;
    let app = app_without_db(cfg);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(json_request("GET", "/health", None, None))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );
}

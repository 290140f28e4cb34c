//! End-to-end flows against Postgres. Run with `DATABASE_URL` set and `--ignored`.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use common::{app_with_db, body_json, json_request, token};

async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let response = app
        .clone()
        .oneshot(json_request(method, uri, Some(token), body))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
#[ignore]
async fn application_lifecycle_end_to_end() {
    let (app, _pool) = app_with_db().await;
    let run = Uuid::new_v4().simple().to_string();
    let reviewer = token(&format!("auth0|sb-{}", run), "SACHBEARBEITER");
    let applicant = token(&format!("auth0|anna-{}", run), "ANTRAGSTELLER");

    let (status, form) = call(
        &app,
        "POST",
        "/api/forms",
        &reviewer,
        Some(json!({
            "title": format!("Vereinsförderung {}", run),
            "category": "Sport",
            "draft_key": "new-form",
            "fields": [
                { "name": "email", "type": "EMAIL", "label": "E-Mail", "display_order": 1,
                  "required": true, "autofill": true, "autofill_attribute": "email" },
                { "name": "members", "type": "NUMBER", "label": "Mitglieder", "display_order": 2,
                  "min_value": 1.0 },
                { "name": "consent", "type": "CHECKBOX", "label": "Einwilligung", "display_order": 3 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", form);
    let form_id = form["id"].as_str().unwrap().to_string();
    assert_eq!(form["status"], "DRAFT");
    let ids: Vec<i64> = form["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    // Drafts cannot be applied to.
    let submit = json!({
        "form_id": form_id,
        "title": "Trainingslager",
        "amount": "1500.00",
        "answers": { "email": "anna@example.org", "members": "42", "consent": "on" }
    });
    let (status, _) = call(&app, "POST", "/api/applications", &applicant, Some(submit.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", &format!("/api/forms/{}/publish", form_id), &reviewer, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, rendered) = call(&app, "GET", &format!("/api/forms/{}/render", form_id), &applicant, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        rendered["fields"][0]["initial_value"],
        format!("auth0_anna-{}@example.org", run)
    );

    let (status, application) = call(&app, "POST", "/api/applications", &applicant, Some(submit)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", application);
    let app_id = application["id"].as_str().unwrap().to_string();
    assert_eq!(application["answers"]["2"], json!(42));
    assert_eq!(application["answers"]["3"], json!(true));

    // Editing the live form does not touch the snapshot of the application.
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/api/forms/{}", form_id),
        &reviewer,
        Some(json!({
            "title": "Vereinsförderung (neu)",
            "fields": [
                { "id": 1, "name": "email", "type": "EMAIL", "label": "E-Mail", "display_order": 1 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, detail) = call(&app, "GET", &format!("/api/applications/{}", app_id), &applicant, None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = detail["form_view"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["display"], "Ja");

    let status_uri = format!("/api/review/applications/{}/status", app_id);
    let (status, _) = call(&app, "PATCH", &status_uri, &reviewer, Some(json!({ "status": "APPROVED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "PATCH", &status_uri, &reviewer, Some(json!({ "status": "IN_REVIEW" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, rejected) = call(
        &app,
        "POST",
        &format!("/api/review/applications/{}/reject", app_id),
        &reviewer,
        Some(json!({ "reason": "incomplete documents" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "REJECTED");
    assert_eq!(rejected["rejection_reason"], "incomplete documents");

    let (status, _) = call(&app, "POST", &format!("/api/applications/{}/withdraw", app_id), &applicant, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/applications/{}/messages", app_id),
        &applicant,
        Some(json!({ "body": "Die Unterlagen reiche ich nach." })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, messages) = call(&app, "GET", &format!("/api/applications/{}/messages", app_id), &reviewer, None).await;
    assert_eq!(messages.as_array().unwrap().len(), 1);

    let (status, list) = call(
        &app,
        "GET",
        "/api/review/applications?status=REJECTED&per_page=100",
        &reviewer,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|item| item["id"] == app_id.as_str()));
}

#[tokio::test]
#[ignore]
async fn draft_saves_use_optimistic_versions() {
    let (app, _pool) = app_with_db().await;
    let owner = token(&format!("auth0|builder-{}", Uuid::new_v4().simple()), "ADMIN");

    let (status, first) = call(
        &app,
        "PUT",
        "/api/drafts/new-form",
        &owner,
        Some(json!({ "expected_version": 0, "payload": { "title": "Entwurf" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["version"], 1);

    // A second tab still holding version 0 loses.
    let (status, _) = call(
        &app,
        "PUT",
        "/api/drafts/new-form",
        &owner,
        Some(json!({ "expected_version": 0, "payload": { "title": "Anderer Tab" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, second) = call(
        &app,
        "PUT",
        "/api/drafts/new-form",
        &owner,
        Some(json!({ "expected_version": 1, "payload": { "title": "Entwurf 2" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["version"], 2);

    let (status, latest) = call(&app, "GET", "/api/drafts/latest", &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["payload"]["title"], "Entwurf 2");

    let (status, padded) = call(&app, "GET", "/api/drafts/%20new-form", &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(padded["version"], 2);

    let (status, _) = call(&app, "DELETE", "/api/drafts/new-form%20", &owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", "/api/drafts/latest", &owner, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

pub mod applications;
pub mod documents;
pub mod drafts;
pub mod forms;
pub mod health;
pub mod messages;
pub mod public_forms;
pub mod review;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth::{require_bearer_auth, require_privileged},
    cors::cors_layer,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

/// Multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/api/public/forms", get(public_forms::list_published_forms))
        .route("/api/public/forms/:id", get(public_forms::get_published_form))
        .layer(from_fn_with_state(
            RateLimiter::new("public", config.public_rps),
            rps_middleware,
        ));

    let applicant_api = Router::new()
        .route("/api/users/me", get(users::me))
        .route("/api/forms/published", get(forms::list_open_forms))
        .route("/api/forms/:id/render", get(forms::render_form))
        .route("/api/applications", post(applications::submit_application))
        .route("/api/applications/my", get(applications::my_applications))
        .route(
            "/api/applications/:id",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/api/applications/:id/withdraw",
            post(applications::withdraw_application),
        )
        .route(
            "/api/applications/:id/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/api/applications/:id/messages/:message_id",
            axum::routing::delete(messages::delete_message),
        )
        .route(
            "/api/applications/:id/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/api/applications/:id/documents/:document_id",
            axum::routing::delete(documents::delete_document),
        )
        .route(
            "/api/applications/:id/documents/:document_id/download",
            get(documents::download_document),
        )
        .route("/api/drafts", get(drafts::list_drafts))
        .route("/api/drafts/latest", get(drafts::latest_draft))
        .route(
            "/api/drafts/:key",
            get(drafts::get_draft)
                .put(drafts::save_draft)
                .delete(drafts::delete_draft),
        )
        .route_layer(from_fn_with_state(state.clone(), require_bearer_auth));

    let reviewer_api = Router::new()
        .route("/api/forms", get(forms::list_forms).post(forms::create_form))
        .route(
            "/api/forms/:id",
            get(forms::get_form)
                .put(forms::update_form)
                .delete(forms::delete_form),
        )
        .route("/api/forms/:id/publish", post(forms::publish_form))
        .route("/api/forms/:id/archive", post(forms::archive_form))
        .route(
            "/api/forms/:id/fields/:field_id/move",
            post(forms::move_field),
        )
        .route("/api/review/applications", get(review::list_applications))
        .route(
            "/api/review/applications/:id/status",
            patch(review::update_status),
        )
        .route("/api/review/applications/:id/approve", post(review::approve))
        .route("/api/review/applications/:id/reject", post(review::reject))
        .route("/api/users", get(users::list_users))
        .route_layer(from_fn_with_state(state.clone(), require_privileged));

    let api = applicant_api.merge(reviewer_api).layer(from_fn_with_state(
        RateLimiter::new("api", config.api_rps),
        rps_middleware,
    ));

    let body_limit = usize::try_from(config.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    public_api
        .merge(api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

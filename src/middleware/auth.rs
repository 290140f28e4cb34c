use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

/// Authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    pub token: String,
    pub privileged: bool,
}

impl AuthUser {
    pub fn role(&self) -> &str {
        self.claims.role.as_deref().unwrap_or(crate::models::user::ROLE_APPLICANT)
    }
}

fn reject(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

pub fn authenticate(headers: &HeaderMap, config: &Config) -> Result<AuthUser, Response> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(reject(StatusCode::UNAUTHORIZED, "missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(reject(StatusCode::UNAUTHORIZED, "bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(reject(StatusCode::UNAUTHORIZED, "unsupported_scheme"));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    match config.jwt_audience.as_deref() {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = config.jwt_issuer.as_deref() {
        validation.set_issuer(&[issuer]);
    }

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => {
            let privileged = data
                .claims
                .role
                .as_deref()
                .map_or(false, |role| config.is_privileged(role));
            Ok(AuthUser {
                claims: data.claims,
                token: token.to_string(),
                privileged,
            })
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer token");
            Err(reject(StatusCode::UNAUTHORIZED, "invalid_token"))
        }
    }
}

pub async fn require_bearer_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(req.headers(), &state.config) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(response) => response,
    }
}

/// Reviewer routes: the role claim must be one of the configured privileged roles.
pub async fn require_privileged(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(req.headers(), &state.config) {
        Ok(user) if user.privileged => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(user) => {
            tracing::warn!(sub = %user.claims.sub, role = %user.role(), "privileged route denied");
            reject(StatusCode::FORBIDDEN, "forbidden")
        }
        Err(response) => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn config() -> Config {
        Config {
            server_address: "127.0.0.1:0".into(),
            database_url: "postgres://localhost/unused".into(),
            jwt_secret: "secret".into(),
            jwt_audience: Some("https://foerderportal-api".into()),
            jwt_issuer: None,
            identity_userinfo_url: None,
            privileged_roles: vec!["SACHBEARBEITER".into(), "ADMIN".into()],
            max_upload_mb: 10,
            uploads_dir: "./uploads".into(),
            api_rps: 100,
            public_rps: 100,
            cors_origins: vec!["*".into()],
            draft_retention_days: 30,
            log_format: crate::config::LogFormat::Pretty,
        }
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn token(role: &str, aud: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + 600) as usize;
        encode(
            &Header::default(),
            &json!({ "sub": "auth0|1", "exp": exp, "role": role, "aud": aud }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    #[test]
    fn privileged_role_is_matched_case_insensitively() {
        let user = authenticate(
            &headers_with(&token("sachbearbeiter", "https://foerderportal-api")),
            &config(),
        )
        .unwrap();
        assert!(user.privileged);
        assert_eq!(user.claims.sub, "auth0|1");
    }

    #[test]
    fn applicants_are_not_privileged() {
        let user = authenticate(
            &headers_with(&token("ANTRAGSTELLER", "https://foerderportal-api")),
            &config(),
        )
        .unwrap();
        assert!(!user.privileged);
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let result = authenticate(&headers_with(&token("ADMIN", "https://other")), &config());
        assert_eq!(result.unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn missing_header_is_rejected() {
        let result = authenticate(&HeaderMap::new(), &config());
        assert_eq!(result.unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }
}

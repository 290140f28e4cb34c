use sqlx::PgPool;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::user::User;
use crate::services::identity_service::IdentityProfile;

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mirrors the caller into `users`; the identity provider stays authoritative for
    /// name, email and role.
    pub async fn resolve(&self, auth: &AuthUser) -> Result<User> {
        let profile = IdentityProfile::from(&auth.claims);
        self.upsert(auth, &profile).await
    }

    pub async fn upsert(&self, auth: &AuthUser, profile: &IdentityProfile) -> Result<User> {
        let name = profile
            .display_name()
            .or_else(|| profile.email.clone())
            .unwrap_or_else(|| auth.claims.sub.clone());

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (subject, name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject) DO UPDATE
            SET name = EXCLUDED.name,
                email = COALESCE(EXCLUDED.email, users.email),
                role = EXCLUDED.role,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&auth.claims.sub)
        .bind(&name)
        .bind(&profile.email)
        .bind(auth.role().to_ascii_uppercase())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }
}

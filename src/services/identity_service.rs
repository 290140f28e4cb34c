use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::form::IdentityAttribute;

/// Profile attributes of the signed-in user, as issued by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl IdentityProfile {
    pub fn attribute(&self, attribute: IdentityAttribute) -> Option<&str> {
        let value = match attribute {
            IdentityAttribute::Email => self.email.as_deref(),
            IdentityAttribute::GivenName => self.given_name.as_deref(),
            IdentityAttribute::FamilyName => self.family_name.as_deref(),
            IdentityAttribute::Name => self.name.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
    }

    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.attribute(IdentityAttribute::Name) {
            return Some(name.to_string());
        }
        match (
            self.attribute(IdentityAttribute::GivenName),
            self.attribute(IdentityAttribute::FamilyName),
        ) {
            (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
    }
}

impl From<&Claims> for IdentityProfile {
    fn from(claims: &Claims) -> Self {
        Self {
            email: claims.email.clone(),
            name: claims.name.clone(),
            given_name: claims.given_name.clone(),
            family_name: claims.family_name.clone(),
        }
    }
}

/// Fetches profile attributes from the identity provider's userinfo endpoint
/// when the access token does not carry them.
#[derive(Clone)]
pub struct IdentityService {
    userinfo_url: Option<String>,
    http_client: Client,
}

impl IdentityService {
    pub fn new(userinfo_url: Option<String>, http_client: Client) -> Self {
        Self {
            userinfo_url,
            http_client,
        }
    }

    pub async fn profile(&self, claims: &Claims, bearer_token: &str) -> Result<IdentityProfile> {
        let from_claims = IdentityProfile::from(claims);
        let Some(url) = self.userinfo_url.as_deref() else {
            return Ok(from_claims);
        };
        if !from_claims.is_empty() {
            return Ok(from_claims);
        }

        let response = self
            .http_client
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "userinfo request failed");
            return Err(Error::Unauthorized("Could not load the user profile".into()));
        }
        Ok(response.json::<IdentityProfile>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_given_and_family_name() {
        let profile = IdentityProfile {
            given_name: Some("Anna".into()),
            family_name: Some("Berg".into()),
            ..IdentityProfile::default()
        };
        assert_eq!(profile.display_name().as_deref(), Some("Anna Berg"));
    }

    #[test]
    fn blank_attributes_count_as_missing() {
        let profile = IdentityProfile {
            email: Some("  ".into()),
            ..IdentityProfile::default()
        };
        assert_eq!(profile.attribute(IdentityAttribute::Email), None);
    }
}

//! Caller identity and permission checking utilities

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use lambda_http::Request;
use lambda_http::tracing::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::http::header_value;

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity claims taken from a verified ID token
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: bool,
}

// Older Google tokens carry `"email_verified": "true"`.
fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

/// Turns a bearer token into verified claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, ApiError>;
}

/// Verifies Google-issued ID tokens against Google's published signing keys.
pub struct GoogleTokenVerifier {
    client_id: String,
    certs_url: String,
    http: reqwest::Client,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_certs_url(client_id, GOOGLE_CERTS_URL)
    }

    pub fn with_certs_url(client_id: impl Into<String>, certs_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            certs_url: certs_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, ApiError> {
        self.http
            .get(&self.certs_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::upstream("Failed to fetch token signing keys", e))?
            .json::<JwkSet>()
            .await
            .map_err(|e| ApiError::upstream("Failed to parse token signing keys", e))
    }
}

fn invalid_token() -> ApiError {
    ApiError::Unauthorized("Invalid token".to_string())
}

#[async_trait]
impl TokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        if self.client_id.is_empty() {
            warn!("Token verification requested but no OAuth client id is configured");
            return Err(invalid_token());
        }

        let header = decode_header(token).map_err(|_| invalid_token())?;
        let kid = header.kid.ok_or_else(invalid_token)?;

        let keys = self.fetch_keys().await?;
        let jwk = keys.find(&kid).ok_or_else(invalid_token)?;
        let key = DecodingKey::from_jwk(jwk).map_err(|_| invalid_token())?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected ID token: {}", e);
                invalid_token()
            })
    }
}

/// Extract the bearer token from the Authorization header, if any
pub fn bearer_token(event: &Request) -> Option<&str> {
    header_value(event, "Authorization")
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the caller's identity.
///
/// No bearer token means an anonymous caller; a token that fails
/// verification is rejected.
pub async fn caller_from_event(event: &Request, verifier: &dyn TokenVerifier) -> Result<Option<Claims>, ApiError> {
    match bearer_token(event) {
        Some(token) => verifier.verify(token).await.map(Some),
        None => Ok(None),
    }
}

/// Check if an email is on the admin allow-list (trimmed, case-insensitive)
pub fn is_admin(email: Option<&str>, admin_emails: &[String]) -> bool {
    let Some(email) = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()) else {
        return false;
    };
    admin_emails
        .iter()
        .any(|admin| admin.trim().to_lowercase() == email)
}

/// Check if the verified caller is an admin
pub fn caller_is_admin(caller: Option<&Claims>, admin_emails: &[String]) -> bool {
    is_admin(caller.and_then(|c| c.email.as_deref()), admin_emails)
}

/// Fails with 403 unless the caller is an admin.
pub fn require_admin(caller: Option<&Claims>, admin_emails: &[String]) -> Result<(), ApiError> {
    if caller_is_admin(caller, admin_emails) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Unauthorized. Admin access required.".to_string()))
    }
}

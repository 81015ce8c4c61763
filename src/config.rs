//! Process configuration, resolved once at cold start.
//!
//! Each value is taken from Secrets Manager when present, then the
//! environment, then a built-in default.

use std::collections::HashMap;

use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client as SecretsClient;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use lambda_http::Error;
use lambda_http::tracing::{info, warn};

const DEFAULT_BUCKET: &str = "ecommerce-product-images";
const DEFAULT_ADMIN_EMAILS: &str = "admin@example.com";
const DEFAULT_SECRETS_PREFIX: &str = "storefront";
const DEFAULT_ENVIRONMENT: &str = "dev";

/// Secret names looked up under `{prefix}/{environment}/`
const SECRET_NAMES: [&str; 5] = [
    "admin-emails",
    "google-client-id",
    "google-sheets-id",
    "google-credentials",
    "stripe-secret-key",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// JSON documents in the S3 bucket
    ObjectStore,
    /// Google Sheets
    Spreadsheet,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub bucket: String,
    pub storage_backend: StorageBackend,
    pub sheets_id: String,
    pub google_credentials: Option<String>,
    pub admin_emails: Vec<String>,
    pub google_client_id: String,
    pub stripe_secret_key: String,
}

impl Config {
    /// Builds the configuration from an environment lookup and already
    /// fetched secrets (keyed by short secret name).
    pub fn resolve<F>(env: F, secrets: &HashMap<String, String>) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let layered = |secret: &str, var: &str| {
            secrets
                .get(secret)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| env(var))
        };

        let storage_backend = match env("STORAGE_BACKEND").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("s3") => StorageBackend::ObjectStore,
            Some("sheets") => StorageBackend::Spreadsheet,
            Some(other) => return Err(Error::from(format!("Unknown STORAGE_BACKEND '{}' (expected s3 or sheets)", other))),
        };

        let google_credentials = layered("google-credentials", "GOOGLE_CREDENTIALS");
        let sheets_id = layered("google-sheets-id", "GOOGLE_SHEETS_ID").unwrap_or_default();
        if storage_backend == StorageBackend::Spreadsheet && (google_credentials.is_none() || sheets_id.is_empty()) {
            return Err(Error::from("STORAGE_BACKEND=sheets requires GOOGLE_CREDENTIALS and GOOGLE_SHEETS_ID"));
        }

        let admin_emails = parse_email_list(
            &layered("admin-emails", "ADMIN_EMAILS").unwrap_or_else(|| DEFAULT_ADMIN_EMAILS.to_string()),
        );

        Ok(Config {
            environment: env("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            bucket: env("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            storage_backend,
            sheets_id,
            google_credentials,
            admin_emails,
            google_client_id: layered("google-client-id", "GOOGLE_CLIENT_ID").unwrap_or_default(),
            stripe_secret_key: layered("stripe-secret-key", "STRIPE_SECRET_KEY").unwrap_or_default(),
        })
    }

    /// Reads the process environment and Secrets Manager.
    pub async fn load(sdk_config: &SdkConfig) -> Result<Self, Error> {
        let lookup = |name: &str| std::env::var(name).ok();
        let prefix = lookup("SECRETS_PREFIX").unwrap_or_else(|| DEFAULT_SECRETS_PREFIX.to_string());
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let client = SecretsClient::new(sdk_config);
        let secrets = fetch_secrets(&client, &prefix, &environment).await;

        Self::resolve(lookup, &secrets)
    }
}

pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fetches every known secret once. Missing or unreadable secrets are skipped
/// so the environment fallback applies.
async fn fetch_secrets(client: &SecretsClient, prefix: &str, environment: &str) -> HashMap<String, String> {
    let mut secrets = HashMap::new();
    for name in SECRET_NAMES {
        let secret_id = format!("{}/{}/{}", prefix, environment, name);
        match client.get_secret_value().secret_id(&secret_id).send().await {
            Ok(output) => {
                if let Some(value) = output.secret_string() {
                    secrets.insert(name.to_string(), value.to_string());
                }
            }
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_resource_not_found_exception()) {
                    info!("Secret {} not found, using environment", secret_id);
                } else {
                    warn!("Could not read secret {}: {}", secret_id, DisplayErrorContext(&e));
                }
            }
        }
    }
    secrets
}

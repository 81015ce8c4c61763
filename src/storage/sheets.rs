//! Google Sheets backed collections.
//!
//! Each collection lives in its own sheet with a header row; records are read
//! from row 2 down. Requests authenticate as a service account: a self-signed
//! RS256 assertion is exchanged for a short-lived access token on every call.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::models::{Category, Order, OrderStatus, Product, empty_object};
use crate::storage::{Mutation, Predicate, Repository};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a service-account key file that token exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsClient {
    spreadsheet_id: String,
    key: ServiceAccountKey,
    api_base: String,
    http: reqwest::Client,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, credentials_json: &str) -> Result<Self, ApiError> {
        Self::with_api_base(spreadsheet_id, credentials_json, SHEETS_API)
    }

    pub fn with_api_base(
        spreadsheet_id: impl Into<String>,
        credentials_json: &str,
        api_base: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let key: ServiceAccountKey = serde_json::from_str(credentials_json)
            .map_err(|e| ApiError::upstream("Invalid Google service account credentials", e))?;
        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| ApiError::upstream("Invalid Google service account key", e))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| ApiError::upstream("Failed to sign token request", e))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::upstream("Failed to obtain Google access token", e))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("Failed to obtain Google access token", e))?;
        Ok(token.access_token)
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    /// Cells of `range` as stored, numbers unformatted.
    pub async fn read(&self, range: &str) -> Result<Vec<Vec<Value>>, ApiError> {
        let token = self.access_token().await?;
        let range_values: ValueRange = self
            .http
            .get(self.values_url(range, "?valueRenderOption=UNFORMATTED_VALUE"))
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::upstream(format!("Failed to read {}", range), e))?
            .json()
            .await
            .map_err(|e| ApiError::upstream(format!("Failed to read {}", range), e))?;
        Ok(range_values.values)
    }

    pub async fn append(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), ApiError> {
        let token = self.access_token().await?;
        self.http
            .post(self.values_url(range, ":append?valueInputOption=RAW"))
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::upstream(format!("Failed to append to {}", range), e))?;
        Ok(())
    }

    /// Makes `rows` the sheet's data rows (row 2 down, columns A to
    /// `last_column`).
    ///
    /// The new rows are written over the old ones first and only the rows left
    /// below them are cleared afterwards, so a failed write leaves the sheet as
    /// it was.
    pub async fn replace_rows(&self, sheet: &str, last_column: char, rows: Vec<Vec<Value>>) -> Result<(), ApiError> {
        let token = self.access_token().await?;
        let count = rows.len();

        if count > 0 {
            let range = format!("{}!A2:{}{}", sheet, last_column, count + 1);
            self.http
                .put(self.values_url(&range, "?valueInputOption=RAW"))
                .bearer_auth(&token)
                .json(&json!({ "values": rows }))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ApiError::upstream(format!("Failed to write {}", range), e))?;
        }

        let stale = format!("{}!A{}:{}", sheet, count + 2, last_column);
        self.http
            .post(self.values_url(&stale, ":clear"))
            .bearer_auth(&token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::upstream(format!("Failed to clear {}", stale), e))?;
        Ok(())
    }
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Mapping between a record and one spreadsheet row.
pub trait SheetRow: Sized {
    const SHEET: &'static str;
    /// Last column letter, e.g. `H` for eight columns.
    const LAST_COLUMN: char;

    fn to_row(&self) -> Vec<Value>;

    /// `None` for rows that are too short or malformed.
    fn from_row(row: &[String]) -> Option<Self>;

    fn data_range() -> String {
        format!("{}!A2:{}", Self::SHEET, Self::LAST_COLUMN)
    }

    fn append_range() -> String {
        format!("{}!A:{}", Self::SHEET, Self::LAST_COLUMN)
    }

    fn width() -> usize {
        (Self::LAST_COLUMN as u32 - 'A' as u32 + 1) as usize
    }
}

fn parse_row<T: SheetRow>(cells: &[Value]) -> Option<T> {
    let text: Vec<String> = cells.iter().cloned().map(cell_text).collect();
    T::from_row(&text)
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

fn json_cell<T: for<'de> Deserialize<'de> + Default>(row: &[String], index: usize) -> T {
    row.get(index)
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

impl SheetRow for Product {
    const SHEET: &'static str = "Products";
    const LAST_COLUMN: char = 'H';

    fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.id),
            json!(self.name),
            json!(self.description),
            json!(self.price),
            json!(self.category.as_str()),
            json!(self.image),
            json!(self.user_id),
            json!(self.created_at),
        ]
    }

    fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 6 {
            return None;
        }
        Some(Product {
            id: cell(row, 0),
            name: cell(row, 1),
            description: cell(row, 2),
            price: row[3].trim().parse().ok()?,
            category: row[4].parse().unwrap_or(Category::General),
            image: cell(row, 5),
            user_id: cell(row, 6),
            created_at: cell(row, 7),
        })
    }
}

impl SheetRow for Order {
    const SHEET: &'static str = "Orders";
    const LAST_COLUMN: char = 'K';

    fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.id),
            json!(self.user_id),
            json!(serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string())),
            json!(self.total),
            json!(self.status.as_str()),
            json!(self.created_at),
            json!(self.customer_info.to_string()),
            json!(self.payment_intent_id),
            json!(self.tracking_number),
            json!(serde_json::to_string(&self.status_history).unwrap_or_else(|_| "[]".to_string())),
            json!(self.last_modified.clone().unwrap_or_default()),
        ]
    }

    fn from_row(row: &[String]) -> Option<Self> {
        if row.len() < 6 {
            return None;
        }
        let customer_info: Value = row
            .get(6)
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(empty_object);
        Some(Order {
            id: cell(row, 0),
            user_id: cell(row, 1),
            items: json_cell(row, 2),
            total: row[3].trim().parse().unwrap_or(0.0),
            status: row[4].parse().unwrap_or(OrderStatus::Pending),
            created_at: cell(row, 5),
            customer_info,
            payment_intent_id: cell(row, 7),
            tracking_number: cell(row, 8),
            status_history: json_cell(row, 9),
            last_modified: Some(cell(row, 10)).filter(|s| !s.is_empty()),
        })
    }
}

pub struct SheetsRepository<T> {
    client: Arc<SheetsClient>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SheetRow> SheetsRepository<T> {
    pub fn new(client: Arc<SheetsClient>) -> Self {
        Self { client, _record: PhantomData }
    }

    /// Writes rows back padded to full width. Rows that were not parsed or
    /// not changed go back exactly as they were read.
    async fn write_back(&self, mut rows: Vec<Vec<Value>>) -> Result<(), ApiError> {
        for row in rows.iter_mut() {
            row.resize(T::width(), Value::String(String::new()));
        }
        self.client.replace_rows(T::SHEET, T::LAST_COLUMN, rows).await
    }
}

#[async_trait]
impl<T> Repository<T> for SheetsRepository<T>
where
    T: SheetRow + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Vec<T>, ApiError> {
        let rows = self.client.read(&T::data_range()).await?;
        Ok(rows.iter().filter_map(|row| parse_row(row)).collect())
    }

    async fn append(&self, item: T) -> Result<(), ApiError> {
        self.client.append(&T::append_range(), vec![item.to_row()]).await
    }

    async fn update_where(&self, matches: Predicate<'_, T>, update: Mutation<'_, T>) -> Result<usize, ApiError> {
        let mut rows = self.client.read(&T::data_range()).await?;
        let mut updated = 0;
        for row in rows.iter_mut() {
            let Some(mut record) = parse_row::<T>(row) else {
                continue;
            };
            if matches(&record) {
                update(&mut record);
                *row = record.to_row();
                updated += 1;
            }
        }
        if updated > 0 {
            self.write_back(rows).await?;
        }
        Ok(updated)
    }

    async fn remove_where(&self, matches: Predicate<'_, T>) -> Result<usize, ApiError> {
        let mut rows = self.client.read(&T::data_range()).await?;
        let before = rows.len();
        rows.retain(|row| !parse_row::<T>(row).is_some_and(|record| matches(&record)));
        let removed = before - rows.len();
        if removed > 0 {
            self.write_back(rows).await?;
        }
        Ok(removed)
    }
}

//! Handler modules for Lambda function

pub mod analyze;
pub mod login;
pub mod orders;
pub mod payment;
pub mod products;
pub mod uploads;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

pub use analyze::handle_analyze_image;
pub use login::handle_login;
pub use orders::{handle_create_order, handle_list_orders, handle_update_order_status};
pub use payment::{handle_confirm_payment, handle_create_payment_intent, handle_payment_health};
pub use products::{handle_create_product, handle_delete_product, handle_list_products};
pub use uploads::handle_upload_url;

/// Current UTC time as an RFC 3339 timestamp
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn to_json<T: Serialize>(value: &T, what: &str) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::upstream(format!("Failed to serialize {}", what), e))
}

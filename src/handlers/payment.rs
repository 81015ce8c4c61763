//! Payment intent handlers.

use lambda_http::tracing::{error, info};
use lambda_http::{Body, Request, Response};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::now_timestamp;
use crate::http::{json_response, optional_str, parse_json_body};
use crate::models::{Order, OrderItem, OrderStatus, StatusChange, empty_object};
use crate::payment::{NewPaymentIntent, PaymentIntent};
use crate::state::AppState;

/// Starts a card payment. `amount` is in cents.
pub async fn handle_create_payment_intent(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let body = parse_json_body(event.body())?;

    let amount = body
        .get("amount")
        .and_then(Value::as_f64)
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| ApiError::bad_request("Invalid amount"))?;

    let details = body.get("orderDetails").cloned().unwrap_or_else(empty_object);
    let request = NewPaymentIntent {
        amount: amount as i64,
        currency: optional_str(&body, "currency").unwrap_or_else(|| "usd".to_string()),
        customer_email: optional_str(&body, "customerEmail").unwrap_or_default(),
        order_id: optional_str(&details, "orderId").unwrap_or_default(),
        customer_id: optional_str(&details, "customerId").unwrap_or_default(),
    };

    let intent = state.payments.create_intent(&request).await?;
    info!("Created payment intent {} for {} {}", intent.id, intent.amount, intent.currency);

    Ok(json_response(
        200,
        &json!({
            "clientSecret": intent.client_secret,
            "paymentIntentId": intent.id,
        }),
    ))
}

/// Checks that a payment succeeded and records the resulting order.
///
/// A payment already recorded is not recorded again. Failing to record the
/// order is logged; the payment itself stands.
pub async fn handle_confirm_payment(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let body = parse_json_body(event.body())?;
    let intent_id = optional_str(&body, "paymentIntentId")
        .ok_or_else(|| ApiError::bad_request("Payment intent ID required"))?;
    let details = body.get("orderDetails").cloned().unwrap_or_else(empty_object);

    let intent = state.payments.retrieve_intent(&intent_id).await?;
    if intent.status != "succeeded" {
        return Err(ApiError::PaymentIncomplete { status: intent.status });
    }

    let order = paid_order(&intent, &details);
    let mut order_id = order.id.clone();
    match state.orders.list().await {
        Ok(orders) => match orders.into_iter().find(|o| o.payment_intent_id == intent.id) {
            Some(existing) => {
                info!("Payment {} already recorded as order {}", intent.id, existing.id);
                order_id = existing.id;
            }
            None => match state.orders.append(order).await {
                Ok(()) => info!("Recorded order {} for payment {}", order_id, intent.id),
                Err(e) => error!("Failed to record order for payment {}: {}", intent.id, e),
            },
        },
        Err(e) => error!("Failed to record order for payment {}: {}", intent.id, e),
    }

    Ok(json_response(
        200,
        &json!({
            "success": true,
            "orderId": order_id,
            "paymentStatus": intent.status,
            "amountReceived": intent.amount_received,
        }),
    ))
}

pub async fn handle_payment_health(state: &AppState) -> Result<Response<Body>, ApiError> {
    Ok(json_response(
        200,
        &json!({
            "status": "healthy",
            "stripeConfigured": state.payments.is_configured(),
        }),
    ))
}

/// Order for a completed payment, in `processing` state
fn paid_order(intent: &PaymentIntent, details: &Value) -> Order {
    let items: Vec<OrderItem> = details
        .get("items")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let total = details
        .get("totalAmount")
        .and_then(Value::as_f64)
        .unwrap_or(intent.amount_received as f64 / 100.0);
    let now = now_timestamp();

    Order {
        id: format!("order_{}", intent.id),
        user_id: optional_str(details, "customerId").unwrap_or_default(),
        items,
        total,
        status: OrderStatus::Processing,
        created_at: now.clone(),
        customer_info: details.get("shippingInfo").filter(|v| v.is_object()).cloned().unwrap_or_else(empty_object),
        payment_intent_id: intent.id.clone(),
        tracking_number: String::new(),
        status_history: vec![StatusChange {
            status: OrderStatus::Processing,
            timestamp: now,
            updated_by: "system".to_string(),
            tracking_number: None,
        }],
        last_modified: None,
    }
}

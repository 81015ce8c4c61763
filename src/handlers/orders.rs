//! Order handlers (list, create, status update).

use chrono::Utc;
use lambda_http::tracing::info;
use lambda_http::{Body, Request, RequestExt, Response};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{Claims, caller_from_event, caller_is_admin, require_admin};
use crate::error::ApiError;
use crate::handlers::{now_timestamp, to_json};
use crate::http::{get_value_in_json, json_response, optional_str, parse_json_body};
use crate::models::{Order, OrderItem, OrderStatus, StatusChange, empty_object, items_total};
use crate::state::AppState;

/// Whose orders a non-admin request may see
enum OrderScope {
    All,
    Caller(Claims),
    User(String),
}

impl OrderScope {
    fn includes(&self, order: &Order) -> bool {
        match self {
            OrderScope::All => true,
            OrderScope::Caller(claims) => {
                order.user_id == claims.sub
                    || claims.email.as_deref().is_some_and(|email| {
                        order
                            .customer_email()
                            .is_some_and(|c| c.trim().eq_ignore_ascii_case(email.trim()))
                    })
            }
            OrderScope::User(user_id) => &order.user_id == user_id,
        }
    }
}

/// Lists orders, newest first.
///
/// Admins see everything. A verified caller sees orders they own or that
/// carry their email; an anonymous caller must name a `userId`.
pub async fn handle_list_orders(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let caller = caller_from_event(event, state.verifier.as_ref()).await?;

    let scope = if caller_is_admin(caller.as_ref(), &state.config.admin_emails) {
        OrderScope::All
    } else if let Some(claims) = caller {
        OrderScope::Caller(claims)
    } else {
        match event.query_string_parameters().first("userId").map(str::trim).filter(|u| !u.is_empty()) {
            Some(user_id) => OrderScope::User(user_id.to_string()),
            None => return Err(ApiError::bad_request("User ID required")),
        }
    };

    let mut orders: Vec<Order> = state
        .orders
        .list()
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch orders", e))?
        .into_iter()
        .filter(|order| scope.includes(order))
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(json_response(200, &to_json(&orders, "orders")?))
}

/// Creates an order. A missing or zero `total` is computed from the items.
///
/// A verified caller owns the order; `userId` only names the owner of an
/// anonymous order.
pub async fn handle_create_order(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let caller = caller_from_event(event, state.verifier.as_ref()).await?;
    let body = parse_json_body(event.body())?;

    let items: Vec<OrderItem> = match body.get("items") {
        None | Some(Value::Null) => Vec::new(),
        Some(_) => get_value_in_json(&body, "items")?,
    };

    let total = match body.get("total") {
        None | Some(Value::Null) => 0.0,
        Some(v) => v.as_f64().ok_or_else(|| ApiError::bad_request("total is not a valid value"))?,
    };
    let total = if total == 0.0 && !items.is_empty() { items_total(&items) } else { total };

    let status = match optional_str(&body, "status") {
        Some(s) => s.parse::<OrderStatus>().map_err(ApiError::BadRequest)?,
        None => OrderStatus::Pending,
    };

    let user_id = caller
        .map(|c| c.sub)
        .or_else(|| optional_str(&body, "userId"))
        .unwrap_or_default();

    let now = now_timestamp();
    let order = Order {
        id: new_order_id(),
        user_id,
        items,
        total,
        status,
        created_at: now.clone(),
        customer_info: body.get("customerInfo").filter(|v| v.is_object()).cloned().unwrap_or_else(empty_object),
        payment_intent_id: optional_str(&body, "paymentIntentId").unwrap_or_default(),
        tracking_number: String::new(),
        status_history: vec![StatusChange {
            status,
            timestamp: now,
            updated_by: "system".to_string(),
            tracking_number: None,
        }],
        last_modified: None,
    };

    state
        .orders
        .append(order.clone())
        .await
        .map_err(|e| ApiError::upstream("Failed to create order", e))?;
    info!("Order {} created with total {:.2}", order.id, order.total);

    Ok(json_response(
        201,
        &json!({
            "id": order.id,
            "message": "Order created successfully",
            "total": order.total,
            "status": order.status,
            "order": to_json(&order, "order")?,
        }),
    ))
}

/// Sets an order's status (admin only), recording one history entry.
pub async fn handle_update_order_status(
    event: &Request,
    order_id: &str,
    state: &AppState,
) -> Result<Response<Body>, ApiError> {
    let caller = caller_from_event(event, state.verifier.as_ref()).await?;
    require_admin(caller.as_ref(), &state.config.admin_emails)?;

    let order_id = order_id.trim();
    if order_id.is_empty() {
        return Err(ApiError::bad_request("Order ID is required"));
    }

    let body = parse_json_body(event.body())?;
    let status: OrderStatus = optional_str(&body, "status")
        .ok_or_else(|| ApiError::bad_request("Status is required"))?
        .parse()
        .map_err(ApiError::BadRequest)?;
    let tracking_number = optional_str(&body, "trackingNumber").unwrap_or_default();

    let actor = caller
        .and_then(|c| c.email)
        .unwrap_or_else(|| "admin".to_string());
    let now = now_timestamp();

    let updated = state
        .orders
        .update_where(&|o: &Order| o.id == order_id, &|o: &mut Order| {
            o.apply_status(status, Some(tracking_number.as_str()), &actor, &now)
        })
        .await
        .map_err(|e| ApiError::upstream("Failed to update order status", e))?;
    if updated == 0 {
        return Err(ApiError::not_found("Order not found"));
    }
    info!("Order {} status updated to {} by {}", order_id, status, actor);

    Ok(json_response(
        200,
        &json!({
            "message": format!("Order status updated to {}", status),
            "orderId": order_id,
            "newStatus": status,
            "trackingNumber": tracking_number,
        }),
    ))
}

/// `order_{8 hex}_{unix seconds}`
fn new_order_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("order_{}_{}", &hex[..8], Utc::now().timestamp())
}

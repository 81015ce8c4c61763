mod analysis;
mod auth;
mod config;
mod error;
mod handlers;
mod http;
mod models;
mod payment;
mod recognition;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use aws_config::BehaviorVersion;
use lambda_http::tracing::info;
use lambda_http::{run, service_fn, Body, Request, Response};

use config::Config;
use error::ApiError;
use handlers::{
    handle_analyze_image, handle_confirm_payment, handle_create_order, handle_create_payment_intent,
    handle_create_product, handle_delete_product, handle_list_orders, handle_list_products, handle_login,
    handle_payment_health, handle_update_order_status, handle_upload_url,
};
use http::{error_response, handle_options, strip_stage_prefix};
use state::AppState;

/// Resources the API serves, with any id taken from the path
#[derive(Debug, PartialEq)]
enum Route<'a> {
    Products,
    Product(&'a str),
    Orders,
    Order(&'a str),
    Auth,
    CreatePaymentIntent,
    ConfirmPayment,
    PaymentHealth,
    UploadUrl,
    AnalyzeImage,
}

fn route(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let route = match segments.as_slice() {
        ["products"] => Route::Products,
        ["products", id] => Route::Product(*id),
        ["orders"] => Route::Orders,
        ["orders", id] => Route::Order(*id),
        ["auth"] => Route::Auth,
        ["payment", "create-payment-intent"] | ["create-payment-intent"] => Route::CreatePaymentIntent,
        ["payment", "confirm-payment"] | ["confirm-payment"] => Route::ConfirmPayment,
        ["payment", "health"] => Route::PaymentHealth,
        ["upload-url"] => Route::UploadUrl,
        ["analyze-image"] => Route::AnalyzeImage,
        _ => return None,
    };
    Some(route)
}

/// Handle the Lambda event
async fn handle_lambda_event(event: Request, state: &AppState) -> Response<Body> {
    let method = event.method().as_str();

    // Handle CORS preflight requests
    if method == "OPTIONS" {
        return handle_options();
    }

    let path = strip_stage_prefix(event.uri().path());
    info!("{} {}", method, path);

    let Some(route) = route(path) else {
        return error_response(404, "Not found");
    };

    let result = match (route, method) {
        (Route::Products, "GET") => handle_list_products(state).await,
        (Route::Products, "POST") => handle_create_product(&event, state).await,
        (Route::Product(id), "DELETE") => handle_delete_product(&event, id, state).await,
        (Route::Orders, "GET") => handle_list_orders(&event, state).await,
        (Route::Orders, "POST") => handle_create_order(&event, state).await,
        (Route::Order(id), "PUT") => handle_update_order_status(&event, id, state).await,
        (Route::Auth, "POST") => handle_login(&event, state).await,
        (Route::CreatePaymentIntent, "POST") => handle_create_payment_intent(&event, state).await,
        (Route::ConfirmPayment, "POST") => handle_confirm_payment(&event, state).await,
        (Route::PaymentHealth, "GET") => handle_payment_health(state).await,
        (Route::UploadUrl, "GET") => handle_upload_url(&event, state).await,
        (Route::AnalyzeImage, "POST") => handle_analyze_image(&event, state).await,
        _ => Err(ApiError::MethodNotAllowed),
    };

    result.unwrap_or_else(ApiError::into_response)
}

/// Main Lambda handler function
async fn function_handler(event: Request, state: &AppState) -> Result<Response<Body>, lambda_http::Error> {
    Ok(handle_lambda_event(event, state).await)
}

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    lambda_http::tracing::init_default_subscriber();

    // Clients and configuration are built once per cold start
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let config = Config::load(&sdk_config).await?;
    let state = AppState::from_config(config, &sdk_config)?;
    let state = &state;

    run(service_fn(move |event: Request| async move { function_handler(event, state).await })).await
}

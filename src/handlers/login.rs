//! Sign-in: exchanges an ID token for the caller's profile.

use lambda_http::tracing::info;
use lambda_http::{Body, Request, Response};
use serde_json::json;

use crate::error::ApiError;
use crate::http::{json_response, optional_str, parse_json_body};
use crate::state::AppState;

pub async fn handle_login(event: &Request, state: &AppState) -> Result<Response<Body>, ApiError> {
    let body = parse_json_body(event.body())?;
    let token = optional_str(&body, "token").ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let claims = state.verifier.verify(&token).await?;
    info!("User {} signed in", claims.sub);

    Ok(json_response(
        200,
        &json!({
            "user": {
                "id": claims.sub,
                "email": claims.email.unwrap_or_default(),
                "name": claims.name.unwrap_or_default(),
                "picture": claims.picture.unwrap_or_default(),
                "email_verified": claims.email_verified,
            },
            "token": token,
        }),
    ))
}

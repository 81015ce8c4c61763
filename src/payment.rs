//! Payment processor client (Stripe REST API)

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;

const STRIPE_API: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub amount_received: i64,
    #[serde(default)]
    pub currency: String,
}

/// Parameters for a new card payment intent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPaymentIntent {
    /// Smallest currency unit (cents).
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub order_id: String,
    pub customer_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn create_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, ApiError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ApiError>;
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

pub struct StripeGateway {
    secret_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(secret_key, STRIPE_API)
    }

    pub fn with_base_url(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn ensure_configured(&self) -> Result<(), ApiError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ApiError::upstream("Payment processor not configured", "no secret key set"))
        }
    }

    /// Stripe rejections become 400s carrying Stripe's message; transport failures are 500s.
    async fn read_intent(&self, request: reqwest::RequestBuilder) -> Result<PaymentIntent, ApiError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ApiError::upstream("Payment processor request failed", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::upstream("Payment processor request failed", e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Payment processor returned {}", status));
            return Err(ApiError::BadRequest(message));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::upstream("Unexpected payment processor response", e))
    }
}

pub(crate) fn intent_form(intent: &NewPaymentIntent) -> Vec<(&'static str, String)> {
    vec![
        ("amount", intent.amount.to_string()),
        ("currency", intent.currency.clone()),
        ("payment_method_types[]", "card".to_string()),
        ("metadata[customer_email]", intent.customer_email.clone()),
        ("metadata[order_id]", intent.order_id.clone()),
        ("metadata[customer_id]", intent.customer_id.clone()),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn is_configured(&self) -> bool {
        !self.secret_key.trim().is_empty()
    }

    async fn create_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, ApiError> {
        self.ensure_configured()?;
        let request = self
            .http
            .post(format!("{}/payment_intents", self.base_url))
            .form(&intent_form(intent));
        self.read_intent(request).await
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ApiError> {
        self.ensure_configured()?;
        let request = self
            .http
            .get(format!("{}/payment_intents/{}", self.base_url, urlencoding::encode(id)));
        self.read_intent(request).await
    }
}

//! Bank account linking and payment initiation, backed by the Plaid REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{config::PlaidEnv, errors::AppError};

#[derive(Debug, Clone, PartialEq)]
pub enum LinkPurpose {
    /// Link a business bank account for verification and statements.
    AccountLinking,
    /// Authorise a single payment created beforehand.
    Payment { payment_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkTokenRequest {
    pub client_user_id: String,
    pub purpose: LinkPurpose,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkToken {
    pub link_token: String,
    pub expiration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub recipient_id: String,
    pub reference: String,
    /// Amount in pence.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCreated {
    pub payment_id: String,
    pub status: String,
}

#[async_trait]
pub trait BankLinkPlatform: Send + Sync {
    async fn create_link_token(&self, request: LinkTokenRequest) -> Result<LinkToken, AppError>;
    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessToken, AppError>;
    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentCreated, AppError>;
}

pub struct PlaidClient {
    http: Client,
    base_url: String,
    client_id: String,
    secret: String,
    client_name: String,
}

impl PlaidClient {
    pub fn new(env: PlaidEnv, client_id: &str, secret: &str, client_name: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: env.base_url().to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            client_name: client_name.to_string(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, mut body: Value) -> Result<T, AppError> {
        body["client_id"] = Value::String(self.client_id.clone());
        body["secret"] = Value::String(self.secret.clone());

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            return Err(decode_error(&payload));
        }
        Ok(serde_json::from_value(payload)?)
    }
}

#[async_trait]
impl BankLinkPlatform for PlaidClient {
    async fn create_link_token(&self, request: LinkTokenRequest) -> Result<LinkToken, AppError> {
        let body = link_token_body(&self.client_name, &request);
        let token: LinkToken = self.post("/link/token/create", body).await?;
        log::info!("Link token created for {}", request.client_user_id);
        Ok(token)
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessToken, AppError> {
        self.post(
            "/item/public_token/exchange",
            json!({ "public_token": public_token }),
        )
        .await
    }

    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentCreated, AppError> {
        let body = json!({
            "recipient_id": request.recipient_id,
            "reference": request.reference,
            "amount": {
                "currency": "GBP",
                "value": request.amount as f64 / 100.0,
            },
        });
        let payment: PaymentCreated = self.post("/payment_initiation/payment/create", body).await?;
        log::info!("Payment {} created ({})", payment.payment_id, payment.status);
        Ok(payment)
    }
}

pub fn link_token_body(client_name: &str, request: &LinkTokenRequest) -> Value {
    let mut body = json!({
        "client_name": client_name,
        "country_codes": ["GB"],
        "language": "en",
        "user": { "client_user_id": request.client_user_id },
    });
    match &request.purpose {
        LinkPurpose::AccountLinking => {
            body["products"] = json!(["auth", "transactions"]);
        }
        LinkPurpose::Payment { payment_id } => {
            body["products"] = json!(["payment_initiation"]);
            body["payment_initiation"] = json!({ "payment_id": payment_id });
        }
    }
    body
}

fn decode_error(payload: &Value) -> AppError {
    AppError::Plaid {
        code: payload["error_code"]
            .as_str()
            .unwrap_or("UNKNOWN")
            .to_string(),
        message: payload["display_message"]
            .as_str()
            .or_else(|| payload["error_message"].as_str())
            .unwrap_or("Plaid request failed")
            .to_string(),
    }
}

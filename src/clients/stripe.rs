//! Card issuing and connected accounts, backed by the Stripe REST API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

use crate::errors::AppError;

#[async_trait]
pub trait PaymentsPlatform: Send + Sync {
    async fn create_account(&self, params: Value) -> Result<Value, AppError>;
    async fn create_person(&self, account_id: &str, params: Value) -> Result<Value, AppError>;
    async fn retrieve_account(&self, account_id: &str) -> Result<Value, AppError>;
    async fn create_cardholder(&self, account_id: &str, params: Value) -> Result<Value, AppError>;
    async fn create_card(&self, account_id: &str, params: Value) -> Result<Value, AppError>;
}

pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str, connected_account: Option<&str>) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key);
        match connected_account {
            Some(account) => builder.header("Stripe-Account", account),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(decode_error(status.as_u16(), &body))
        }
    }

    async fn post_form(
        &self,
        path: &str,
        params: &Value,
        connected_account: Option<&str>,
    ) -> Result<Value, AppError> {
        let builder = self
            .request(Method::POST, path, connected_account)
            .form(&form_pairs(params));
        self.send(builder).await
    }
}

#[async_trait]
impl PaymentsPlatform for StripeClient {
    async fn create_account(&self, params: Value) -> Result<Value, AppError> {
        let account = self.post_form("/v1/accounts", &params, None).await?;
        log::info!("Created connected account {}", account["id"]);
        Ok(account)
    }

    async fn create_person(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        let path = format!("/v1/accounts/{}/persons", account_id);
        let person = self.post_form(&path, &params, None).await?;
        log::info!("Created person {} on {}", person["id"], account_id);
        Ok(person)
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Value, AppError> {
        let path = format!("/v1/accounts/{}", account_id);
        self.send(self.request(Method::GET, &path, None)).await
    }

    async fn create_cardholder(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        self.post_form("/v1/issuing/cardholders", &params, Some(account_id))
            .await
    }

    async fn create_card(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        let card = self
            .post_form("/v1/issuing/cards", &params, Some(account_id))
            .await?;
        log::info!("Issued card {} on {}", card["id"], account_id);
        Ok(card)
    }
}

/// Encodes JSON params in Stripe's bracketed form syntax, e.g.
/// `capabilities[transfers][requested]=true` and `items[0][price]=100`.
pub fn form_pairs(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = params {
        for (key, value) in map {
            flatten_into(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

fn flatten_into(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Bool(b) => pairs.push((prefix, b.to_string())),
        Value::Number(n) => pairs.push((prefix, n.to_string())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(format!("{}[{}]", prefix, i), item, pairs);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten_into(format!("{}[{}]", prefix, key), item, pairs);
            }
        }
    }
}

fn decode_error(status: u16, body: &Value) -> AppError {
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("Stripe request failed")
        .to_string();
    AppError::Stripe { status, message }
}

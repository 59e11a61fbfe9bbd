use actix_web::{
    get, post,
    web::{self, Data},
    HttpResponse, Responder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{errors::AppError, AppState};

/// Merchant categories a Trok card may be used at.
pub const FUEL_CATEGORIES: [&str; 2] = ["service_stations", "automated_fuel_dispensers"];

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    id: String,
}

#[get("/account")]
pub async fn account_handler(
    state: Data<AppState>,
    query: web::Query<AccountQuery>,
) -> Result<impl Responder, AppError> {
    if query.id.is_empty() {
        return Err(AppError::Validation("Account id is required".to_string()));
    }
    let account = state.payments.retrieve_account(&query.id).await?;
    Ok(HttpResponse::Ok().json(account))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCardholder {
    #[validate(length(min = 1, message = "Account id is required"))]
    account_id: String,
    #[validate(length(min = 1, max = 24, message = "Name must be between 1 and 24 characters"))]
    name: String,
    #[validate(email(message = "Invalid email address"))]
    email: Option<String>,
    phone_number: Option<String>,
    billing: Value,
}

#[post("/cardholder")]
pub async fn cardholder_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<NewCardholder>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    if payload.billing.get("address").is_none() {
        return Err(AppError::Validation(
            "A billing address is required".to_string(),
        ));
    }
    let cardholder = state
        .payments
        .create_cardholder(
            &payload.account_id,
            json!({
                "type": "individual",
                "status": "active",
                "name": payload.name,
                "email": payload.email,
                "phone_number": payload.phone_number,
                "billing": payload.billing,
            }),
        )
        .await?;
    log::info!("Cardholder {} created on {}", cardholder["id"], payload.account_id);
    Ok(HttpResponse::Ok().json(cardholder))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Virtual,
    Physical,
}

impl CardType {
    fn as_str(&self) -> &'static str {
        match self {
            CardType::Virtual => "virtual",
            CardType::Physical => "physical",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCard {
    #[validate(length(min = 1, message = "Account id is required"))]
    account_id: String,
    #[validate(length(min = 1, message = "Cardholder id is required"))]
    cardholder_id: String,
    #[serde(rename = "type", default)]
    card_type: CardType,
    /// Daily limit in pence.
    #[validate(range(min = 1, message = "Spending limit must be positive"))]
    spending_limit: Option<i64>,
    #[serde(default)]
    shipping: Option<Value>,
}

pub fn card_params(card: &NewCard) -> Value {
    let mut spending_controls = json!({ "allowed_categories": FUEL_CATEGORIES });
    if let Some(limit) = card.spending_limit {
        spending_controls["spending_limits"] = json!([{ "amount": limit, "interval": "daily" }]);
    }
    json!({
        "cardholder": card.cardholder_id,
        "currency": "gbp",
        "type": card.card_type.as_str(),
        "status": "active",
        "spending_controls": spending_controls,
        "shipping": card.shipping,
    })
}

#[post("/card")]
pub async fn card_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<NewCard>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    if payload.card_type == CardType::Physical && payload.shipping.is_none() {
        return Err(AppError::Validation(
            "Physical cards need a shipping address".to_string(),
        ));
    }
    let card = state
        .payments
        .create_card(&payload.account_id, card_params(&payload))
        .await?;
    Ok(HttpResponse::Ok().json(card))
}

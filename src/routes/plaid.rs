use actix_identity::Identity;
use actix_web::{
    post,
    web::{self, Data},
    HttpResponse, Responder,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use validator::{Validate, ValidationError};

use crate::{
    clients::plaid::{LinkPurpose, LinkToken, LinkTokenRequest, PaymentRequest},
    db,
    errors::AppError,
    structs::Payment,
    utils::{normalize_email, now},
    AppState,
};

lazy_static! {
    static ref PAYMENT_REFERENCE: Regex = Regex::new(r"^[a-zA-Z0-9 ]{1,18}$").unwrap();
}

fn validate_reference(reference: &str) -> Result<(), ValidationError> {
    if PAYMENT_REFERENCE.is_match(reference) {
        Ok(())
    } else {
        Err(ValidationError::new("reference")
            .with_message("Reference must be 1-18 letters, numbers or spaces".into()))
    }
}

/// Opens a bank-linking session for the business behind `email`.
pub async fn link_business_account(state: &AppState, email: &str) -> Result<LinkToken, AppError> {
    state
        .bank_links
        .create_link_token(LinkTokenRequest {
            client_user_id: normalize_email(email),
            purpose: LinkPurpose::AccountLinking,
        })
        .await
}

/// Whether a bank account has been linked, either on the user or on the staged signup.
pub async fn account_linked(state: &AppState, email: &str) -> Result<bool, AppError> {
    let email = normalize_email(email);
    if let Some(user) = db::get_user_by_email(&state.db_pool, &email).await? {
        if user.plaid_access_token.is_some() {
            return Ok(true);
        }
    }
    Ok(state
        .signups
        .fetch(&email)
        .await?
        .is_some_and(|fields| fields.contains_key("plaid_access_token")))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkTokenBody {
    #[validate(email(message = "Invalid email address"))]
    email: String,
}

#[post("/create_link_token")]
pub async fn create_link_token_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<LinkTokenBody>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    let token = link_business_account(&state, &payload.email).await?;
    Ok(HttpResponse::Ok().json(token))
}

#[derive(Debug, Deserialize)]
pub struct SetAccessToken {
    #[serde(default)]
    email: Option<String>,
    public_token: String,
}

#[post("/set_access_token")]
pub async fn set_access_token_handler(
    state: Data<AppState>,
    identity: Option<Identity>,
    web::Json(payload): web::Json<SetAccessToken>,
) -> Result<impl Responder, AppError> {
    let email = match (payload.email.filter(|e| !e.is_empty()), identity) {
        (Some(email), _) => normalize_email(&email),
        (None, Some(identity)) => identity.id()?,
        (None, None) => {
            return Err(AppError::Validation(
                "An email or an active session is required".to_string(),
            ))
        }
    };

    let token = state
        .bank_links
        .exchange_public_token(&payload.public_token)
        .await?;

    let on_user =
        db::set_user_bank_link(&state.db_pool, &email, &token.access_token, &token.item_id)
            .await?;
    if !on_user {
        state
            .signups
            .merge(
                &email,
                vec![
                    ("plaid_access_token".to_string(), token.access_token),
                    ("plaid_item_id".to_string(), token.item_id.clone()),
                ],
                state.config.signup_ttl,
            )
            .await?;
    }
    log::info!("Bank account linked for {} (item {})", email, token.item_id);

    Ok(HttpResponse::Ok().json(json!({
        "item_id": token.item_id,
        "message": "Bank account linked"
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentLinkBody {
    user_id: String,
    #[serde(default)]
    stripe_account_id: Option<String>,
    /// Pounds, as entered in the dashboard.
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    amount: f64,
    #[validate(custom(function = validate_reference))]
    reference: String,
}

#[post("/create_link_token_for_payment")]
pub async fn payment_link_token_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<PaymentLinkBody>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    let user_id: i64 = payload
        .user_id
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid user id: {}", payload.user_id)))?;
    let recipient_id = state
        .config
        .plaid_payment_recipient_id
        .clone()
        .ok_or_else(|| AppError::Config("PLAID_PAYMENT_RECIPIENT_ID is not set".to_string()))?;
    let amount = (payload.amount * 100.0).round() as i64;

    let created = state
        .bank_links
        .create_payment(PaymentRequest {
            recipient_id,
            reference: payload.reference.clone(),
            amount,
        })
        .await?;

    db::create_payment(
        &state.db_pool,
        &Payment {
            id: created.payment_id.clone(),
            user_id,
            stripe_account_id: payload.stripe_account_id,
            amount,
            currency: "GBP".to_string(),
            reference: payload.reference,
            status: created.status,
            created_at: now(),
        },
    )
    .await?;

    let token = state
        .bank_links
        .create_link_token(LinkTokenRequest {
            client_user_id: user_id.to_string(),
            purpose: LinkPurpose::Payment {
                payment_id: created.payment_id.clone(),
            },
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "link_token": token.link_token,
        "expiration": token.expiration,
        "payment_id": created.payment_id,
    })))
}

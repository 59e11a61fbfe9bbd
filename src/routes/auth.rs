use actix_identity::Identity;
use actix_web::{
    post,
    web::{self, Data},
    HttpMessage, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    db,
    errors::AppError,
    store::{object_to_fields, SignupFields, ONBOARDING_STEP},
    structs::NewUser,
    utils::{hash_password, normalize_email, verify_password},
    AppState,
};

const PASSWORD_HASH: &str = "password_hash";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupInfo {
    #[validate(length(min = 1, message = "First name is required"))]
    firstname: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    lastname: String,
    #[validate(email(message = "Invalid email address"))]
    email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters long"
    ))]
    password: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    phone: String,
    #[serde(default)]
    referral_code: Option<String>,
}

#[post("/signup")]
pub async fn signup_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<SignupInfo>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    if db::get_user_by_email(&state.db_pool, &email).await?.is_some() {
        return Err(AppError::Validation(
            "An account with this email already exists".to_string(),
        ));
    }

    let mut fields = vec![
        ("firstname".to_string(), payload.firstname),
        ("lastname".to_string(), payload.lastname),
        ("email".to_string(), email.clone()),
        (PASSWORD_HASH.to_string(), hash_password(&payload.password)?),
        ("phone".to_string(), payload.phone),
        (ONBOARDING_STEP.to_string(), "1".to_string()),
    ];
    if let Some(code) = payload.referral_code.filter(|c| !c.is_empty()) {
        fields.push(("referral_code".to_string(), code));
    }

    state
        .signups
        .merge(&email, fields, state.config.signup_ttl)
        .await?;
    log::info!("Signup for {} has been initiated", email);

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Signup for {} has been initiated", email)
    })))
}

#[derive(Debug, Deserialize)]
pub struct OnboardingQuery {
    email: String,
    step: u32,
}

#[post("/onboarding")]
pub async fn onboarding_handler(
    state: Data<AppState>,
    query: web::Query<OnboardingQuery>,
    web::Json(payload): web::Json<Value>,
) -> Result<impl Responder, AppError> {
    let Value::Object(object) = payload else {
        return Err(AppError::Validation(
            "Onboarding payload must be a JSON object".to_string(),
        ));
    };
    let email = normalize_email(&query.email);

    let mut fields = object_to_fields(&object);
    // the step comes from the query and the password is only set at signup
    fields.retain(|(key, _)| key != ONBOARDING_STEP && key != PASSWORD_HASH);
    fields.push((ONBOARDING_STEP.to_string(), query.step.to_string()));

    state
        .signups
        .merge(&email, fields, state.config.signup_ttl)
        .await?;
    log::info!("{} has completed onboarding step {}", email, query.step);

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} has completed onboarding step {}", email, query.step)
    })))
}

#[derive(Debug, Deserialize)]
pub struct TokenRef {
    id: String,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationData {
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRegistration {
    #[serde(rename = "accountToken")]
    account_token: TokenRef,
    #[serde(rename = "personToken")]
    person_token: TokenRef,
    #[serde(default)]
    business_profile: Value,
    data: RegistrationData,
}

/// Builds the durable user from a staged signup.
pub fn new_user_from_signup(
    email: &str,
    fields: &SignupFields,
    stripe_account_id: &str,
    stripe_person_id: Option<&str>,
) -> Result<NewUser, AppError> {
    let field = |key: &str| {
        fields
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("Signup for {} is missing {}", email, key)))
    };
    Ok(NewUser {
        firstname: field("firstname")?,
        lastname: field("lastname")?,
        email: email.to_string(),
        pwd_hash: field(PASSWORD_HASH)?,
        phone: field("phone")?,
        referral_code: fields.get("referral_code").cloned(),
        onboarding_step: fields
            .get(ONBOARDING_STEP)
            .and_then(|s| s.parse().ok())
            .unwrap_or(1),
        stripe_account_id: Some(stripe_account_id.to_string()),
        stripe_person_id: stripe_person_id.map(str::to_string),
        plaid_access_token: fields.get("plaid_access_token").cloned(),
        plaid_item_id: fields.get("plaid_item_id").cloned(),
    })
}

#[post("/complete-registration")]
pub async fn complete_registration_handler(
    state: Data<AppState>,
    web::Json(payload): web::Json<CompleteRegistration>,
) -> Result<impl Responder, AppError> {
    let account = state
        .payments
        .create_account(json!({
            "country": "GB",
            "type": "custom",
            "business_profile": payload.business_profile,
            "capabilities": {
                "card_payments": { "requested": true },
                "transfers": { "requested": true }
            },
            "account_token": payload.account_token.id,
        }))
        .await?;
    let account_id = account["id"]
        .as_str()
        .ok_or_else(|| AppError::Stripe {
            status: 502,
            message: "Connected account response has no id".to_string(),
        })?
        .to_string();

    let person = state
        .payments
        .create_person(
            &account_id,
            json!({ "person_token": payload.person_token.id }),
        )
        .await?;

    let email = normalize_email(&payload.data.email);
    match state.signups.fetch(&email).await? {
        Some(fields) => {
            if db::get_user_by_email(&state.db_pool, &email).await?.is_some() {
                log::warn!("User {} already exists, keeping the existing record", email);
                state.signups.remove(&email).await?;
            } else {
                match new_user_from_signup(&email, &fields, &account_id, person["id"].as_str()) {
                    Ok(new_user) => {
                        db::create_user(&state.db_pool, new_user).await?;
                        state.signups.remove(&email).await?;
                    }
                    Err(e) => log::warn!("{}, user record not created", e),
                }
            }
        }
        None => log::warn!("No staged signup for {}, user record not created", email),
    }

    Ok(HttpResponse::Ok().json(json!({ "account": account, "person": person })))
}

#[derive(Debug, Deserialize)]
pub struct Login {
    email: String,
    password: String,
}

#[post("/login")]
pub async fn login_handler(
    state: Data<AppState>,
    request: HttpRequest,
    web::Json(form): web::Json<Login>,
) -> Result<impl Responder, AppError> {
    let email = normalize_email(&form.email);
    let user = db::get_user_by_email(&state.db_pool, &email)
        .await?
        .filter(|user| verify_password(&form.password, &user.pwd_hash))
        .ok_or_else(|| {
            log::warn!("Failed login for {}", email);
            AppError::Unauthorized("User not found!".to_string())
        })?;

    Identity::login(&request.extensions(), user.email.clone())?;
    log::info!("{} logged in", user.email);
    Ok(HttpResponse::Ok().json(user))
}

#[post("/logout")]
pub async fn logout_handler(identity: Option<Identity>) -> impl Responder {
    if let Some(identity) = identity {
        identity.logout();
    }
    HttpResponse::Ok().json(json!({ "message": "Logged out" }))
}

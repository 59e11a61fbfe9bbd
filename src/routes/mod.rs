use actix_web::{
    dev::ConnectionInfo,
    get,
    http::Method,
    web::{self, ServiceConfig},
    HttpResponse, Responder,
};
use serde_json::json;

use crate::errors::AppError;

pub mod auth;
pub mod plaid;
pub mod rpc;
pub mod stripe;
pub mod upload;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/server/auth")
            .service(auth::signup_handler)
            .service(auth::onboarding_handler)
            .service(auth::complete_registration_handler)
            .service(auth::login_handler)
            .service(auth::logout_handler),
    )
    .service(
        web::scope("/server/stripe")
            .service(stripe::account_handler)
            .service(stripe::cardholder_handler)
            .service(stripe::card_handler),
    )
    .service(
        web::scope("/server/plaid")
            .service(plaid::create_link_token_handler)
            .service(plaid::set_access_token_handler)
            .service(plaid::payment_link_token_handler),
    )
    .service(rpc::rpc_handler)
    .service(upload::upload_handler)
    .service(welcome_handler)
    .service(web::resource("/ping").to(ping_handler));
}

#[get("/server")]
pub async fn welcome_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Welcome to trok!" }))
}

/// Health check for the hosting platform.
pub async fn ping_handler(conn: ConnectionInfo) -> impl Responder {
    let message = format!("Pinged at {}", chrono::Utc::now().to_rfc2822());
    log::info!("{} - {}", conn.realip_remote_addr().unwrap_or("unknown"), message);
    HttpResponse::Ok().json(json!({ "message": message }))
}

pub async fn default_handler(req_method: Method) -> Result<HttpResponse, AppError> {
    match req_method {
        Method::GET => Err(AppError::NotFound("Not found".to_string())),
        _ => Err(AppError::MethodNotAllowed("Method not allowed".to_string())),
    }
}

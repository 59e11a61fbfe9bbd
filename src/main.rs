use std::{str::FromStr, sync::Arc};

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    body::MessageBody,
    cookie::Key,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware::{self, from_fn},
    web::{self, Data},
    App, HttpServer,
};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};

mod clients;
mod config;
mod db;
mod errors;
mod hpp;
mod jobs;
mod routes;
mod store;
mod structs;
mod utils;

#[cfg(test)]
mod testing;

use clients::{BankLinkPlatform, PaymentsPlatform, PlaidClient, StripeClient, UploadSigner};
use config::Config;
use errors::AppError;
use store::{RedisSignupStore, SignupStore};

#[derive(Clone)]
pub struct AppState {
    db_pool: SqlitePool,
    signups: Arc<dyn SignupStore>,
    payments: Arc<dyn PaymentsPlatform>,
    bank_links: Arc<dyn BankLinkPlatform>,
    uploads: Arc<UploadSigner>,
    config: Arc<Config>,
}

/// Middleware stack and routes shared by the server and the tests.
pub fn build_app(
    state: AppState,
    session_key: Key,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(Data::new(state))
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            AppError::Validation(err.to_string()).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            AppError::Validation(err.to_string()).into()
        }))
        .wrap(from_fn(hpp::parameter_pollution))
        .wrap(middleware::Compress::default())
        .wrap(IdentityMiddleware::default())
        .wrap(SessionMiddleware::new(
            CookieSessionStore::default(),
            session_key,
        ))
        .wrap(Cors::permissive())
        // always register the Logger last so it wraps everything else
        .wrap(middleware::Logger::default())
        .configure(routes::configure)
        .default_service(web::to(routes::default_handler))
}

async fn connect_database(database_url: &str) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .read_only(false)
        .busy_timeout(std::time::Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!().run(&db_pool).await?;
    info!("Database migrated successfully");
    Ok(db_pool)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("FATAL: {}", e);
        e
    })?;

    let db_pool = connect_database(&config.database_url).await?;
    let signups = RedisSignupStore::connect(&config.redis_url).await?;

    let state = AppState {
        db_pool: db_pool.clone(),
        signups: Arc::new(signups),
        payments: Arc::new(StripeClient::new(
            &config.stripe_api_base,
            &config.stripe_secret_key,
        )),
        bank_links: Arc::new(PlaidClient::new(
            config.plaid_env,
            &config.plaid_client_id,
            &config.plaid_secret,
            &config.plaid_client_name,
        )),
        uploads: Arc::new(UploadSigner::new(
            &config.gcs_bucket_name,
            &config.gcs_hmac_access_id,
            &config.gcs_hmac_secret,
        )),
        config: Arc::new(config.clone()),
    };

    let session_key = Key::from(config.session_key.as_bytes());
    let bind = (config.host.clone(), config.port);

    info!("Listening at http://{}:{}/server", config.host, config.port);

    let server = HttpServer::new(move || build_app(state.clone(), session_key.clone()))
        .bind(bind)?
        .run();

    jobs::spawn_statement_checker(db_pool, config.statement_check_interval);

    server.await
}

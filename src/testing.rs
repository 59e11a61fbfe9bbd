//! Fixtures shared by the unit tests: an in-memory database, in-memory
//! stand-ins for the external platforms, and a fully wired `AppState`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::{
    clients::{
        plaid::{AccessToken, LinkPurpose, LinkToken, LinkTokenRequest, PaymentCreated, PaymentRequest},
        BankLinkPlatform, PaymentsPlatform, UploadSigner,
    },
    config::{Config, PlaidEnv},
    db,
    errors::AppError,
    store::{SignupFields, SignupStore},
    structs::{NewUser, User},
    utils::hash_password,
    AppState,
};

pub const TEST_PASSWORD: &str = "fleet-password-1";

pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}

pub async fn seed_user(pool: &SqlitePool, email: &str) -> User {
    db::create_user(
        pool,
        NewUser {
            firstname: "Sam".into(),
            lastname: "Driver".into(),
            email: email.into(),
            pwd_hash: hash_password(TEST_PASSWORD).unwrap(),
            phone: "+447700900123".into(),
            onboarding_step: 5,
            ..Default::default()
        },
    )
    .await
    .expect("seed user")
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 3333,
        database_url: "sqlite::memory:".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        session_key: "k".repeat(64),
        stripe_secret_key: "sk_test_123".into(),
        stripe_api_base: "https://api.stripe.com".into(),
        plaid_client_id: "client".into(),
        plaid_secret: "secret".into(),
        plaid_env: PlaidEnv::Sandbox,
        plaid_client_name: "Trok".into(),
        plaid_payment_recipient_id: Some("recipient-id-sandbox-1".into()),
        gcs_bucket_name: "trok-uploads".into(),
        gcs_hmac_access_id: "GOOG1EXAMPLE".into(),
        gcs_hmac_secret: "hmac-secret".into(),
        signup_ttl: Duration::from_secs(172_800),
        statement_check_interval: Duration::from_secs(3600),
    }
}

#[derive(Default)]
pub struct MemorySignupStore {
    records: Mutex<HashMap<String, (SignupFields, Duration)>>,
}

impl MemorySignupStore {
    pub fn ttl(&self, email: &str) -> Option<Duration> {
        self.records.lock().unwrap().get(email).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl SignupStore for MemorySignupStore {
    async fn merge(
        &self,
        email: &str,
        fields: Vec<(String, String)>,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut records = self.records.lock().unwrap();
        let entry = records.entry(email.to_string()).or_default();
        entry.0.extend(fields);
        entry.1 = ttl;
        Ok(())
    }

    async fn fetch(&self, email: &str) -> Result<Option<SignupFields>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(email)
            .map(|(fields, _)| fields.clone()))
    }

    async fn remove(&self, email: &str) -> Result<(), AppError> {
        self.records.lock().unwrap().remove(email);
        Ok(())
    }
}

/// Records every call and answers like the sandbox API would.
#[derive(Default)]
pub struct FakePayments {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub reject_person: bool,
}

impl FakePayments {
    fn record(&self, call: &str, params: Value) {
        self.calls.lock().unwrap().push((call.to_string(), params));
    }

    pub fn call(&self, name: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(call, _)| call == name)
            .map(|(_, params)| params.clone())
    }
}

#[async_trait]
impl PaymentsPlatform for FakePayments {
    async fn create_account(&self, params: Value) -> Result<Value, AppError> {
        self.record("create_account", params.clone());
        Ok(json!({ "id": "acct_test_1", "object": "account", "country": params["country"] }))
    }

    async fn create_person(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        self.record("create_person", params);
        if self.reject_person {
            return Err(AppError::Stripe {
                status: 400,
                message: "No such token: 'cpt_bad'".into(),
            });
        }
        Ok(json!({ "id": "person_test_1", "object": "person", "account": account_id }))
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Value, AppError> {
        self.record("retrieve_account", json!({ "id": account_id }));
        Ok(json!({ "id": account_id, "object": "account" }))
    }

    async fn create_cardholder(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        self.record("create_cardholder", params.clone());
        Ok(json!({ "id": "ich_test_1", "name": params["name"], "account": account_id }))
    }

    async fn create_card(&self, account_id: &str, params: Value) -> Result<Value, AppError> {
        self.record("create_card", params.clone());
        Ok(json!({
            "id": "ic_test_1",
            "cardholder": params["cardholder"],
            "currency": params["currency"],
            "account": account_id
        }))
    }
}

#[derive(Default)]
pub struct FakeBankLinks {
    pub link_requests: Mutex<Vec<LinkTokenRequest>>,
    pub payments: Mutex<Vec<PaymentRequest>>,
}

#[async_trait]
impl BankLinkPlatform for FakeBankLinks {
    async fn create_link_token(&self, request: LinkTokenRequest) -> Result<LinkToken, AppError> {
        let link_token = match &request.purpose {
            LinkPurpose::AccountLinking => format!("link-sandbox-{}", request.client_user_id),
            LinkPurpose::Payment { payment_id } => format!("link-sandbox-{}", payment_id),
        };
        self.link_requests.lock().unwrap().push(request);
        Ok(LinkToken {
            link_token,
            expiration: "2030-01-01T00:00:00Z".into(),
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<AccessToken, AppError> {
        if !public_token.starts_with("public-") {
            return Err(AppError::Plaid {
                code: "INVALID_PUBLIC_TOKEN".into(),
                message: "provided public token is in an invalid format".into(),
            });
        }
        Ok(AccessToken {
            access_token: "access-sandbox-1".into(),
            item_id: "item-sandbox-1".into(),
        })
    }

    async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentCreated, AppError> {
        self.payments.lock().unwrap().push(request);
        Ok(PaymentCreated {
            payment_id: "payment-id-sandbox-1".into(),
            status: "PAYMENT_STATUS_INPUT_NEEDED".into(),
        })
    }
}

pub struct TestContext {
    pub state: AppState,
    pub signups: Arc<MemorySignupStore>,
    pub payments: Arc<FakePayments>,
    pub bank_links: Arc<FakeBankLinks>,
}

pub async fn test_context() -> TestContext {
    test_context_with(FakePayments::default()).await
}

pub async fn test_context_with(payments: FakePayments) -> TestContext {
    let config = test_config();
    let signups = Arc::new(MemorySignupStore::default());
    let payments = Arc::new(payments);
    let bank_links = Arc::new(FakeBankLinks::default());
    let state = AppState {
        db_pool: test_pool().await,
        signups: signups.clone(),
        payments: payments.clone(),
        bank_links: bank_links.clone(),
        uploads: Arc::new(UploadSigner::new(
            &config.gcs_bucket_name,
            &config.gcs_hmac_access_id,
            &config.gcs_hmac_secret,
        )),
        config: Arc::new(config),
    };
    TestContext {
        state,
        signups,
        payments,
        bank_links,
    }
}

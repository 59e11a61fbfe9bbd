//! Short-lived staging area for signups that have not finished onboarding.
//!
//! Each signup is a Redis hash under `signup:{email}`. Every write refreshes
//! the expiry, so an abandoned signup disappears a fixed time after its last
//! step.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde_json::{Map, Value};

use crate::errors::AppError;

pub const ONBOARDING_STEP: &str = "onboarding_step";

pub type SignupFields = HashMap<String, String>;

#[async_trait]
pub trait SignupStore: Send + Sync {
    /// Merges `fields` into the record for `email` and resets its expiry.
    async fn merge(
        &self,
        email: &str,
        fields: Vec<(String, String)>,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// Returns the staged fields, or `None` once the record expired.
    async fn fetch(&self, email: &str) -> Result<Option<SignupFields>, AppError>;

    async fn remove(&self, email: &str) -> Result<(), AppError>;
}

pub fn signup_key(email: &str) -> String {
    format!("signup:{}", email)
}

/// Flattens a JSON object into hash fields. Strings are kept verbatim, other
/// values are stored as JSON text, nulls are dropped.
pub fn object_to_fields(object: &Map<String, Value>) -> Vec<(String, String)> {
    object
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

/// `HSET` of the fields and `EXPIRE` of the key in one `MULTI`/`EXEC` block.
fn merge_pipeline(key: &str, fields: &[(String, String)], ttl: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    if !fields.is_empty() {
        pipe.hset_multiple(key, fields).ignore();
    }
    pipe.expire(key, ttl.as_secs() as i64).ignore();
    pipe
}

#[derive(Clone)]
pub struct RedisSignupStore {
    connection: ConnectionManager,
}

impl RedisSignupStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        log::info!("Connected to redis");
        Ok(Self { connection })
    }
}

#[async_trait]
impl SignupStore for RedisSignupStore {
    async fn merge(
        &self,
        email: &str,
        fields: Vec<(String, String)>,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        let pipe = merge_pipeline(&signup_key(email), &fields, ttl);
        let _: () = pipe.query_async(&mut conn).await?;
        log::debug!("Staged {} field(s) for {}", fields.len(), email);
        Ok(())
    }

    async fn fetch(&self, email: &str) -> Result<Option<SignupFields>, AppError> {
        let mut conn = self.connection.clone();
        let fields: SignupFields = conn.hgetall(signup_key(email)).await?;
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn remove(&self, email: &str) -> Result<(), AppError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(signup_key(email)).await?;
        Ok(())
    }
}

//! V4 signed POST policies for direct browser uploads to Cloud Storage.
//!
//! Signing uses an HMAC key pair (GOOG4-HMAC-SHA256), so no service account
//! private key is needed on the server.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "GOOG4-HMAC-SHA256";
const REGION: &str = "auto";
const SERVICE: &str = "storage";
const REQUEST_TYPE: &str = "goog4_request";

/// Largest document a browser may POST under one policy (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SignedPostPolicy {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

pub struct UploadSigner {
    bucket: String,
    access_id: String,
    secret: String,
}

impl UploadSigner {
    pub fn new(bucket: &str, access_id: &str, secret: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            access_id: access_id.to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Policy allowing a single POST of `object_name`, valid for `ttl` from `now`.
    pub fn post_policy(
        &self,
        object_name: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<SignedPostPolicy, AppError> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let expiration = (now + ttl).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let credential = format!(
            "{}/{}/{}/{}/{}",
            self.access_id, date_stamp, REGION, SERVICE, REQUEST_TYPE
        );

        let policy = json!({
            "conditions": [
                { "bucket": self.bucket },
                { "key": object_name },
                { "x-goog-date": timestamp },
                { "x-goog-credential": credential },
                { "x-goog-algorithm": ALGORITHM },
                ["content-length-range", 0, MAX_UPLOAD_BYTES],
            ],
            "expiration": expiration,
        });
        let encoded_policy = STANDARD.encode(serde_json::to_vec(&policy)?);
        let signature = self.sign(&date_stamp, &encoded_policy)?;

        let fields = BTreeMap::from([
            ("key".to_string(), object_name.to_string()),
            ("policy".to_string(), encoded_policy),
            ("x-goog-algorithm".to_string(), ALGORITHM.to_string()),
            ("x-goog-credential".to_string(), credential),
            ("x-goog-date".to_string(), timestamp),
            ("x-goog-signature".to_string(), signature),
        ]);

        Ok(SignedPostPolicy {
            url: format!("https://storage.googleapis.com/{}/", self.bucket),
            fields,
        })
    }

    fn sign(&self, date_stamp: &str, string_to_sign: &str) -> Result<String, AppError> {
        let mut key = format!("GOOG4{}", self.secret).into_bytes();
        for part in [date_stamp, REGION, SERVICE, REQUEST_TYPE] {
            key = hmac(&key, part.as_bytes())?;
        }
        Ok(hex::encode(hmac(&key, string_to_sign.as_bytes())?))
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Config(format!("Invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

//! Minimal S3-compatible client (MinIO) signed with AWS Signature V4.
//!
//! Only the three calls the publisher needs: bucket existence, bucket
//! creation and a single-part object upload.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::publisher::ObjectStore;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Covers the largest upload, 120 s of PCM, over a slow link.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct S3Store {
    client: Client,
    config: StorageConfig,
}

impl S3Store {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        Self::with_timeouts(config, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        config: StorageConfig,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}://{}{}", self.config.scheme(), self.config.endpoint, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, StorageError> {
        let signed = sign(
            &self.config,
            method.as_str(),
            path,
            "",
            &body,
            Utc::now(),
        )?;

        let mut request = self
            .client
            .request(method, self.url(path))
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.payload_hash)
            .header("authorization", signed.authorization);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        Ok(request.body(body).send().await?)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn ensure_bucket(&self) -> Result<(), StorageError> {
        let path = format!("/{}", uri_encode(&self.config.bucket));

        let head = self.send(Method::HEAD, &path, Vec::new(), None).await?;
        match head.status() {
            s if s.is_success() => {
                debug!("Bucket {} exists", self.config.bucket);
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(StorageError::Status {
                    operation: "HeadBucket",
                    status: status.as_u16(),
                    body: String::new(),
                })
            }
        }

        let created = self.send(Method::PUT, &path, Vec::new(), None).await?;
        let status = created.status();
        let body = created.text().await.unwrap_or_default();
        // A concurrent request may have created it first
        if status.is_success() || body.contains("BucketAlreadyOwnedByYou") {
            info!("Created bucket {}", self.config.bucket);
            return Ok(());
        }
        Err(StorageError::Status {
            operation: "CreateBucket",
            status: status.as_u16(),
            body,
        })
    }

    async fn put_object(
        &self,
        name: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = format!(
            "/{}/{}",
            uri_encode(&self.config.bucket),
            uri_encode(name)
        );

        let response = self
            .send(Method::PUT, &path, body, Some(content_type))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(StorageError::Status {
            operation: "PutObject",
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    fn locator(&self, name: &str) -> String {
        self.config.locator(name)
    }
}

/// Headers produced by signing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub payload_hash: String,
    pub authorization: String,
}

/// Sign a path-style request. `path` and `query` must already be URI-encoded,
/// with query parameters sorted by name.
pub fn sign(
    config: &StorageConfig,
    method: &str,
    path: &str,
    query: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedHeaders, StorageError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(body));

    let signed_header_names = "host;x-amz-content-sha256;x-amz-date";
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
        config.endpoint.trim(),
        payload_hash,
        amz_date
    );
    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_header_names}\n{payload_hash}"
    );

    let scope = format!("{}/{}/{}/aws4_request", date_stamp, config.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_date = hmac(format!("AWS4{}", config.secret_key).as_bytes(), &date_stamp)?;
    let k_region = hmac(&k_date, &config.region)?;
    let k_service = hmac(&k_region, SERVICE)?;
    let k_signing = hmac(&k_service, "aws4_request")?;
    let signature = hex::encode(hmac(&k_signing, &string_to_sign)?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, config.access_key, scope, signed_header_names, signature
    );

    Ok(SignedHeaders {
        amz_date,
        payload_hash,
        authorization,
    })
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, StorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encode one path segment per the SigV4 rules.
pub fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

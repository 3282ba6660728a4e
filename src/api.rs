// src/api.rs

//! NFVIS management API client
//!
//! This module provides:
//! - The `ManagementClient` trait the reconciler is constructed against
//! - `HttpManagementClient`, the production implementation over blocking
//!   reqwest with basic auth
//!
//! There is no retry logic here: a failed request is terminal for the
//! invocation, so the client surfaces the first failure as-is.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// NFVIS uses YANG-modelled JSON on its REST interface
const YANG_JSON: &str = "application/vnd.yang.data+json";

/// Authenticated request/response cycles against the management API
///
/// Implementations return decoded JSON on success. Response bodies that are
/// empty or not JSON decode to `Value::Null` — distinguishing "no content"
/// from "empty inventory" is the caller's concern, not the transport's.
pub trait ManagementClient {
    /// Issue a GET against `path` (relative to the API base)
    fn query(&self, path: &str) -> Result<Value>;

    /// Issue a mutating request against `path`
    fn mutate(&self, path: &str, method: Method, payload: Option<Value>) -> Result<Value>;
}

impl<M: ManagementClient + ?Sized> ManagementClient for &M {
    fn query(&self, path: &str) -> Result<Value> {
        (**self).query(path)
    }

    fn mutate(&self, path: &str, method: Method, payload: Option<Value>) -> Result<Value> {
        (**self).mutate(path, method, payload)
    }
}

/// Blocking HTTPS client for a single NFVIS host
pub struct HttpManagementClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl HttpManagementClient {
    /// Create a client for `https://{host}/api`
    ///
    /// `insecure` disables TLS certificate verification; NFVIS hosts commonly
    /// present self-signed certificates.
    pub fn new(
        host: &str,
        user: &str,
        password: &str,
        timeout: Duration,
        insecure: bool,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(YANG_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(YANG_JSON));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("https://{}/api", host),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, path: &str, method: Method, payload: Option<Value>) -> Result<Value> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.user, Some(&self.password));
        if let Some(payload) = payload {
            request = request.json(&payload);
        }

        let response = request
            .send()
            .map_err(|e| Error::Request(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::RemoteFailure {
                status: status.as_u16(),
                body,
            });
        }

        // NFVIS answers mutations with 201/204 and an empty body
        let body = response.text().unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

impl ManagementClient for HttpManagementClient {
    fn query(&self, path: &str) -> Result<Value> {
        self.send(path, Method::GET, None)
    }

    fn mutate(&self, path: &str, method: Method, payload: Option<Value>) -> Result<Value> {
        info!("{} {}", method, path);
        self.send(path, method, payload)
    }
}

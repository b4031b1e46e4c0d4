//! HTTP transport for the AEP management API
//!
//! One TLS client with certificate verification disabled: the API is only
//! reached over the bench LAN, and hardware fresh out of the box presents
//! a self-signed certificate. Requests are single-shot; the caller decides
//! what a failure means, nothing is retried here.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::CommissionError;

pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, CommissionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { inner: client })
    }

    pub async fn get_json(&self, description: &str, url: &str) -> Result<Value, CommissionError> {
        tracing::debug!("{}: GET {}", description, url);
        let resp = self.inner.get(url).send().await?.error_for_status()?;
        let body: Value = resp.json().await?;
        tracing::debug!("{} response: {}", description, body);
        Ok(body)
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        description: &str,
        url: &str,
        data: Option<&T>,
    ) -> Result<Value, CommissionError> {
        tracing::debug!("{}: POST {}", description, url);
        let mut req = self.inner.post(url);
        if let Some(data) = data {
            req = req.json(data);
        }
        let resp = req.send().await?.error_for_status()?;
        let body: Value = resp.json().await?;
        tracing::debug!("{} response: {}", description, body);
        Ok(body)
    }

    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        description: &str,
        url: &str,
        data: &T,
    ) -> Result<Value, CommissionError> {
        tracing::debug!("{}: PUT {}", description, url);
        let resp = self
            .inner
            .put(url)
            .json(data)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = resp.json().await?;
        tracing::debug!("{} response: {}", description, body);
        Ok(body)
    }
}

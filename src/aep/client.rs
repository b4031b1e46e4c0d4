//! Token-authenticated client for the AEP management API
//!
//! Owns the login/token lifecycle and the pre-/post-login URL distinction.
//! The token moves from `None` to `Some` exactly once per run and is never
//! cleared; the gateway itself holds all persistent state.

use async_trait::async_trait;
use serde_json::Value;

use super::ManagementApi;
use crate::error::CommissionError;
use crate::http::HttpClient;
use crate::models::{CommissioningAnswer, CommissioningState};

pub struct AepClient {
    http: HttpClient,
    base_url: String,
    username: String,
    password: String,
    token: Option<String>,
}

impl AepClient {
    pub fn new(http: HttpClient, address: &str, username: &str, password: &str) -> Self {
        Self::with_base_url(http, format!("https://{}/api/", address), username, password)
    }

    /// Talk to an explicit base URL instead of `https://<address>/api/`.
    /// The URL must end with a slash.
    pub fn with_base_url(
        http: HttpClient,
        base_url: String,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            http,
            base_url,
            username: username.to_string(),
            password: password.to_string(),
            token: None,
        }
    }

    fn url_no_token(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn url_with_token(&self, endpoint: &str) -> Result<String, CommissionError> {
        let token = self
            .token
            .as_deref()
            .ok_or(CommissionError::NotAuthenticated)?;
        Ok(format!("{}{}?token={}", self.base_url, endpoint, token))
    }

    /// Pull the payload out of the `{result: ...}` envelope.
    fn unwrap_result(mut body: Value) -> Result<Value, CommissionError> {
        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(CommissionError::Protocol(format!(
                "response missing result: {}",
                body
            ))),
        }
    }

    /// The commissioning endpoint is looser than the collections: a reply
    /// without the envelope (or with an unexpected shape) is an empty state,
    /// matching how the device behaves on the final confirmation round.
    fn commissioning_state(mut body: Value) -> CommissioningState {
        match body.get_mut("result") {
            Some(result) => serde_json::from_value(result.take()).unwrap_or_default(),
            None => CommissioningState::default(),
        }
    }
}

#[async_trait]
impl ManagementApi for AepClient {
    async fn login(&mut self) -> Result<(), CommissionError> {
        tracing::info!("log in");
        if self.token.is_some() {
            return Ok(());
        }

        let url = format!(
            "{}login?username={}&password={}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        );
        let body = self.http.get_json("logging in", &url).await?;

        match body.pointer("/result/token").and_then(Value::as_str) {
            Some(token) => {
                self.token = Some(token.to_string());
                Ok(())
            }
            None => {
                tracing::error!("login failed: {}", body);
                Err(CommissionError::Protocol(
                    "login response carried no token".into(),
                ))
            }
        }
    }

    async fn get_commissioning(&self) -> Result<CommissioningState, CommissionError> {
        tracing::info!("get commissioning info");
        if self.token.is_some() {
            tracing::error!("already logged in");
            return Err(CommissionError::AlreadyAuthenticated);
        }

        let url = self.url_no_token("commissioning");
        let body = self.http.get_json("fetch commissioning data", &url).await?;
        Ok(Self::commissioning_state(body))
    }

    async fn set_commissioning(
        &self,
        answer: &CommissioningAnswer,
    ) -> Result<CommissioningState, CommissionError> {
        tracing::info!("set commissioning info");
        if self.token.is_some() {
            tracing::error!("already logged in");
            return Err(CommissionError::AlreadyAuthenticated);
        }

        let url = self.url_no_token("commissioning");
        let body = self
            .http
            .post_json("set commissioning info", &url, Some(answer))
            .await?;
        Ok(Self::commissioning_state(body))
    }

    async fn get_collection(&self, name: &str) -> Result<Value, CommissionError> {
        let url = self.url_with_token(name)?;
        let body = self.http.get_json("get collection", &url).await?;
        Self::unwrap_result(body)
    }

    async fn set_collection(&self, name: &str, value: &Value) -> Result<Value, CommissionError> {
        let url = self.url_with_token(name)?;
        let body = self
            .http
            .put_json(&format!("set collection {}", name), &url, value)
            .await?;
        Self::unwrap_result(body)
    }

    async fn command(&self, name: &str, data: Option<&Value>) -> Result<Value, CommissionError> {
        let url = self.url_with_token(&format!("command/{}", name))?;
        self.http
            .post_json(&format!("do command {}", name), &url, data)
            .await
    }
}

//! Management API abstraction
//!
//! The commissioning sequence needs only a small slice of the AEP surface.
//! The trait keeps that slice mockable; `AepClient` is the one real
//! implementation.

pub mod client;

pub use client::AepClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CommissionError;
use crate::models::{CommissioningAnswer, CommissioningState};

/// Typed operations against the gateway's token-authenticated REST API.
///
/// `login` and the two commissioning operations are the only calls allowed
/// without a token; the commissioning operations are additionally the only
/// calls *forbidden* once a token exists.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Authenticate and store the session token. Idempotent: a held token
    /// short-circuits without touching the network.
    async fn login(&mut self) -> Result<(), CommissionError>;

    async fn get_commissioning(&self) -> Result<CommissioningState, CommissionError>;

    async fn set_commissioning(
        &self,
        answer: &CommissioningAnswer,
    ) -> Result<CommissioningState, CommissionError>;

    async fn get_collection(&self, name: &str) -> Result<Value, CommissionError>;

    async fn set_collection(&self, name: &str, value: &Value) -> Result<Value, CommissionError>;

    async fn command(&self, name: &str, data: Option<&Value>) -> Result<Value, CommissionError>;

    /// Discard uncommitted device configuration, back to the last save.
    async fn revert(&self) -> Result<Value, CommissionError> {
        tracing::info!("revert gateway state to saved");
        self.command("revert", None).await
    }

    async fn save(&self) -> Result<Value, CommissionError> {
        tracing::info!("save gateway state");
        self.command("save", None).await
    }

    async fn restart(&self) -> Result<Value, CommissionError> {
        tracing::info!("reboot gateway (this takes a while)");
        self.command("restart", None).await
    }

    async fn remote_access(&self) -> Result<Value, CommissionError> {
        tracing::info!("get remoteAccess collection");
        self.get_collection("remoteAccess").await
    }

    async fn set_remote_access(&self, value: &Value) -> Result<Value, CommissionError> {
        tracing::info!("set remoteAccess collection");
        self.set_collection("remoteAccess", value).await
    }

    async fn system(&self) -> Result<Value, CommissionError> {
        tracing::info!("get system collection");
        self.get_collection("system").await
    }
}

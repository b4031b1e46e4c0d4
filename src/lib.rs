//! Commissioning library for MultiTech Conduit AEP gateways
//!
//! Talks the gateway's token-based management API to set the admin
//! credentials and enable ssh, then stages a firmware image over ssh and
//! launches the upgrade. The binary in `main.rs` is a thin CLI over
//! [`provision::Provisioner`].

pub mod aep;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod provision;
pub mod shell;

//! Error taxonomy for the commissioning sequence
//!
//! Every client and shell operation returns one of these; the provisioner
//! branches on the value and the first failing phase aborts the run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommissionError {
    /// Network, TLS, HTTP-status, or body-decode failure talking to the
    /// management API.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The device answered, but not with what the protocol promises.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A pre-login commissioning endpoint was called while a token is held.
    /// The device path it would hit no longer exists at that point.
    #[error("commissioning endpoint called after login")]
    AlreadyAuthenticated,

    /// An authenticated endpoint was called before `login`.
    #[error("not logged in")]
    NotAuthenticated,

    /// Discovered product identity disagrees with the operator's expectation.
    #[error("product {kind} mismatch: expected {expected}, device reports {actual}")]
    IdentityMismatch {
        kind: &'static str,
        expected: String,
        actual: String,
    },

    /// The gateway did not come back over ssh within the reboot budget.
    #[error("ssh did not come back within {0:?}")]
    RebootTimeout(Duration),

    /// The firmware image to stage is not on the local filesystem.
    #[error("image file not found: {0}")]
    ImageNotFound(PathBuf),

    /// A remote command ran but exited nonzero.
    #[error("remote command failed: {0}")]
    CommandFailed(String),

    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

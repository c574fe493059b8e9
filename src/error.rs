//! Error types for the routecert controller

use thiserror::Error;

use crate::acme::{AcmeError, AuthorizationStatus};
use crate::cert::CertError;

/// Main error type for reconciliation operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// ACME protocol or account error
    #[error("acme error: {0}")]
    Acme(#[from] AcmeError),

    /// Certificate parsing, key generation, or CSR error
    #[error("certificate error: {0}")]
    Cert(#[from] CertError),

    /// The Route is in the waiting-for-authorization state but carries no
    /// authorization URL annotation
    #[error("route {key} has no pinned authorization url")]
    MissingAuthorizationUrl {
        /// Namespaced key of the Route
        key: String,
    },

    /// The CA reported an authorization status the driver cannot act on
    #[error("route {key}: authorization has transitioned to unexpected state {status}")]
    UnexpectedAuthorizationState {
        /// Namespaced key of the Route
        key: String,
        /// The status reported by the CA
        status: AuthorizationStatus,
    },

    /// A background task (key generation) failed to run to completion
    #[error("background task failed: {0}")]
    Task(String),
}

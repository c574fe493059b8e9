//! ACME protocol contracts
//!
//! The controller drives the ACME protocol through an injected client; the
//! account establishment and wire protocol live behind the [`AcmeClient`]
//! and [`AcmeClientFactory`] traits. This module holds the protocol-facing
//! types shared by the driver and the challenge exposers.

mod client;
pub mod exposer;

pub use client::{AcmeClient, AcmeClientFactory, IssuedCertificate};

#[cfg(test)]
pub use client::{MockAcmeClient, MockAcmeClientFactory};

use std::fmt;

use thiserror::Error;

/// Errors from ACME client calls and challenge exposure
#[derive(Debug, Error)]
pub enum AcmeError {
    /// The call did not complete within the configured deadline
    #[error("acme call timed out")]
    Timeout,

    /// The shared account could not be established or refreshed
    #[error("acme account error: {0}")]
    Account(String),

    /// The CA rejected a request or returned a malformed response
    #[error("acme protocol error: {0}")]
    Protocol(String),

    /// A challenge exposer failed to present or tear down a challenge
    #[error("challenge exposer error: {0}")]
    Exposer(String),
}

/// Status of an ACME authorization as reported by the CA.
///
/// The set is open: CAs may report states this controller does not know.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The CA is waiting for a challenge to be completed
    Pending,
    /// Proof of control succeeded
    Valid,
    /// Proof of control failed permanently
    Invalid,
    /// The authorization was revoked
    Revoked,
    /// The CA is still processing a completed challenge
    Processing,
    /// A status this controller does not recognize
    Unknown(String),
}

impl AuthorizationStatus {
    /// Parse the wire representation of an authorization status.
    pub fn parse(status: &str) -> Self {
        match status {
            "pending" => Self::Pending,
            "valid" => Self::Valid,
            "invalid" => Self::Invalid,
            "revoked" => Self::Revoked,
            "processing" => Self::Processing,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Valid => f.write_str("valid"),
            Self::Invalid => f.write_str("invalid"),
            Self::Revoked => f.write_str("revoked"),
            Self::Processing => f.write_str("processing"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

/// One challenge offered by the CA under an authorization.
#[derive(Clone, Debug, Default)]
pub struct Challenge {
    /// Challenge type, e.g. `http-01`
    pub type_: String,
    /// Token the CA expects to find at the well-known path
    pub token: String,
    /// Error detail the CA attached after a failed validation
    pub error: Option<String>,
}

/// An ACME authorization: a pending or completed proof of control for one
/// host, addressed by its URL.
#[derive(Clone, Debug)]
pub struct Authorization {
    /// Stable URL of the authorization object at the CA
    pub uri: String,
    /// Current status
    pub status: AuthorizationStatus,
    /// Challenges offered by the CA
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// Collect the error details the CA attached to failed challenges, for
    /// inclusion in user-visible events.
    pub fn error_summary(&self) -> String {
        let errors: Vec<&str> = self
            .challenges
            .iter()
            .filter_map(|c| c.error.as_deref())
            .collect();
        if errors.is_empty() {
            "no challenge errors reported".to_string()
        } else {
            errors.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_open_ended() {
        assert_eq!(AuthorizationStatus::parse("pending"), AuthorizationStatus::Pending);
        assert_eq!(AuthorizationStatus::parse("valid"), AuthorizationStatus::Valid);
        assert_eq!(
            AuthorizationStatus::parse("deactivated"),
            AuthorizationStatus::Unknown("deactivated".to_string())
        );
        assert_eq!(AuthorizationStatus::parse("deactivated").to_string(), "deactivated");
    }

    #[test]
    fn error_summary_joins_challenge_errors() {
        let authz = Authorization {
            uri: "https://ca.example/authz/1".to_string(),
            status: AuthorizationStatus::Invalid,
            challenges: vec![
                Challenge {
                    type_: "http-01".to_string(),
                    token: "tok".to_string(),
                    error: Some("connection refused".to_string()),
                },
                Challenge {
                    type_: "dns-01".to_string(),
                    token: "tok2".to_string(),
                    error: None,
                },
            ],
        };
        assert_eq!(authz.error_summary(), "connection refused");

        let clean = Authorization {
            uri: "https://ca.example/authz/2".to_string(),
            status: AuthorizationStatus::Pending,
            challenges: Vec::new(),
        };
        assert_eq!(clean.error_summary(), "no challenge errors reported");
    }
}

//! ACME client contracts
//!
//! The concrete client is injected at construction. It is shared between
//! all workers and pinned to one CA account; implementations must either be
//! safe for concurrent use or serialize internally.

use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::exposer::ExposerMap;
use super::{AcmeError, Authorization};

/// A certificate issued by the CA.
#[derive(Clone, Debug)]
pub struct IssuedCertificate {
    /// DER-encoded certificate chain, leaf first
    pub der_chain: Vec<Vec<u8>>,
    /// URL the certificate can be re-fetched from
    pub certificate_url: String,
}

/// Client for one ACME account at one CA.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Request a new authorization for `host`.
    async fn authorize(&self, host: &str) -> Result<Authorization, AcmeError>;

    /// Fetch an authorization by its URL.
    async fn get_authorization(&self, uri: &str) -> Result<Authorization, AcmeError>;

    /// Drive one of the authorization's challenges to completion using a
    /// matching exposer, then return the refreshed authorization.
    async fn accept_authorization(
        &self,
        authorization: &Authorization,
        host: &str,
        exposers: &ExposerMap,
    ) -> Result<Authorization, AcmeError>;

    /// Revoke a pending authorization so it does not count against CA
    /// rate limits.
    async fn revoke_authorization(&self, uri: &str) -> Result<(), AcmeError>;

    /// Submit a CSR and download the issued certificate chain.
    async fn create_certificate(&self, csr_der: &[u8]) -> Result<IssuedCertificate, AcmeError>;
}

/// Hands out the shared, account-pinned [`AcmeClient`].
///
/// Process-wide singleton by necessity: the account key is established once
/// at process start and reused for every Route.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AcmeClientFactory: Send + Sync {
    /// Get the shared client, establishing the account on first use.
    async fn client(&self) -> Result<Arc<dyn AcmeClient>, AcmeError>;
}

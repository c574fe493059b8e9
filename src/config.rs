//! Controller configuration
//!
//! All knobs are provided at construction time; nothing is read from the
//! environment by the library itself.

use std::time::Duration;

use crate::cert::RSA_KEY_BITS;
use crate::queue::{DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use crate::state::RenewalPolicy;

/// How often a key is retried after an error before it is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Deadline applied to every outbound ACME call.
pub const DEFAULT_ACME_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before re-checking an authorization the CA reported as pending.
pub const DEFAULT_PENDING_AUTHORIZATION_RETRY: Duration = Duration::from_secs(5);

/// Configuration of the Route controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Public IP of the HTTP-01 exposer endpoint that challenge traffic for
    /// managed hosts must reach.
    pub exposer_ip: String,

    /// Rate-limited retries granted to a key before it is dropped.
    pub max_retries: u32,

    /// Per-call deadline for outbound ACME requests.
    pub acme_timeout: Duration,

    /// Re-queue delay while an accepted authorization stays pending.
    pub pending_authorization_retry: Duration,

    /// RSA key size for issued certificates.
    pub rsa_key_bits: usize,

    /// Parameters of the randomized early-renewal decision.
    pub renewal: RenewalPolicy,

    /// Base delay of the per-key failure backoff.
    pub rate_limit_base_delay: Duration,

    /// Cap of the per-key failure backoff.
    pub rate_limit_max_delay: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            exposer_ip: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            acme_timeout: DEFAULT_ACME_TIMEOUT,
            pending_authorization_retry: DEFAULT_PENDING_AUTHORIZATION_RETRY,
            rsa_key_bits: RSA_KEY_BITS,
            renewal: RenewalPolicy::default(),
            rate_limit_base_delay: DEFAULT_BASE_DELAY,
            rate_limit_max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl ControllerConfig {
    /// Default configuration with the given exposer IP.
    pub fn new(exposer_ip: impl Into<String>) -> Self {
        Self {
            exposer_ip: exposer_ip.into(),
            ..Default::default()
        }
    }
}

//! routecert - automatic ACME TLS certificates for cluster Routes
//!
//! routecert watches Routes that opted into certificate management via
//! annotation, drives HTTP-01 challenges against an ACME certificate
//! authority, writes the issued certificate back into the Route's inline
//! TLS section, and renews it before expiry with randomized spreading so
//! that large cohorts do not stampede the CA.
//!
//! # Architecture
//!
//! The controller is level-triggered: every reconcile derives the Route's
//! ACME state from the observed object alone and acts on it. Nothing is
//! cached between reconciles.
//!
//! - [`route`] - the Route resource type, annotations, and helper predicates
//! - [`state`] - pure state classifier and the randomized renewal policy
//! - [`cert`] - PEM certificate parsing, hostname checks, key/CSR generation
//! - [`acme`] - ACME client contracts and the challenge exposer registry
//! - [`queue`] - rate-limited deduplicating workqueue with per-key serialization
//! - [`informer`] - watch-backed shared informer cache with tombstone delivery
//! - [`events`] - Kubernetes Event recording for domain events
//! - [`controller`] - the Route reconciliation engine tying it all together
//! - [`config`] - construction-time controller configuration
//! - [`error`] - error types

#![warn(missing_docs)]

pub mod acme;
pub mod cert;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod informer;
pub mod queue;
pub mod route;
pub mod state;

pub use error::Error;

/// Result type alias using the crate-wide [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

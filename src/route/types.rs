//! Route resource definition
//!
//! The Route type mirrors the `route.openshift.io/v1` API surface the
//! controller consumes: host, inline TLS configuration, and the per-ingress
//! admission conditions. Fields the controller never touches are omitted.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a Route
///
/// A Route binds an externally routable host name to a backend. The
/// controller only reads `host` and reads/writes the inline `tls` section.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    plural = "routes",
    status = "RouteStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Externally reachable host name of the Route
    #[serde(default)]
    pub host: String,

    /// Path that the router watches to route traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Inline TLS configuration; absent means the Route serves plain HTTP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Inline TLS configuration of a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Termination type of the TLS connection
    #[serde(default)]
    pub termination: TlsTermination,

    /// PEM-encoded private key
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    /// PEM-encoded leaf certificate (optionally followed by the chain)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate: String,

    /// PEM-encoded CA certificate of the chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,

    /// How insecure (plain HTTP) traffic is handled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<InsecureEdgeTerminationPolicy>,
}

/// Where the TLS connection is terminated
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsTermination {
    /// TLS is terminated at the router edge
    #[default]
    Edge,
    /// Encrypted traffic is passed through to the backend
    Passthrough,
    /// Traffic is re-encrypted between router and backend
    Reencrypt,
}

/// Policy for traffic arriving on the insecure (plain HTTP) port
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum InsecureEdgeTerminationPolicy {
    /// Refuse insecure connections
    None,
    /// Serve insecure connections as-is
    Allow,
    /// Redirect insecure connections to HTTPS
    Redirect,
}

/// Observed status of a Route, one entry per router that exposes it
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    /// Per-router ingress status
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<RouteIngress>,
}

/// Status of a Route as seen by one router
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    /// Host the router exposes the Route under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Name of the router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,

    /// Conditions observed by the router, notably `Admitted`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<RouteIngressCondition>,
}

/// A single condition asserted by a router about a Route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngressCondition {
    /// Condition type, e.g. `Admitted`
    #[serde(rename = "type")]
    pub type_: String,

    /// Condition status: `True`, `False`, or `Unknown`
    pub status: String,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

//! Route resource type and the annotation contract
//!
//! Annotations are the control-plane contract with users: a Route opts into
//! management by carrying the managed marker, can be paused, and while an
//! ACME authorization is in flight the controller pins its URL on the Route.

mod types;

pub use types::{
    InsecureEdgeTerminationPolicy, Route, RouteIngress, RouteIngressCondition, RouteSpec,
    RouteStatus, TlsConfig, TlsTermination,
};

use kube::ResourceExt;

/// Marker annotation; its presence opts the Route into certificate management.
pub const MANAGED_ANNOTATION: &str = "kubernetes.io/tls-acme";

/// When set to `"true"`, the controller observes the Route but does not
/// mutate it. Set automatically after a failed authorization.
pub const PAUSED_ANNOTATION: &str = "kubernetes.io/tls-acme-paused";

/// Holds the URL of the in-flight ACME authorization for this Route.
pub const AWAITING_AUTHORIZATION_URL_ANNOTATION: &str =
    "acme.routecert.io/awaiting-authorization-at-url";

/// Condition type a router asserts once the Route's host is routed to it.
pub const ADMITTED_CONDITION: &str = "Admitted";

/// Returns true if the Route carries the managed marker annotation.
pub fn is_managed(route: &Route) -> bool {
    route.annotations().contains_key(MANAGED_ANNOTATION)
}

/// Returns true if the Route is paused (annotation value exactly `"true"`).
pub fn is_paused(route: &Route) -> bool {
    route.annotations().get(PAUSED_ANNOTATION).map(String::as_str) == Some("true")
}

/// Returns true if at least one router admitted the Route.
///
/// Admission asserts that the host is actually routed to this endpoint; a
/// certificate must never be requested for a host we do not control.
pub fn is_admitted(route: &Route) -> bool {
    route.status.as_ref().is_some_and(|status| {
        status.ingress.iter().any(|ingress| {
            ingress
                .conditions
                .iter()
                .any(|c| c.type_ == ADMITTED_CONDITION && c.status == "True")
        })
    })
}

/// The URL of the in-flight authorization, if one is pinned on the Route.
pub fn awaiting_authorization_url(route: &Route) -> Option<&str> {
    route
        .annotations()
        .get(AWAITING_AUTHORIZATION_URL_ANNOTATION)
        .map(String::as_str)
}

/// Stable `namespace/name` key of a Route, used as the workqueue key.
pub fn route_key(route: &Route) -> String {
    match route.namespace() {
        Some(ns) => format!("{}/{}", ns, route.name_any()),
        None => route.name_any(),
    }
}

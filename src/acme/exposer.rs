//! Challenge exposers
//!
//! An exposer makes an HTTP-01 key authorization reachable at the target
//! host over plain HTTP until told to tear it down. Exposers are registered
//! by challenge type; before a challenge is accepted the `http-01` entry is
//! wrapped per Route so exposure is bound to that Route's host and the
//! configured public exposer IP.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::AcmeError;
use crate::route::Route;

/// Challenge type name for HTTP-01.
pub const HTTP01: &str = "http-01";

/// Registry of exposers keyed by challenge type name.
pub type ExposerMap = HashMap<String, Arc<dyn ChallengeExposer>>;

/// Makes a challenge response reachable at a host.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChallengeExposer: Send + Sync {
    /// Make `key_authorization` reachable at the well-known challenge path
    /// for `token` on `domain`, over plain HTTP.
    async fn expose(
        &self,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<(), AcmeError>;

    /// Tear down a previously exposed challenge.
    async fn remove(&self, domain: &str, token: &str) -> Result<(), AcmeError>;
}

/// Per-Route decorator around the `http-01` exposer.
///
/// Constructed fresh for every reconcile; binds exposure to the Route's
/// host and refuses challenges for any other domain, so a stale cache entry
/// can never publish a token under the wrong host.
pub struct RouteExposer {
    inner: Arc<dyn ChallengeExposer>,
    namespace: String,
    name: String,
    host: String,
    exposer_ip: String,
}

impl RouteExposer {
    /// Wrap `inner` for the given Route, exposing at `exposer_ip`.
    pub fn new(inner: Arc<dyn ChallengeExposer>, route: &Route, exposer_ip: &str) -> Self {
        Self {
            inner,
            namespace: route.namespace().unwrap_or_default(),
            name: route.name_any(),
            host: route.spec.host.clone(),
            exposer_ip: exposer_ip.to_string(),
        }
    }
}

#[async_trait]
impl ChallengeExposer for RouteExposer {
    async fn expose(
        &self,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<(), AcmeError> {
        if domain != self.host {
            return Err(AcmeError::Exposer(format!(
                "exposer for route {}/{} serves host {:?}, refusing challenge for {:?}",
                self.namespace, self.name, self.host, domain
            )));
        }

        debug!(
            namespace = %self.namespace,
            name = %self.name,
            %domain,
            exposer_ip = %self.exposer_ip,
            "exposing http-01 challenge"
        );
        self.inner.expose(domain, token, key_authorization).await
    }

    async fn remove(&self, domain: &str, token: &str) -> Result<(), AcmeError> {
        if domain != self.host {
            return Err(AcmeError::Exposer(format!(
                "exposer for route {}/{} serves host {:?}, refusing teardown for {:?}",
                self.namespace, self.name, self.host, domain
            )));
        }

        debug!(
            namespace = %self.namespace,
            name = %self.name,
            %domain,
            "removing http-01 challenge"
        );
        self.inner.remove(domain, token).await
    }
}

/// Build the per-Route exposer map: the `http-01` entry is wrapped in a
/// [`RouteExposer`], all other challenge types pass through untouched.
pub fn wrap_for_route(exposers: &ExposerMap, route: &Route, exposer_ip: &str) -> ExposerMap {
    exposers
        .iter()
        .map(|(challenge_type, exposer)| {
            let wrapped: Arc<dyn ChallengeExposer> = if challenge_type == HTTP01 {
                Arc::new(RouteExposer::new(exposer.clone(), route, exposer_ip))
            } else {
                exposer.clone()
            };
            (challenge_type.clone(), wrapped)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn test_route(host: &str) -> Route {
        let mut route = Route::new(
            "r",
            RouteSpec {
                host: host.to_string(),
                ..Default::default()
            },
        );
        route.metadata = ObjectMeta {
            name: Some("r".to_string()),
            namespace: Some("ns".to_string()),
            ..Default::default()
        };
        route
    }

    #[tokio::test]
    async fn wrapped_exposer_delegates_for_matching_host() {
        let mut inner = MockChallengeExposer::new();
        inner
            .expect_expose()
            .withf(|domain, token, key_auth| {
                domain == "example.com" && token == "tok" && key_auth == "tok.thumb"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        inner
            .expect_remove()
            .withf(|domain, token| domain == "example.com" && token == "tok")
            .times(1)
            .returning(|_, _| Ok(()));

        let route = test_route("example.com");
        let exposer = RouteExposer::new(Arc::new(inner), &route, "10.0.0.1");

        exposer.expose("example.com", "tok", "tok.thumb").await.unwrap();
        exposer.remove("example.com", "tok").await.unwrap();
    }

    #[tokio::test]
    async fn wrapped_exposer_refuses_foreign_host() {
        let inner = MockChallengeExposer::new();
        let route = test_route("example.com");
        let exposer = RouteExposer::new(Arc::new(inner), &route, "10.0.0.1");

        let err = exposer.expose("evil.com", "tok", "tok.thumb").await.unwrap_err();
        assert!(matches!(err, AcmeError::Exposer(_)));
    }

    #[test]
    fn wrap_replaces_only_http01() {
        let mut exposers: ExposerMap = HashMap::new();
        let http01: Arc<dyn ChallengeExposer> = Arc::new(MockChallengeExposer::new());
        let dns01: Arc<dyn ChallengeExposer> = Arc::new(MockChallengeExposer::new());
        exposers.insert(HTTP01.to_string(), http01);
        exposers.insert("dns-01".to_string(), dns01.clone());

        let route = test_route("example.com");
        let wrapped = wrap_for_route(&exposers, &route, "10.0.0.1");

        assert_eq!(wrapped.len(), 2);
        // dns-01 passes through by identity
        assert!(Arc::ptr_eq(&wrapped["dns-01"], &dns01));
        // http-01 was replaced by the decorator
        assert!(!Arc::ptr_eq(&wrapped[HTTP01], &exposers[HTTP01]));
    }
}

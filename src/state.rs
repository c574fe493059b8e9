//! ACME state classification and renewal scheduling
//!
//! The state is derived on every reconcile from the observed Route alone;
//! it is never persisted or cached. Renewal is randomized across the second
//! third of the certificate lifetime so cohorts issued at the same instant
//! do not hit the CA at the same instant again.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info};

use crate::cert::ParsedCertificate;
use crate::route::{self, Route};

/// The ACME lifecycle state of a Route, derived from its contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcmeState {
    /// No usable certificate for the current host
    NeedsCert,
    /// An authorization is pinned on the Route and must be driven forward
    WaitingForAuthz,
    /// A valid certificate covers the host and renewal is not yet due
    Ok,
}

/// Probabilistic early-renewal decision.
///
/// A certificate past half of its lifetime (but before the hard deadline at
/// one third remaining) is renewed with ~50% probability per reconcile: one
/// draw from a normal distribution, renew on the negative half. The
/// generator is seeded from the reconcile timestamp, so the decision is a
/// pure function of `now`.
#[derive(Clone, Copy, Debug)]
pub struct RenewalPolicy {
    /// Mean of the normal distribution
    pub mean: f64,
    /// Standard deviation of the normal distribution
    pub std_dev: f64,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std_dev: 1.0,
        }
    }
}

impl RenewalPolicy {
    /// Decide whether to renew early at time `now`.
    pub fn should_renew_early(&self, now: DateTime<Utc>) -> bool {
        let seed = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp()) as u64;
        let mut rng = StdRng::seed_from_u64(seed);
        let draw: f64 = rng.sample(StandardNormal);
        draw * self.std_dev + self.mean < 0.0
    }
}

/// Classify a Route's ACME state at time `now`.
///
/// Pure: the result depends only on the arguments. Rules in order:
///
/// 1. A pinned authorization URL forces `WaitingForAuthz`, regardless of
///    the TLS contents.
/// 2. No TLS section, an undecodable certificate, a certificate that does
///    not cover the host, or one outside its validity window all mean
///    `NeedsCert`.
/// 3. At one third of the lifetime remaining the renewal deadline is
///    reached: `NeedsCert`. Between one half and one third remaining the
///    [`RenewalPolicy`] decides. Otherwise `Ok`.
pub fn classify(now: DateTime<Utc>, route: &Route, policy: &RenewalPolicy) -> AcmeState {
    if route::awaiting_authorization_url(route).is_some() {
        return AcmeState::WaitingForAuthz;
    }

    let Some(tls) = route.spec.tls.as_ref() else {
        return AcmeState::NeedsCert;
    };

    let cert = match ParsedCertificate::from_pem(&tls.certificate) {
        Ok(cert) => cert,
        Err(err) => {
            debug!(key = %route::route_key(route), error = %err, "failed to decode certificate");
            return AcmeState::NeedsCert;
        }
    };

    if !cert.verify_hostname(&route.spec.host) {
        debug!(
            key = %route::route_key(route),
            host = %route.spec.host,
            "certificate does not cover host"
        );
        return AcmeState::NeedsCert;
    }

    if !cert.valid_at(now) {
        return AcmeState::NeedsCert;
    }

    let remaining = cert.not_after - now;
    let lifetime = cert.not_after - cert.not_before;

    if remaining <= lifetime / 3 {
        info!(
            key = %route::route_key(route),
            remaining = %remaining,
            "renewing certificate, renewal deadline reached"
        );
        return AcmeState::NeedsCert;
    }

    if remaining <= lifetime / 2 && policy.should_renew_early(now) {
        debug!(
            key = %route::route_key(route),
            remaining = %remaining,
            "renewing certificate in advance to spread the load"
        );
        return AcmeState::NeedsCert;
    }

    AcmeState::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::tests::make_cert_pem;
    use crate::route::{
        RouteSpec, TlsConfig, AWAITING_AUTHORIZATION_URL_ANNOTATION,
    };
    use chrono::{Duration, TimeZone};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    /// Policy with `std_dev = 0`: the draw equals `mean`, so renewal is
    /// deterministic (`mean < 0` renews, `mean >= 0` does not).
    const ALWAYS_RENEW: RenewalPolicy = RenewalPolicy {
        mean: -1.0,
        std_dev: 0.0,
    };
    const NEVER_RENEW: RenewalPolicy = RenewalPolicy {
        mean: 1.0,
        std_dev: 0.0,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn route_with_tls(host: &str, tls: Option<TlsConfig>) -> Route {
        let mut route = Route::new(
            "r",
            RouteSpec {
                host: host.to_string(),
                tls,
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

    fn route_with_cert(host: &str, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Route {
        route_with_cert_for_san(host, host, not_before, not_after)
    }

    fn route_with_cert_for_san(
        host: &str,
        san: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Route {
        route_with_tls(
            host,
            Some(TlsConfig {
                certificate: make_cert_pem(&[san], not_before, not_after),
                key: "unused".to_string(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn awaiting_annotation_wins_over_everything() {
        // Even a perfectly valid certificate does not matter while an
        // authorization is pinned.
        let mut route = route_with_cert("example.com", t0() - Duration::days(1), t0() + Duration::days(89));
        route
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(
                AWAITING_AUTHORIZATION_URL_ANNOTATION.to_string(),
                "https://ca.example/authz/1".to_string(),
            );
        assert_eq!(
            classify(t0(), &route, &RenewalPolicy::default()),
            AcmeState::WaitingForAuthz
        );
    }

    #[test]
    fn missing_tls_needs_cert() {
        let route = route_with_tls("example.com", None);
        assert_eq!(
            classify(t0(), &route, &RenewalPolicy::default()),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn undecodable_certificate_needs_cert() {
        let route = route_with_tls(
            "example.com",
            Some(TlsConfig {
                certificate: "garbage".to_string(),
                key: "garbage".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(
            classify(t0(), &route, &RenewalPolicy::default()),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn hostname_change_invalidates_certificate() {
        let route = route_with_cert_for_san(
            "new.example.com",
            "old.example.com",
            t0() - Duration::days(1),
            t0() + Duration::days(89),
        );
        assert_eq!(
            classify(t0(), &route, &NEVER_RENEW),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn fresh_certificate_is_ok() {
        let route = route_with_cert("example.com", t0() - Duration::days(1), t0() + Duration::days(89));
        assert_eq!(classify(t0(), &route, &ALWAYS_RENEW), AcmeState::Ok);
    }

    #[test]
    fn expired_at_not_after_exactly() {
        let not_after = t0();
        let route = route_with_cert("example.com", t0() - Duration::days(90), not_after);
        assert_eq!(
            classify(not_after, &route, &NEVER_RENEW),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn not_yet_valid_needs_cert() {
        let route = route_with_cert("example.com", t0() + Duration::days(1), t0() + Duration::days(90));
        assert_eq!(
            classify(t0(), &route, &NEVER_RENEW),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn renewal_deadline_is_inclusive_at_one_third() {
        // lifetime 30d, remaining exactly 10d = lifetime/3
        let route = route_with_cert("example.com", t0() - Duration::days(20), t0() + Duration::days(10));
        assert_eq!(
            classify(t0(), &route, &NEVER_RENEW),
            AcmeState::NeedsCert
        );
    }

    #[test]
    fn just_before_deadline_is_policy_territory() {
        // lifetime 30d, remaining 10d + 1h: inside (lifetime/3, lifetime/2]
        let route = route_with_cert(
            "example.com",
            t0() - Duration::days(20) + Duration::hours(1),
            t0() + Duration::days(10) + Duration::hours(1),
        );
        assert_eq!(classify(t0(), &route, &NEVER_RENEW), AcmeState::Ok);
        assert_eq!(classify(t0(), &route, &ALWAYS_RENEW), AcmeState::NeedsCert);
    }

    #[test]
    fn outside_renewal_window_ignores_policy() {
        // lifetime 30d, remaining 16d > lifetime/2
        let route = route_with_cert("example.com", t0() - Duration::days(14), t0() + Duration::days(16));
        assert_eq!(classify(t0(), &route, &ALWAYS_RENEW), AcmeState::Ok);
    }

    #[test]
    fn classification_is_deterministic_for_fixed_now() {
        let route = route_with_cert("example.com", t0() - Duration::days(18), t0() + Duration::days(12));
        let policy = RenewalPolicy::default();
        let first = classify(t0(), &route, &policy);
        for _ in 0..10 {
            assert_eq!(classify(t0(), &route, &policy), first);
        }
    }

    #[test]
    fn renewal_probability_is_about_half() {
        let policy = RenewalPolicy::default();
        let base = t0();
        let trials: i64 = 10_000;
        let renewals = (0..trials)
            .filter(|i| {
                let now = base + Duration::nanoseconds(i * 31 + 7);
                policy.should_renew_early(now)
            })
            .count();

        let fraction = renewals as f64 / trials as f64;
        assert!(
            (0.45..=0.55).contains(&fraction),
            "renewal fraction {fraction} outside [0.45, 0.55]"
        );
    }

    #[test]
    fn probabilistic_window_renews_about_half_the_time() {
        // lifetime 30d, remaining ~12d: inside the probabilistic window for
        // every sampled nanosecond offset.
        let route = route_with_cert("example.com", t0() - Duration::days(18), t0() + Duration::days(12));
        let policy = RenewalPolicy::default();
        let trials: i64 = 2_000;
        let renewals = (0..trials)
            .filter(|i| {
                let now = t0() + Duration::nanoseconds(i * 13 + 1);
                classify(now, &route, &policy) == AcmeState::NeedsCert
            })
            .count();

        let fraction = renewals as f64 / trials as f64;
        assert!(
            (0.4..=0.6).contains(&fraction),
            "renewal fraction {fraction} outside [0.4, 0.6]"
        );
    }
}

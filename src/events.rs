//! Kubernetes Event recording for domain events
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so the controller can emit Events visible via `kubectl describe route`.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate. A failed event must never break reconciliation.

use async_trait::async_trait;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::route::Route;

/// Severity of a domain event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSeverity {
    /// Informational, e.g. a certificate was provisioned
    Normal,
    /// Something requires user attention, e.g. a failed authorization
    Warning,
}

/// Publishes domain events on Routes.
///
/// Implementations are fire-and-forget: `event()` logs on failure but never
/// returns an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Publish an event on the given Route.
    async fn event(&self, route: &Route, severity: EventSeverity, reason: &str, message: &str);
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventRecorder {
    client: Client,
    reporter: Reporter,
}

impl KubeEventRecorder {
    /// Create a recorder reporting as `controller_name`.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self { client, reporter }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn event(&self, route: &Route, severity: EventSeverity, reason: &str, message: &str) {
        let type_ = match severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        let reference = route.object_ref(&());
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), reference);
        if let Err(err) = recorder.publish(event).await {
            warn!(reason, error = %err, "failed to publish event");
        }
    }
}

/// No-op implementation for tests and dry runs.
pub struct NoopEventRecorder;

#[async_trait]
impl EventRecorder for NoopEventRecorder {
    async fn event(&self, _route: &Route, _severity: EventSeverity, _reason: &str, _message: &str) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// A certificate was successfully provisioned onto the Route.
    pub const CERTIFICATE_PROVISIONED: &str = "AcmeCertificateProvisioned";
    /// The CA failed to validate control of the domain.
    pub const FAILED_AUTHORIZATION: &str = "AcmeFailedAuthorization";
    /// The CA revoked an authorization for the domain.
    pub const REVOKED_AUTHORIZATION: &str = "AcmeRevokedAuthorization";
}

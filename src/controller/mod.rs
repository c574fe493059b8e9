//! Controller implementations
//!
//! Contains the reconciliation engine for Routes: an event-driven workqueue
//! feeding a per-Route ACME state machine, level-triggered on the informer
//! cache.

mod route;

pub use route::{KubeRouteWriter, RouteController, RouteWriter, CONTROLLER_NAME};

use tracing::debug;
use uuid::Uuid;

use parley_types::models::Identity;

/// Where an outbound emission is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    User(Uuid),
    Room(Uuid),
    All,
}

/// Interceptor for the router's dispatch path: called for every inbound
/// client event and every outbound emission. The default implementation
/// traces; tests or operators can install their own.
pub trait DispatchHook: Send + Sync {
    fn on_event(&self, identity: &Identity, event: &str) {
        let _ = (identity, event);
    }

    fn on_emit(&self, target: EmitTarget, event: &str) {
        let _ = (target, event);
    }
}

/// Default hook: structured trace of every event in and out.
pub struct TracingHook;

impl DispatchHook for TracingHook {
    fn on_event(&self, identity: &Identity, event: &str) {
        debug!(
            user_id = %identity.user_id,
            username = %identity.username,
            event,
            "inbound event"
        );
    }

    fn on_emit(&self, target: EmitTarget, event: &str) {
        debug!(?target, event, "outbound event");
    }
}

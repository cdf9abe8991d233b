//! The session and room coordination layer: per-connection event loop,
//! dispatcher fan-out, and the handlers that tie presence, rooms and the
//! message ledger together.

pub mod connection;
pub mod dispatcher;
pub mod hook;
pub mod router;

pub use dispatcher::Dispatcher;
pub use hook::{DispatchHook, EmitTarget, TracingHook};
pub use router::{CoordinatorState, EventError, EventRouter};

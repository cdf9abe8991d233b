pub mod handlers;
pub mod middleware;
pub mod service;

pub use service::{AuthError, AuthService};

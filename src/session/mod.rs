// ============================================================================
// Session Management Module
// ============================================================================
//
// Holds the bearer token and signed-in account, mirrors them into client
// storage, and publishes auth status changes. A `LoginRequired` status is
// the signal for the presentation layer to route to its login entry point.
//
// ============================================================================

pub mod auth;
pub mod state;

pub use auth::{AuthService, LoginResponse, SignupRequest};
pub use state::{Account, AuthStatus, LoginReason, Session, SessionStore};

//! Odoo module
//!
//! Authenticated, retrying client for the Odoo `common` and `object` services

pub mod client;
pub mod error;
pub mod retry;
pub mod session;

pub use client::{OdooClient, SearchOptions};
pub use error::{AuthError, CallFailure, OdooError};
pub use retry::RetryPolicy;
pub use session::{Session, SessionState, SessionStore};

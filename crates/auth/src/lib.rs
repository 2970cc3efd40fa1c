//! `salesdesk-auth`: session and identity as seen by the sync client.
//!
//! Issuing, refreshing and revoking sessions belongs to the hosted auth
//! service. This crate only models what the client reads from a session to
//! scope its queries.

pub mod identity;
pub mod session;

pub use identity::{DatasetProfile, IdentityContext, TableSet};
pub use session::{AccessToken, Session, SessionError};

//! Client for the remote recipe service.
//!
//! [`SessionContext`] carries the login state explicitly; every
//! [`RemoteClient`] operation borrows it mutably so renewed cookies and tokens
//! end up back in the caller's hands for persisting.

pub mod client;
pub mod session;

pub use client::{Credentials, RemoteClient};
pub use session::SessionContext;

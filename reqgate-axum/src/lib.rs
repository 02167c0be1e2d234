//! Adaptations and integration for Axum.
//!
//! [`AxumRequest`] buffers an axum request so the binders and the key authentication gate can
//! read it, [`AxumResponse`] receives the gate's rejections. The [`key_auth`] middleware runs a
//! gate in front of a router and hands the accepted credential to handlers as [`ApiKey`].
#![warn(missing_docs)]

mod error;
pub use error::WebError;

mod middleware;
pub use middleware::{key_auth, ApiKey};

mod request;
pub use request::{AxumRequest, BODY_LIMIT};

mod response;
pub use response::AxumResponse;

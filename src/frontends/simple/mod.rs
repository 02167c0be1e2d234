//! A baseline implementation of [`WebRequest`] and [`WebResponse`].
//!
//! The types own all their data and are built with chained constructors. This is useful for
//! testing as well as for applications that parse requests themselves, for example behind a
//! custom transport.
//!
//! [`WebRequest`]: ../../endpoint/trait.WebRequest.html
//! [`WebResponse`]: ../../endpoint/trait.WebResponse.html
mod request;

pub use self::request::{Body, Error, Request, Response};

//! Fully implemented frontends.
//!
//! Frontends are glue adapters from other http server crates to the [`WebRequest`] and
//! [`WebResponse`] traits. This crate itself only carries the owning [`simple`] frontend, which
//! needs no server at all and is what the tests of this crate and of embedding applications use.
//! Server integrations live in their own crates, for example `reqgate-axum`.
//!
//! Writing a frontend
//! ------------------
//! A frontend buffers the request before the core sees it. Headers whose value is not valid
//! text are skipped, the query and an `application/x-www-form-urlencoded` body are parsed into
//! pairs keeping their order and repetitions, and a `multipart/form-data` body is parsed into a
//! [`MultipartForm`]. The rejection produced by the key authentication gate only needs a status,
//! headers and a text body, so a response type is usually a thin wrapper around the server's own.
//!
//! [`WebRequest`]: ../endpoint/trait.WebRequest.html
//! [`WebResponse`]: ../endpoint/trait.WebResponse.html
//! [`simple`]: simple/index.html
//! [`MultipartForm`]: ../primitives/values/struct.MultipartForm.html
pub mod simple;

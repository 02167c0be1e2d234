//! # reqgate
//!
//! Request binding and API key authentication for web servers, for use in combination with axum
//! or other front-ends, featuring pluggable extractors and body codecs.
//!
//! ## About
//!
//! `reqgate` covers two jobs that sit between a web server and the application handlers. The
//! [`binder`] populates application types from the parts of a request: the query, urlencoded and
//! multipart forms, headers, cookies, route placeholders, response headers and serialized
//! bodies. The [`keyauth`] gate pulls an opaque credential out of a request, lets the
//! application validate it and answers rejected requests with a standards compliant
//! `WWW-Authenticate` challenge.
//!
//! ## Binding
//!
//! Textual sources go through the [`schema`] decoder. A type describes its fields once by
//! implementing [`Record`], naming each field per source with an alias tag such as `query` or
//! `form`. Keys in bracket notation, `posts[0][title]`, address nested records and sequences.
//! Conversion failures, unknown keys and empty required fields are collected per field path
//! instead of aborting at the first one. Bodies in JSON, XML, CBOR or MessagePack are handed to
//! `serde` instead.
//!
//! ## Key authentication
//!
//! Choose where the credential is read from with one of the [`extractors`], or a chain of them,
//! supply a validator and build a [`KeyAuth`]. Configuration errors, like an unknown RFC 6750
//! error code, are reported when the gate is built.
//!
//! ## Custom Front-Ends
//!
//! Nothing here performs I/O. A front-end buffers the request and exposes it through
//! [`WebRequest`], and receives rejections through [`WebResponse`]. See [`frontends`] for the
//! owning implementation used in tests, and the `reqgate-axum` crate for axum.
//!
//! [`binder`]: binder/index.html
//! [`keyauth`]: keyauth/index.html
//! [`schema`]: schema/index.html
//! [`Record`]: schema/trait.Record.html
//! [`extractors`]: extractors/index.html
//! [`KeyAuth`]: keyauth/struct.KeyAuth.html
//! [`WebRequest`]: endpoint/trait.WebRequest.html
//! [`WebResponse`]: endpoint/trait.WebResponse.html
//! [`frontends`]: frontends/index.html
pub mod binder;
pub mod endpoint;
pub mod extractors;
pub mod frontends;
pub mod keyauth;
pub mod primitives;
pub mod schema;

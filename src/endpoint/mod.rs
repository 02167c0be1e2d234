//! Polymorphic HTTP wrappers for binding and key authentication.
//!
//! Neither the binders nor the key authentication gate depend on a particular web server library.
//! Everything they need from a request is expressed through [`WebRequest`], and everything they
//! produce through [`WebResponse`]. The frontends, which are the bindings to particular server
//! libraries, implement these traits or reuse the owning types of [`frontends::simple`].
//!
//! Custom frontend
//! ---------------
//! A custom frontend buffers the request body and parses the url query, the urlencoded and
//! multipart bodies and the cookies before handing the request to the core. The core itself never
//! performs I/O and never suspends, so asynchronous servers drive it from their own handlers.
//!
//! [`WebRequest`]: trait.WebRequest.html
//! [`WebResponse`]: trait.WebResponse.html
//! [`frontends::simple`]: ../frontends/simple/index.html
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use log::warn;

use crate::primitives::values::MultipartForm;

/// An iterator over key value pairs, borrowed from the request where possible.
pub type Pairs<'a> = Box<dyn Iterator<Item = (Cow<'a, str>, Cow<'a, str>)> + 'a>;

/// Abstraction of web requests with several different abstractions and constructors needed by
/// the binders and the gate.
///
/// Repeated keys are yielded once per occurrence, in the order the client sent them.
pub trait WebRequest: Context {
    /// The error generated from access of malformed or invalid requests.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The corresponding type of Responses returned from this module.
    type Response: WebResponse<Error = Self::Error>;

    /// All request headers.
    ///
    /// Header values that are not valid text should be skipped rather than failing the request.
    fn headers(&self) -> Pairs<'_>;

    /// The first value of a header, with the name compared case-insensitively.
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Retrieve the parsed url query.
    fn query(&self) -> Pairs<'_>;

    /// The first value of a query parameter.
    fn query_value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.query().find(|(name, _)| name == key).map(|(_, value)| value)
    }

    /// Retrieve the parsed `application/x-www-form-urlencoded` body of the request.
    ///
    /// Requests with a different content type yield no pairs.
    fn urlbody(&self) -> Pairs<'_>;

    /// Retrieve the parsed `multipart/form-data` body.
    ///
    /// An Err value indicates a malformed body or a different Content-Type.
    fn multipart(&self) -> Result<&MultipartForm, Self::Error>;

    /// The first value of a form field, from either the urlencoded or the multipart body.
    fn form_value(&self, key: &str) -> Option<Cow<'_, str>> {
        let urlencoded = self
            .urlbody()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value);

        urlencoded.or_else(|| {
            self.multipart()
                .ok()
                .and_then(|form| form.value.first(key))
                .map(|value| Cow::Borrowed(value.as_str()))
        })
    }

    /// All request cookies.
    fn cookies(&self) -> Pairs<'_>;

    /// The value of a cookie.
    fn cookie(&self, name: &str) -> Option<Cow<'_, str>> {
        self.cookies().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// The value of a route parameter as resolved by the router.
    fn param(&self, name: &str) -> Option<Cow<'_, str>>;

    /// The raw `Content-Type` header.
    fn content_type(&self) -> Option<Cow<'_, str>> {
        self.header("content-type")
    }

    /// The buffered request body.
    fn body(&self) -> &[u8];
}

/// Response representation into which the gate writes its rejections.
///
/// Responses are also a binding source: their headers can be decoded like request headers.
pub trait WebResponse {
    /// The error generated when trying to construct an unhandled or invalid response.
    type Error;

    /// The status code currently set.
    fn status(&self) -> u16;

    /// Replace the status code.
    fn set_status(&mut self, status: u16) -> Result<(), Self::Error>;

    /// All response headers.
    fn headers(&self) -> Pairs<'_>;

    /// Set a header, replacing all previous values of the same name.
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Self::Error>;

    /// A pure text response, with media type `text/plain`.
    fn body_text(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Access to the request-local storage.
///
/// Every [`WebRequest`] is a context. The storage itself is one as well, so helpers reading it
/// accept either.
pub trait Context {
    fn locals(&self) -> &Locals;

    fn locals_mut(&mut self) -> &mut Locals;
}

/// Request-scoped values, at most one per type.
#[derive(Default)]
pub struct Locals {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

/// Borrow a list of owned pairs.
pub fn borrowed_pairs(list: &[(String, String)]) -> Pairs<'_> {
    Box::new(
        list.iter()
            .map(|(key, value)| (Cow::Borrowed(key.as_str()), Cow::Borrowed(value.as_str()))),
    )
}

/// A source without any pairs.
pub fn no_pairs<'a>() -> Pairs<'a> {
    Box::new(std::iter::empty())
}

/// Split the value of a `Cookie` header into name value pairs.
///
/// Quotes around a value are removed, pairs without `=` are skipped.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((name, value)) => {
                let value = value.trim().trim_matches('"');
                Some((name.trim().to_owned(), value.to_owned()))
            }
            None => {
                warn!("ignoring malformed cookie {:?}", pair);
                None
            }
        })
        .collect()
}

impl Locals {
    pub fn new() -> Self {
        Locals::default()
    }

    /// Store a value, returning the one it replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Context for Locals {
    fn locals(&self) -> &Locals {
        self
    }

    fn locals_mut(&mut self) -> &mut Locals {
        self
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Locals").field("len", &self.values.len()).finish()
    }
}

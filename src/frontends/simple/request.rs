//! Simple, owning request and response types.
use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;
use url::form_urlencoded;

use crate::endpoint::{borrowed_pairs, parse_cookie_header, Context, Locals, Pairs, WebRequest, WebResponse};
use crate::primitives::values::MultipartForm;

const URLENCODED: &str = "application/x-www-form-urlencoded";

/// Open and simple implementation of `WebRequest`.
#[derive(Debug, Default)]
pub struct Request {
    /// Header names and values, in arrival order.
    pub headers: Vec<(String, String)>,

    /// The key-value pairs in the url query component.
    pub query: Vec<(String, String)>,

    /// The key-value pairs of a `x-www-form-urlencoded` body.
    pub urlbody: Vec<(String, String)>,

    /// A parsed `multipart/form-data` body.
    pub multipart: Option<MultipartForm>,

    pub cookies: Vec<(String, String)>,

    /// Route parameters, as a router would resolve them.
    pub params: HashMap<String, String>,

    /// The raw body.
    pub body: Bytes,

    pub locals: Locals,
}

/// Open and simple implementation of `WebResponse`.
#[derive(Clone, Debug)]
pub struct Response {
    /// HTTP status code, `200` unless changed.
    pub status: u16,

    /// Header names and values.
    pub headers: Vec<(String, String)>,

    pub body: Option<Body>,
}

/// Models the necessary body contents.
///
/// A content type header is set along with each variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// A pure text body, `text/plain`.
    Text(String),
}

/// Errors of the simple frontend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The request carries no multipart body.
    #[error("request has no multipart/form-data body")]
    NotMultipart,

    /// A status code outside of `100..=999`.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),
}

impl Request {
    pub fn new() -> Self {
        Request::default()
    }

    /// Append a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Append the pairs of an urlencoded query string.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query.extend(parse_urlencoded(query));
        self
    }

    /// Use an urlencoded form as the body, setting the content type.
    pub fn with_urlbody(mut self, body: &str) -> Self {
        self.urlbody.extend(parse_urlencoded(body));
        self.body = Bytes::copy_from_slice(body.as_bytes());
        self.set_content_type(URLENCODED);
        self
    }

    /// Set a route parameter.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Append a `Cookie` header and the cookies it holds.
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        self.cookies.extend(parse_cookie_header(header));
        self.headers.push(("Cookie".to_owned(), header.to_owned()));
        self
    }

    /// Use an already parsed multipart form as the body, setting the content type.
    pub fn with_multipart(mut self, form: MultipartForm) -> Self {
        self.multipart = Some(form);
        self.set_content_type("multipart/form-data; boundary=reqgate");
        self
    }

    /// Use raw bytes as the body.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.set_content_type(content_type);
        self
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        self.headers
            .push(("Content-Type".to_owned(), content_type.to_owned()));
    }
}

fn parse_urlencoded(input: &str) -> impl Iterator<Item = (String, String)> + '_ {
    form_urlencoded::parse(input.as_bytes()).into_owned()
}

impl Response {
    /// The first value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The text body, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Some(Body::Text(text)) => Some(text),
            None => None,
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Response {
            status: 200,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl Context for Request {
    fn locals(&self) -> &Locals {
        &self.locals
    }

    fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }
}

impl WebRequest for Request {
    type Error = Error;
    type Response = Response;

    fn headers(&self) -> Pairs<'_> {
        borrowed_pairs(&self.headers)
    }

    fn query(&self) -> Pairs<'_> {
        borrowed_pairs(&self.query)
    }

    fn urlbody(&self) -> Pairs<'_> {
        borrowed_pairs(&self.urlbody)
    }

    fn multipart(&self) -> Result<&MultipartForm, Self::Error> {
        self.multipart.as_ref().ok_or(Error::NotMultipart)
    }

    fn cookies(&self) -> Pairs<'_> {
        borrowed_pairs(&self.cookies)
    }

    fn param(&self, name: &str) -> Option<Cow<'_, str>> {
        self.params.get(name).map(|value| Cow::Borrowed(value.as_str()))
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

impl WebResponse for Response {
    type Error = Error;

    fn status(&self) -> u16 {
        self.status
    }

    fn set_status(&mut self, status: u16) -> Result<(), Self::Error> {
        if !(100..=999).contains(&status) {
            return Err(Error::InvalidStatus(status));
        }
        self.status = status;
        Ok(())
    }

    fn headers(&self) -> Pairs<'_> {
        borrowed_pairs(&self.headers)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Self::Error> {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.to_owned()));
        Ok(())
    }

    fn body_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.body = Some(Body::Text(text.to_owned()));
        self.set_header("Content-Type", "text/plain; charset=utf-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keeps_repetitions() {
        let request = Request::new().with_query("a=1&b=x%20y&a=2");
        let pairs: Vec<_> = request.query().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(
            pairs,
            [("a".to_owned(), "1".to_owned()), ("b".into(), "x y".into()), ("a".into(), "2".into())]
        );
        assert_eq!(request.query_value("a").as_deref(), Some("1"));
    }

    #[test]
    fn cookies_from_header() {
        let request = Request::new().with_cookie_header("session=abc; theme=\"dark\"; broken");
        assert_eq!(request.cookie("session").as_deref(), Some("abc"));
        assert_eq!(request.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(request.cookies().count(), 2);
        assert!(request.header("cookie").is_some());
    }

    #[test]
    fn urlbody_sets_content_type() {
        let request = Request::new().with_urlbody("name=john");
        assert_eq!(request.content_type().as_deref(), Some(URLENCODED));
        assert_eq!(request.form_value("name").as_deref(), Some("john"));
        assert_eq!(request.body(), b"name=john");
        assert_eq!(request.multipart().unwrap_err(), Error::NotMultipart);
    }

    #[test]
    fn form_value_falls_back_to_multipart() {
        let mut form = MultipartForm::new();
        form.push_value("name", "eric");
        let request = Request::new().with_multipart(form);
        assert_eq!(request.form_value("name").as_deref(), Some("eric"));
    }

    #[test]
    fn response_headers_replace() {
        let mut response = Response::default();
        response.set_header("X-Key", "a").unwrap();
        response.set_header("x-key", "b").unwrap();
        assert_eq!(response.headers().count(), 1);
        assert_eq!(response.header("X-KEY"), Some("b"));

        assert_eq!(response.set_status(42), Err(Error::InvalidStatus(42)));
        response.body_text("hello").unwrap();
        assert_eq!(response.text(), Some("hello"));
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
    }
}

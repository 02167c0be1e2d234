//! Credential extraction from the locations a client may present it in.
//!
//! An [`Extractor`] is a pure function from a request to the credential, annotated with where
//! it looks. The annotations let the gate build a matching challenge: every extractor reading an
//! `Authorization` style header contributes its scheme.
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::endpoint::WebRequest;
use crate::schema::BoxError;

/// Where an extractor reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Header,
    AuthHeader,
    Form,
    Query,
    Param,
    Cookie,
    Custom,
}

/// Failure of an extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Nothing usable was found.
    #[error("missing or malformed API Key")]
    MissingOrMalformedApiKey,

    /// A custom extractor failed on its own terms.
    #[error(transparent)]
    Custom(BoxError),
}

type ExtractFn<R> = dyn Fn(&R) -> Result<String, ExtractError> + Send + Sync;

/// A credential source.
pub struct Extractor<R> {
    extract: Arc<ExtractFn<R>>,
    key: String,
    auth_scheme: String,
    source: Source,
    chain: Vec<Extractor<R>>,
}

impl<R> Extractor<R> {
    fn new<F>(source: Source, key: &str, auth_scheme: &str, extract: F) -> Self
    where
        F: Fn(&R) -> Result<String, ExtractError> + Send + Sync + 'static,
    {
        Extractor {
            extract: Arc::new(extract),
            key: key.to_owned(),
            auth_scheme: auth_scheme.to_owned(),
            source,
            chain: Vec::new(),
        }
    }

    /// Run the extraction.
    pub fn extract(&self, request: &R) -> Result<String, ExtractError> {
        (self.extract)(request)
    }

    /// The header, cookie, parameter or field name read.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The authorization scheme, empty unless reading an `Authorization` style header.
    pub fn auth_scheme(&self) -> &str {
        &self.auth_scheme
    }

    pub fn source(&self) -> Source {
        self.source
    }

    /// The extractors of a chain, in evaluation order.
    pub fn chain(&self) -> &[Extractor<R>] {
        &self.chain
    }

    /// Every scheme of an `Authorization` style header this extractor may read, depth first.
    pub fn auth_schemes(&self) -> Vec<String> {
        let mut schemes = Vec::new();
        self.collect_schemes(&mut schemes);
        schemes
    }

    fn collect_schemes(&self, schemes: &mut Vec<String>) {
        if self.source == Source::AuthHeader && !self.auth_scheme.is_empty() {
            schemes.push(self.auth_scheme.clone());
        }

        for link in &self.chain {
            link.collect_schemes(schemes);
        }
    }
}

impl<R> Clone for Extractor<R> {
    fn clone(&self) -> Self {
        Extractor {
            extract: Arc::clone(&self.extract),
            key: self.key.clone(),
            auth_scheme: self.auth_scheme.clone(),
            source: self.source,
            chain: self.chain.clone(),
        }
    }
}

impl<R> fmt::Debug for Extractor<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("source", &self.source)
            .field("key", &self.key)
            .field("auth_scheme", &self.auth_scheme)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Read the credential from an `Authorization` style header.
///
/// With a scheme the header must be the scheme, one or more spaces and a token68 value. Without
/// a scheme the whole trimmed header is the credential.
pub fn from_auth_header<R: WebRequest + 'static>(header: &str, scheme: &str) -> Extractor<R> {
    let name = header.to_owned();
    let expected = scheme.to_owned();
    Extractor::new(Source::AuthHeader, header, scheme, move |request: &R| {
        let value = request
            .header(&name)
            .ok_or(ExtractError::MissingOrMalformedApiKey)?;

        match parse_auth_header(&value, &expected) {
            Some(token) => Ok(token.to_owned()),
            None => {
                debug!("keyauth: malformed {} header", name);
                Err(ExtractError::MissingOrMalformedApiKey)
            }
        }
    })
}

/// Read the credential verbatim from a header.
pub fn from_header<R: WebRequest + 'static>(header: &str) -> Extractor<R> {
    let name = header.to_owned();
    Extractor::new(Source::Header, header, "", move |request: &R| non_empty(request.header(&name)))
}

pub fn from_cookie<R: WebRequest + 'static>(cookie: &str) -> Extractor<R> {
    let name = cookie.to_owned();
    Extractor::new(Source::Cookie, cookie, "", move |request: &R| non_empty(request.cookie(&name)))
}

/// Read the credential from a route parameter.
pub fn from_param<R: WebRequest + 'static>(param: &str) -> Extractor<R> {
    let name = param.to_owned();
    Extractor::new(Source::Param, param, "", move |request: &R| non_empty(request.param(&name)))
}

pub fn from_query<R: WebRequest + 'static>(param: &str) -> Extractor<R> {
    let name = param.to_owned();
    Extractor::new(Source::Query, param, "", move |request: &R| non_empty(request.query_value(&name)))
}

/// Read the credential from a urlencoded or multipart form field.
pub fn from_form<R: WebRequest + 'static>(field: &str) -> Extractor<R> {
    let name = field.to_owned();
    Extractor::new(Source::Form, field, "", move |request: &R| non_empty(request.form_value(&name)))
}

/// Wrap an application defined extraction.
pub fn from_custom<R, F>(key: &str, extract: F) -> Extractor<R>
where
    R: WebRequest + 'static,
    F: Fn(&R) -> Result<String, ExtractError> + Send + Sync + 'static,
{
    Extractor::new(Source::Custom, key, "", extract)
}

/// Try extractors left to right.
///
/// The first non-empty credential wins. Otherwise the last error is reported, and an empty
/// chain always fails. The chain reports the source and key of its first extractor.
pub fn chain<R: WebRequest + 'static>(extractors: Vec<Extractor<R>>) -> Extractor<R> {
    let (source, key) = match extractors.first() {
        Some(first) => (first.source, first.key.clone()),
        None => (Source::Custom, String::new()),
    };

    let links = extractors.clone();
    let mut chained = Extractor::new(source, &key, "", move |request: &R| {
        let mut last_error = None;
        for link in &links {
            match link.extract(request) {
                Ok(credential) if !credential.is_empty() => return Ok(credential),
                Ok(_) => {}
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or(ExtractError::MissingOrMalformedApiKey))
    });

    chained.chain = extractors;
    chained
}

fn non_empty(value: Option<Cow<'_, str>>) -> Result<String, ExtractError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.into_owned()),
        _ => Err(ExtractError::MissingOrMalformedApiKey),
    }
}

/// Split `<scheme> <token68>` and validate the token.
pub(crate) fn parse_auth_header<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let value = value.trim_matches([' ', '\t']);
    if value.is_empty() {
        return None;
    }

    if scheme.is_empty() {
        return Some(value);
    }

    let prefix = value.get(..scheme.len())?;
    if !prefix.eq_ignore_ascii_case(scheme) {
        return None;
    }

    let rest = &value[scheme.len()..];
    if !rest.starts_with(' ') {
        return None;
    }

    let token = rest.trim_start_matches(' ');
    if is_token68(token) {
        Some(token)
    } else {
        None
    }
}

/// `[A-Za-z0-9-._~+/]+=*`
fn is_token68(token: &str) -> bool {
    let body = token.trim_end_matches('=');
    !body.is_empty()
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'+' | b'/'))
}

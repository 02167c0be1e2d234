use std::fmt;
use std::sync::Arc;

use url::Url;

use super::challenge::ErrorCode;
use super::error::{ConfigError, KeyAuthError};
use super::Next;
use crate::endpoint::WebRequest;
use crate::extractors::Extractor;
use crate::schema::BoxError;

/// The realm announced when none is configured.
pub const DEFAULT_REALM: &str = "Restricted";

/// Decides whether a request bypasses the gate.
pub type Skip<R> = dyn Fn(&R) -> bool + Send + Sync;

/// Checks an extracted credential.
pub type Validator<R> = dyn Fn(&R, &str) -> Result<bool, BoxError> + Send + Sync;

/// Runs after a credential was accepted.
pub type SuccessHandler<R> = dyn for<'n> Fn(
        &mut R,
        Next<'n, R>,
    ) -> Result<<R as WebRequest>::Response, <R as WebRequest>::Error>
    + Send
    + Sync;

/// Builds the response of a rejected request.
pub type ErrorHandler<R> = dyn Fn(
        &mut R,
        KeyAuthError,
    ) -> Result<<R as WebRequest>::Response, <R as WebRequest>::Error>
    + Send
    + Sync;

/// Settings of a [`KeyAuth`] gate.
///
/// Only the validator is mandatory. The challenge parameters `error`, `error_description`,
/// `error_uri` and `scope` follow RFC 6750 and are checked when the gate is built.
///
/// [`KeyAuth`]: struct.KeyAuth.html
pub struct Config<R: WebRequest> {
    /// Requests for which this returns true pass without inspection.
    pub next: Option<Arc<Skip<R>>>,

    /// Replaces the default of running the downstream handler.
    pub success_handler: Option<Arc<SuccessHandler<R>>>,

    /// Replaces the default 401 response.
    pub error_handler: Option<Arc<ErrorHandler<R>>>,

    pub validator: Option<Arc<Validator<R>>>,

    pub realm: String,

    /// Defaults to a `Bearer` token in the `Authorization` header.
    pub extractor: Option<Extractor<R>>,

    /// Sent verbatim when the extractor reads no authorization scheme.
    pub challenge: String,

    pub error: String,

    pub error_description: String,

    pub error_uri: String,

    /// Space separated scope tokens, only for `insufficient_scope`.
    pub scope: String,
}

impl<R: WebRequest> Config<R> {
    pub fn new() -> Self {
        Config::default()
    }

    /// Skip the gate for matching requests.
    pub fn next<F>(mut self, skip: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(skip));
        self
    }

    pub fn success_handler<F>(mut self, handler: F) -> Self
    where
        F: for<'n> Fn(&mut R, Next<'n, R>) -> Result<R::Response, R::Error> + Send + Sync + 'static,
    {
        self.success_handler = Some(Arc::new(handler));
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut R, KeyAuthError) -> Result<R::Response, R::Error> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&R, &str) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn realm(mut self, realm: &str) -> Self {
        self.realm = realm.to_owned();
        self
    }

    pub fn extractor(mut self, extractor: Extractor<R>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn challenge(mut self, challenge: &str) -> Self {
        self.challenge = challenge.to_owned();
        self
    }

    pub fn error(mut self, error: &str) -> Self {
        self.error = error.to_owned();
        self
    }

    pub fn error_description(mut self, description: &str) -> Self {
        self.error_description = description.to_owned();
        self
    }

    pub fn error_uri(mut self, uri: &str) -> Self {
        self.error_uri = uri.to_owned();
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_owned();
        self
    }

    /// Check the challenge parameters and return the error code they announce.
    pub(crate) fn validate(&self) -> Result<Option<ErrorCode>, ConfigError> {
        if self.validator.is_none() {
            return Err(ConfigError::MissingValidator);
        }

        let error = if self.error.is_empty() {
            None
        } else {
            match ErrorCode::parse(&self.error) {
                Some(code) => Some(code),
                None => return Err(ConfigError::UnsupportedError(self.error.clone())),
            }
        };

        if error.is_none() {
            if !self.error_description.is_empty() {
                return Err(ConfigError::DescriptionWithoutError);
            }
            if !self.error_uri.is_empty() {
                return Err(ConfigError::UriWithoutError);
            }
        }

        if !self.error_uri.is_empty() {
            if let Err(err) = Url::parse(&self.error_uri) {
                return Err(ConfigError::InvalidErrorUri(format!("{}: {}", self.error_uri, err)));
            }
        }

        if error == Some(ErrorCode::InsufficientScope) {
            if self.scope.trim().is_empty() {
                return Err(ConfigError::MissingScope);
            }
            for token in self.scope.split(' ') {
                if !is_scope_token(token) {
                    return Err(ConfigError::InvalidScopeToken(token.to_owned()));
                }
            }
        } else if !self.scope.is_empty() {
            return Err(ConfigError::ScopeWithoutInsufficientScope);
        }

        Ok(error)
    }
}

/// A `scope-token` of RFC 6749, section 3.3.
fn is_scope_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|byte| (0x21..=0x7e).contains(&byte) && byte != b'"' && byte != b'\\')
}

impl<R: WebRequest> Default for Config<R> {
    fn default() -> Self {
        Config {
            next: None,
            success_handler: None,
            error_handler: None,
            validator: None,
            realm: DEFAULT_REALM.to_owned(),
            extractor: None,
            challenge: String::new(),
            error: String::new(),
            error_description: String::new(),
            error_uri: String::new(),
            scope: String::new(),
        }
    }
}

impl<R: WebRequest> Clone for Config<R> {
    fn clone(&self) -> Self {
        Config {
            next: self.next.clone(),
            success_handler: self.success_handler.clone(),
            error_handler: self.error_handler.clone(),
            validator: self.validator.clone(),
            realm: self.realm.clone(),
            extractor: self.extractor.clone(),
            challenge: self.challenge.clone(),
            error: self.error.clone(),
            error_description: self.error_description.clone(),
            error_uri: self.error_uri.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<R: WebRequest> fmt::Debug for Config<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("next", &self.next.is_some())
            .field("success_handler", &self.success_handler.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .field("validator", &self.validator.is_some())
            .field("realm", &self.realm)
            .field("extractor", &self.extractor)
            .field("challenge", &self.challenge)
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .field("error_uri", &self.error_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

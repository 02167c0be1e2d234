//! A request gate authenticating clients by an opaque API key.
//!
//! The gate pulls a credential out of the request with an [`Extractor`], asks the configured
//! validator about it and either stores it in the request locals before running the downstream
//! handler, or answers with a rejection. Rejections with status `401` carry a
//! `WWW-Authenticate` challenge, those with status `407` a `Proxy-Authenticate` one. The
//! challenge lists every authorization scheme the extractor reads and, for `Bearer`, the error
//! parameters of RFC 6750.
//!
//! ```
//! # use reqgate::endpoint::WebResponse;
//! # use reqgate::frontends::simple::{Request, Response};
//! # use reqgate::keyauth::{Config, KeyAuth, Next, token_from_context};
//! # use reqgate::extractors::from_header;
//! let gate = KeyAuth::new(Config::new()
//!     .extractor(from_header("X-Api-Key"))
//!     .validator(|_: &Request, key: &str| Ok(key == "SECRET")))
//!     .unwrap();
//!
//! let mut request = Request::new().with_header("X-Api-Key", "SECRET");
//! let response = gate.handle(&mut request, Next::new(|request: &mut Request| {
//!     let mut response = Response::default();
//!     response.body_text(token_from_context(request))?;
//!     Ok(response)
//! })).unwrap();
//! assert_eq!(response.status, 200);
//! ```
//!
//! [`Extractor`]: ../extractors/struct.Extractor.html
mod challenge;
mod config;
mod error;

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::endpoint::{Context, WebRequest, WebResponse};
use crate::extractors::{from_auth_header, Extractor};
use crate::primitives::pool::Pool;

use self::challenge::{Challenge, ChallengeBuffer};

pub use self::challenge::ErrorCode;
pub use self::config::{Config, ErrorHandler, Skip, SuccessHandler, Validator, DEFAULT_REALM};
pub use self::error::{ConfigError, KeyAuthError};

/// Idle challenge buffers kept per gate.
const BUFFER_POOL_CAPACITY: usize = 32;

/// Body of the default rejection of a missing or refused credential.
pub const MISSING_OR_INVALID: &str = "missing or invalid API Key";

/// Body of the default rejection of a failing validator or extractor.
pub const INVALID_OR_EXPIRED: &str = "Invalid or expired API Key";

/// The continuation of an accepted request.
pub struct Next<'n, R: WebRequest> {
    run: Box<dyn FnOnce(&mut R) -> Result<R::Response, R::Error> + 'n>,
}

/// The api key gate.
pub struct KeyAuth<R: WebRequest> {
    skip: Option<Arc<Skip<R>>>,
    success_handler: Option<Arc<SuccessHandler<R>>>,
    error_handler: Option<Arc<ErrorHandler<R>>>,
    validator: Arc<Validator<R>>,
    extractor: Extractor<R>,
    challenge: Challenge,
    buffers: Arc<Pool<ChallengeBuffer>>,
}

/// The validated credential, stored in the request locals.
struct Token(String);

impl<'n, R: WebRequest> Next<'n, R> {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce(&mut R) -> Result<R::Response, R::Error> + 'n,
    {
        Next { run: Box::new(run) }
    }

    /// Run the downstream handler.
    pub fn run(self, request: &mut R) -> Result<R::Response, R::Error> {
        (self.run)(request)
    }
}

impl<R: WebRequest + 'static> KeyAuth<R> {
    /// Build a gate, checking the configuration.
    pub fn new(config: Config<R>) -> Result<Self, ConfigError> {
        let error = config.validate()?;
        let validator = config.validator.ok_or(ConfigError::MissingValidator)?;

        let extractor = config
            .extractor
            .unwrap_or_else(|| from_auth_header("Authorization", "Bearer"));

        let realm = if config.realm.is_empty() {
            DEFAULT_REALM.to_owned()
        } else {
            config.realm
        };

        let challenge = Challenge {
            realm,
            schemes: extractor.auth_schemes(),
            explicit: config.challenge,
            error,
            description: config.error_description,
            uri: config.error_uri,
            scope: config.scope,
        };

        debug!(
            "keyauth: gate on {:?} {:?} announcing schemes {:?}",
            extractor.source(),
            extractor.key(),
            challenge.schemes
        );

        Ok(KeyAuth {
            skip: config.next,
            success_handler: config.success_handler,
            error_handler: config.error_handler,
            validator,
            extractor,
            challenge,
            buffers: Arc::new(Pool::new(BUFFER_POOL_CAPACITY, ChallengeBuffer::new)),
        })
    }

    /// Whether the request passes without inspection.
    pub fn skip(&self, request: &R) -> bool {
        self.skip.as_ref().map_or(false, |skip| skip(request))
    }

    /// Extract and validate the credential, storing it in the request locals on success.
    pub fn authenticate(&self, request: &mut R) -> Result<(), KeyAuthError> {
        let token = match self.extractor.extract(request) {
            Ok(token) => token,
            Err(err) => {
                debug!("keyauth: no credential from {:?}: {}", self.extractor.source(), err);
                return Err(err.into());
            }
        };

        match (self.validator)(&*request, &token) {
            Ok(true) => {
                request.locals_mut().insert(Token(token));
                Ok(())
            }
            Ok(false) => {
                debug!("keyauth: credential refused");
                Err(KeyAuthError::MissingOrMalformedApiKey)
            }
            Err(err) => {
                debug!("keyauth: validator failed: {}", err);
                Err(KeyAuthError::Validator(err))
            }
        }
    }

    /// The header name and value of the challenge for a response status, if any.
    pub fn challenge_for(&self, status: u16) -> Option<(&'static str, String)> {
        let header = match status {
            401 => "WWW-Authenticate",
            407 => "Proxy-Authenticate",
            _ => return None,
        };

        let mut buffer = self.buffers.get();
        self.challenge.render(&mut buffer.0);
        Some((header, String::from_utf8_lossy(&buffer.0).into_owned()))
    }

    /// Add the challenge matching the status of the response.
    pub fn add_challenge(&self, response: &mut R::Response) -> Result<(), R::Error> {
        match self.challenge_for(response.status()) {
            Some((header, value)) => response.set_header(header, &value),
            None => Ok(()),
        }
    }

    /// Answer a request that failed authentication.
    pub fn reject(&self, request: &mut R, err: KeyAuthError) -> Result<R::Response, R::Error>
    where
        R::Response: Default,
    {
        let mut response = match &self.error_handler {
            Some(handler) => handler(request, err)?,
            None => default_rejection::<R>(err)?,
        };

        self.add_challenge(&mut response)?;
        Ok(response)
    }

    /// Run the whole gate around a downstream handler.
    pub fn handle(&self, request: &mut R, next: Next<'_, R>) -> Result<R::Response, R::Error>
    where
        R::Response: Default,
    {
        if self.skip(request) {
            return next.run(request);
        }

        match self.authenticate(request) {
            Ok(()) => match &self.success_handler {
                Some(handler) => handler(request, next),
                None => next.run(request),
            },
            Err(err) => self.reject(request, err),
        }
    }
}

fn default_rejection<R: WebRequest>(err: KeyAuthError) -> Result<R::Response, R::Error>
where
    R::Response: Default,
{
    let mut response = R::Response::default();
    response.set_status(401)?;
    match err {
        KeyAuthError::MissingOrMalformedApiKey => response.body_text(MISSING_OR_INVALID)?,
        _ => response.body_text(INVALID_OR_EXPIRED)?,
    }
    Ok(response)
}

/// The credential accepted for this request, or `""` when the gate did not run or was skipped.
pub fn token_from_context<C: Context + ?Sized>(context: &C) -> &str {
    context
        .locals()
        .get::<Token>()
        .map_or("", |token| token.0.as_str())
}

impl<R: WebRequest> fmt::Debug for KeyAuth<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyAuth")
            .field("extractor", &self.extractor)
            .field("challenge", &self.challenge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Locals;
    use crate::extractors::{from_custom, from_header, ExtractError};
    use crate::frontends::simple::{Request, Response};

    fn ok(_: &mut Request) -> Result<Response, crate::frontends::simple::Error> {
        let mut response = Response::default();
        response.body_text("ok")?;
        Ok(response)
    }

    fn secret_gate() -> KeyAuth<Request> {
        KeyAuth::new(
            Config::new()
                .extractor(from_header("X-Api-Key"))
                .validator(|_: &Request, key: &str| Ok(key == "SECRET")),
        )
        .unwrap()
    }

    #[test]
    fn token_is_stored() {
        let gate = secret_gate();
        let mut request = Request::new().with_header("X-Api-Key", "SECRET");
        assert_eq!(token_from_context(&request), "");

        gate.authenticate(&mut request).unwrap();
        assert_eq!(token_from_context(&request), "SECRET");
        assert_eq!(token_from_context(request.locals()), "SECRET");
        assert_eq!(token_from_context(&Locals::new()), "");
    }

    #[test]
    fn refused_credentials() {
        let gate = secret_gate();
        let mut request = Request::new().with_header("X-Api-Key", "nope");
        assert!(matches!(
            gate.authenticate(&mut request),
            Err(KeyAuthError::MissingOrMalformedApiKey)
        ));
        assert_eq!(token_from_context(&request), "");
    }

    #[test]
    fn validator_errors_get_their_own_body() {
        let gate = KeyAuth::new(
            Config::new()
                .extractor(from_header("X-Api-Key"))
                .validator(|_: &Request, _: &str| Err("database down".into())),
        )
        .unwrap();

        let mut request = Request::new().with_header("X-Api-Key", "key");
        let response = gate.handle(&mut request, Next::new(ok)).unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.text(), Some(INVALID_OR_EXPIRED));
    }

    #[test]
    fn custom_extractor_errors_are_kept() {
        let extractor = from_custom("signature", |_: &Request| {
            Err(ExtractError::Custom("bad signature".into()))
        });
        let gate = KeyAuth::new(
            Config::new()
                .extractor(extractor)
                .validator(|_: &Request, _: &str| Ok(true)),
        )
        .unwrap();

        let mut request = Request::new();
        match gate.authenticate(&mut request) {
            Err(KeyAuthError::Extractor(err)) => assert_eq!(err.to_string(), "bad signature"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn skipped_requests_are_not_inspected() {
        let gate = KeyAuth::new(
            Config::new()
                .next(|request: &Request| request.param("public").is_some())
                .validator(|_: &Request, _: &str| -> Result<bool, _> {
                    panic!("validator must not run")
                }),
        )
        .unwrap();

        let mut request = Request::new().with_param("public", "1");
        let response = gate.handle(&mut request, Next::new(ok)).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(token_from_context(&request), "");
    }

    #[test]
    fn success_handler_wraps_downstream() {
        let gate = KeyAuth::new(
            Config::new()
                .extractor(from_header("X-Api-Key"))
                .validator(|_: &Request, _: &str| Ok(true))
                .success_handler(|request: &mut Request, next: Next<'_, Request>| {
                    let mut response = next.run(request)?;
                    response.set_header("X-Authenticated", "yes")?;
                    Ok(response)
                }),
        )
        .unwrap();

        let mut request = Request::new().with_header("X-Api-Key", "any");
        let response = gate.handle(&mut request, Next::new(ok)).unwrap();
        assert_eq!(response.header("x-authenticated"), Some("yes"));
    }

    #[test]
    fn challenge_only_for_401_and_407() {
        let gate = secret_gate();
        assert_eq!(
            gate.challenge_for(401),
            Some(("WWW-Authenticate", r#"ApiKey realm="Restricted""#.to_owned()))
        );
        assert_eq!(
            gate.challenge_for(407),
            Some(("Proxy-Authenticate", r#"ApiKey realm="Restricted""#.to_owned()))
        );
        assert_eq!(gate.challenge_for(403), None);
        assert_eq!(gate.challenge_for(200), None);
    }

    #[test]
    fn buffers_return_to_the_pool() {
        let gate = secret_gate();
        gate.challenge_for(401);
        gate.challenge_for(401);
        assert_eq!(gate.buffers.idle(), 1);
    }

    #[test]
    fn default_extractor_is_bearer() {
        let gate = KeyAuth::new(Config::new().validator(|_: &Request, _: &str| Ok(false))).unwrap();
        assert_eq!(
            gate.challenge_for(401).unwrap().1,
            r#"Bearer realm="Restricted""#
        );
    }

    #[test]
    fn invalid_configuration_is_returned() {
        let err = KeyAuth::new(
            Config::new()
                .validator(|_: &Request, _: &str| Ok(true))
                .error("insufficient_scope"),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingScope);
    }
}

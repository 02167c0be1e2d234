use thiserror::Error;

use crate::extractors::ExtractError;
use crate::schema::BoxError;

/// Why a request was rejected.
#[derive(Debug, Error)]
pub enum KeyAuthError {
    /// No credential, a malformed one, or one the validator refused.
    #[error("missing or invalid API Key")]
    MissingOrMalformedApiKey,

    /// A custom extractor failed.
    #[error(transparent)]
    Extractor(BoxError),

    /// The validator failed.
    #[error(transparent)]
    Validator(BoxError),
}

/// Misuse detected when building the gate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("keyauth: a validator function is required")]
    MissingValidator,

    #[error("keyauth: unsupported error code {0:?}, expected invalid_request, invalid_token or insufficient_scope")]
    UnsupportedError(String),

    #[error("keyauth: an error description requires an error code")]
    DescriptionWithoutError,

    #[error("keyauth: an error uri requires an error code")]
    UriWithoutError,

    #[error("keyauth: the error uri must be absolute: {0}")]
    InvalidErrorUri(String),

    #[error("keyauth: insufficient_scope requires a scope")]
    MissingScope,

    #[error("keyauth: invalid scope token {0:?}")]
    InvalidScopeToken(String),

    #[error("keyauth: a scope requires the insufficient_scope error")]
    ScopeWithoutInsufficientScope,
}

impl From<ExtractError> for KeyAuthError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::MissingOrMalformedApiKey => KeyAuthError::MissingOrMalformedApiKey,
            ExtractError::Custom(err) => KeyAuthError::Extractor(err),
        }
    }
}

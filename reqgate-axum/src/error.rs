use axum::{
    http::{
        header::{InvalidHeaderName, InvalidHeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
    BoxError,
};
use reqgate::binder::BindError;
use thiserror::Error;

/// The error type for reqgate operations in axum.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request body could not be read.
    #[error("could not read the request body: {0}")]
    Body(#[source] axum::Error),

    /// The multipart body could not be parsed.
    #[error("malformed multipart body: {0}")]
    Multipart(#[source] BoxError),

    /// A multipart body was requested but the request carries none.
    #[error("request is not multipart/form-data")]
    NotMultipart,

    /// A status code outside of `100..=999`.
    #[error("invalid status code {0}")]
    Status(u16),

    /// Couldn't set a header value.
    #[error("couldn't set header, {0}")]
    Header(#[from] InvalidHeaderValue),

    /// Couldn't set a header with this name.
    #[error("couldn't set header, {0}")]
    HeaderName(#[from] InvalidHeaderName),

    /// The request passed no key authentication gate.
    #[error("request was not authenticated")]
    Unauthenticated,

    /// Binding the request failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match self {
            WebError::Unauthenticated => StatusCode::UNAUTHORIZED,
            WebError::Bind(_) | WebError::Multipart(_) | WebError::NotMultipart => StatusCode::BAD_REQUEST,
            WebError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

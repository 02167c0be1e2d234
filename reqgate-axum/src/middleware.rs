use std::sync::Arc;

use axum::{
    async_trait,
    body::{self, Body},
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::debug;
use reqgate::keyauth::{self, token_from_context, KeyAuth};

use crate::{AxumRequest, AxumResponse, WebError, BODY_LIMIT};

/// The credential accepted by [`key_auth`], available to handlers behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey(pub String);

/// Run a key authentication gate in front of the downstream service.
///
/// Use with `axum::middleware::from_fn_with_state`. Rejections are answered by the gate,
/// accepted requests reach the downstream service with the credential stored as [`ApiKey`].
///
/// A configured success handler may answer the request itself. When it continues, the handler
/// sees a placeholder response with status 200 and no body, and the downstream service only runs
/// once the handler returned. What the handler did to the placeholder is then laid over the real
/// response: its headers replace downstream headers of the same name, a status other than 200
/// replaces the downstream status and a body replaces the downstream body.
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use reqgate::extractors::from_header;
/// use reqgate::keyauth::{Config, KeyAuth};
/// use reqgate_axum::{key_auth, ApiKey, AxumRequest};
///
/// let gate = KeyAuth::new(Config::new()
///     .extractor(from_header("X-Api-Key"))
///     .validator(|_: &AxumRequest, key: &str| Ok(key == "SECRET")))
///     .unwrap();
///
/// let app: Router = Router::new()
///     .route("/", get(|ApiKey(key): ApiKey| async move { key }))
///     .layer(middleware::from_fn_with_state(Arc::new(gate), key_auth));
/// ```
pub async fn key_auth(State(gate): State<Arc<KeyAuth<AxumRequest>>>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let body = match body::to_bytes(body, BODY_LIMIT).await {
        Ok(body) => body,
        Err(err) => return WebError::Body(err).into_response(),
    };

    let mut wrapped = match AxumRequest::from_parts(&mut parts, body.clone()).await {
        Ok(wrapped) => wrapped,
        Err(err) => return err.into_response(),
    };

    let mut forward = false;
    let answer = gate.handle(
        &mut wrapped,
        keyauth::Next::new(|_: &mut AxumRequest| {
            forward = true;
            Ok(AxumResponse::default())
        }),
    );

    let placeholder = match answer {
        Ok(response) if forward => response,
        Ok(response) => return response.into_response(),
        Err(err) => return err.into_response(),
    };

    let token = token_from_context(&wrapped);
    if !token.is_empty() {
        parts.extensions.insert(ApiKey(token.to_owned()));
    } else {
        debug!("keyauth: forwarding request that skipped the gate");
    }

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;
    overlay(placeholder, response)
}

fn overlay(placeholder: AxumResponse, mut response: Response) -> Response {
    let (status, headers, body) = placeholder.into_parts();
    if status != StatusCode::OK {
        *response.status_mut() = status;
    }

    response.headers_mut().extend(headers);
    if let Some(body) = body {
        *response.body_mut() = Body::from(body);
    }

    response
}

#[async_trait]
impl<S> FromRequestParts<S> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKey>()
            .cloned()
            .ok_or(WebError::Unauthenticated)
    }
}

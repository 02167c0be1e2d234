use axum::{
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        StatusCode,
    },
    response::{IntoResponse, Response},
};
use reqgate::endpoint::{Pairs, WebResponse};
use std::borrow::Cow;

use crate::WebError;

#[derive(Default, Clone, Debug)]
/// Type implementing `WebResponse` and `IntoResponse` for use in route handlers
pub struct AxumResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
}

impl AxumResponse {
    /// The status code of the response
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// The headers of the response
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set the body for the response
    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_owned());
        self
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Option<String>) {
        (self.status, self.headers, self.body)
    }
}

impl WebResponse for AxumResponse {
    type Error = WebError;

    fn status(&self) -> u16 {
        self.status.as_u16()
    }

    fn set_status(&mut self, status: u16) -> Result<(), Self::Error> {
        self.status = StatusCode::from_u16(status).map_err(|_| WebError::Status(status))?;
        Ok(())
    }

    fn headers(&self) -> Pairs<'_> {
        Box::new(self.headers.iter().filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((Cow::Borrowed(name.as_str()), Cow::Borrowed(value)))
        }))
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Self::Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    fn body_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.body = Some(text.to_owned());
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Ok(())
    }
}

impl IntoResponse for AxumResponse {
    fn into_response(self) -> Response {
        let body = self.body.unwrap_or_default();
        (self.status, self.headers, body).into_response()
    }
}

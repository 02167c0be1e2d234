use std::borrow::Cow;
use std::collections::HashMap;

use axum::{
    async_trait,
    body::{self, Body, Bytes},
    extract::{FromRequest, FromRequestParts, Multipart, RawPathParams, Request},
    http::{header, request::Parts},
};
use log::warn;
use reqgate::endpoint::{borrowed_pairs, no_pairs, parse_cookie_header, Context, Locals, Pairs, WebRequest};
use reqgate::primitives::values::{FileHeader, MultipartForm};
use url::form_urlencoded;

use crate::{AxumResponse, WebError};

/// Largest body buffered, matching axum's default limit.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Default)]
/// Type implementing `WebRequest` as well as `FromRequest` for use in route handlers
///
/// This type consumes the body of the Request upon extraction, so be careful not to use it in
/// places you also expect an application payload
pub struct AxumRequest {
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    urlbody: Vec<(String, String)>,
    multipart: Option<MultipartForm>,
    cookies: Vec<(String, String)>,
    params: HashMap<String, String>,
    body: Bytes,
    locals: Locals,
}

impl AxumRequest {
    /// Buffer a request from its parts and already collected body.
    ///
    /// Multipart bodies are parsed as well, which is the only reason this is async.
    pub async fn from_parts(parts: &mut Parts, body: Bytes) -> Result<Self, WebError> {
        let mut headers = Vec::with_capacity(parts.headers.len());
        let mut cookies = Vec::new();
        for (name, value) in &parts.headers {
            let value = match value.to_str() {
                Ok(value) => value,
                Err(_) => {
                    warn!("skipping header {} with a non-text value", name);
                    continue;
                }
            };
            if name == header::COOKIE {
                cookies.extend(parse_cookie_header(value));
            }
            headers.push((name.as_str().to_owned(), value.to_owned()));
        }

        let query = parts
            .uri
            .query()
            .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let params = match RawPathParams::from_request_parts(parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect(),
            Err(_) => HashMap::new(),
        };

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let essence = content_type.split(';').next().unwrap_or_default().trim();

        let mut urlbody = Vec::new();
        let mut multipart = None;
        if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            urlbody = form_urlencoded::parse(&body).into_owned().collect();
        } else if essence.eq_ignore_ascii_case("multipart/form-data") {
            multipart = Some(read_multipart(&content_type, body.clone()).await?);
        }

        Ok(AxumRequest {
            headers,
            query,
            urlbody,
            multipart,
            cookies,
            params,
            body,
            locals: Locals::new(),
        })
    }
}

async fn read_multipart(content_type: &str, body: Bytes) -> Result<MultipartForm, WebError> {
    let request = Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|err| WebError::Multipart(err.into()))?;

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| WebError::Multipart(err.into()))?;

    let mut form = MultipartForm::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| WebError::Multipart(err.into()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match field.file_name().map(str::to_owned) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_owned);
                let headers = field
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
                    .collect();
                let content = field
                    .bytes()
                    .await
                    .map_err(|err| WebError::Multipart(err.into()))?;

                form.push_file(
                    &name,
                    FileHeader {
                        filename,
                        content_type,
                        headers,
                        content,
                    },
                );
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| WebError::Multipart(err.into()))?;
                form.push_value(&name, text);
            }
        }
    }

    Ok(form)
}

impl Context for AxumRequest {
    fn locals(&self) -> &Locals {
        &self.locals
    }

    fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }
}

impl WebRequest for AxumRequest {
    type Error = WebError;
    type Response = AxumResponse;

    fn headers(&self) -> Pairs<'_> {
        borrowed_pairs(&self.headers)
    }

    fn query(&self) -> Pairs<'_> {
        borrowed_pairs(&self.query)
    }

    fn urlbody(&self) -> Pairs<'_> {
        if self.urlbody.is_empty() {
            return no_pairs();
        }
        borrowed_pairs(&self.urlbody)
    }

    fn multipart(&self) -> Result<&MultipartForm, Self::Error> {
        self.multipart.as_ref().ok_or(WebError::NotMultipart)
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

#[async_trait]
impl<S> FromRequest<S> for AxumRequest
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let body = body::to_bytes(body, BODY_LIMIT).await.map_err(WebError::Body)?;
        AxumRequest::from_parts(&mut parts, body).await
    }
}

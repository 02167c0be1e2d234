use std::any::Any;

use log::debug;
use serde::de::DeserializeOwned;

use super::form::media_type;
#[cfg(feature = "cbor")]
use super::CborBinding;
#[cfg(feature = "json")]
use super::JsonBinding;
#[cfg(feature = "msgpack")]
use super::MsgPackBinding;
#[cfg(feature = "xml")]
use super::XmlBinding;
use super::{
    BindError, CookieBinding, FormBinding, HeaderBinding, QueryBinding, RespHeaderBinding, UriBinding,
};
use crate::endpoint::{WebRequest, WebResponse};
use crate::schema::{BoxError, Decode, Registry};

/// An application defined binder for additional media types.
pub trait CustomBinder<R>: Send + Sync {
    /// The name it is addressed by in [`Bind::custom`].
    fn name(&self) -> &str;

    /// Media types, like `application/yaml`, that [`Bind::body`] routes to this binder.
    fn mime_types(&self) -> &[&str];

    /// Populate `out`, which is the caller's target behind `Any`.
    fn parse(&self, request: &R, out: &mut dyn Any) -> Result<(), BoxError>;
}

/// Binds parts of one request.
///
/// ```
/// use reqgate::binder::Bind;
/// use reqgate::frontends::simple::Request;
/// use reqgate::schema::{Fields, Record};
///
/// #[derive(Debug, Default)]
/// struct Search {
///     terms: Vec<String>,
/// }
///
/// impl Record for Search {
///     fn describe(fields: &mut Fields<Self>) {
///         fields.field("Terms", |search| &mut search.terms).tag("query", "q");
///     }
/// }
///
/// let request = Request::new().with_query("q=rust,http");
/// let mut search = Search::default();
/// Bind::new(&request).enable_splitting(true).query(&mut search).unwrap();
/// assert_eq!(search.terms, ["rust", "http"]);
/// ```
pub struct Bind<'r, R> {
    request: &'r R,
    registry: &'r Registry,
    custom: &'r [Box<dyn CustomBinder<R>>],
    enable_splitting: bool,
}

impl<'r, R: WebRequest> Bind<'r, R> {
    /// Bind with the global registry.
    pub fn new(request: &'r R) -> Self {
        Bind {
            request,
            registry: Registry::global(),
            custom: Default::default(),
            enable_splitting: false,
        }
    }

    pub fn registry(mut self, registry: &'r Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn custom_binders(mut self, binders: &'r [Box<dyn CustomBinder<R>>]) -> Self {
        self.custom = binders;
        self
    }

    /// Split comma separated values of sequence fields in the header, query and form binders.
    pub fn enable_splitting(mut self, enable: bool) -> Self {
        self.enable_splitting = enable;
        self
    }

    pub fn header<T: Decode>(&self, out: &mut T) -> Result<(), BindError> {
        let binding = HeaderBinding { enable_splitting: self.enable_splitting };
        binding.bind(self.registry, self.request, out)
    }

    pub fn query<T: Decode>(&self, out: &mut T) -> Result<(), BindError> {
        let binding = QueryBinding { enable_splitting: self.enable_splitting };
        binding.bind(self.registry, self.request, out)
    }

    pub fn form<T: Decode>(&self, out: &mut T) -> Result<(), BindError> {
        let binding = FormBinding { enable_splitting: self.enable_splitting };
        binding.bind(self.registry, self.request, out)
    }

    pub fn cookie<T: Decode>(&self, out: &mut T) -> Result<(), BindError> {
        CookieBinding.bind(self.registry, self.request, out)
    }

    /// Bind the named route placeholders.
    pub fn uri<T: Decode>(&self, params: &[&str], out: &mut T) -> Result<(), BindError> {
        UriBinding.bind_request(self.registry, self.request, params, out)
    }

    /// Bind the headers of a response produced for this request.
    pub fn resp_header<W: WebResponse, T: Decode>(&self, response: &W, out: &mut T) -> Result<(), BindError> {
        RespHeaderBinding.bind(self.registry, response, out)
    }

    #[cfg(feature = "json")]
    pub fn json<T: DeserializeOwned>(&self, out: &mut T) -> Result<(), BindError> {
        <JsonBinding>::default().bind(self.request.body(), out)
    }

    #[cfg(feature = "xml")]
    pub fn xml<T: DeserializeOwned>(&self, out: &mut T) -> Result<(), BindError> {
        <XmlBinding>::default().bind(self.request.body(), out)
    }

    #[cfg(feature = "cbor")]
    pub fn cbor<T: DeserializeOwned>(&self, out: &mut T) -> Result<(), BindError> {
        <CborBinding>::default().bind(self.request.body(), out)
    }

    #[cfg(feature = "msgpack")]
    pub fn msgpack<T: DeserializeOwned>(&self, out: &mut T) -> Result<(), BindError> {
        <MsgPackBinding>::default().bind(self.request.body(), out)
    }

    /// Bind with a registered custom binder.
    pub fn custom<T: Any>(&self, name: &str, out: &mut T) -> Result<(), BindError> {
        let binder = self
            .custom
            .iter()
            .find(|binder| binder.name() == name)
            .ok_or_else(|| BindError::UnknownBinder(name.to_owned()))?;

        binder.parse(self.request, out).map_err(BindError::Body)
    }

    /// Bind the body with the binder matching the request's content type.
    ///
    /// Codecs are tried first, then forms, then custom binders by media type.
    pub fn body<T>(&self, out: &mut T) -> Result<(), BindError>
    where
        T: Decode + DeserializeOwned,
    {
        let media = match media_type(self.request) {
            Some(media) => media,
            None => return Err(BindError::SuitableContentNotFound),
        };

        let essence = media.essence_str();
        let suffix = media.suffix().map(|name| name.as_str());
        match (essence, suffix) {
            #[cfg(feature = "json")]
            ("application/json", _) | (_, Some("json")) => self.json(out),
            #[cfg(feature = "xml")]
            ("application/xml" | "text/xml", _) | (_, Some("xml")) => self.xml(out),
            #[cfg(feature = "cbor")]
            ("application/cbor", _) | (_, Some("cbor")) => self.cbor(out),
            #[cfg(feature = "msgpack")]
            ("application/msgpack" | "application/vnd.msgpack" | "application/x-msgpack", _) => self.msgpack(out),
            ("application/x-www-form-urlencoded" | "multipart/form-data", _) => self.form(out),
            _ => {
                let binder = self
                    .custom
                    .iter()
                    .find(|binder| binder.mime_types().iter().any(|mime| mime.eq_ignore_ascii_case(essence)));

                match binder {
                    Some(binder) => binder.parse(self.request, out).map_err(BindError::Body),
                    None => {
                        debug!("binder: no binder for content type {:?}", essence);
                        Err(BindError::SuitableContentNotFound)
                    }
                }
            }
        }
    }
}

use std::borrow::Cow;

use super::{BindError, Binding};
use crate::endpoint::WebRequest;
use crate::primitives::values::Values;
use crate::schema::{Decode, Registry};

/// Binds route placeholders.
///
/// The router knows which placeholders a route declares, so the names are passed in together
/// with a lookup. A placeholder without a value binds as empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct UriBinding;

impl Binding for UriBinding {
    fn name(&self) -> &'static str {
        "uri"
    }

    fn reset(&mut self) {}
}

impl UriBinding {
    pub fn bind<T, F>(&self, registry: &Registry, params: &[&str], lookup: F, out: &mut T) -> Result<(), BindError>
    where
        T: Decode,
        F: Fn(&str) -> Option<String>,
    {
        let mut data = Values::new();
        for &param in params {
            data.append(param, lookup(param).unwrap_or_default());
        }

        registry.decoder(self.name()).decode(out, &data)?;
        Ok(())
    }

    /// Bind placeholders resolved by the request itself.
    pub fn bind_request<R, T>(&self, registry: &Registry, request: &R, params: &[&str], out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        self.bind(registry, params, |name| request.param(name).map(Cow::into_owned), out)
    }
}

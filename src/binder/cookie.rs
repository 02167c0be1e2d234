use super::{gather, BindError, Binding};
use crate::endpoint::WebRequest;
use crate::schema::{Decode, Registry};

/// Binds request cookies.
///
/// Comma separated values are always split for sequence fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieBinding;

impl Binding for CookieBinding {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn reset(&mut self) {}
}

impl CookieBinding {
    pub fn bind<R, T>(&self, registry: &Registry, request: &R, out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        let decoder = registry.decoder(self.name());
        let data = gather::<T>(&decoder, request.cookies(), true, false)?;
        decoder.decode(out, &data)?;
        Ok(())
    }
}

use super::{gather, BindError, Binding};
use crate::endpoint::WebResponse;
use crate::schema::{Decode, Registry};

/// Binds the headers of a response, for example in an outgoing middleware.
///
/// Comma separated values are always split for sequence fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct RespHeaderBinding;

impl Binding for RespHeaderBinding {
    fn name(&self) -> &'static str {
        "respHeader"
    }

    fn reset(&mut self) {}
}

impl RespHeaderBinding {
    pub fn bind<W, T>(&self, registry: &Registry, response: &W, out: &mut T) -> Result<(), BindError>
    where
        W: WebResponse,
        T: Decode,
    {
        let decoder = registry.decoder(self.name());
        let data = gather::<T>(&decoder, response.headers(), true, false)?;
        decoder.decode(out, &data)?;
        Ok(())
    }
}

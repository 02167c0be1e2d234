use super::{gather, BindError, Binding};
use crate::endpoint::WebRequest;
use crate::schema::{Decode, Registry};

/// Binds request headers.
///
/// Header names are matched case-insensitively unless the registry asks otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderBinding {
    pub enable_splitting: bool,
}

impl Binding for HeaderBinding {
    fn name(&self) -> &'static str {
        "header"
    }

    fn reset(&mut self) {
        self.enable_splitting = false;
    }
}

impl HeaderBinding {
    pub fn bind<R, T>(&self, registry: &Registry, request: &R, out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        let decoder = registry.decoder(self.name());
        let data = gather::<T>(&decoder, request.headers(), self.enable_splitting, false)?;
        decoder.decode(out, &data)?;
        Ok(())
    }
}

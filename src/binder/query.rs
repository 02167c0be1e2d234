use super::{gather, BindError, Binding};
use crate::endpoint::WebRequest;
use crate::schema::{Decode, Registry};

/// Binds the url query.
///
/// Bracket keys are rewritten into paths. With splitting enabled, comma separated values of
/// sequence fields become separate elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryBinding {
    pub enable_splitting: bool,
}

impl Binding for QueryBinding {
    fn name(&self) -> &'static str {
        "query"
    }

    fn reset(&mut self) {
        self.enable_splitting = false;
    }
}

impl QueryBinding {
    pub fn bind<R, T>(&self, registry: &Registry, request: &R, out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        let decoder = registry.decoder(self.name());
        let data = gather::<T>(&decoder, request.query(), self.enable_splitting, true)?;
        decoder.decode(out, &data)?;
        Ok(())
    }
}

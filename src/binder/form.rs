use mime::Mime;

use super::{gather, normalized, push_value, BindError, Binding};
use crate::endpoint::WebRequest;
use crate::primitives::values::{Files, Values};
use crate::schema::{Decode, Registry};

/// Binds urlencoded and multipart form bodies.
///
/// Multipart bodies contribute their files as well, to fields of type `FileHeader`,
/// `Option<FileHeader>` or `Vec<FileHeader>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormBinding {
    pub enable_splitting: bool,
}

impl Binding for FormBinding {
    fn name(&self) -> &'static str {
        "form"
    }

    fn reset(&mut self) {
        self.enable_splitting = false;
    }
}

impl FormBinding {
    pub fn bind<R, T>(&self, registry: &Registry, request: &R, out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        if is_multipart(request) {
            return self.bind_multipart(registry, request, out);
        }

        let decoder = registry.decoder(self.name());
        let data = gather::<T>(&decoder, request.urlbody(), self.enable_splitting, true)?;
        decoder.decode(out, &data)?;
        Ok(())
    }

    /// Bind the multipart body, failing with the host's error if it could not be parsed.
    pub fn bind_multipart<R, T>(&self, registry: &Registry, request: &R, out: &mut T) -> Result<(), BindError>
    where
        R: WebRequest,
        T: Decode,
    {
        let form = request
            .multipart()
            .map_err(|err| BindError::Request(Box::new(err)))?;
        let decoder = registry.decoder(self.name());

        let mut data = Values::new();
        for (key, values) in form.value.iter() {
            let key = normalized(key)?;
            for value in values {
                push_value::<T>(&decoder, &mut data, &key, value.clone(), self.enable_splitting);
            }
        }

        let mut files = Files::new();
        for (key, uploads) in form.file.iter() {
            files.extend(&normalized(key)?, uploads.iter().cloned());
        }

        decoder.decode_with_files(out, &data, &files)?;
        Ok(())
    }
}

pub(crate) fn media_type<R: WebRequest>(request: &R) -> Option<Mime> {
    request.content_type()?.parse().ok()
}

fn is_multipart<R: WebRequest>(request: &R) -> bool {
    media_type(request).map_or(false, |media| {
        media.type_() == mime::MULTIPART && media.subtype() == mime::FORM_DATA
    })
}

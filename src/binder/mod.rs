//! Binders populate records from one request location each.
//!
//! Every binder collects its source into [`Values`], rewriting bracket keys and splitting comma
//! separated values where configured, and hands the result to a decoder leased from a
//! [`Registry`] under the binder's alias. The body binders instead delegate to a codec.
//!
//! The [`Bind`] facade ties a request to a registry and offers every binder as a method,
//! including dispatch on the request's content type.
//!
//! [`Registry`]: ../schema/struct.Registry.html
use std::borrow::Cow;

use thiserror::Error;

use crate::endpoint::Pairs;
use crate::primitives::values::Values;
use crate::schema::{BoxError, Decode, DecodeError, Decoder};

mod bind;
mod body;
mod brackets;
mod cookie;
mod form;
mod header;
mod query;
mod resp_header;
mod uri;

pub use self::bind::{Bind, CustomBinder};
pub use self::body::BodyDecoder;
#[cfg(feature = "cbor")]
pub use self::body::{CborBinding, Ciborium};
#[cfg(feature = "json")]
pub use self::body::{JsonBinding, SerdeJson};
#[cfg(feature = "msgpack")]
pub use self::body::{MsgPackBinding, RmpSerde};
#[cfg(feature = "xml")]
pub use self::body::{QuickXml, XmlBinding};
pub use self::brackets::{normalize_key, UnbalancedBrackets};
pub use self::cookie::CookieBinding;
pub use self::form::FormBinding;
pub use self::header::HeaderBinding;
pub use self::query::QueryBinding;
pub use self::resp_header::RespHeaderBinding;
pub use self::uri::UriBinding;

/// Common surface of all binders.
pub trait Binding {
    /// The alias tag this binder reads field names from.
    fn name(&self) -> &'static str;

    /// Restore the default options.
    fn reset(&mut self);
}

/// Failure of a binder.
#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Key(#[from] UnbalancedBrackets),

    /// No binder accepts the request's content type.
    #[error("binder: suitable content not found to parse body")]
    SuitableContentNotFound,

    /// A custom binder was requested by a name nobody registered.
    #[error("binder: custom binder {0:?} is not registered")]
    UnknownBinder(String),

    /// The codec rejected the body.
    #[error(transparent)]
    Body(BoxError),

    /// The host failed to provide the source, for example a malformed multipart body.
    #[error(transparent)]
    Request(BoxError),
}

impl BindError {
    /// The per-field errors of a failed decode, if that is what failed.
    pub fn fields(&self) -> Option<&crate::schema::MultiError> {
        match self {
            BindError::Decode(err) => err.fields(),
            _ => None,
        }
    }
}

/// Rewrite bracket keys, leaving all others borrowed.
pub(crate) fn normalized(key: &str) -> Result<Cow<'_, str>, UnbalancedBrackets> {
    if key.contains('[') {
        normalize_key(key).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(key))
    }
}

/// Append a value, splitting it on commas when the target field is a sequence.
pub(crate) fn push_value<T: Decode>(decoder: &Decoder, data: &mut Values, key: &str, value: String, split: bool) {
    if split && value.contains(',') && decoder.is_sequence_field::<T>(key) {
        for piece in value.split(',') {
            data.append(key, piece.to_owned());
        }
    } else {
        data.append(key, value);
    }
}

/// Collect a pair source for the target `T`.
pub(crate) fn gather<T: Decode>(
    decoder: &Decoder, pairs: Pairs<'_>, split: bool, brackets: bool,
) -> Result<Values, BindError> {
    let mut data = Values::new();
    for (key, value) in pairs {
        let key = if brackets { normalized(&key)? } else { Cow::Borrowed(&*key) };
        push_value::<T>(decoder, &mut data, &key, value.into_owned(), split);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Fields, Record};

    #[derive(Debug, Default)]
    struct Target {
        names: Vec<String>,
        name: String,
    }

    impl Record for Target {
        fn describe(fields: &mut Fields<Self>) {
            fields.field("Names", |t| &mut t.names).tag("query", "names");
            fields.field("Name", |t| &mut t.name).tag("query", "name");
        }
    }

    fn pairs(list: &[(&'static str, &'static str)]) -> Pairs<'static> {
        let owned: Vec<_> = list.to_vec();
        Box::new(owned.into_iter().map(|(k, v)| (Cow::Borrowed(k), Cow::Borrowed(v))))
    }

    #[test]
    fn splits_only_sequence_fields() {
        let mut decoder = Decoder::new();
        decoder.set_alias_tag("query");
        let data = gather::<Target>(
            &decoder,
            pairs(&[("names", "x"), ("names", "y,z"), ("name", "a,b")]),
            true,
            false,
        )
        .unwrap();

        assert_eq!(data.get("names").unwrap(), ["x", "y", "z"]);
        assert_eq!(data.get("name").unwrap(), ["a,b"]);
    }

    #[test]
    fn without_splitting_values_stay_whole() {
        let mut decoder = Decoder::new();
        decoder.set_alias_tag("query");
        let data = gather::<Target>(&decoder, pairs(&[("names", "x"), ("names", "y,z")]), false, false).unwrap();
        assert_eq!(data.get("names").unwrap(), ["x", "y,z"]);
    }

    #[test]
    fn bracket_keys_are_rewritten() {
        let decoder = Decoder::new();
        let data = gather::<Target>(&decoder, pairs(&[("posts[0][title]", "t")]), false, true).unwrap();
        assert!(data.contains_key("posts.0.title"));

        let err = gather::<Target>(&decoder, pairs(&[("posts[0", "t")]), false, true).unwrap_err();
        assert!(matches!(err, BindError::Key(_)));
    }
}

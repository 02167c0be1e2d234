//! Binders delegating the whole body to a codec.
//!
//! Each binder holds its codec in a public slot, so an application can swap in a different
//! implementation of [`BodyDecoder`] without touching the dispatch.
use serde::de::DeserializeOwned;

#[cfg(any(feature = "json", feature = "xml", feature = "cbor", feature = "msgpack"))]
use super::{BindError, Binding};
use crate::schema::BoxError;

/// A codec turning a buffered body into a value.
pub trait BodyDecoder: Send + Sync {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError>;
}

/// JSON through `serde_json`.
#[cfg(feature = "json")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeJson;

/// XML through `quick-xml`.
#[cfg(feature = "xml")]
#[derive(Clone, Copy, Debug, Default)]
pub struct QuickXml;

/// CBOR through `ciborium`.
#[cfg(feature = "cbor")]
#[derive(Clone, Copy, Debug, Default)]
pub struct Ciborium;

/// MessagePack through `rmp-serde`.
#[cfg(feature = "msgpack")]
#[derive(Clone, Copy, Debug, Default)]
pub struct RmpSerde;

#[cfg(feature = "json")]
impl BodyDecoder for SerdeJson {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[cfg(feature = "xml")]
impl BodyDecoder for QuickXml {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        Ok(quick_xml::de::from_reader(body)?)
    }
}

#[cfg(feature = "cbor")]
impl BodyDecoder for Ciborium {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        Ok(ciborium::de::from_reader(body)?)
    }
}

#[cfg(feature = "msgpack")]
impl BodyDecoder for RmpSerde {
    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, BoxError> {
        Ok(rmp_serde::from_slice(body)?)
    }
}

/// Binds a JSON body.
#[cfg(feature = "json")]
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonBinding<D = SerdeJson> {
    pub decoder: D,
}

/// Binds an XML body.
#[cfg(feature = "xml")]
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlBinding<D = QuickXml> {
    pub decoder: D,
}

/// Binds a CBOR body.
#[cfg(feature = "cbor")]
#[derive(Clone, Copy, Debug, Default)]
pub struct CborBinding<D = Ciborium> {
    pub decoder: D,
}

/// Binds a MessagePack body.
#[cfg(feature = "msgpack")]
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgPackBinding<D = RmpSerde> {
    pub decoder: D,
}

macro_rules! body_binding {
    ($feature:literal, $binding:ident, $name:literal) => {
        #[cfg(feature = $feature)]
        impl<D: BodyDecoder> Binding for $binding<D> {
            fn name(&self) -> &'static str {
                $name
            }

            fn reset(&mut self) {}
        }

        #[cfg(feature = $feature)]
        impl<D: BodyDecoder> $binding<D> {
            pub fn with_decoder(decoder: D) -> Self {
                $binding { decoder }
            }

            /// Replace `out` with the decoded body.
            pub fn bind<T: DeserializeOwned>(&self, body: &[u8], out: &mut T) -> Result<(), BindError> {
                *out = self.decoder.decode(body).map_err(BindError::Body)?;
                Ok(())
            }
        }
    };
}

body_binding!("json", JsonBinding, "json");
body_binding!("xml", XmlBinding, "xml");
body_binding!("cbor", CborBinding, "cbor");
body_binding!("msgpack", MsgPackBinding, "msgpack");

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
    struct Note {
        title: String,
        stars: u8,
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_body() {
        let mut note = Note::default();
        JsonBinding::<SerdeJson>::default()
            .bind(br#"{"title":"hi","stars":3}"#, &mut note)
            .unwrap();
        assert_eq!(note, Note { title: "hi".into(), stars: 3 });

        let err = JsonBinding::<SerdeJson>::default().bind(b"{", &mut note).unwrap_err();
        assert!(matches!(err, BindError::Body(_)));
    }

    #[cfg(feature = "xml")]
    #[test]
    fn xml_body() {
        let mut note = Note::default();
        XmlBinding::<QuickXml>::default()
            .bind(b"<note><title>hi</title><stars>4</stars></note>", &mut note)
            .unwrap();
        assert_eq!(note, Note { title: "hi".into(), stars: 4 });
    }

    #[cfg(feature = "msgpack")]
    #[test]
    fn msgpack_body() {
        let source = Note { title: "mp".into(), stars: 1 };
        let body = rmp_serde::to_vec_named(&source).unwrap();
        let mut note = Note::default();
        MsgPackBinding::<RmpSerde>::default().bind(&body, &mut note).unwrap();
        assert_eq!(note, source);
    }

    #[cfg(feature = "cbor")]
    #[test]
    fn cbor_body() {
        let source = Note { title: "cb".into(), stars: 2 };
        let mut body = Vec::new();
        ciborium::ser::into_writer(&source, &mut body).unwrap();
        let mut note = Note::default();
        CborBinding::<Ciborium>::default().bind(&body, &mut note).unwrap();
        assert_eq!(note, source);
    }
}

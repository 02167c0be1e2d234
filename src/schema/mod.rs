//! Populates typed records from textual key value data.
//!
//! Records describe their fields through [`Record`], the decoder walks dotted paths through
//! records, sequences, optionals and maps, converting each leaf from text. A [`Registry`] hands
//! out pooled decoders per alias, which is how the binders obtain theirs.
mod convert;
mod decode;
mod decoder;
mod error;
mod record;
mod registry;

pub use self::convert::{parse_bool, parse_float, Converters, FloatRange, InvalidBool};
pub use self::decode::{Decode, Kind, MapSlot, Sequence, Shape, UnmarshalText};
pub use self::decoder::{Decoder, DEFAULT_MAX_INDEX};
pub use self::error::{
    BoxError, ConversionError, DecodeError, EmptyFieldError, FieldError, MultiError, UnknownKeyError,
};
pub use self::record::{FieldBuilder, Fields, Layout, LayoutCache, Record, RecordType};
pub use self::registry::{ParserConfig, Registry};

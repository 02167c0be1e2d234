//! The decoding capability of target types.
//!
//! The decoder walks values through the object safe [`Decode`] trait: it asks a slot for its
//! [`Kind`] and then for the matching view, a [`Sequence`], a [`MapSlot`], the pointee of an
//! option or the field table of a record. The static [`Shape`] of a type answers the same
//! questions without a value, which is what splitting decisions and required checks need.
use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::convert::{parse_bool, parse_float};
use super::error::BoxError;
use super::record::RecordType;
use crate::primitives::values::FileHeader;

/// The dynamic category of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Decoded from a single textual value.
    Scalar,

    /// An uploaded file.
    File,

    /// A growable list, addressed by index segments.
    Sequence,

    /// An optional value, allocated when a path reaches through it.
    Optional,

    /// A text keyed map, the remaining path is the key.
    Map,

    /// A record with a field table.
    Record,
}

/// The static structure of a type.
#[derive(Clone, Copy, Debug)]
pub enum Shape {
    Scalar,
    File,
    Sequence(fn() -> Shape),
    Optional(fn() -> Shape),
    Map(fn() -> Shape),
    Record(RecordType),
}

/// A type the decoder can write into.
///
/// Implemented for the builtin scalars, `String`, `char`, [`FileHeader`], `Vec<T>`,
/// `Option<T>`, `HashMap<String, V>` and every [`Record`](super::Record). Types with their own
/// textual representation implement [`UnmarshalText`] and use [`decode_via_text!`].
pub trait Decode: 'static {
    /// The static structure of the type.
    fn shape() -> Shape
    where
        Self: Sized;

    fn kind(&self) -> Kind;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Reset to the zero value.
    fn clear_value(&mut self);

    /// Name used in conversion errors.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Identity of the concrete type, used to find registered converters.
    fn value_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// Assign from a single textual value.
    fn set_text(&mut self, _text: &str) -> Result<(), BoxError> {
        Err(format!("{} cannot be decoded from text", self.type_name()).into())
    }

    /// Assign an uploaded file, returning whether the slot accepted it.
    fn set_file(&mut self, _file: &FileHeader) -> bool {
        false
    }

    fn as_sequence(&mut self) -> Option<&mut dyn Sequence> {
        None
    }

    fn as_map(&mut self) -> Option<&mut dyn MapSlot> {
        None
    }

    /// The record itself and its type, for record slots.
    fn as_record(&mut self) -> Option<(&mut dyn Any, RecordType)> {
        None
    }

    /// The contained value of an optional, allocated if absent.
    fn pointee(&mut self) -> Option<&mut dyn Decode> {
        None
    }
}

/// Index based access to a sequence slot.
pub trait Sequence {
    fn length(&self) -> usize;

    /// The element at `index`, growing the sequence with default elements as needed.
    fn element(&mut self, index: usize) -> &mut dyn Decode;

    /// Append a default element and return it.
    fn push_default(&mut self) -> &mut dyn Decode;

    fn truncate_to(&mut self, len: usize);

    fn element_type_name(&self) -> &'static str;
}

/// Key based access to a map slot.
pub trait MapSlot {
    /// The value stored under `key`, inserted with its default if absent.
    fn slot(&mut self, key: &str) -> &mut dyn Decode;

    /// Identity of the value type.
    fn value_type(&self) -> TypeId;
}

/// Types with a textual representation of their own.
///
/// A sequence newtype implementing this receives the whole raw string, commas included.
pub trait UnmarshalText {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError>;
}

/// Implement [`Decode`] for types implementing [`UnmarshalText`] and `Default`.
///
/// ```
/// use reqgate::schema::{BoxError, UnmarshalText};
///
/// #[derive(Debug, Default)]
/// struct Tags(Vec<String>);
///
/// impl UnmarshalText for Tags {
///     fn unmarshal_text(&mut self, text: &str) -> Result<(), BoxError> {
///         self.0 = text.split('|').map(str::to_owned).collect();
///         Ok(())
///     }
/// }
///
/// reqgate::decode_via_text!(Tags);
/// ```
#[macro_export]
macro_rules! decode_via_text {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::schema::Decode for $ty {
            fn shape() -> $crate::schema::Shape {
                $crate::schema::Shape::Scalar
            }

            fn kind(&self) -> $crate::schema::Kind {
                $crate::schema::Kind::Scalar
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn clear_value(&mut self) {
                *self = ::std::default::Default::default();
            }

            fn set_text(&mut self, text: &str) -> ::std::result::Result<(), $crate::schema::BoxError> {
                $crate::schema::UnmarshalText::unmarshal_text(self, text)
            }
        }
    )+};
}

macro_rules! scalar {
    ($ty:ty, $parse:expr) => {
        impl Decode for $ty {
            fn shape() -> Shape {
                Shape::Scalar
            }

            fn kind(&self) -> Kind {
                Kind::Scalar
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }

            fn clear_value(&mut self) {
                *self = <$ty>::default();
            }

            fn set_text(&mut self, text: &str) -> Result<(), BoxError> {
                let parse: fn(&str) -> Result<$ty, BoxError> = $parse;
                *self = parse(text)?;
                Ok(())
            }
        }
    };
}

macro_rules! integers {
    ($($ty:ty),*) => {$(
        scalar!($ty, |text| Ok(text.parse::<$ty>()?));
    )*};
}

integers!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
scalar!(f32, parse_float::<f32>);
scalar!(f64, parse_float::<f64>);
scalar!(bool, |text| Ok(parse_bool(text)?));
scalar!(String, |text| Ok(text.to_owned()));
scalar!(char, |text| {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got {:?}", text).into()),
    }
});

impl Decode for FileHeader {
    fn shape() -> Shape {
        Shape::File
    }

    fn kind(&self) -> Kind {
        Kind::File
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear_value(&mut self) {
        *self = FileHeader::default();
    }

    fn set_file(&mut self, file: &FileHeader) -> bool {
        self.clone_from(file);
        true
    }
}

impl<T: Decode + Default> Decode for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence(T::shape)
    }

    fn kind(&self) -> Kind {
        Kind::Sequence
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear_value(&mut self) {
        self.clear();
    }

    fn as_sequence(&mut self) -> Option<&mut dyn Sequence> {
        Some(self)
    }
}

impl<T: Decode + Default> Sequence for Vec<T> {
    fn length(&self) -> usize {
        self.len()
    }

    fn element(&mut self, index: usize) -> &mut dyn Decode {
        if index >= self.len() {
            self.resize_with(index + 1, T::default);
        }
        &mut self[index]
    }

    fn push_default(&mut self) -> &mut dyn Decode {
        self.push(T::default());
        let last = self.len() - 1;
        &mut self[last]
    }

    fn truncate_to(&mut self, len: usize) {
        self.truncate(len);
    }

    fn element_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(T::shape)
    }

    fn kind(&self) -> Kind {
        Kind::Optional
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear_value(&mut self) {
        *self = None;
    }

    fn pointee(&mut self) -> Option<&mut dyn Decode> {
        let inner: &mut dyn Decode = self.get_or_insert_with(T::default);
        Some(inner)
    }
}

impl<V: Decode + Default> Decode for HashMap<String, V> {
    fn shape() -> Shape {
        Shape::Map(V::shape)
    }

    fn kind(&self) -> Kind {
        Kind::Map
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear_value(&mut self) {
        self.clear();
    }

    fn as_map(&mut self) -> Option<&mut dyn MapSlot> {
        Some(self)
    }
}

impl<V: Decode + Default> MapSlot for HashMap<String, V> {
    fn slot(&mut self, key: &str) -> &mut dyn Decode {
        self.entry(key.to_owned()).or_default()
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<V>()
    }
}

impl Shape {
    pub fn kind(&self) -> Kind {
        match self {
            Shape::Scalar => Kind::Scalar,
            Shape::File => Kind::File,
            Shape::Sequence(_) => Kind::Sequence,
            Shape::Optional(_) => Kind::Optional,
            Shape::Map(_) => Kind::Map,
            Shape::Record(_) => Kind::Record,
        }
    }

    /// Look through any number of optionals.
    pub fn strip_optional(self) -> Shape {
        let mut shape = self;
        while let Shape::Optional(inner) = shape {
            shape = inner();
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_parse_text() {
        let mut number = 0i64;
        number.set_text("-42").unwrap();
        assert_eq!(number, -42);
        assert!(number.set_text("4.2").is_err());

        let mut flag = false;
        flag.set_text("on").unwrap();
        assert!(flag);

        let mut letter = ' ';
        letter.set_text("x").unwrap();
        assert_eq!(letter, 'x');
        assert!(letter.set_text("xy").is_err());

        let mut text = String::from("old");
        text.clear_value();
        assert_eq!(text, "");
    }

    #[test]
    fn sequences_grow_on_demand() {
        let mut list: Vec<u8> = Vec::new();
        let seq = list.as_sequence().unwrap();
        seq.element(2).set_text("7").unwrap();
        seq.push_default().set_text("9").unwrap();
        assert_eq!(seq.length(), 4);
        assert_eq!(list, [0, 0, 7, 9]);
    }

    #[test]
    fn optionals_allocate_on_demand() {
        let mut value: Option<u16> = None;
        value.pointee().unwrap().set_text("5").unwrap();
        assert_eq!(value, Some(5));
        value.clear_value();
        assert_eq!(value, None);
    }

    #[test]
    fn shapes_describe_nesting() {
        let shape = <Option<Vec<String>>>::shape();
        assert_eq!(shape.kind(), Kind::Optional);
        assert_eq!(shape.strip_optional().kind(), Kind::Sequence);
        assert_eq!(<HashMap<String, Vec<String>>>::shape().kind(), Kind::Map);
    }
}

//! Text conversions for the builtin scalar types and the registry of custom converters.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use super::error::BoxError;

/// The text was not one of the accepted boolean spellings.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid boolean {0:?}")]
pub struct InvalidBool(pub String);

/// A float literal that is out of range for its type.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("value {0:?} out of range")]
pub struct FloatRange(pub String);

type ConvertFn = dyn Fn(&str, &mut dyn Any) -> Result<(), BoxError> + Send + Sync;

/// Custom text conversions, keyed by their target type.
///
/// A registered converter takes precedence over the builtin conversion and over
/// [`UnmarshalText`](super::UnmarshalText) for its type.
#[derive(Clone, Default)]
pub struct Converters {
    by_type: HashMap<TypeId, (&'static str, Arc<ConvertFn>)>,
}

/// Parse `true/false`, `on/off` and `1/0`, ignoring ASCII case.
pub fn parse_bool(text: &str) -> Result<bool, InvalidBool> {
    const TRUE: [&str; 3] = ["true", "on", "1"];
    const FALSE: [&str; 3] = ["false", "off", "0"];

    if TRUE.iter().any(|word| word.eq_ignore_ascii_case(text)) {
        Ok(true)
    } else if FALSE.iter().any(|word| word.eq_ignore_ascii_case(text)) {
        Ok(false)
    } else {
        Err(InvalidBool(text.to_owned()))
    }
}

/// Parse a base 10 float, rejecting finite literals that overflow to infinity.
pub fn parse_float<F>(text: &str) -> Result<F, BoxError>
where
    F: FromStr + Into<f64> + Copy,
    F::Err: std::error::Error + Send + Sync + 'static,
{
    let value: F = text.parse()?;
    let spelled_infinite = text
        .trim_start_matches(['+', '-'])
        .to_ascii_lowercase()
        .starts_with("inf");

    if value.into().is_infinite() && !spelled_infinite {
        return Err(FloatRange(text.to_owned()).into());
    }

    Ok(value)
}

impl Converters {
    pub fn new() -> Self {
        Converters::default()
    }

    /// Register a conversion for `T`, replacing an earlier one.
    pub fn register<T, F, E>(&mut self, convert: F)
    where
        T: Any,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let apply = move |text: &str, slot: &mut dyn Any| -> Result<(), BoxError> {
            let slot = slot
                .downcast_mut::<T>()
                .ok_or("converter applied to a slot of a different type")?;
            *slot = convert(text).map_err(Into::<BoxError>::into)?;
            Ok(())
        };

        self.by_type.insert(
            TypeId::of::<T>(),
            (std::any::type_name::<T>(), Arc::new(apply)),
        );
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.by_type.contains_key(&id)
    }

    pub(crate) fn get(&self, id: TypeId) -> Option<&ConvertFn> {
        self.by_type.get(&id).map(|(_, convert)| &**convert)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set()
            .entries(self.by_type.values().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_spellings() {
        for text in ["true", "TRUE", "On", "1"] {
            assert_eq!(parse_bool(text), Ok(true), "{}", text);
        }
        for text in ["false", "Off", "0"] {
            assert_eq!(parse_bool(text), Ok(false), "{}", text);
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn float_overflow_is_an_error() {
        assert_eq!(parse_float::<f64>("1.5").unwrap(), 1.5);
        assert!(parse_float::<f64>("1e400").is_err());
        assert!(parse_float::<f32>("1e40").is_err());
        assert!(parse_float::<f64>("-inf").unwrap().is_infinite());
        assert!(parse_float::<f64>("abc").is_err());
    }

    #[test]
    fn registered_converter_writes_slot() {
        let mut converters = Converters::new();
        converters.register(|text: &str| text.parse::<u8>().map(|n| n * 2));
        assert!(converters.contains(TypeId::of::<u8>()));

        let mut slot = 0u8;
        let convert = converters.get(TypeId::of::<u8>()).unwrap();
        convert("21", &mut slot).unwrap();
        assert_eq!(slot, 42);
        assert!(convert("x", &mut slot).is_err());

        let mut other = String::new();
        assert!(convert("1", &mut other).is_err());
    }
}

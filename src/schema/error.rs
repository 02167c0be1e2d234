use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Type-erased error of a converter or a codec.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A value could not be converted into the type of its target field.
#[derive(Debug, Error)]
pub struct ConversionError {
    /// Full path of the field.
    pub key: String,

    /// Name of the type the value was converted into.
    pub type_name: &'static str,

    /// Position within a sequence, if the target was a sequence element.
    pub index: Option<usize>,

    /// The converter's complaint.
    #[source]
    pub source: BoxError,
}

/// A key did not resolve to any field of the target.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("schema: invalid path \"{key}\"")]
pub struct UnknownKeyError {
    pub key: String,
}

/// A required field received no value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{key} is empty")]
pub struct EmptyFieldError {
    pub key: String,
}

/// The failure recorded for a single path.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    UnknownKey(#[from] UnknownKeyError),

    #[error(transparent)]
    EmptyField(#[from] EmptyFieldError),

    /// A sequence index beyond the decoder's limit.
    #[error("schema: index {index} of \"{key}\" exceeds the parser limit of {limit}")]
    IndexLimit {
        key: String,
        index: usize,
        limit: usize,
    },
}

/// All field failures of one decode call, keyed by path.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: BTreeMap<String, FieldError>,
}

/// Failure of a decode call.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The target is neither a record nor a text keyed map.
    #[error("schema: interface must be a record or a map, got {0}")]
    InvalidTarget(&'static str),

    /// A map target whose values are not `String` or `Vec<String>`.
    #[error("binder: map is not convertable to map[string]string or map[string][]string")]
    MapNotConvertable,

    #[error(transparent)]
    Fields(#[from] MultiError),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.index {
            None => write!(
                f,
                "schema: error converting value for \"{}\" into {}",
                self.key, self.type_name
            ),
            Some(index) => write!(
                f,
                "schema: error converting value for index {} of \"{}\" into {}",
                index, self.key, self.type_name
            ),
        }
    }
}

impl FieldError {
    pub(crate) fn conversion(
        key: &str, type_name: &'static str, index: Option<usize>, source: BoxError,
    ) -> Self {
        FieldError::Conversion(ConversionError {
            key: key.to_owned(),
            type_name,
            index,
            source,
        })
    }

    pub(crate) fn unknown(key: &str) -> Self {
        FieldError::UnknownKey(UnknownKeyError { key: key.to_owned() })
    }

    /// The path this error was recorded for.
    pub fn key(&self) -> &str {
        match self {
            FieldError::Conversion(err) => &err.key,
            FieldError::UnknownKey(err) => &err.key,
            FieldError::EmptyField(err) => &err.key,
            FieldError::IndexLimit { key, .. } => key,
        }
    }

    pub fn is_empty_field(&self) -> bool {
        matches!(self, FieldError::EmptyField(_))
    }

    pub fn is_unknown_key(&self) -> bool {
        matches!(self, FieldError::UnknownKey(_))
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, FieldError::Conversion(_))
    }
}

impl MultiError {
    pub fn new() -> Self {
        MultiError::default()
    }

    /// Record an error, keeping the first one reported for a path.
    pub fn insert(&mut self, key: impl Into<String>, error: FieldError) {
        self.errors.entry(key.into()).or_insert(error);
    }

    pub fn get(&self, key: &str) -> Option<&FieldError> {
        self.errors.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.errors.contains_key(key)
    }

    /// Iterate the errors ordered by path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.errors.iter().map(|(key, error)| (key.as_str(), error))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn into_result(self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::Fields(self))
        }
    }
}

impl IntoIterator for MultiError {
    type Item = (String, FieldError);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut errors = self.errors.values();
        let first = match errors.next() {
            None => return f.write_str("(0 errors)"),
            Some(first) => first,
        };

        match self.errors.len() {
            1 => write!(f, "{}", first),
            2 => write!(f, "{} (and 1 other error)", first),
            n => write!(f, "{} (and {} other errors)", first, n - 1),
        }
    }
}

impl std::error::Error for MultiError {}

impl DecodeError {
    /// The per-field errors, if this was not an input-shape failure.
    pub fn fields(&self) -> Option<&MultiError> {
        match self {
            DecodeError::Fields(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_error_reports_first_and_count() {
        let mut errors = MultiError::new();
        assert_eq!(errors.to_string(), "(0 errors)");

        errors.insert("b", FieldError::unknown("b"));
        assert_eq!(errors.to_string(), "schema: invalid path \"b\"");

        errors.insert("a", EmptyFieldError { key: "a".into() }.into());
        errors.insert("a", FieldError::unknown("a"));
        assert_eq!(errors.to_string(), "a is empty (and 1 other error)");
        assert!(errors.get("a").unwrap().is_empty_field());
    }

    #[test]
    fn conversion_mentions_index() {
        let error = FieldError::conversion("ids", "u32", Some(2), "bad digit".into());
        assert_eq!(
            error.to_string(),
            "schema: error converting value for index 2 of \"ids\" into u32"
        );
        assert_eq!(error.key(), "ids");
    }
}

//! Ordered multi-valued maps, as produced by query strings, forms and header lists.
use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// An insertion ordered map from text keys to every value seen for them.
///
/// Keys keep the order of their first occurrence and values keep their arrival order. This is
/// the shape all request sources are collected into before they reach the decoder.
#[derive(Clone)]
pub struct Multimap<V> {
    entries: Vec<(String, Vec<V>)>,
    index: HashMap<String, usize>,
}

/// Textual values keyed by parameter name.
pub type Values = Multimap<String>;

/// Uploaded files keyed by form field name.
pub type Files = Multimap<FileHeader>;

/// Metadata and content of a single uploaded file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// The file name the client sent, not sanitized.
    pub filename: String,

    /// The `Content-Type` of the part, if the client sent one.
    pub content_type: Option<String>,

    /// All headers of the multipart section.
    pub headers: Vec<(String, String)>,

    /// The buffered content.
    pub content: Bytes,
}

/// A parsed `multipart/form-data` body.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    /// Every textual part.
    pub value: Values,

    /// Every part that carried a file name.
    pub file: Files,
}

impl<V> Multimap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Multimap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a value to the key, creating the key if it was not present.
    pub fn append(&mut self, key: &str, value: V) {
        self.slot(key).push(value);
    }

    /// Append every value of an iterator to the key.
    ///
    /// The key is created even if the iterator turns out empty.
    pub fn extend<I>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
    {
        self.slot(key).extend(values);
    }

    /// All values of the key, in arrival order.
    pub fn get(&self, key: &str) -> Option<&[V]> {
        self.index
            .get(key)
            .map(|&position| self.entries[position].1.as_slice())
    }

    /// The first value of the key.
    pub fn first(&self, key: &str) -> Option<&V> {
        self.get(key).and_then(<[V]>::first)
    }

    /// The last value of the key.
    pub fn last(&self, key: &str) -> Option<&V> {
        self.get(key).and_then(<[V]>::last)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate the keys and their values in order of first occurrence.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// The number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn slot(&mut self, key: &str) -> &mut Vec<V> {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.entries.push((key.to_owned(), Vec::new()));
                self.index.insert(key.to_owned(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        &mut self.entries[position].1
    }
}

impl<V> Default for Multimap<V> {
    fn default() -> Self {
        Multimap::new()
    }
}

impl<V: PartialEq> PartialEq for Multimap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: Eq> Eq for Multimap<V> {}

impl<V: fmt::Debug> fmt::Debug for Multimap<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Multimap<V>
where
    K: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Multimap::new();
        for (key, value) in iter {
            map.append(key.as_ref(), value);
        }
        map
    }
}

impl FileHeader {
    /// A file with just a name and content.
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        FileHeader {
            filename: filename.into(),
            content: content.into(),
            ..FileHeader::default()
        }
    }

    /// The size of the buffered content in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        MultipartForm::default()
    }

    /// Add a textual part.
    pub fn push_value(&mut self, name: &str, value: impl Into<String>) {
        self.value.append(name, value.into());
    }

    /// Add a file part.
    pub fn push_file(&mut self, name: &str, file: FileHeader) {
        self.file.append(name, file);
    }
}

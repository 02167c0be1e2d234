use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use super::convert::Converters;
use super::decode::{Decode, Kind, Sequence, Shape};
use super::error::{BoxError, DecodeError, EmptyFieldError, FieldError, MultiError};
use super::record::{LayoutCache, Lookup, RecordType};
use crate::primitives::pool::Recycle;
use crate::primitives::values::{FileHeader, Files, Values};

/// The largest sequence index a path may address, by default.
pub const DEFAULT_MAX_INDEX: usize = 16_000;

/// Populates records and maps from textual key value data.
///
/// Keys are dotted paths: record fields are named by their tag for the decoder's alias, with the
/// declared identifier as a fallback, sequences are addressed by decimal indices and the
/// remainder of a path below a map is the map key.
///
/// ```
/// use reqgate::primitives::values::Values;
/// use reqgate::schema::{Decoder, Fields, Record};
///
/// #[derive(Debug, Default)]
/// struct Login {
///     user: String,
///     remember: bool,
/// }
///
/// impl Record for Login {
///     fn describe(fields: &mut Fields<Self>) {
///         fields.field("User", |login| &mut login.user);
///         fields.field("Remember", |login| &mut login.remember).tag("schema", "remember_me");
///     }
/// }
///
/// let data: Values = vec![("user", "ferris"), ("remember_me", "on")]
///     .into_iter()
///     .map(|(key, value)| (key, value.to_string()))
///     .collect();
///
/// let mut login = Login::default();
/// Decoder::new().decode(&mut login, &data).unwrap();
/// assert_eq!(login.user, "ferris");
/// assert!(login.remember);
/// ```
#[derive(Clone)]
pub struct Decoder {
    alias_tag: String,
    ignore_unknown_keys: bool,
    zero_empty: bool,
    case_sensitive: bool,
    max_index: usize,
    converters: Arc<Converters>,
    cache: Arc<LayoutCache>,
    baseline: Arc<Baseline>,
}

/// The options a decoder returns to when it is recycled.
#[derive(Debug)]
struct Baseline {
    alias_tag: String,
    ignore_unknown_keys: bool,
    zero_empty: bool,
    case_sensitive: bool,
    max_index: usize,
    converters: Arc<Converters>,
}

impl Decoder {
    /// A decoder reading the `schema` alias, ignoring unknown keys and zeroing empty values.
    pub fn new() -> Self {
        Decoder::with_cache("schema", Arc::new(Converters::new()), Arc::new(LayoutCache::new()))
    }

    pub(crate) fn with_cache(alias_tag: &str, converters: Arc<Converters>, cache: Arc<LayoutCache>) -> Self {
        let baseline = Baseline {
            alias_tag: alias_tag.to_owned(),
            ignore_unknown_keys: true,
            zero_empty: true,
            case_sensitive: false,
            max_index: DEFAULT_MAX_INDEX,
            converters: Arc::clone(&converters),
        };

        Decoder {
            alias_tag: alias_tag.to_owned(),
            ignore_unknown_keys: true,
            zero_empty: true,
            case_sensitive: false,
            max_index: DEFAULT_MAX_INDEX,
            converters,
            cache,
            baseline: Arc::new(baseline),
        }
    }

    /// Make the current options the ones restored on [`recycle`](Recycle::recycle).
    pub(crate) fn seal(&mut self) {
        self.baseline = Arc::new(Baseline {
            alias_tag: self.alias_tag.clone(),
            ignore_unknown_keys: self.ignore_unknown_keys,
            zero_empty: self.zero_empty,
            case_sensitive: self.case_sensitive,
            max_index: self.max_index,
            converters: Arc::clone(&self.converters),
        });
    }

    /// Switch the tag key consulted for field names.
    pub fn set_alias_tag(&mut self, alias_tag: &str) {
        if self.alias_tag != alias_tag {
            self.alias_tag = alias_tag.to_owned();
        }
    }

    pub fn alias_tag(&self) -> &str {
        &self.alias_tag
    }

    /// Whether keys without a target field are skipped instead of reported.
    pub fn ignore_unknown_keys(&mut self, ignore: bool) {
        self.ignore_unknown_keys = ignore;
    }

    /// Whether empty values reset their target to its zero value instead of being skipped.
    pub fn zero_empty(&mut self, zero: bool) {
        self.zero_empty = zero;
    }

    /// Whether field names must match the key exactly.
    pub fn match_case_sensitive(&mut self, sensitive: bool) {
        self.case_sensitive = sensitive;
    }

    /// Limit the sequence indices a path may address.
    pub fn set_max_index(&mut self, max_index: usize) {
        self.max_index = max_index;
    }

    /// Register a conversion for `T`, taking precedence over the builtin one.
    pub fn register_converter<T, F, E>(&mut self, convert: F)
    where
        T: Any,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Arc::make_mut(&mut self.converters).register(convert);
    }

    /// Decode the values into a record or a text keyed map.
    pub fn decode<T: Decode>(&self, out: &mut T, src: &Values) -> Result<(), DecodeError> {
        self.decode_with_files(out, src, &Files::new())
    }

    /// Decode the values and the uploaded files into a record or a text keyed map.
    ///
    /// Input-shape failures abort before anything is written. Field failures are collected and
    /// returned together after every key was tried.
    pub fn decode_with_files<T: Decode>(&self, out: &mut T, src: &Values, files: &Files) -> Result<(), DecodeError> {
        let ty = match T::shape() {
            Shape::Map(_) => return self.decode_map(out, src),
            Shape::Record(ty) => ty,
            _ => return Err(DecodeError::InvalidTarget(std::any::type_name::<T>())),
        };

        let mut errors = MultiError::new();
        for (path, values) in src.iter() {
            let result = self
                .check_path(T::shape(), path)
                .and_then(|()| self.resolve(&mut *out, path))
                .and_then(|slot| self.assign_text(slot, path, values));
            self.collect(&mut errors, path, result);
        }

        for (path, uploads) in files.iter() {
            let result = self
                .check_path(T::shape(), path)
                .and_then(|()| self.resolve(&mut *out, path))
                .and_then(|slot| self.assign_files(slot, path, uploads));
            self.collect(&mut errors, path, result);
        }

        self.check_required(ty, "", src, files, &mut errors);
        errors.into_result()
    }

    /// Whether `key` addresses a sequence in `T`, or `T` is a map.
    ///
    /// Binders consult this before splitting a comma separated value.
    pub fn is_sequence_field<T: Decode>(&self, key: &str) -> bool {
        let mut shape = T::shape();
        if let Shape::Map(_) = shape {
            return true;
        }

        for segment in key.split('.') {
            shape = match shape.strip_optional() {
                Shape::Record(ty) => {
                    let layout = self.cache.get(ty);
                    match layout.lookup(segment, &self.alias_tag, !self.case_sensitive) {
                        Lookup::Found(flat) => flat.meta.shape,
                        _ => return false,
                    }
                }
                Shape::Sequence(element) if segment.parse::<usize>().is_ok() => element(),
                Shape::Map(value) => return matches!(value().strip_optional(), Shape::Sequence(_)),
                _ => return false,
            };
        }

        matches!(shape.strip_optional(), Shape::Sequence(_))
    }

    fn collect(&self, errors: &mut MultiError, path: &str, result: Result<(), FieldError>) {
        match result {
            Ok(()) => {}
            Err(FieldError::UnknownKey(_)) if self.ignore_unknown_keys => {
                trace!("schema: skipping unknown key {:?}", path);
            }
            Err(err) => errors.insert(path, err),
        }
    }

    fn decode_map(&self, out: &mut dyn Decode, src: &Values) -> Result<(), DecodeError> {
        let map = out.as_map().ok_or(DecodeError::MapNotConvertable)?;
        let value_type = map.value_type();

        if value_type == TypeId::of::<String>() {
            for (key, values) in src.iter() {
                if let Some(slot) = map.slot(key).as_any_mut().downcast_mut::<String>() {
                    *slot = values.last().cloned().unwrap_or_default();
                }
            }
        } else if value_type == TypeId::of::<Vec<String>>() {
            for (key, values) in src.iter() {
                if let Some(slot) = map.slot(key).as_any_mut().downcast_mut::<Vec<String>>() {
                    *slot = values.to_vec();
                }
            }
        } else {
            return Err(DecodeError::MapNotConvertable);
        }

        Ok(())
    }

    /// Walk a path through the static structure of the target without touching a value.
    ///
    /// Resolving allocates optionals and grows sequences on the way down, so a path is only
    /// resolved once it is known to end in a field.
    fn check_path(&self, mut shape: Shape, path: &str) -> Result<(), FieldError> {
        let unknown = || FieldError::unknown(path);
        let mut segments = path.split('.').peekable();

        while let Some(&segment) = segments.peek() {
            shape = match shape {
                Shape::Optional(inner) => inner(),
                Shape::Record(ty) => {
                    segments.next();
                    let layout = self.cache.get(ty);
                    match layout.lookup(segment, &self.alias_tag, !self.case_sensitive) {
                        Lookup::Found(flat) => flat.meta.shape,
                        Lookup::Ambiguous => {
                            debug!("schema: {:?} is ambiguous in {}", segment, ty.name());
                            return Err(unknown());
                        }
                        Lookup::Unknown => return Err(unknown()),
                    }
                }
                Shape::Sequence(element) => {
                    segments.next();
                    let index: usize = segment.parse().map_err(|_| unknown())?;
                    if index >= self.max_index {
                        return Err(FieldError::IndexLimit {
                            key: path.to_owned(),
                            index,
                            limit: self.max_index,
                        });
                    }
                    element()
                }
                Shape::Map(_) => return Ok(()),
                Shape::Scalar | Shape::File => return Err(unknown()),
            };
        }

        Ok(())
    }

    /// Walk a checked path down to the slot it addresses.
    fn resolve<'a>(&self, root: &'a mut dyn Decode, path: &str) -> Result<&'a mut dyn Decode, FieldError> {
        let unknown = || FieldError::unknown(path);
        let segments: Vec<&str> = path.split('.').collect();
        let mut rest = segments.as_slice();
        let mut slot = root;

        while let Some((head, tail)) = rest.split_first() {
            slot = match slot.kind() {
                Kind::Optional => slot.pointee().ok_or_else(unknown)?,
                Kind::Record => {
                    let (record, ty) = slot.as_record().ok_or_else(unknown)?;
                    rest = tail;
                    self.field(record, ty, head).ok_or_else(unknown)?
                }
                Kind::Sequence => {
                    let index: usize = head.parse().map_err(|_| unknown())?;
                    rest = tail;
                    slot.as_sequence().ok_or_else(unknown)?.element(index)
                }
                Kind::Map => {
                    let key = rest.join(".");
                    let map = slot.as_map().ok_or_else(unknown)?;
                    return Ok(map.slot(&key));
                }
                Kind::Scalar | Kind::File => return Err(unknown()),
            };
        }

        Ok(slot)
    }

    fn field<'a>(&self, record: &'a mut dyn Any, ty: RecordType, name: &str) -> Option<&'a mut dyn Decode> {
        let layout = self.cache.get(ty);
        let route = match layout.lookup(name, &self.alias_tag, !self.case_sensitive) {
            Lookup::Found(flat) => flat.route.clone(),
            Lookup::Ambiguous => {
                debug!("schema: {:?} is ambiguous in {}", name, ty.name());
                return None;
            }
            Lookup::Unknown => return None,
        };

        self.cache.field(record, ty, &route)
    }

    fn assign_text(&self, slot: &mut dyn Decode, path: &str, values: &[String]) -> Result<(), FieldError> {
        let type_name = slot.type_name();

        if !self.converters.contains(slot.value_type_id()) {
            match slot.kind() {
                Kind::Sequence => return self.assign_sequence(slot, path, values),
                Kind::Optional => {
                    if values.iter().all(String::is_empty) {
                        if self.zero_empty {
                            slot.clear_value();
                        }
                        return Ok(());
                    }

                    return match slot.pointee() {
                        Some(inner) => self.assign_text(inner, path, values),
                        None => Err(FieldError::conversion(path, type_name, None, "optional without a value".into())),
                    };
                }
                _ => {}
            }
        }

        let text = values.last().map(String::as_str).unwrap_or_default();
        if text.is_empty() {
            if self.zero_empty {
                slot.clear_value();
            }
            return Ok(());
        }

        self.convert(slot, text)
            .map_err(|source| FieldError::conversion(path, type_name, None, source))
    }

    fn assign_sequence(&self, slot: &mut dyn Decode, path: &str, values: &[String]) -> Result<(), FieldError> {
        let type_name = slot.type_name();
        let seq = match slot.as_sequence() {
            Some(seq) => seq,
            None => return Err(FieldError::conversion(path, type_name, None, "not a sequence".into())),
        };

        if values.iter().all(String::is_empty) {
            if self.zero_empty {
                seq.truncate_to(0);
            }
            return Ok(());
        }

        seq.truncate_to(0);
        for (index, value) in values.iter().enumerate() {
            if value.is_empty() {
                if self.zero_empty {
                    seq.push_default();
                }
                continue;
            }

            let mark = seq.length();
            if let Err(source) = self.convert(seq.push_default(), value) {
                seq.truncate_to(mark);
                if value.contains(',') && self.split_into(seq, value).is_ok() {
                    continue;
                }

                return Err(FieldError::conversion(path, seq.element_type_name(), Some(index), source));
            }
        }

        Ok(())
    }

    /// Convert every comma separated piece into its own element.
    ///
    /// Pieces are converted as they are. An empty piece becomes a zero element when empty
    /// values are zeroed and is skipped otherwise.
    fn split_into(&self, seq: &mut dyn Sequence, value: &str) -> Result<(), BoxError> {
        let mark = seq.length();
        for piece in value.split(',') {
            if piece.is_empty() {
                if self.zero_empty {
                    seq.push_default();
                }
                continue;
            }

            if let Err(err) = self.convert(seq.push_default(), piece) {
                seq.truncate_to(mark);
                return Err(err);
            }
        }

        debug!("schema: split {:?} into {} elements", value, seq.length() - mark);
        Ok(())
    }

    /// Convert one textual value, preferring registered converters.
    fn convert(&self, slot: &mut dyn Decode, text: &str) -> Result<(), BoxError> {
        if let Some(convert) = self.converters.get(slot.value_type_id()) {
            return convert(text, slot.as_any_mut());
        }

        match slot.kind() {
            Kind::Optional => match slot.pointee() {
                Some(inner) => self.convert(inner, text),
                None => Err("optional without a value".into()),
            },
            _ => slot.set_text(text),
        }
    }

    fn assign_files(&self, slot: &mut dyn Decode, path: &str, files: &[FileHeader]) -> Result<(), FieldError> {
        let type_name = slot.type_name();
        let not_a_file = || FieldError::conversion(path, type_name, None, "field cannot hold an uploaded file".into());

        match slot.kind() {
            Kind::File => {
                match files.last() {
                    Some(file) => {
                        slot.set_file(file);
                    }
                    None if self.zero_empty => slot.clear_value(),
                    None => {}
                }
                Ok(())
            }
            Kind::Optional => {
                if files.is_empty() {
                    if self.zero_empty {
                        slot.clear_value();
                    }
                    return Ok(());
                }
                let inner = slot.pointee().ok_or_else(not_a_file)?;
                self.assign_files(inner, path, files)
            }
            Kind::Sequence => {
                let seq = slot.as_sequence().ok_or_else(not_a_file)?;
                seq.truncate_to(0);
                for file in files {
                    let result = self.assign_files(seq.push_default(), path, std::slice::from_ref(file));
                    if let Err(err) = result {
                        seq.truncate_to(0);
                        return Err(err);
                    }
                }
                Ok(())
            }
            _ => Err(not_a_file()),
        }
    }

    /// Report required fields without a value, recursing into nested records.
    fn check_required(&self, ty: RecordType, prefix: &str, src: &Values, files: &Files, errors: &mut MultiError) {
        let layout = self.cache.get(ty);
        for flat in layout.flat() {
            if flat.meta.embedded {
                continue;
            }

            let name = match flat.meta.name_for(&self.alias_tag) {
                Some(name) => name,
                None => continue,
            };

            let path = format!("{}{}", prefix, name);
            let missing = self.is_missing(&path, src, files);
            if missing && flat.meta.required_for(&self.alias_tag) {
                errors.insert(path.clone(), EmptyFieldError { key: path.clone() }.into());
            }

            match flat.meta.shape {
                Shape::Record(inner) => self.check_required(inner, &format!("{}.", path), src, files, errors),
                Shape::Optional(_) if !missing => {
                    if let Shape::Record(inner) = flat.meta.shape.strip_optional() {
                        self.check_required(inner, &format!("{}.", path), src, files, errors);
                    }
                }
                _ => {}
            }
        }
    }

    /// Whether neither the path nor anything below it carries a non-empty value.
    fn is_missing(&self, path: &str, src: &Values, files: &Files) -> bool {
        let matches = |key: &str| {
            if self.case_sensitive {
                key == path
            } else {
                key.eq_ignore_ascii_case(path)
            }
        };
        let below = |key: &str| key.len() > path.len() && key.as_bytes()[path.len()] == b'.' && matches(&key[..path.len()]);

        let has_value = src
            .iter()
            .any(|(key, values)| (matches(key) || below(key)) && values.iter().any(|value| !value.is_empty()));
        let has_file = files
            .iter()
            .any(|(key, uploads)| (matches(key) || below(key)) && !uploads.is_empty());

        !has_value && !has_file
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl Recycle for Decoder {
    fn recycle(&mut self) {
        let baseline = Arc::clone(&self.baseline);
        self.set_alias_tag(&baseline.alias_tag);
        self.ignore_unknown_keys = baseline.ignore_unknown_keys;
        self.zero_empty = baseline.zero_empty;
        self.case_sensitive = baseline.case_sensitive;
        self.max_index = baseline.max_index;
        if !Arc::ptr_eq(&self.converters, &baseline.converters) {
            self.converters = Arc::clone(&baseline.converters);
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("alias_tag", &self.alias_tag)
            .field("ignore_unknown_keys", &self.ignore_unknown_keys)
            .field("zero_empty", &self.zero_empty)
            .field("case_sensitive", &self.case_sensitive)
            .field("converters", &self.converters)
            .finish()
    }
}

//! Field tables of user records.
//!
//! A record describes its fields once, with accessors and per-alias tags. The description is
//! flattened into a [`Layout`] that is cached per type and shared by every decoder of a registry.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use super::decode::{Decode, Kind, Shape};

/// A user type with named fields.
///
/// ```
/// use reqgate::schema::{Fields, Record};
///
/// #[derive(Debug, Default)]
/// struct Post {
///     title: String,
/// }
///
/// #[derive(Debug, Default)]
/// struct Query {
///     name: String,
///     posts: Vec<Post>,
/// }
///
/// impl Record for Post {
///     fn describe(fields: &mut Fields<Self>) {
///         fields.field("Title", |post| &mut post.title).tag("query", "title");
///     }
/// }
///
/// impl Record for Query {
///     fn describe(fields: &mut Fields<Self>) {
///         fields.field("Name", |query| &mut query.name).tag("query", "name,required");
///         fields.field("Posts", |query| &mut query.posts).tag("query", "posts");
///     }
/// }
/// ```
pub trait Record: Default + Send + 'static {
    /// Declare every decodable field.
    fn describe(fields: &mut Fields<Self>);
}

/// Identity and layout constructor of a record type.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
    layout: fn() -> Layout,
}

/// Collects the field declarations of one record.
pub struct Fields<S> {
    defs: Vec<FieldDef>,
    _record: PhantomData<fn(&mut S)>,
}

/// Adds tags and options to the field just declared.
pub struct FieldBuilder<'a> {
    meta: &'a mut FieldMeta,
}

#[derive(Clone, Debug)]
pub(crate) struct Tag {
    alias: &'static str,
    name: &'static str,
    required: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct FieldMeta {
    pub(crate) ident: &'static str,
    pub(crate) tags: Vec<Tag>,
    pub(crate) required: bool,
    pub(crate) embedded: bool,
    pub(crate) shape: Shape,
}

trait Access: Send + Sync {
    fn get<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Decode>;
}

struct FieldAccess<S, T> {
    access: fn(&mut S) -> &mut T,
}

pub(crate) struct FieldDef {
    pub(crate) meta: FieldMeta,
    access: Box<dyn Access>,
}

/// A field reachable from the top of a record, possibly through embedded records.
#[derive(Debug)]
pub(crate) struct FlatField {
    /// Field indices from the outer record down to the field.
    pub(crate) route: Vec<usize>,
    /// Number of embeddings crossed.
    pub(crate) depth: usize,
    pub(crate) meta: FieldMeta,
}

/// The flattened field table of a record type.
pub struct Layout {
    fields: Vec<FieldDef>,
    flat: Vec<FlatField>,
}

pub(crate) enum Lookup<'a> {
    Found(&'a FlatField),
    Ambiguous,
    Unknown,
}

/// Record layouts by type, built on first use.
#[derive(Default)]
pub struct LayoutCache {
    layouts: RwLock<HashMap<TypeId, Arc<Layout>>>,
}

impl<T: Record> Decode for T {
    fn shape() -> Shape {
        Shape::Record(RecordType::of::<T>())
    }

    fn kind(&self) -> Kind {
        Kind::Record
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clear_value(&mut self) {
        *self = T::default();
    }

    fn as_record(&mut self) -> Option<(&mut dyn Any, RecordType)> {
        let record: &mut dyn Any = self;
        Some((record, RecordType::of::<T>()))
    }
}

impl RecordType {
    pub fn of<T: Record>() -> Self {
        RecordType {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            layout: Layout::of::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

impl<S: Record> Fields<S> {
    fn new() -> Self {
        Fields {
            defs: Vec::new(),
            _record: PhantomData,
        }
    }

    /// Declare a field, named `ident` unless an alias tag renames it.
    pub fn field<T: Decode>(&mut self, ident: &'static str, access: fn(&mut S) -> &mut T) -> FieldBuilder<'_> {
        self.push(ident, access, false)
    }

    /// Declare an embedded record whose fields are addressable as if they were declared here.
    ///
    /// The record stays addressable under its own name as well.
    pub fn embed<T: Record>(&mut self, ident: &'static str, access: fn(&mut S) -> &mut T) -> FieldBuilder<'_> {
        self.push(ident, access, true)
    }

    fn push<T: Decode>(&mut self, ident: &'static str, access: fn(&mut S) -> &mut T, embedded: bool) -> FieldBuilder<'_> {
        self.defs.push(FieldDef {
            meta: FieldMeta {
                ident,
                tags: Vec::new(),
                required: false,
                embedded,
                shape: T::shape(),
            },
            access: Box::new(FieldAccess { access }),
        });

        let last = self.defs.len() - 1;
        FieldBuilder {
            meta: &mut self.defs[last].meta,
        }
    }
}

impl FieldBuilder<'_> {
    /// Name the field for one alias.
    ///
    /// The tag value is a name optionally followed by `,required`. An empty name keeps the
    /// field's identifier and `-` hides the field from the alias.
    pub fn tag(self, alias: &'static str, value: &'static str) -> Self {
        let mut options = value.split(',');
        let name = options.next().unwrap_or_default();
        let required = options.any(|option| option == "required");
        self.meta.tags.retain(|tag| tag.alias != alias);
        self.meta.tags.push(Tag { alias, name, required });
        self
    }

    /// Require a non-empty value under every alias.
    pub fn required(self) -> Self {
        self.meta.required = true;
        self
    }
}

impl FieldMeta {
    /// The name of the field for an alias, none if the alias hides it.
    pub(crate) fn name_for(&self, alias: &str) -> Option<&'static str> {
        match self.tags.iter().find(|tag| tag.alias == alias) {
            Some(tag) if tag.name == "-" => None,
            Some(tag) if !tag.name.is_empty() => Some(tag.name),
            _ => Some(self.ident),
        }
    }

    pub(crate) fn required_for(&self, alias: &str) -> bool {
        self.required
            || self
                .tags
                .iter()
                .any(|tag| tag.alias == alias && tag.required)
    }
}

impl<S: 'static, T: Decode> Access for FieldAccess<S, T> {
    fn get<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Decode> {
        let record = record.downcast_mut::<S>()?;
        let field: &mut dyn Decode = (self.access)(record);
        Some(field)
    }
}

impl Layout {
    fn of<T: Record>() -> Layout {
        let mut fields = Fields::<T>::new();
        T::describe(&mut fields);

        let mut flat = Vec::new();
        let metas: Vec<FieldMeta> = fields.defs.iter().map(|def| def.meta.clone()).collect();
        flatten(&metas, &mut Vec::new(), 0, &mut flat);

        Layout {
            fields: fields.defs,
            flat,
        }
    }

    /// Declared fields, without flattening.
    pub(crate) fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Every addressable field, embedded ones included.
    pub(crate) fn flat(&self) -> &[FlatField] {
        &self.flat
    }

    /// Resolve a field name for an alias.
    ///
    /// Exact matches win over case-folded ones and shallower fields shadow deeper ones. Two
    /// candidates at the same depth are ambiguous.
    pub(crate) fn lookup(&self, key: &str, alias: &str, fold_case: bool) -> Lookup<'_> {
        for folded in [false, true] {
            if folded && !fold_case {
                break;
            }

            let mut best: Option<&FlatField> = None;
            let mut tied = false;
            for flat in &self.flat {
                let matched = match flat.meta.name_for(alias) {
                    Some(name) if folded => name.eq_ignore_ascii_case(key),
                    Some(name) => name == key,
                    None => false,
                };

                if !matched {
                    continue;
                }

                match best {
                    Some(current) if flat.depth > current.depth => {}
                    Some(current) if flat.depth == current.depth => tied = true,
                    _ => {
                        best = Some(flat);
                        tied = false;
                    }
                }
            }

            match best {
                Some(_) if tied => return Lookup::Ambiguous,
                Some(found) => return Lookup::Found(found),
                None => {}
            }
        }

        Lookup::Unknown
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Layout").field("flat", &self.flat).finish()
    }
}

fn flatten(metas: &[FieldMeta], route: &mut Vec<usize>, depth: usize, out: &mut Vec<FlatField>) {
    for (index, meta) in metas.iter().enumerate() {
        route.push(index);
        out.push(FlatField {
            route: route.clone(),
            depth,
            meta: meta.clone(),
        });

        if let (true, Shape::Record(inner)) = (meta.embedded, meta.shape) {
            let inner = (inner.layout)();
            let metas: Vec<FieldMeta> = inner.fields.iter().map(|def| def.meta.clone()).collect();
            flatten(&metas, route, depth + 1, out);
        }

        route.pop();
    }
}

impl LayoutCache {
    pub fn new() -> Self {
        LayoutCache::default()
    }

    /// The layout of a record type, built under the write lock on first use.
    pub fn get(&self, record: RecordType) -> Arc<Layout> {
        let cached = self
            .layouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record.id)
            .cloned();

        if let Some(layout) = cached {
            return layout;
        }

        let mut layouts = self.layouts.write().unwrap_or_else(PoisonError::into_inner);
        layouts
            .entry(record.id)
            .or_insert_with(|| Arc::new((record.layout)()))
            .clone()
    }

    /// Follow a route from a record down to one of its fields.
    pub(crate) fn field<'a>(
        &self, mut record: &'a mut dyn Any, mut ty: RecordType, route: &[usize],
    ) -> Option<&'a mut dyn Decode> {
        let (last, hops) = route.split_last()?;
        for &hop in hops {
            let layout = self.get(ty);
            let slot = layout.fields.get(hop)?.access.get(record)?;
            let (inner, inner_ty) = slot.as_record()?;
            record = inner;
            ty = inner_ty;
        }

        let layout = self.get(ty);
        let field = layout.fields.get(*last)?;
        field.access.get(record)
    }

    pub fn len(&self) -> usize {
        self.layouts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LayoutCache").field("types", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Base {
        id: u32,
        name: String,
    }

    #[derive(Debug, Default)]
    struct Extra {
        name: String,
    }

    #[derive(Debug, Default)]
    struct Outer {
        base: Base,
        extra: Extra,
        title: String,
        secret: String,
    }

    impl Record for Base {
        fn describe(fields: &mut Fields<Self>) {
            fields.field("ID", |base| &mut base.id).tag("query", "id");
            fields.field("Name", |base| &mut base.name);
        }
    }

    impl Record for Extra {
        fn describe(fields: &mut Fields<Self>) {
            fields.field("Name", |extra| &mut extra.name);
        }
    }

    impl Record for Outer {
        fn describe(fields: &mut Fields<Self>) {
            fields.embed("Base", |outer| &mut outer.base);
            fields.embed("Extra", |outer| &mut outer.extra);
            fields.field("Title", |outer| &mut outer.title).tag("query", "title,required");
            fields.field("Secret", |outer| &mut outer.secret).tag("query", "-");
        }
    }

    fn found_route(layout: &Layout, key: &str, alias: &str) -> Option<Vec<usize>> {
        match layout.lookup(key, alias, true) {
            Lookup::Found(flat) => Some(flat.route.clone()),
            _ => None,
        }
    }

    #[test]
    fn embedded_fields_are_flattened() {
        let layout = Layout::of::<Outer>();
        assert_eq!(found_route(&layout, "id", "query"), Some(vec![0, 0]));
        assert_eq!(found_route(&layout, "ID", "form"), Some(vec![0, 0]));
        assert_eq!(found_route(&layout, "extra", "query"), Some(vec![1]));
        assert_eq!(found_route(&layout, "TITLE", "query"), Some(vec![2]));
    }

    #[test]
    fn same_depth_names_are_ambiguous() {
        let layout = Layout::of::<Outer>();
        assert!(matches!(layout.lookup("name", "query", true), Lookup::Ambiguous));
    }

    #[test]
    fn dash_hides_field_per_alias() {
        let layout = Layout::of::<Outer>();
        assert!(matches!(layout.lookup("secret", "query", true), Lookup::Unknown));
        assert_eq!(found_route(&layout, "secret", "form"), Some(vec![3]));
    }

    #[test]
    fn case_sensitive_lookup() {
        let layout = Layout::of::<Outer>();
        assert!(matches!(layout.lookup("TITLE", "query", false), Lookup::Unknown));
        assert_eq!(found_route(&layout, "title", "query"), Some(vec![2]));
    }

    #[test]
    fn required_is_per_alias() {
        let layout = Layout::of::<Outer>();
        let title = &layout.fields()[2].meta;
        assert!(title.required_for("query"));
        assert!(!title.required_for("form"));
    }

    #[test]
    fn cache_follows_routes() {
        let cache = LayoutCache::new();
        let mut outer = Outer::default();
        let slot = cache
            .field(&mut outer, RecordType::of::<Outer>(), &[0, 0])
            .unwrap();
        slot.set_text("7").unwrap();
        assert_eq!(outer.base.id, 7);
        assert_eq!(cache.len(), 2);
    }
}

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use once_cell::sync::Lazy;

use super::convert::Converters;
use super::decode::Decode;
use super::decoder::Decoder;
use super::error::{BoxError, DecodeError};
use super::record::LayoutCache;
use crate::primitives::pool::{Pool, Pooled};
use crate::primitives::values::{Files, Values};

/// Idle decoders retained per alias.
const POOL_CAPACITY: usize = 64;

/// Options applied to every decoder handed out by a [`Registry`].
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Read this tag key instead of the binder's own alias.
    pub alias_tag: Option<String>,

    /// Custom conversions by target type.
    pub converters: Converters,

    pub ignore_unknown_keys: bool,

    pub zero_empty: bool,

    pub match_case_sensitive: bool,
}

/// Pools of prepared decoders, one per alias, sharing a record layout cache.
///
/// Configuration is a startup operation: [`configure`](Registry::configure) replaces the pools,
/// decoders already leased keep their previous options until they are returned.
pub struct Registry {
    config: RwLock<Arc<ParserConfig>>,
    pools: RwLock<HashMap<String, Arc<Pool<Decoder>>>>,
    cache: Arc<LayoutCache>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            alias_tag: None,
            converters: Converters::new(),
            ignore_unknown_keys: true,
            zero_empty: true,
            match_case_sensitive: false,
        }
    }
}

impl ParserConfig {
    pub fn alias_tag(mut self, alias_tag: impl Into<String>) -> Self {
        self.alias_tag = Some(alias_tag.into());
        self
    }

    /// Register a conversion for `T`.
    pub fn converter<T, F, E>(mut self, convert: F) -> Self
    where
        T: Any,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.converters.register(convert);
        self
    }

    pub fn ignore_unknown_keys(mut self, ignore: bool) -> Self {
        self.ignore_unknown_keys = ignore;
        self
    }

    pub fn zero_empty(mut self, zero: bool) -> Self {
        self.zero_empty = zero;
        self
    }

    pub fn match_case_sensitive(mut self, sensitive: bool) -> Self {
        self.match_case_sensitive = sensitive;
        self
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Registry {
            config: RwLock::new(Arc::new(config)),
            pools: RwLock::new(HashMap::new()),
            cache: Arc::new(LayoutCache::new()),
        }
    }

    /// The process wide registry used when no other one is given.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Replace the options of every decoder handed out from now on.
    pub fn configure(&self, config: ParserConfig) {
        debug!("schema: reconfiguring decoder registry: {:?}", config);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        self.pools.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn config(&self) -> Arc<ParserConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Lease a decoder for an alias.
    pub fn decoder(&self, alias: &str) -> Pooled<Decoder> {
        self.pool(alias).get()
    }

    /// Decode with a leased decoder.
    pub fn decode<T: Decode>(&self, alias: &str, out: &mut T, src: &Values) -> Result<(), DecodeError> {
        self.decoder(alias).decode(out, src)
    }

    /// Decode values and files with a leased decoder.
    pub fn decode_with_files<T: Decode>(
        &self, alias: &str, out: &mut T, src: &Values, files: &Files,
    ) -> Result<(), DecodeError> {
        self.decoder(alias).decode_with_files(out, src, files)
    }

    fn pool(&self, alias: &str) -> Arc<Pool<Decoder>> {
        let existing = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .cloned();

        if let Some(pool) = existing {
            return pool;
        }

        let config = self.config();
        let cache = Arc::clone(&self.cache);
        let converters = Arc::new(config.converters.clone());
        let alias_tag = config.alias_tag.clone().unwrap_or_else(|| alias.to_owned());

        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        pools
            .entry(alias.to_owned())
            .or_insert_with(|| {
                Arc::new(Pool::new(POOL_CAPACITY, move || {
                    let mut decoder = Decoder::with_cache(&alias_tag, Arc::clone(&converters), Arc::clone(&cache));
                    decoder.ignore_unknown_keys(config.ignore_unknown_keys);
                    decoder.zero_empty(config.zero_empty);
                    decoder.match_case_sensitive(config.match_case_sensitive);
                    decoder.seal();
                    decoder
                }))
            })
            .clone()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Registry")
            .field("config", &self.config())
            .field("aliases", &pools.keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Fields, Record};

    #[derive(Debug, Default)]
    struct Flags {
        level: u8,
    }

    impl Record for Flags {
        fn describe(fields: &mut Fields<Self>) {
            fields.field("Level", |f| &mut f.level).tag("query", "lvl");
        }
    }

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs.iter().map(|&(key, value)| (key, value.to_owned())).collect()
    }

    #[test]
    fn decoders_read_their_alias() {
        let registry = Registry::new();
        assert_eq!(registry.decoder("query").alias_tag(), "query");

        let mut flags = Flags::default();
        registry.decode("query", &mut flags, &values(&[("lvl", "3")])).unwrap();
        assert_eq!(flags.level, 3);
    }

    #[test]
    fn decoders_return_to_their_pool() {
        let registry = Registry::new();
        drop(registry.decoder("form"));
        let pool = registry.pool("form");
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn lease_changes_are_undone_on_return() {
        let registry = Registry::with_config(ParserConfig::default().ignore_unknown_keys(false));
        {
            let mut decoder = registry.decoder("query");
            decoder.ignore_unknown_keys(true);
            decoder.set_alias_tag("other");
            decoder.register_converter(|_: &str| -> Result<u8, BoxError> { Ok(0) });
        }
        assert_eq!(registry.pool("query").idle(), 1);

        let decoder = registry.decoder("query");
        assert_eq!(decoder.alias_tag(), "query");

        let mut flags = Flags::default();
        let err = decoder
            .decode(&mut flags, &values(&[("lvl", "3"), ("nope", "1")]))
            .unwrap_err();
        assert!(err.fields().unwrap().get("nope").unwrap().is_unknown_key());
        assert_eq!(flags.level, 3);
    }

    #[test]
    fn configure_applies_to_new_leases() {
        let registry = Registry::new();
        registry.configure(
            ParserConfig::default()
                .converter(|text: &str| -> Result<u8, BoxError> { Ok(text.len() as u8) })
                .ignore_unknown_keys(false),
        );

        let mut flags = Flags::default();
        registry.decode("query", &mut flags, &values(&[("lvl", "abcd")])).unwrap();
        assert_eq!(flags.level, 4);

        let err = registry
            .decode("query", &mut flags, &values(&[("nope", "1")]))
            .unwrap_err();
        assert!(err.fields().unwrap().get("nope").unwrap().is_unknown_key());
    }

    #[test]
    fn alias_override_replaces_binder_alias() {
        let registry = Registry::with_config(ParserConfig::default().alias_tag("query"));
        let mut flags = Flags::default();
        registry.decode("form", &mut flags, &values(&[("lvl", "5")])).unwrap();
        assert_eq!(flags.level, 5);
    }
}

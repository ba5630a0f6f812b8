//! Configuration for the view engine

use crate::error::Result;
use crate::registry::{Extension, Filter, Function, Registration};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

/// Default logical location of the compiled template cache
pub const DEFAULT_CACHE_PATH: &str = "/storage/views";

/// Configuration for the view engine.
///
/// Every option starts at its default; setting an option replaces the
/// default for that option as a whole (lists are not merged). When loaded
/// from a document, unknown keys are ignored.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Logical path of the compiled template cache, resolved through a
    /// [`PathResolver`](crate::PathResolver)
    pub cache_path: PathBuf,

    /// Directories searched, in order, for bare template names
    pub file_paths: Vec<PathBuf>,

    /// Namespace aliases (`@alias/name`) and their directories
    #[serde(deserialize_with = "ordered_pairs")]
    pub namespaces: Vec<(String, PathBuf)>,

    /// Extensions registered into the environment
    #[serde(skip)]
    pub extensions: Vec<Arc<dyn Extension>>,

    /// Filter entries keyed by name
    #[serde(skip)]
    pub filters: Vec<(String, Registration<Filter>)>,

    /// Function entries keyed by name
    #[serde(skip)]
    pub functions: Vec<(String, Registration<Function>)>,

    /// Values available to every template
    #[serde(deserialize_with = "ordered_pairs")]
    pub globals: Vec<(String, serde_json::Value)>,

    /// HTML-escape template output (default: true)
    pub autoescape: bool,

    /// Treat undefined variables as errors (default: false)
    pub strict: bool,
}

impl ViewConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            file_paths: Vec::new(),
            namespaces: Vec::new(),
            extensions: Vec::new(),
            filters: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            autoescape: true,
            strict: false,
        }
    }

    /// Load the serializable options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load the serializable options from a JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Set the cache path
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Replace the template search paths
    pub fn with_file_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.file_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Append a template search path
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Add a namespace alias
    pub fn with_namespace(mut self, alias: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.namespaces.push((alias.into(), path.into()));
        self
    }

    /// Add an extension
    pub fn with_extension<E: Extension + 'static>(mut self, extension: E) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Add a filter entry
    pub fn with_filter(
        mut self,
        name: impl Into<String>,
        entry: impl Into<Registration<Filter>>,
    ) -> Self {
        self.filters.push((name.into(), entry.into()));
        self
    }

    /// Add a function entry
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        entry: impl Into<Registration<Function>>,
    ) -> Self {
        self.functions.push((name.into(), entry.into()));
        self
    }

    /// Add a global value
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }

    /// Enable/disable HTML escaping
    pub fn with_autoescape(mut self, enable: bool) -> Self {
        self.autoescape = enable;
        self
    }

    /// Enable strict mode (error on undefined variables)
    pub fn with_strict(mut self, enable: bool) -> Self {
        self.strict = enable;
        self
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ViewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extensions: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        let filters: Vec<&str> = self.filters.iter().map(|(k, _)| k.as_str()).collect();
        let functions: Vec<&str> = self.functions.iter().map(|(k, _)| k.as_str()).collect();

        f.debug_struct("ViewConfig")
            .field("cache_path", &self.cache_path)
            .field("file_paths", &self.file_paths)
            .field("namespaces", &self.namespaces)
            .field("extensions", &extensions)
            .field("filters", &filters)
            .field("functions", &functions)
            .field("globals", &self.globals)
            .field("autoescape", &self.autoescape)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Deserialize a table into (key, value) pairs in document order
fn ordered_pairs<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of names to values")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                pairs.push(entry);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor(PhantomData))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Callable;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = ViewConfig::default();

        assert_eq!(config.cache_path, PathBuf::from("/storage/views"));
        assert!(config.file_paths.is_empty());
        assert!(config.namespaces.is_empty());
        assert!(config.extensions.is_empty());
        assert!(config.filters.is_empty());
        assert!(config.functions.is_empty());
        assert!(config.globals.is_empty());
        assert!(config.autoescape);
        assert!(!config.strict);
    }

    #[test]
    fn test_config_builder() {
        let config = ViewConfig::new()
            .with_cache_path("/tmp/views")
            .with_file_paths(["views", "shared"])
            .with_file_path("fallback")
            .with_namespace("@admin", "admin/views")
            .with_filter("shout", Callable::new(|args| Ok(args[0].clone())))
            .with_global("site", "Armature")
            .with_strict(true);

        assert_eq!(config.cache_path, PathBuf::from("/tmp/views"));
        assert_eq!(
            config.file_paths,
            vec![PathBuf::from("views"), PathBuf::from("shared"), PathBuf::from("fallback")]
        );
        assert_eq!(config.namespaces[0].0, "@admin");
        assert_eq!(config.filters.len(), 1);
        assert_eq!(config.globals[0], ("site".to_string(), json!("Armature")));
        assert!(config.strict);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = ViewConfig::from_json(json!({
            "use_cache": false,
            "cache_path": "/tmp",
            "view_path": "tests/views",
        }))
        .unwrap();

        assert_eq!(config.cache_path, PathBuf::from("/tmp"));
        assert!(config.file_paths.is_empty());
        assert!(config.autoescape);
    }

    #[test]
    fn test_from_toml() {
        let config = ViewConfig::from_toml_str(
            r#"
            file_paths = ["views", "shared"]
            strict = true

            [namespaces]
            "@admin" = "admin/views"
            mail = "mail/views"

            [globals]
            site = "Armature"
            year = 2025
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
        assert_eq!(config.file_paths.len(), 2);
        assert_eq!(config.namespaces.len(), 2);
        assert!(config.namespaces.iter().any(|(k, v)| k == "@admin" && v == &PathBuf::from("admin/views")));
        assert!(config.globals.contains(&("year".to_string(), json!(2025))));
        assert!(config.strict);
    }

    #[test]
    fn test_invalid_document() {
        let err = ViewConfig::from_toml_str("file_paths = 3").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}

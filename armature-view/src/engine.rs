//! View engine built on a MiniJinja environment

use crate::config::ViewConfig;
use crate::error::{Result, ViewError};
use crate::loader::FilesystemLoader;
use crate::paths::PathResolver;
use crate::registry::{self, Filter, Function};
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Renders templates from files and strings.
///
/// The environment, loader and every registered filter, function, global
/// and extension are fixed at construction. Clones share one environment,
/// including its cache of compiled templates.
///
/// # Error handling
///
/// [`View::render`] and [`View::template`] wrap every engine failure in
/// [`ViewError::RenderFailure`] (code `5050`). [`View::render_string`]
/// returns the engine's own [`minijinja::Error`] unwrapped.
#[derive(Clone)]
pub struct View {
    env: Arc<Environment<'static>>,
    loader: Arc<FilesystemLoader>,
    cache_path: PathBuf,
}

impl View {
    /// Create a view engine, resolving the cache path under the current
    /// working directory
    pub fn new(config: ViewConfig) -> Result<Self> {
        Self::with_resolver(config, &PathResolver::default())
    }

    /// Create a view engine with a custom path resolver
    pub fn with_resolver(config: ViewConfig, resolver: &PathResolver) -> Result<Self> {
        let ViewConfig {
            cache_path,
            file_paths,
            namespaces,
            extensions,
            filters,
            functions,
            globals,
            autoescape,
            strict,
        } = config;

        let mut loader = FilesystemLoader::new();
        for path in file_paths {
            loader.add_path(path)?;
        }
        for (alias, path) in namespaces {
            loader.add_namespace(&alias, path)?;
        }
        let loader = Arc::new(loader);

        let cache_path = resolver.resolve(&cache_path);
        prepare_cache_dir(&cache_path)?;

        let mut env = Environment::new();

        let source = loader.clone();
        env.set_loader(move |name| source.load(name));

        // Escape everything, including inline templates, not just .html files
        let escape = if autoescape {
            AutoEscape::Html
        } else {
            AutoEscape::None
        };
        env.set_auto_escape_callback(move |_| escape.clone());

        if strict {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        }

        for extension in &extensions {
            debug!(extension = extension.name(), "Registering extension");
            extension.register(&mut env);
        }

        let filter_count = registry::register_all::<Filter>(&mut env, filters);
        let function_count = registry::register_all::<Function>(&mut env, functions);

        for (name, value) in &globals {
            env.add_global(name.clone(), Value::from_serialize(value));
        }

        debug!(
            paths = ?loader.paths(),
            namespaces = ?loader.namespaces(),
            cache_path = %cache_path.display(),
            extensions = extensions.len(),
            filters = filter_count,
            functions = function_count,
            globals = globals.len(),
            "View engine initialized"
        );

        Ok(Self {
            env: Arc::new(env),
            loader,
            cache_path,
        })
    }

    /// Render a template from the search paths or a namespace
    pub fn render<S: Serialize>(&self, name: &str, data: S) -> Result<String> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(data))
            .map_err(|e| self.render_failure(name, e))
    }

    /// Render inline template source.
    ///
    /// Returns `Ok(None)` when the template produces no output. Errors are
    /// returned exactly as the engine reports them.
    pub fn render_string<S: Serialize>(
        &self,
        source: &str,
        data: S,
    ) -> std::result::Result<Option<String>, minijinja::Error> {
        let output = self.env.render_str(source, data)?;
        Ok(if output.is_empty() { None } else { Some(output) })
    }

    /// Alias of [`View::render`]
    pub fn template<S: Serialize>(&self, name: &str, data: S) -> Result<String> {
        self.render(name, data)
    }

    /// Check whether a template name resolves to a file
    pub fn exists(&self, name: &str) -> bool {
        self.loader.exists(name)
    }

    /// The template loader
    pub fn loader(&self) -> &FilesystemLoader {
        &self.loader
    }

    /// Resolved directory of the compiled template cache
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn render_failure(&self, requested: &str, err: minijinja::Error) -> ViewError {
        let name = err.name().unwrap_or(requested);
        let file = self
            .loader
            .find(name)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| name.to_string());
        let line = err.line().unwrap_or(0);

        warn!(template = %requested, file = %file, line, error = %err, "Template render failed");
        ViewError::render_failure(err, &file, line)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("loader", &self.loader)
            .field("cache_path", &self.cache_path)
            .finish_non_exhaustive()
    }
}

fn prepare_cache_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(ViewError::InvalidCachePath(path.to_path_buf()));
    }
    fs::create_dir_all(path)?;
    Ok(())
}

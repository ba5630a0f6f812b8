//! MiniJinja view rendering for Armature framework
//!
//! This crate renders templates through a MiniJinja environment configured
//! from a single [`ViewConfig`]: ordered search paths, `@namespace` aliases,
//! a cache directory, extensions, filters, functions and globals.
//!
//! ## Features
//!
//! - 📂 Ordered template search paths (first match wins)
//! - 🏷️ Namespaced templates (`@admin/index.j2`)
//! - 🔧 Filters and functions from closures or prebuilt objects
//! - 🧩 Extensions bundling several capabilities
//! - 🛡️ Strict mode for undefined variables
//! - 🔒 HTML escaping (configurable)
//! - ⚡ Async facade running renders on the blocking pool
//!
//! ## Example
//!
//! ```no_run
//! use armature_view::{Callable, View, ViewConfig};
//! use minijinja::Value;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ViewConfig::new()
//!     .with_file_path("views")
//!     .with_namespace("@admin", "admin/views")
//!     .with_filter(
//!         "shout",
//!         Callable::new(|args| Ok(Value::from(args[0].to_string().to_uppercase()))),
//!     );
//!
//! let view = View::new(config)?;
//!
//! let html = view.render("hello.j2", json!({"name": "World"}))?;
//! let admin = view.render("@admin/dashboard.j2", json!({}))?;
//! let inline = view.render_string("{{ name | shout }}", json!({"name": "bob"}))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! [`View::render`] and [`View::template`] report every failure as
//! [`ViewError::RenderFailure`] with code `5050` and a message ending in
//! ` in file <path> line <line>`. [`View::render_string`] returns the
//! engine's [`minijinja::Error`] unchanged.
//!
//! ## Template Example
//!
//! ```jinja
//! <h1>Hello {{ name | default('World') }}</h1>
//!
//! <ul>
//! {% for item in items %}
//!   <li>{{ item | upper }}</li>
//! {% endfor %}
//! </ul>
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod paths;
pub mod registry;

pub use config::ViewConfig;
pub use engine::View;
pub use error::{Result, ViewError};
pub use loader::FilesystemLoader;
pub use paths::PathResolver;
pub use registry::{Callable, Extension, Filter, Function, Registration};

// Re-export minijinja for extensions and callables
pub use minijinja;

use serde::Serialize;

/// Async view service for Armature
#[derive(Clone, Debug)]
pub struct ViewService {
    view: View,
}

impl ViewService {
    /// Create a new view service
    pub fn new(config: ViewConfig) -> Result<Self> {
        Ok(Self {
            view: View::new(config)?,
        })
    }

    /// Wrap an existing view engine
    pub fn from_view(view: View) -> Self {
        Self { view }
    }

    /// Render a template with data
    pub async fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        // Rendering is CPU-bound; keep it off the async workers
        let view = self.view.clone();
        let template = template.to_string();
        let data = minijinja::Value::from_serialize(data);

        tokio::task::spawn_blocking(move || view.render(&template, data))
            .await
            .map_err(|e| ViewError::Task(e.to_string()))?
    }

    /// Render a template string (not from file)
    pub async fn render_string<T: Serialize>(
        &self,
        source: &str,
        data: &T,
    ) -> std::result::Result<Option<String>, minijinja::Error> {
        let view = self.view.clone();
        let source = source.to_string();
        let data = minijinja::Value::from_serialize(data);

        tokio::task::spawn_blocking(move || view.render_string(&source, data))
            .await
            .map_err(|e| {
                minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "render task failed")
                    .with_source(e)
            })?
    }

    /// Alias of [`ViewService::render`]
    pub async fn template<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        self.render(template, data).await
    }

    /// Get engine reference
    pub fn view(&self) -> &View {
        &self.view
    }
}

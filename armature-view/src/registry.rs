//! Filters, functions and extensions registered into the environment

use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type CallableFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// A type-erased callable exposed to templates.
///
/// Filters receive the piped value as the first argument, followed by any
/// arguments given in the template.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    /// Wrap a closure or function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the callable
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        (self.0)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A named template filter: `{{ value | name(args) }}`
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    callable: Callable,
    safe: bool,
}

impl Filter {
    /// Create a filter
    pub fn new(name: impl Into<String>, callable: Callable) -> Self {
        Self {
            name: name.into(),
            callable,
            safe: false,
        }
    }

    /// Mark string output as safe so it is not auto-escaped
    pub fn with_safe_output(mut self, enable: bool) -> Self {
        self.safe = enable;
        self
    }

    /// Filter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether string output bypasses auto-escaping
    pub fn is_safe(&self) -> bool {
        self.safe
    }
}

/// A named template function: `{{ name(args) }}`
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    callable: Callable,
    safe: bool,
}

impl Function {
    /// Create a function
    pub fn new(name: impl Into<String>, callable: Callable) -> Self {
        Self {
            name: name.into(),
            callable,
            safe: false,
        }
    }

    /// Mark string output as safe so it is not auto-escaped
    pub fn with_safe_output(mut self, enable: bool) -> Self {
        self.safe = enable;
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether string output bypasses auto-escaping
    pub fn is_safe(&self) -> bool {
        self.safe
    }
}

/// A filter or function entry as supplied in configuration.
///
/// Entries are keyed by name. A [`Registration::Built`] value is registered
/// under its own name and the key is ignored. A [`Registration::Callable`]
/// is wrapped under the key, provided the key is not empty. Anything else is
/// skipped without error.
#[derive(Debug, Clone)]
pub enum Registration<T> {
    /// An already-built filter or function
    Built(T),
    /// A bare callable to be named by its key
    Callable(Callable),
    /// A value that is not callable
    Other(serde_json::Value),
}

impl<T> From<Callable> for Registration<T> {
    fn from(callable: Callable) -> Self {
        Registration::Callable(callable)
    }
}

impl From<Filter> for Registration<Filter> {
    fn from(filter: Filter) -> Self {
        Registration::Built(filter)
    }
}

impl From<Function> for Registration<Function> {
    fn from(function: Function) -> Self {
        Registration::Built(function)
    }
}

/// A bundle of capabilities registered into the environment at construction.
///
/// Extensions may add filters, functions, tests and globals. They are
/// applied in configuration order, so a later extension can shadow a
/// capability of the same name added by an earlier one.
pub trait Extension: Send + Sync {
    /// Extension name, used for diagnostics
    fn name(&self) -> &str;

    /// Add this extension's capabilities to the environment
    fn register(&self, env: &mut Environment<'static>);
}

/// Something that can be added to the environment under a name
pub(crate) trait Capability: Sized {
    const KIND: &'static str;

    fn from_callable(name: &str, callable: Callable) -> Self;

    fn name(&self) -> &str;

    fn register(self, env: &mut Environment<'static>);
}

impl Capability for Filter {
    const KIND: &'static str = "filter";

    fn from_callable(name: &str, callable: Callable) -> Self {
        Filter::new(name, callable)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn register(self, env: &mut Environment<'static>) {
        env.add_filter(self.name, adapt(self.callable, self.safe));
    }
}

impl Capability for Function {
    const KIND: &'static str = "function";

    fn from_callable(name: &str, callable: Callable) -> Self {
        Function::new(name, callable)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn register(self, env: &mut Environment<'static>) {
        env.add_function(self.name, adapt(self.callable, self.safe));
    }
}

/// Register every usable entry and return how many were added
pub(crate) fn register_all<T: Capability>(
    env: &mut Environment<'static>,
    entries: Vec<(String, Registration<T>)>,
) -> usize {
    let mut registered = 0;

    for (key, entry) in entries {
        match entry {
            Registration::Built(capability) => {
                debug!(kind = T::KIND, name = capability.name(), "Registering");
                capability.register(env);
                registered += 1;
            }
            Registration::Callable(callable) if !key.is_empty() => {
                debug!(kind = T::KIND, name = %key, "Registering callable");
                T::from_callable(&key, callable).register(env);
                registered += 1;
            }
            Registration::Callable(_) => {
                debug!(kind = T::KIND, "Skipping callable without a name");
            }
            Registration::Other(value) => {
                debug!(kind = T::KIND, name = %key, %value, "Skipping non-callable entry");
            }
        }
    }

    registered
}

fn adapt(
    callable: Callable,
    safe: bool,
) -> impl Fn(Rest<Value>) -> Result<Value, Error> + Send + Sync + 'static {
    move |args: Rest<Value>| {
        let value = callable.call(&args)?;
        Ok(if safe { mark_safe(value) } else { value })
    }
}

fn mark_safe(value: Value) -> Value {
    match value.as_str() {
        Some(s) => Value::from_safe_string(s.to_string()),
        None => value,
    }
}

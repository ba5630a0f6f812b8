//! Logical path resolution

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

type ResolveFn = dyn Fn(&Path) -> PathBuf + Send + Sync;

/// Maps logical paths such as `/storage/views` to absolute filesystem paths.
///
/// The default resolver roots logical paths at the current working
/// directory, so `/storage/views` becomes `<cwd>/storage/views`. A leading
/// `/` in a logical path is ignored.
#[derive(Clone)]
pub struct PathResolver {
    resolve: Arc<ResolveFn>,
}

impl PathResolver {
    /// Resolve logical paths under `root`
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::from_fn(move |logical| root.join(relative(logical)))
    }

    /// Resolve logical paths under the current working directory
    pub fn current_dir() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::rooted_at(root)
    }

    /// Use an arbitrary resolution function
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Path) -> PathBuf + Send + Sync + 'static,
    {
        Self { resolve: Arc::new(f) }
    }

    /// Resolve a logical path
    pub fn resolve(&self, logical: impl AsRef<Path>) -> PathBuf {
        (self.resolve)(logical.as_ref())
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::current_dir()
    }
}

impl fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathResolver").finish_non_exhaustive()
    }
}

/// Strip root and prefix components so the path can be joined under a root
fn relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_at_strips_leading_slash() {
        let resolver = PathResolver::rooted_at("/srv/app");
        assert_eq!(
            resolver.resolve("/storage/views"),
            PathBuf::from("/srv/app/storage/views")
        );
        assert_eq!(resolver.resolve("cache"), PathBuf::from("/srv/app/cache"));
    }

    #[test]
    fn test_from_fn() {
        let resolver = PathResolver::from_fn(|p| PathBuf::from("/tmp").join(p.file_name().unwrap()));
        assert_eq!(resolver.resolve("/storage/views"), PathBuf::from("/tmp/views"));
    }

    #[test]
    fn test_current_dir_joins_logical_path() {
        let resolver = PathResolver::current_dir();
        assert!(resolver.resolve("/storage/views").ends_with("storage/views"));
    }
}

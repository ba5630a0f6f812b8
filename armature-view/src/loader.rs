//! Filesystem template loader with ordered search paths and namespaces

use crate::error::{Result, ViewError};
use minijinja::{Error, ErrorKind};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves template names to files.
///
/// Bare names (`hello.j2`) are looked up in the main search paths in the
/// order they were added; the first directory containing the file wins.
/// Namespaced names (`@admin/hello.j2`) are looked up only in the paths
/// registered for that namespace.
#[derive(Debug, Clone, Default)]
pub struct FilesystemLoader {
    paths: Vec<PathBuf>,
    namespaces: HashMap<String, Vec<PathBuf>>,
}

impl FilesystemLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory to the main search paths
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        ensure_dir(&path)?;
        self.paths.push(path);
        Ok(())
    }

    /// Append a directory to a namespace. Leading `@` characters in the
    /// alias are ignored.
    pub fn add_namespace(&mut self, alias: &str, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        ensure_dir(&path)?;
        self.namespaces
            .entry(alias.trim_start_matches('@').to_string())
            .or_default()
            .push(path);
        Ok(())
    }

    /// Main search paths, in lookup order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Paths registered for a namespace, in lookup order
    pub fn namespace_paths(&self, alias: &str) -> &[PathBuf] {
        self.namespaces
            .get(alias)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registered namespace aliases, sorted
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a template name to the file that would be loaded
    pub fn find(&self, name: &str) -> std::result::Result<PathBuf, Error> {
        let name = normalize(name);

        let (dirs, short) = match name.strip_prefix('@') {
            Some(rest) => {
                let (alias, short) = rest.split_once('/').ok_or_else(|| {
                    Error::new(
                        ErrorKind::TemplateNotFound,
                        format!(
                            "malformed namespaced template name \"{}\" (expecting \"@namespace/template_name\")",
                            name
                        ),
                    )
                })?;
                let dirs = self.namespaces.get(alias).ok_or_else(|| {
                    Error::new(
                        ErrorKind::TemplateNotFound,
                        format!("there are no registered paths for namespace \"{}\"", alias),
                    )
                })?;
                (dirs.as_slice(), short)
            }
            None => (self.paths.as_slice(), name.as_str()),
        };

        let short = short.trim_start_matches('/');
        validate(short)?;

        for dir in dirs {
            let candidate = dir.join(short);
            if candidate.is_file() {
                debug!(template = %name, path = %candidate.display(), "Resolved template");
                return Ok(candidate);
            }
        }

        let looked_into: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!(
                "unable to find template \"{}\" (looked into: {})",
                name,
                looked_into.join(", ")
            ),
        ))
    }

    /// Check whether a template name resolves to a file
    pub fn exists(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    /// Load a template's source. Used as the environment's loader callback.
    pub fn load(&self, name: &str) -> std::result::Result<Option<String>, Error> {
        let path = self.find(name)?;

        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("could not read template \"{}\"", path.display()),
            )
            .with_source(e)),
        }
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ViewError::DirectoryNotFound(path.to_path_buf()))
    }
}

/// Use forward slashes and collapse repeated separators
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Reject names that would escape the directory they are looked up in
fn validate(name: &str) -> std::result::Result<(), Error> {
    if name.contains('\0') {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "a template name cannot contain NUL bytes",
        ));
    }

    let mut level = 0i32;
    for part in name.split('/') {
        match part {
            ".." => level -= 1,
            "." => {}
            _ => level += 1,
        }

        if level < 0 {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!(
                    "looks like you try to load a template outside configured directories ({})",
                    name
                ),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_dirs() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (dir, body) in [("first", "first"), ("second", "second"), ("admin", "admin")] {
            let path = temp_dir.path().join(dir);
            fs::create_dir(&path).unwrap();
            fs::write(path.join("page.j2"), body).unwrap();
        }
        fs::write(temp_dir.path().join("second/only.j2"), "only").unwrap();
        temp_dir
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let mut loader = FilesystemLoader::new();
        let err = loader.add_path("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ViewError::DirectoryNotFound(_)));
        assert!(loader.paths().is_empty());
    }

    #[test]
    fn test_search_order() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_path(temp_dir.path().join("first")).unwrap();
        loader.add_path(temp_dir.path().join("second")).unwrap();

        assert_eq!(loader.load("page.j2").unwrap().unwrap(), "first");
        assert_eq!(loader.load("only.j2").unwrap().unwrap(), "only");
    }

    #[test]
    fn test_namespace_lookup() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_path(temp_dir.path().join("first")).unwrap();
        loader.add_namespace("@admin", temp_dir.path().join("admin")).unwrap();

        assert_eq!(loader.namespaces(), vec!["admin"]);
        assert_eq!(loader.load("@admin/page.j2").unwrap().unwrap(), "admin");
        assert_eq!(loader.load("page.j2").unwrap().unwrap(), "first");
    }

    #[test]
    fn test_namespace_alias_appends_paths() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_namespace("@shared", temp_dir.path().join("first")).unwrap();
        loader.add_namespace("shared", temp_dir.path().join("second")).unwrap();

        assert_eq!(loader.namespace_paths("shared").len(), 2);
        assert_eq!(loader.load("@shared/page.j2").unwrap().unwrap(), "first");
        assert_eq!(loader.load("@shared/only.j2").unwrap().unwrap(), "only");
    }

    #[test]
    fn test_unknown_namespace() {
        let loader = FilesystemLoader::new();
        let err = loader.find("@missing/page.j2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert!(err.to_string().contains("namespace \"missing\""));
    }

    #[test]
    fn test_malformed_namespaced_name() {
        let loader = FilesystemLoader::new();
        let err = loader.find("@admin").unwrap_err();
        assert!(err.to_string().contains("malformed namespaced template name"));
    }

    #[test]
    fn test_not_found_lists_search_paths() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_path(temp_dir.path().join("first")).unwrap();

        let err = loader.load("nope.j2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        assert!(err.to_string().contains("looked into"));
        assert!(!loader.exists("nope.j2"));
    }

    #[test]
    fn test_names_are_normalized() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_path(temp_dir.path()).unwrap();

        assert_eq!(loader.load("first//page.j2").unwrap().unwrap(), "first");
        assert_eq!(loader.load("first\\page.j2").unwrap().unwrap(), "first");
        assert_eq!(loader.load("/first/page.j2").unwrap().unwrap(), "first");
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let temp_dir = create_dirs();
        let mut loader = FilesystemLoader::new();
        loader.add_path(temp_dir.path().join("first")).unwrap();
        fs::create_dir(temp_dir.path().join("first/sub")).unwrap();

        let err = loader.find("../second/page.j2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(loader.find("sub/../page.j2").is_ok());
    }
}

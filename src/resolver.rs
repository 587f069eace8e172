//! Path resolution for file-valued options
//!
//! Turns a logical file name (template, stylesheet, include, ...) into a
//! concrete path. Search order, first hit wins: absolute or `~`-relative
//! path, the build's working directory, the enclosing project hierarchy
//! walked upward, then the configured search paths. A miss is not an
//! error: the bare name passes through and the external tool reports it
//! at its own boundary. The project config file is the one exception;
//! its absence is a distinct, non-error outcome.

use std::path::{Path, PathBuf};

use crate::options::project::PROJECT_CONFIG_FILENAME;

/// Resolves logical file names against one build's context.
#[derive(Debug, Clone)]
pub struct Resolver {
    working_dir: PathBuf,
    project_roots: Vec<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Resolver {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            project_roots: Vec::new(),
            search_paths: Vec::new(),
        }
    }

    /// Folders that mark the top of a project hierarchy.
    pub fn with_project_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.project_roots = roots;
        self
    }

    /// Extra directories to search, in listed order.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve a name, falling back to the bare name on a miss.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.locate(name).unwrap_or_else(|| PathBuf::from(name))
    }

    /// Resolve a name into a ready-to-use argument token, e.g.
    /// `resolve_arg("style.css", "--css=")`.
    pub fn resolve_arg(&self, name: &str, prefix: &str) -> String {
        format!("{prefix}{}", self.resolve(name).display())
    }

    /// Search for the project config file. `None` means "no project
    /// config", which callers treat as optional, as opposed to a
    /// resolution miss that falls back to the bare name.
    pub fn find_project_config(&self) -> Option<PathBuf> {
        self.locate(PROJECT_CONFIG_FILENAME)
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        // A path the user spelled out directly.
        let direct = expand_user(name);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct);
        }

        // The build's working directory.
        let in_working = self.working_dir.join(name);
        if in_working.exists() {
            return Some(in_working);
        }

        // Walk upward to the top of the enclosing project folder.
        if let Some(top) = self.project_top() {
            let mut dir = self.working_dir.as_path();
            loop {
                let candidate = dir.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
                if dir == top {
                    break;
                }
                match dir.parent() {
                    Some(parent) => dir = parent,
                    None => break,
                }
            }
        }

        // Configured search paths, in listed order.
        for search in &self.search_paths {
            let base = self.absolutize(expand_user(&search.to_string_lossy()));
            let candidate = base.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// First ancestor of the working directory that is a listed project
    /// root, or whose basename matches one.
    fn project_top(&self) -> Option<&Path> {
        if self.project_roots.is_empty() {
            return None;
        }
        self.working_dir.ancestors().find(|dir| {
            self.project_roots.iter().any(|root| {
                root.as_path() == *dir
                    || (dir.file_name().is_some() && dir.file_name() == root.file_name())
            })
        })
    }

    fn absolutize(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.working_dir.join(path)
        }
    }
}

/// Expand a leading `~` or `~/` to the user's home directory.
fn expand_user(name: &str) -> PathBuf {
    if let Some(rest) = name.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if name == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(name)
}

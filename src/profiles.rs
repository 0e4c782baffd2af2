//! Named profile store
//!
//! A profile is a YAML value tree on disk at `<profiles_dir>/<name>.yaml`.
//! The translation controller loads the selected profile on every pass and
//! merges the IstioOperator spec on top of it. Profiles are read-only
//! configuration; there is no caching, a pass always sees the file as it is.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Error;

/// Loads profile value trees from a directory
#[derive(Clone, Debug)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a profile name resolves to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.yaml"))
    }

    /// Load a profile by name.
    ///
    /// A missing or unparseable profile is a hard error; translation cannot
    /// proceed without its base layer.
    pub fn load(&self, name: &str) -> Result<Value, Error> {
        let path = self.path_for(name);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::profile(name, format!("failed to read {}: {}", path.display(), e))
        })?;
        let value: Value = serde_yaml::from_str(&contents).map_err(|e| {
            Error::profile(name, format!("failed to parse {}: {}", path.display(), e))
        })?;
        if value.is_null() {
            // An empty file is an empty tree, not a null override.
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(value)
    }

    /// Directory this store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

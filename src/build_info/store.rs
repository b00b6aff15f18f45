// src/build_info/store.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;

/// Where build info documents live between runs.
pub trait BuildInfoStore: Send {
    /// The stored document, or `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&mut self, document: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Store backed by a file, accessed through a [`FileSystem`].
pub struct FileBuildInfoStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileBuildInfoStore {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BuildInfoStore for FileBuildInfoStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.fs.is_file(&self.path) {
            debug!(path = ?self.path, "no build info file");
            return Ok(None);
        }
        let text = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading build info {:?}", self.path))?;
        Ok(Some(text))
    }

    fn save(&mut self, document: &str) -> Result<()> {
        self.fs
            .write(&self.path, document.as_bytes())
            .with_context(|| format!("writing build info {:?}", self.path))?;
        debug!(path = ?self.path, bytes = document.len(), "saved build info");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.fs.exists(&self.path) {
            self.fs.remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuildInfoStore {
    document: Option<String>,
}

impl MemoryBuildInfoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildInfoStore for MemoryBuildInfoStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.document.clone())
    }

    fn save(&mut self, document: &str) -> Result<()> {
        self.document = Some(document.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.document = None;
        Ok(())
    }
}

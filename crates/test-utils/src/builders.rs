#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use incbuild::config::{ConfigFile, ConfigSection, RawConfigFile, UnitsSection};
use incbuild::fs::mock::MockFileSystem;
use incbuild::types::BuildInfoStorageMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                units: UnitsSection::default(),
            },
        }
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.config.units.include = vec![pattern.to_string()];
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.units.exclude.push(pattern.to_string());
        self
    }

    pub fn dependency_tracking(mut self, on: bool) -> Self {
        self.config.config.dependency_tracking = on;
        self
    }

    pub fn emit_declarations(mut self, on: bool) -> Self {
        self.config.config.emit_declarations = on;
        self
    }

    pub fn include_inferred_types(mut self, on: bool) -> Self {
        self.config.config.include_inferred_types = on;
        self
    }

    pub fn persist_diagnostics(mut self, on: bool) -> Self {
        self.config.config.persist_diagnostics = on;
        self
    }

    pub fn out_dir(mut self, dir: &str) -> Self {
        self.config.config.out_dir = PathBuf::from(dir);
        self
    }

    pub fn memory_build_info(mut self) -> Self {
        self.config.config.build_info_storage = BuildInfoStorageMode::Memory;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lays out `.unit` files in a [`MockFileSystem`] under a project root.
pub struct MockProjectBuilder {
    root: PathBuf,
    fs: MockFileSystem,
}

impl MockProjectBuilder {
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
            fs: MockFileSystem::new(),
        }
    }

    /// Add a unit; `lines` are joined with newlines.
    pub fn unit(self, path: &str, lines: &[&str]) -> Self {
        let mut text = lines.join("\n");
        text.push('\n');
        self.fs.add_file(self.root.join(path), text);
        self
    }

    pub fn file(self, path: &str, contents: &str) -> Self {
        self.fs.add_file(self.root.join(path), contents);
        self
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn build(self) -> (PathBuf, Arc<MockFileSystem>) {
        (self.root, Arc::new(self.fs))
    }
}

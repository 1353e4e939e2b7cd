use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where archives are unpacked and built, and where they get installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    source_dir: PathBuf,
    install_dir: PathBuf,
}

impl BuildLayout {
    pub fn new(source_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            install_dir: install_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    pub fn archive_path(&self, archive_file_name: &str) -> PathBuf {
        self.source_dir.join(archive_file_name)
    }

    pub fn build_dir(&self, directory_name: &str) -> PathBuf {
        self.source_dir.join(directory_name)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.install_dir.join("lib")
    }

    pub fn runtime_lib_dir(&self, runtime_subdir: &str) -> PathBuf {
        self.lib_dir().join(runtime_subdir)
    }

    pub fn pkgconfig_dir(&self) -> PathBuf {
        self.lib_dir().join("pkgconfig")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [&self.source_dir, &self.install_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

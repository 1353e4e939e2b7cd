use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use buildtree_builder::{BuildEnvironment, BuildLayout, DEFAULT_RUNTIME_SUBDIR};
use buildtree_catalog::DEFAULT_DOWNLOAD_WIDTH;
use serde::Deserialize;

use crate::GlobalArgs;

pub const DEFAULT_CONFIG_FILE: &str = "buildtree.toml";

/// Contents of `buildtree.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub manifest: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub pnet_dir: Option<PathBuf>,
    pub configure_options: Option<String>,
    pub runtime_subdir: Option<String>,
    pub download_width: Option<usize>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse configuration")
    }

    /// Relative paths in the file are taken relative to the file itself.
    fn rebase(mut self, base: &Path) -> Self {
        for path in [
            &mut self.manifest,
            &mut self.source_dir,
            &mut self.install_dir,
            &mut self.pnet_dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

/// Load the explicit configuration file, or `buildtree.toml` from the
/// current directory when it exists.
pub fn load_config_file(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                return Ok(FileConfig::default());
            }
            default
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = FileConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config file: {}", path.display()))?;
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(config.rebase(base))
}

/// Effective settings: command-line flags win over the file, the file wins
/// over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    manifest: Option<PathBuf>,
    source_dir: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    /// pnet installation whose class libraries `ILDJIT_PATH` points at.
    pub pnet_dir: Option<PathBuf>,
    pub configure_options: String,
    pub runtime_subdir: String,
    pub download_width: usize,
}

impl Settings {
    pub fn resolve(file: FileConfig, flags: &GlobalArgs) -> Result<Self> {
        let download_width = file.download_width.unwrap_or(DEFAULT_DOWNLOAD_WIDTH);
        if download_width == 0 {
            return Err(anyhow!("download_width must be at least 1"));
        }
        Ok(Self {
            manifest: flags.manifest.clone().or(file.manifest),
            source_dir: flags.source_dir.clone().or(file.source_dir),
            install_dir: flags.install_dir.clone().or(file.install_dir),
            pnet_dir: flags.pnet_dir.clone().or(file.pnet_dir),
            configure_options: flags
                .configure_options
                .clone()
                .or(file.configure_options)
                .unwrap_or_default(),
            runtime_subdir: file
                .runtime_subdir
                .unwrap_or_else(|| DEFAULT_RUNTIME_SUBDIR.to_string()),
            download_width,
        })
    }

    pub fn manifest(&self) -> Result<&Path> {
        required(self.manifest.as_deref(), "manifest", "--manifest")
    }

    pub fn source_dir(&self) -> Result<&Path> {
        required(self.source_dir.as_deref(), "source_dir", "--source-dir")
    }

    pub fn install_dir(&self) -> Result<&Path> {
        required(self.install_dir.as_deref(), "install_dir", "--install-dir")
    }

    pub fn layout(&self) -> Result<BuildLayout> {
        Ok(BuildLayout::new(self.source_dir()?, self.install_dir()?))
    }

    pub fn environment(&self, layout: &BuildLayout) -> BuildEnvironment {
        BuildEnvironment::from_process(layout, &self.runtime_subdir)
            .with_pnet_dir(self.pnet_dir.as_deref())
    }
}

fn required<'a>(value: Option<&'a Path>, key: &str, flag: &str) -> Result<&'a Path> {
    value.ok_or_else(|| {
        anyhow!("no {key} configured; pass {flag} or set `{key}` in {DEFAULT_CONFIG_FILE}")
    })
}

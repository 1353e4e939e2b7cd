use std::path::{Path, PathBuf};

use crate::layout::BuildLayout;

/// Library subdirectory of the install tree holding the runtime's own libraries.
pub const DEFAULT_RUNTIME_SUBDIR: &str = "iljit";

/// Where a pnet installation keeps the CIL class libraries.
const PNET_CLASS_LIBRARY_DIR: &str = "lib/cscc/lib";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchPath {
    key: &'static str,
    inherited: Option<String>,
    additions: Vec<PathBuf>,
}

impl SearchPath {
    fn value(&self) -> String {
        self.inherited
            .iter()
            .filter(|inherited| !inherited.is_empty())
            .cloned()
            .chain(self.additions.iter().map(|path| path.display().to_string()))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn export_line(&self) -> String {
        let additions = self
            .additions
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        format!("export {key}=${key}:{additions}", key = self.key)
    }
}

/// Environment passed to every build command. Each search path is the
/// inherited value with the install tree's directories appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnvironment {
    paths: Vec<SearchPath>,
    class_library_path: Option<PathBuf>,
}

impl BuildEnvironment {
    pub fn from_process(layout: &BuildLayout, runtime_subdir: &str) -> Self {
        Self::from_inherited(layout, runtime_subdir, |key| std::env::var(key).ok())
    }

    pub fn from_inherited<F>(layout: &BuildLayout, runtime_subdir: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let search_path = |key: &'static str, additions: Vec<PathBuf>| SearchPath {
            key,
            inherited: lookup(key).map(|value| value.trim().to_string()),
            additions,
        };

        Self {
            paths: vec![
                search_path(
                    "LD_LIBRARY_PATH",
                    vec![
                        layout.install_dir().to_path_buf(),
                        layout.lib_dir(),
                        layout.runtime_lib_dir(runtime_subdir),
                    ],
                ),
                search_path("PKG_CONFIG_PATH", vec![layout.pkgconfig_dir()]),
                search_path("PATH", vec![layout.bin_dir()]),
            ],
            class_library_path: None,
        }
    }

    /// Point `ILDJIT_PATH` at the class libraries of a pnet installation.
    /// Only the shell profile carries it; builds do not need it.
    pub fn with_pnet_dir(mut self, pnet_dir: Option<&Path>) -> Self {
        self.class_library_path = pnet_dir.map(|dir| dir.join(PNET_CLASS_LIBRARY_DIR));
        self
    }

    pub fn vars(&self) -> Vec<(&'static str, String)> {
        self.paths
            .iter()
            .map(|path| (path.key, path.value()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.paths
            .iter()
            .find(|path| path.key == key)
            .map(SearchPath::value)
    }

    /// `export` lines suitable for a shell profile.
    pub fn shell_exports(&self) -> Vec<String> {
        let mut lines = self
            .paths
            .iter()
            .map(SearchPath::export_line)
            .collect::<Vec<_>>();
        if let Some(path) = &self.class_library_path {
            lines.push(format!("export ILDJIT_PATH={}", path.display()));
        }
        lines
    }
}

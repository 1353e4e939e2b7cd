use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use buildtree_core::version::{digits_of, is_greater};
use buildtree_core::PackageTree;
use tracing::{debug, trace};

use crate::types::PlanError;

/// Split `<pack_name>-<version>` on the last `-`.
pub fn split_directory_name(directory: &str) -> Option<(&str, &str)> {
    directory.rsplit_once('-')
}

/// Versions of the packages already unpacked in `source_dir`, keyed by
/// archive name. When several directories exist for one package the greatest
/// version wins; directories that are not catalog packages or whose suffix is
/// not a dotted version are ignored.
pub fn scan_installed_versions(
    source_dir: &Path,
    tree: &PackageTree,
) -> Result<BTreeMap<String, String>, PlanError> {
    let catalog = tree.versions_by_archive_name(tree.root());
    let entries = fs::read_dir(source_dir).map_err(|err| PlanError::Scan {
        path: source_dir.to_path_buf(),
        diagnostic: err.to_string(),
    })?;

    let mut directories = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| PlanError::Scan {
            path: source_dir.to_path_buf(),
            diagnostic: err.to_string(),
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            directories.push(name.to_string());
        }
    }
    directories.sort();

    let mut installed: BTreeMap<String, String> = BTreeMap::new();
    for directory in &directories {
        let Some((pack_name, version)) = split_directory_name(directory) else {
            trace!(directory, "skipping directory without version suffix");
            continue;
        };
        if !catalog.contains_key(pack_name) {
            trace!(directory, "skipping directory outside the catalog");
            continue;
        }
        if digits_of(version).is_err() {
            trace!(directory, "skipping directory with unparsable version");
            continue;
        }
        match installed.get(pack_name) {
            Some(current) if !is_greater(version, current) => {}
            _ => {
                installed.insert(pack_name.to_string(), version.to_string());
            }
        }
    }

    debug!(source_dir = %source_dir.display(), found = installed.len(), "scanned installed packages");
    Ok(installed)
}

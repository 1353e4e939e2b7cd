use std::fs;
use std::path::PathBuf;

use buildtree_core::version::is_greater;
use buildtree_core::{Error, PackageTree};
use tracing::{debug, info, warn};

use crate::events::{BuildEvent, EventSink};
use crate::executor::BuildReport;
use crate::fs_utils::{list_subdirectories, remove_file_if_exists};
use crate::layout::BuildLayout;

/// Remove the archives of freshly installed packages and the build
/// directories of their older versions.
///
/// Directories holding an equal or newer version are kept. The first removal
/// failure is reported and ends the whole pass. Returns the removed paths.
pub fn cleanup<S: EventSink>(
    tree: &PackageTree,
    layout: &BuildLayout,
    report: &BuildReport,
    sink: &mut S,
) -> Result<Vec<PathBuf>, Error> {
    let mut removed = Vec::new();

    for id in &report.installed {
        let node = tree.node(*id);
        let (Some(version), Some(archive_file_name)) =
            (node.version.as_deref(), node.archive_file_name())
        else {
            continue;
        };
        let removal_error = |diagnostic: String| Error::Removal {
            package: node.package_archive_name.clone(),
            diagnostic,
        };
        let fail = |sink: &mut S, err: Error| {
            warn!(package = %node.name, "{}", err.header());
            sink.emit(BuildEvent::removal_error(&err));
            err
        };

        sink.emit(BuildEvent::ActionDescription(format!(
            "Package: {}  -  Removing the package",
            node.name
        )));
        let archive_path = layout.archive_path(&archive_file_name);
        if let Err(err) = remove_file_if_exists(&archive_path) {
            return Err(fail(
                sink,
                removal_error(format!("{}: {err}", archive_path.display())),
            ));
        }
        debug!(path = %archive_path.display(), "archive removed");
        removed.push(archive_path);
        sink.emit(BuildEvent::ProgressIncrement);

        sink.emit(BuildEvent::ActionDescription(format!(
            "Package: {}  -  Removing the old Package",
            node.name
        )));
        let directories = list_subdirectories(layout.source_dir()).map_err(|err| {
            fail(
                sink,
                removal_error(format!("{}: {err}", layout.source_dir().display())),
            )
        })?;
        for directory in directories {
            let Some((pack_name, old_version)) = directory.rsplit_once('-') else {
                continue;
            };
            if pack_name != node.package_archive_name || !is_greater(version, old_version) {
                continue;
            }
            let path = layout.build_dir(&directory);
            if let Err(err) = fs::remove_dir_all(&path) {
                return Err(fail(
                    sink,
                    removal_error(format!("{}: {err}", path.display())),
                ));
            }
            info!(path = %path.display(), "removed superseded build directory");
            removed.push(path);
        }
        sink.emit(BuildEvent::ProgressIncrement);
    }

    sink.emit(BuildEvent::Completion);
    Ok(removed)
}

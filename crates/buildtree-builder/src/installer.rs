use std::path::PathBuf;

use buildtree_core::{Error, PackageTree};
use tracing::{info, warn};

use crate::cleanup::cleanup;
use crate::events::EventSink;
use crate::executor::{BuildExecutor, BuildOptions, BuildReport};
use crate::runner::CommandRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Some branch failed, so nothing was removed.
    Skipped,
    Completed { removed: Vec<PathBuf> },
    Failed(Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSummary {
    pub report: BuildReport,
    pub cleanup: CleanupOutcome,
}

impl InstallSummary {
    pub fn succeeded(&self) -> bool {
        self.report.succeeded() && matches!(self.cleanup, CleanupOutcome::Completed { .. })
    }
}

/// Build the whole tree, then clean up once every leaf has completed.
pub fn run_installation<R, S>(
    tree: &PackageTree,
    options: &BuildOptions,
    runner: &mut R,
    sink: &mut S,
) -> InstallSummary
where
    R: CommandRunner,
    S: EventSink,
{
    let report = BuildExecutor::new(options, runner, sink).execute(tree);
    let leaves = tree.leaf_count(tree.root());

    let cleanup = if report.completed_leaves == leaves {
        match cleanup(tree, &options.layout, &report, sink) {
            Ok(removed) => {
                info!(removed = removed.len(), "installation completed");
                CleanupOutcome::Completed { removed }
            }
            Err(err) => CleanupOutcome::Failed(err),
        }
    } else {
        warn!(
            completed = report.completed_leaves,
            leaves,
            failures = report.failures.len(),
            "installation stopped before every branch completed; skipping cleanup"
        );
        CleanupOutcome::Skipped
    };

    InstallSummary { report, cleanup }
}

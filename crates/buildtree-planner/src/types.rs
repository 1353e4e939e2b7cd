use std::path::PathBuf;

use buildtree_core::{NodeAction, NodeId, PackageTree};
use serde::Serialize;
use thiserror::Error;

/// The three flows offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardMode {
    Install,
    Upgrade,
    Rebuild,
}

impl WizardMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Rebuild => "rebuild",
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot scan source directory {}: {diagnostic}", path.display())]
    Scan { path: PathBuf, diagnostic: String },

    #[error("outdated or not properly installed packages: {}; run an install or an upgrade first", packages.join(", "))]
    UpdatesFound { packages: Vec<String> },

    #[error("no remote version was discovered for package '{package}'")]
    MissingVersion { package: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPackage {
    pub name: String,
    pub package_archive_name: String,
    pub version: Option<String>,
    pub installed_version: Option<String>,
    pub action: NodeAction,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub mode: WizardMode,
    /// Packages whose catalog version differs from the local one, pre-order.
    pub outdated: Vec<PlannedPackage>,
    /// Every package of the tree, pre-order.
    pub packages: Vec<PlannedPackage>,
    #[serde(skip)]
    pub(crate) outdated_ids: Vec<NodeId>,
}

impl Plan {
    pub(crate) fn outdated_ids(&self) -> &[NodeId] {
        &self.outdated_ids
    }

    pub fn is_noop(&self) -> bool {
        self.packages
            .iter()
            .all(|package| package.action == NodeAction::None)
    }

    pub fn count(&self, action: NodeAction) -> usize {
        self.packages
            .iter()
            .filter(|package| package.action == action)
            .count()
    }

    /// Number of progress increments a full run emits: unpack, configure,
    /// build, install and the two cleanup steps per install; configure, clean,
    /// build and install per rebuild; clean and install per upgrade.
    pub fn step_count(&self) -> u64 {
        self.packages
            .iter()
            .map(|package| step_weight(package.action))
            .sum()
    }
}

pub(crate) fn step_weight(action: NodeAction) -> u64 {
    match action {
        NodeAction::Install => 6,
        NodeAction::Rebuild => 4,
        NodeAction::Upgrade => 2,
        NodeAction::None => 0,
    }
}

pub(crate) fn node_depth(tree: &PackageTree, id: NodeId) -> usize {
    let mut depth = 0;
    let mut current = tree.node(id).parent();
    while let Some(parent) = current {
        depth += 1;
        current = tree.node(parent).parent();
    }
    depth
}

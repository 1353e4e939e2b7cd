use std::collections::BTreeMap;
use std::path::Path;

use buildtree_core::{NodeAction, NodeId, PackageTree};
use tracing::{debug, info};

use crate::assign::assign_actions;
use crate::outdated::compute_outdated_or_missing;
use crate::scan::scan_installed_versions;
use crate::types::{node_depth, Plan, PlanError, PlannedPackage, WizardMode};

/// Decide the action of every package for `mode` and return the resulting
/// plan. Fails before anything is built when the source directory cannot be
/// scanned, when a rebuild finds outdated packages, or when a package that
/// has to be built has no catalog version.
pub fn plan(tree: &mut PackageTree, source_dir: &Path, mode: WizardMode) -> Result<Plan, PlanError> {
    let root = tree.root();
    let mut installed = BTreeMap::new();
    let mut outdated_ids = Vec::new();

    match mode {
        WizardMode::Install => {
            for id in tree.all_nodes(root) {
                tree.node_mut(id).action = NodeAction::Install;
            }
        }
        WizardMode::Upgrade => {
            installed = scan_installed_versions(source_dir, tree)?;
            outdated_ids = compute_outdated_or_missing(tree, &installed);
            assign_actions(tree, root, false, &outdated_ids, mode);
        }
        WizardMode::Rebuild => {
            installed = scan_installed_versions(source_dir, tree)?;
            let outdated = compute_outdated_or_missing(tree, &installed);
            if !outdated.is_empty() {
                return Err(PlanError::UpdatesFound {
                    packages: outdated
                        .iter()
                        .map(|id| tree.node(*id).name.clone())
                        .collect(),
                });
            }
            assign_actions(tree, root, false, &outdated, mode);
        }
    }

    for id in tree.all_nodes(root) {
        let node = tree.node(id);
        if node.action != NodeAction::None && node.version.is_none() {
            return Err(PlanError::MissingVersion {
                package: node.name.clone(),
            });
        }
    }

    let describe = |id: NodeId| {
        let node = tree.node(id);
        PlannedPackage {
            name: node.name.clone(),
            package_archive_name: node.package_archive_name.clone(),
            version: node.version.clone(),
            installed_version: installed.get(&node.package_archive_name).cloned(),
            action: node.action,
            depth: node_depth(tree, id),
        }
    };
    let packages = tree.all_nodes(root).into_iter().map(&describe).collect::<Vec<_>>();
    let outdated = outdated_ids.iter().copied().map(&describe).collect::<Vec<_>>();

    for package in &packages {
        debug!(package = %package.name, action = package.action.as_str(), "planned");
    }
    let plan = Plan {
        mode,
        outdated,
        packages,
        outdated_ids,
    };
    info!(
        mode = mode.as_str(),
        install = plan.count(NodeAction::Install),
        upgrade = plan.count(NodeAction::Upgrade),
        rebuild = plan.count(NodeAction::Rebuild),
        "plan ready"
    );
    Ok(plan)
}

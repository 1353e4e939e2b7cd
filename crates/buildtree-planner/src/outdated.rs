use std::collections::BTreeMap;

use buildtree_core::{NodeId, PackageTree};

/// Catalog packages that are missing locally or whose local version differs
/// from the catalog one. Only equality is checked: a local version newer
/// than the catalog is reported too.
pub fn compute_outdated_or_missing(
    tree: &PackageTree,
    installed: &BTreeMap<String, String>,
) -> Vec<NodeId> {
    tree.all_nodes(tree.root())
        .into_iter()
        .filter(|id| {
            let node = tree.node(*id);
            match installed.get(&node.package_archive_name) {
                None => true,
                Some(local) => node.version.as_deref() != Some(local.as_str()),
            }
        })
        .collect()
}

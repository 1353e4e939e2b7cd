use buildtree_core::{NodeAction, NodeId, PackageTree};

use crate::types::WizardMode;

/// Assign an action to `node` and its subtree.
///
/// In rebuild mode everything is rebuilt. Otherwise an outdated node is
/// installed from scratch and everything below it is upgraded, unless it is
/// outdated itself; nodes outside any outdated subtree are left alone.
pub fn assign_actions(
    tree: &mut PackageTree,
    node: NodeId,
    descendant_of_target: bool,
    outdated: &[NodeId],
    mode: WizardMode,
) {
    if mode == WizardMode::Rebuild {
        tree.node_mut(node).action = NodeAction::Rebuild;
        for child in tree.children_of(node).to_vec() {
            assign_actions(tree, child, false, outdated, mode);
        }
        return;
    }

    let (action, below) = if outdated.contains(&node) {
        (NodeAction::Install, true)
    } else if descendant_of_target {
        (NodeAction::Upgrade, true)
    } else {
        (NodeAction::None, false)
    };
    tree.node_mut(node).action = action;
    for child in tree.children_of(node).to_vec() {
        assign_actions(tree, child, below, outdated, mode);
    }
}

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use buildtree_core::{NodeAction, PackageTree};

use super::*;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_source_dir(dirs: &[&str]) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "buildtree-planner-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    std::fs::create_dir_all(&path).expect("must create source dir");
    for dir in dirs {
        std::fs::create_dir_all(path.join(dir)).expect("must create package dir");
    }
    path
}

/// root `a` with children `b` and `c`; `b` has child `d`.
fn tree_with_versions(versions: &[(&str, &str)]) -> PackageTree {
    let mut tree = PackageTree::from_manifest_str(
        r#"
<manifest>
  <repository url="https://example.test/" version_url="https://example.test/list">
    <package name="a" pack_name="a" type="tar.gz"/>
    <package name="b" father="a" pack_name="b" type="tar.gz"/>
    <package name="c" father="a" pack_name="c" type="tar.gz"/>
    <package name="d" father="b" pack_name="d" type="tar.gz"/>
  </repository>
</manifest>
"#,
    )
    .expect("manifest should parse");
    tree.apply_versions(
        &versions
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect::<BTreeMap<_, _>>(),
    );
    tree
}

fn installed(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(name, version)| (name.to_string(), version.to_string()))
        .collect()
}

fn action_of(tree: &PackageTree, name: &str) -> NodeAction {
    let id = tree.find_by_name(tree.root(), name).expect("node exists");
    tree.node(id).action
}

fn names(tree: &PackageTree, ids: &[buildtree_core::NodeId]) -> Vec<String> {
    ids.iter().map(|id| tree.node(*id).name.clone()).collect()
}

#[test]
fn split_directory_name_uses_last_dash() {
    assert_eq!(split_directory_name("a-1.0"), Some(("a", "1.0")));
    assert_eq!(split_directory_name("lib-iljit-0.3"), Some(("lib-iljit", "0.3")));
    assert_eq!(split_directory_name("nodash"), None);
}

#[test]
fn scan_keeps_greatest_version_per_package() {
    let tree = tree_with_versions(&[("a", "2.0")]);
    let source = test_source_dir(&["a-1.0", "a-2.0"]);

    let found = scan_installed_versions(&source, &tree).expect("scan must succeed");
    assert_eq!(found, installed(&[("a", "2.0")]));

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn scan_ignores_foreign_and_unparsable_entries() {
    let tree = tree_with_versions(&[]);
    let source = test_source_dir(&["zlib-1.2", "b-latest", "c", "d-0.9", "d-0.10"]);
    std::fs::write(source.join("b-1.0"), b"not a directory").expect("must write file");

    let found = scan_installed_versions(&source, &tree).expect("scan must succeed");
    assert_eq!(found, installed(&[("d", "0.9")]));

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn scan_fails_for_missing_source_dir() {
    let tree = tree_with_versions(&[]);
    let source = test_source_dir(&[]).join("missing");
    let err = scan_installed_versions(&source, &tree).expect_err("missing dir must fail");
    assert!(matches!(err, PlanError::Scan { .. }));
}

#[test]
fn outdated_includes_mismatched_and_missing_packages() {
    let tree = tree_with_versions(&[("a", "2.0"), ("b", "1.0"), ("c", "1.0"), ("d", "3.1")]);
    let local = installed(&[("a", "1.0"), ("c", "1.0"), ("d", "3.1")]);

    let outdated = compute_outdated_or_missing(&tree, &local);
    assert_eq!(names(&tree, &outdated), vec!["a", "b"]);
}

#[test]
fn outdated_triggers_on_locally_newer_versions() {
    let tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let local = installed(&[("a", "1.5"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);

    let outdated = compute_outdated_or_missing(&tree, &local);
    assert_eq!(names(&tree, &outdated), vec!["a"]);
}

#[test]
fn assign_actions_installs_targets_and_upgrades_their_subtrees() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let root = tree.root();
    let a = tree.find_by_name(root, "a").expect("a exists");

    assign_actions(&mut tree, root, false, &[a], WizardMode::Upgrade);

    assert_eq!(action_of(&tree, "a"), NodeAction::Install);
    assert_eq!(action_of(&tree, "b"), NodeAction::Upgrade);
    assert_eq!(action_of(&tree, "c"), NodeAction::Upgrade);
    assert_eq!(action_of(&tree, "d"), NodeAction::Upgrade);
}

#[test]
fn assign_actions_leaves_unrelated_branches_alone() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let root = tree.root();
    let b = tree.find_by_name(root, "b").expect("b exists");
    let d = tree.find_by_name(root, "d").expect("d exists");

    assign_actions(&mut tree, root, false, &[b, d], WizardMode::Upgrade);

    assert_eq!(action_of(&tree, "a"), NodeAction::None);
    assert_eq!(action_of(&tree, "b"), NodeAction::Install);
    assert_eq!(action_of(&tree, "d"), NodeAction::Install);
    assert_eq!(action_of(&tree, "c"), NodeAction::None);
}

#[test]
fn assign_actions_rebuild_marks_everything() {
    let mut tree = tree_with_versions(&[]);
    let root = tree.root();
    assign_actions(&mut tree, root, false, &[], WizardMode::Rebuild);
    for id in tree.all_nodes(root) {
        assert_eq!(tree.node(id).action, NodeAction::Rebuild);
    }
}

#[test]
fn install_plan_marks_every_node_install() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let source = test_source_dir(&[]);

    let plan = plan(&mut tree, &source, WizardMode::Install).expect("plan must succeed");
    assert_eq!(plan.count(NodeAction::Install), 4);
    assert_eq!(plan.step_count(), 24);
    assert!(plan.outdated.is_empty());

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn upgrade_plan_reports_outdated_packages() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "2.0"), ("c", "1.0"), ("d", "1.0")]);
    let source = test_source_dir(&["a-1.0", "b-1.0", "c-1.0", "d-1.0"]);

    let plan = plan(&mut tree, &source, WizardMode::Upgrade).expect("plan must succeed");
    assert_eq!(plan.outdated.len(), 1);
    assert_eq!(plan.outdated[0].name, "b");
    assert_eq!(plan.outdated[0].installed_version.as_deref(), Some("1.0"));
    assert_eq!(plan.outdated[0].version.as_deref(), Some("2.0"));
    assert_eq!(plan.outdated_ids().len(), 1);

    assert_eq!(action_of(&tree, "a"), NodeAction::None);
    assert_eq!(action_of(&tree, "b"), NodeAction::Install);
    assert_eq!(action_of(&tree, "d"), NodeAction::Upgrade);
    assert_eq!(action_of(&tree, "c"), NodeAction::None);
    assert_eq!(plan.step_count(), 8);
    assert_eq!(plan.packages[2].depth, 2);

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn upgrade_plan_is_noop_when_everything_matches() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let source = test_source_dir(&["a-1.0", "b-1.0", "c-1.0", "d-1.0"]);

    let plan = plan(&mut tree, &source, WizardMode::Upgrade).expect("plan must succeed");
    assert!(plan.is_noop());
    assert_eq!(plan.step_count(), 0);

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn rebuild_plan_refuses_outdated_installations() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let source = test_source_dir(&["a-1.0", "b-1.0", "c-1.0"]);

    let err = plan(&mut tree, &source, WizardMode::Rebuild).expect_err("rebuild must be refused");
    match err {
        PlanError::UpdatesFound { packages } => assert_eq!(packages, vec!["d".to_string()]),
        other => panic!("unexpected error: {other}"),
    }

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn rebuild_plan_rebuilds_everything_when_up_to_date() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0"), ("d", "1.0")]);
    let source = test_source_dir(&["a-1.0", "b-1.0", "c-1.0", "d-1.0"]);

    let plan = plan(&mut tree, &source, WizardMode::Rebuild).expect("plan must succeed");
    assert_eq!(plan.count(NodeAction::Rebuild), 4);
    assert_eq!(plan.step_count(), 16);

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn plan_fails_when_a_target_has_no_version() {
    let mut tree = tree_with_versions(&[("a", "1.0"), ("b", "1.0"), ("c", "1.0")]);
    let source = test_source_dir(&[]);

    let err = plan(&mut tree, &source, WizardMode::Install).expect_err("missing version must fail");
    match err {
        PlanError::MissingVersion { package } => assert_eq!(package, "d"),
        other => panic!("unexpected error: {other}"),
    }

    let _ = std::fs::remove_dir_all(source);
}

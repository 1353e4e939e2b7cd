use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use buildtree_core::{NodeAction, PackageTree};

use super::*;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_source_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "buildtree-catalog-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    std::fs::create_dir_all(&path).expect("must create source dir");
    path
}

const LISTING: &str = r#"
<table>
  <tr>
    <td><a href="/project/showfiles.php?group_id=100001&amp;package_id=200001">ildjit</a></td>
    <td><a href="/project/showfiles.php?group_id=100001&amp;package_id=200001&amp;release_id=300009"><strong>0.3.1</strong></a></td>
  </tr>
  <tr>
    <td><a href='/project/showfiles.php?group_id=100001&package_id=200002'>libjit</a></td>
    <td><a href="/project/showfiles.php?group_id=100001&package_id=200002&release_id=300010">0.1.2</a></td>
  </tr>
  <tr>
    <td><a href="/project/showfiles.php?group_id=100001&package_id=200003">stale</a></td>
    <td><a href="/project/showfiles.php?group_id=100001&package_id=200099&release_id=300011">9.9</a></td>
  </tr>
  <tr><td><a href="/project/monitor.php">monitor</a></td></tr>
</table>
"#;

fn test_tree() -> PackageTree {
    PackageTree::from_manifest_str(
        r#"
<manifest>
  <repository url="https://downloads.test/ildjit/" version_url="https://listing.test/a">
    <package name="ildjit" pack_name="ildjit" type="tar.gz"/>
    <package name="libjit" father="ildjit" pack_name="libjit" type="tar.gz"/>
  </repository>
  <repository url="https://mirror.test/extra/" version_url="https://listing.test/a">
    <package name="optimizer" father="libjit" pack_name="iljit-optimizer" type="tar.bz2"/>
  </repository>
</manifest>
"#,
    )
    .expect("manifest should parse")
}

#[test]
fn listing_pairs_package_anchor_with_matching_release() {
    let versions = parse_release_listing(LISTING);
    assert_eq!(versions.get("ildjit").map(String::as_str), Some("0.3.1"));
    assert_eq!(versions.get("libjit").map(String::as_str), Some("0.1.2"));
    assert_eq!(versions.get("stale"), None);
    assert_eq!(versions.len(), 2);
}

#[test]
fn listing_ignores_release_anchor_without_package() {
    let versions = parse_release_listing(
        r#"<a href="/project/showfiles.php?group_id=1&package_id=2&release_id=3">1.0</a>"#,
    );
    assert!(versions.is_empty());
}

#[test]
fn discover_versions_fetches_each_listing_once() {
    let tree = test_tree();
    let calls = RefCell::new(Vec::new());
    let source = |url: &str| -> Result<String, CatalogError> {
        calls.borrow_mut().push(url.to_string());
        Ok(LISTING.to_string())
    };

    let versions = discover_versions(&tree, &source).expect("discovery must succeed");
    assert_eq!(calls.borrow().as_slice(), ["https://listing.test/a"]);
    assert_eq!(versions.len(), 2);
}

#[test]
fn augment_tree_applies_discovered_versions() {
    let mut tree = test_tree();
    let source =
        |_url: &str| -> Result<String, CatalogError> { Ok(LISTING.to_string()) };

    let updated = augment_tree(&mut tree, &source).expect("augmentation must succeed");
    assert_eq!(updated, 2);
    let optimizer = tree
        .find_by_name(tree.root(), "optimizer")
        .expect("optimizer exists");
    assert_eq!(tree.node(optimizer).version, None);
    assert_eq!(tree.node(tree.root()).version.as_deref(), Some("0.3.1"));
}

#[test]
fn discovery_failure_is_a_connection_error() {
    let tree = test_tree();
    let source = |url: &str| -> Result<String, CatalogError> {
        Err(CatalogError::Connection {
            url: url.to_string(),
            diagnostic: "connection refused".to_string(),
        })
    };

    let err = discover_versions(&tree, &source).expect_err("discovery must fail");
    assert_eq!(err.title(), "Connection Error");
    let report = err.as_report().expect("connection errors have a report");
    assert_eq!(report.header(), "Cannot connect to https://listing.test/a.");
}

fn versioned_tree() -> PackageTree {
    let mut tree = test_tree();
    tree.apply_versions(
        &[("ildjit", "0.3.1"), ("libjit", "0.1.2"), ("optimizer", "1.0")]
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect::<BTreeMap<_, _>>(),
    );
    tree
}

#[test]
fn queue_targets_install_nodes_with_repository_urls() {
    let mut tree = versioned_tree();
    let libjit = tree.find_by_name(tree.root(), "libjit").expect("libjit exists");
    tree.node_mut(libjit).action = NodeAction::Upgrade;
    let source = PathBuf::from("/var/src");

    let queue = DownloadQueue::for_tree(&tree, &source).expect("queue must build");
    let urls = queue
        .requests()
        .iter()
        .map(|request| request.url.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        urls,
        vec![
            "https://downloads.test/ildjit/ildjit-0.3.1.tar.gz",
            "https://mirror.test/extra/iljit-optimizer-1.0.tar.bz2",
        ]
    );
    assert_eq!(
        queue.requests()[1].destination,
        source.join("iljit-optimizer-1.0.tar.bz2")
    );
}

#[test]
fn queue_requires_versions_for_install_nodes() {
    let tree = test_tree();
    let err = DownloadQueue::for_tree(&tree, &PathBuf::from("/var/src"))
        .expect_err("unversioned install must fail");
    assert!(matches!(err, CatalogError::MissingVersion { ref package } if package == "ildjit"));
}

#[test]
fn queue_downloads_in_bounded_batches_and_renames_parts() {
    let tree = versioned_tree();
    let source = test_source_dir();
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let fetcher = |url: &str, out: &mut dyn Write| -> Result<u64, String> {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(20));
        out.write_all(url.as_bytes()).map_err(|err| err.to_string())?;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(url.len() as u64)
    };
    let completed = Mutex::new(Vec::new());

    DownloadQueue::for_tree(&tree, &source)
        .expect("queue must build")
        .with_width(2)
        .run(&fetcher, |request, status| {
            completed
                .lock()
                .expect("lock")
                .push((request.package.clone(), status));
        })
        .expect("downloads must succeed");

    assert!(peak.load(Ordering::SeqCst) <= 2);
    let completed = completed.into_inner().expect("lock");
    assert_eq!(completed.len(), 3);
    assert_eq!(completed[0], ("ildjit".to_string(), DownloadStatus::Downloaded));
    let body = std::fs::read_to_string(source.join("libjit-0.1.2.tar.gz")).expect("archive");
    assert_eq!(body, "https://downloads.test/ildjit/libjit-0.1.2.tar.gz");
    assert!(!source.join("libjit-0.1.2.tar.gz.part").exists());

    let _ = std::fs::remove_dir_all(source);
}

#[test]
fn queue_keeps_present_archives_and_stops_after_failing_batch() {
    let tree = versioned_tree();
    let source = test_source_dir();
    std::fs::write(source.join("ildjit-0.3.1.tar.gz"), b"cached").expect("must write archive");
    let fetched = Mutex::new(Vec::new());
    let fetcher = |url: &str, _out: &mut dyn Write| -> Result<u64, String> {
        fetched.lock().expect("lock").push(url.to_string());
        if url.ends_with("libjit-0.1.2.tar.gz") {
            return Err("404 Not Found".to_string());
        }
        Ok(0)
    };
    let mut statuses = Vec::new();

    let err = DownloadQueue::for_tree(&tree, &source)
        .expect("queue must build")
        .with_width(1)
        .run(&fetcher, |request, status| {
            statuses.push((request.package.clone(), status))
        })
        .expect_err("download must fail");

    assert_eq!(statuses, vec![("ildjit".to_string(), DownloadStatus::Present)]);
    assert_eq!(
        fetched.into_inner().expect("lock"),
        vec!["https://downloads.test/ildjit/libjit-0.1.2.tar.gz".to_string()]
    );
    assert_eq!(err.title(), "Download Error");
    assert!(err.to_string().contains("404 Not Found"));
    assert!(!source.join("libjit-0.1.2.tar.gz.part").exists());
    assert!(!source.join("libjit-0.1.2.tar.gz").exists());

    let _ = std::fs::remove_dir_all(source);
}

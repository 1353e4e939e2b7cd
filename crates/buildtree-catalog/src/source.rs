use std::collections::BTreeMap;
use std::time::Duration;

use buildtree_core::PackageTree;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::listing::parse_release_listing;

/// Fetches the release listing page behind a repository's `version_url`.
pub trait VersionSource {
    fn fetch_listing(&self, url: &str) -> Result<String, CatalogError>;
}

impl<F> VersionSource for F
where
    F: Fn(&str) -> Result<String, CatalogError>,
{
    fn fetch_listing(&self, url: &str) -> Result<String, CatalogError> {
        self(url)
    }
}

pub struct HttpVersionSource {
    client: Client,
}

impl HttpVersionSource {
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CatalogError::Connection {
                url: String::new(),
                diagnostic: format!("failed to build http client: {err}"),
            })?;
        Ok(Self { client })
    }
}

impl VersionSource for HttpVersionSource {
    fn fetch_listing(&self, url: &str) -> Result<String, CatalogError> {
        let connection = |err: reqwest::Error| CatalogError::Connection {
            url: url.to_string(),
            diagnostic: err.to_string(),
        };
        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(connection)
    }
}

/// Query every distinct `version_url` of the tree's repositories, in
/// manifest order, and merge the discovered versions.
pub fn discover_versions<V: VersionSource + ?Sized>(
    tree: &PackageTree,
    source: &V,
) -> Result<BTreeMap<String, String>, CatalogError> {
    let mut seen = Vec::new();
    let mut versions = BTreeMap::new();
    for repository in tree.repositories() {
        if seen.contains(&repository.version_url.as_str()) {
            continue;
        }
        seen.push(repository.version_url.as_str());

        debug!(url = %repository.version_url, "fetching release listing");
        let page = source.fetch_listing(&repository.version_url)?;
        let found = parse_release_listing(&page);
        debug!(url = %repository.version_url, packages = found.len(), "release listing parsed");
        versions.extend(found);
    }
    Ok(versions)
}

/// Discover versions and write them into the tree. Returns how many packages
/// received a version.
pub fn augment_tree<V: VersionSource + ?Sized>(
    tree: &mut PackageTree,
    source: &V,
) -> Result<usize, CatalogError> {
    let versions = discover_versions(tree, source)?;
    let updated = tree.apply_versions(&versions);
    info!(
        updated,
        packages = tree.node_count(),
        "package versions discovered"
    );
    Ok(updated)
}

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::archive::ArchiveType;
use crate::error::{Error, Result};
use crate::manifest::PackageManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the builder does with a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAction {
    /// Unpack, configure, build and install.
    #[default]
    Install,
    /// Clean and install the already configured tree.
    Upgrade,
    None,
    /// Configure, clean, build and install.
    Rebuild,
}

impl NodeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::None => "none",
            Self::Rebuild => "rebuild",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub name: String,
    pub package_archive_name: String,
    pub archive_type: ArchiveType,
    pub version: Option<String>,
    pub action: NodeAction,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl PackageNode {
    pub fn new(
        name: impl Into<String>,
        package_archive_name: impl Into<String>,
        archive_type: ArchiveType,
    ) -> Self {
        Self {
            name: name.into(),
            package_archive_name: package_archive_name.into(),
            archive_type,
            version: None,
            action: NodeAction::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `<pack_name>-<version>`, the directory the archive unpacks to.
    pub fn directory_name(&self) -> Option<String> {
        self.version
            .as_ref()
            .map(|version| format!("{}-{version}", self.package_archive_name))
    }

    pub fn archive_file_name(&self) -> Option<String> {
        self.directory_name()
            .map(|directory| format!("{directory}.{}", self.archive_type.extension()))
    }
}

impl std::fmt::Display for PackageNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (pack {}, type {}",
            self.name, self.package_archive_name, self.archive_type
        )?;
        if let Some(version) = &self.version {
            write!(f, ", version {version}")?;
        }
        write!(f, ", action {})", self.action.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Base download URL; archives live at `url + archive_file_name`.
    pub url: String,
    /// Release listing page used to discover versions.
    pub version_url: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTree {
    nodes: Vec<PackageNode>,
    root: NodeId,
    repositories: Vec<Repository>,
}

impl PackageTree {
    pub fn from_manifest_path(path: &Path) -> Result<Self> {
        Self::from_manifest(&PackageManifest::from_path(path)?)
    }

    pub fn from_manifest_str(input: &str) -> Result<Self> {
        Self::from_manifest(&PackageManifest::from_xml_str(input)?)
    }

    /// Validate the manifest and build the tree. Fathers may be declared
    /// after their children; siblings keep manifest order.
    pub fn from_manifest(manifest: &PackageManifest) -> Result<Self> {
        manifest.validate()?;
        let mut nodes = Vec::new();
        let mut ids: HashMap<&str, NodeId> = HashMap::new();
        let mut repositories = Vec::new();

        for repository in &manifest.repositories {
            let mut members = Vec::new();
            for package in &repository.packages {
                let archive_type = ArchiveType::parse(&package.archive_type).ok_or_else(|| {
                    Error::parse(
                        "package manifest",
                        format!("package '{}' has an empty type", package.name),
                    )
                })?;
                ids.insert(package.name.as_str(), NodeId(nodes.len()));
                nodes.push(PackageNode::new(
                    package.name.clone(),
                    package.pack_name.clone(),
                    archive_type,
                ));
                members.push(package.name.clone());
            }
            repositories.push(Repository {
                url: repository.url.clone(),
                version_url: repository.version_url.clone(),
                members,
            });
        }

        let mut root = None;
        for package in manifest.packages() {
            let id = ids[package.name.as_str()];
            match &package.father {
                None => root = Some(id),
                Some(father) => {
                    let father_id = *ids.get(father.as_str()).ok_or_else(|| {
                        Error::parse(
                            "package manifest",
                            format!("package '{}' names unknown father '{father}'", package.name),
                        )
                    })?;
                    nodes[id.0].parent = Some(father_id);
                    nodes[father_id.0].children.push(id);
                }
            }
        }
        let root =
            root.ok_or_else(|| Error::parse("package manifest", "the manifest has no root package"))?;

        let tree = Self {
            nodes,
            root,
            repositories,
        };
        let reachable = tree.all_nodes(root).len();
        if reachable != tree.nodes.len() {
            let mut detached = tree
                .nodes
                .iter()
                .enumerate()
                .filter(|(index, _)| !tree.is_descendant_of(NodeId(*index), root))
                .map(|(_, node)| node.name.as_str())
                .collect::<Vec<_>>();
            detached.sort();
            return Err(Error::parse(
                "package manifest",
                format!(
                    "packages not reachable from root '{}' (father cycle): {}",
                    tree.nodes[root.0].name,
                    detached.join(", ")
                ),
            ));
        }
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &PackageNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PackageNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Pre-order listing of the subtree rooted at `subtree_root`.
    pub fn all_nodes(&self, subtree_root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![subtree_root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Every node below `id`, pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut all = self.all_nodes(id);
        all.remove(0);
        all
    }

    pub fn leaf_count(&self, subtree_root: NodeId) -> usize {
        self.all_nodes(subtree_root)
            .into_iter()
            .filter(|id| self.nodes[id.0].is_leaf())
            .count()
    }

    pub fn find_by_name(&self, subtree_root: NodeId, name: &str) -> Option<NodeId> {
        self.find(subtree_root, |node| node.name == name)
    }

    pub fn find_by_archive_name(&self, subtree_root: NodeId, archive_name: &str) -> Option<NodeId> {
        self.find(subtree_root, |node| node.package_archive_name == archive_name)
    }

    /// First pre-order match wins.
    fn find(&self, subtree_root: NodeId, matches: impl Fn(&PackageNode) -> bool) -> Option<NodeId> {
        self.all_nodes(subtree_root)
            .into_iter()
            .find(|id| matches(&self.nodes[id.0]))
    }

    fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        let mut hops = 0;
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                return false;
            }
            current = self.nodes[candidate.0].parent;
        }
        false
    }

    /// Catalog versions keyed by archive name. Packages without a discovered
    /// version map to `None`.
    pub fn versions_by_archive_name(&self, subtree_root: NodeId) -> BTreeMap<String, Option<String>> {
        self.all_nodes(subtree_root)
            .into_iter()
            .map(|id| {
                let node = &self.nodes[id.0];
                (node.package_archive_name.clone(), node.version.clone())
            })
            .collect()
    }

    pub fn base_url_for(&self, name: &str) -> Option<&str> {
        self.repository_for(name).map(|repository| repository.url.as_str())
    }

    pub fn version_url_for(&self, name: &str) -> Option<&str> {
        self.repository_for(name)
            .map(|repository| repository.version_url.as_str())
    }

    fn repository_for(&self, name: &str) -> Option<&Repository> {
        self.repositories
            .iter()
            .find(|repository| repository.members.iter().any(|member| member == name))
    }

    /// Apply discovered versions by logical name. Nodes missing from
    /// `versions` keep whatever they had. Returns the number of nodes updated.
    pub fn apply_versions(&mut self, versions: &BTreeMap<String, String>) -> usize {
        let mut updated = 0;
        for node in &mut self.nodes {
            if let Some(version) = versions.get(&node.name) {
                node.version = Some(version.clone());
                updated += 1;
            }
        }
        updated
    }

    /// Indented dump of the subtree, one package per line.
    pub fn render(&self, subtree_root: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![(subtree_root, 0_usize)];
        while let Some((id, depth)) = stack.pop() {
            let _ = writeln!(out, "{}{}", " ".repeat(depth), self.nodes[id.0]);
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }
}

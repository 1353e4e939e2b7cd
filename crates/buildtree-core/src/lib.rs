mod archive;
mod error;
mod manifest;
mod tree;
pub mod version;

pub use archive::{ArchiveType, Extractor};
pub use error::{Error, Result};
pub use manifest::{PackageEntry, PackageManifest, RepositoryEntry};
pub use tree::{NodeAction, NodeId, PackageNode, PackageTree, Repository};

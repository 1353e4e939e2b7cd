mod download;
mod error;
mod listing;
mod source;

pub use download::{
    ArchiveFetcher, DownloadQueue, DownloadRequest, DownloadStatus, HttpFetcher,
    DEFAULT_DOWNLOAD_WIDTH,
};
pub use error::CatalogError;
pub use listing::parse_release_listing;
pub use source::{augment_tree, discover_versions, HttpVersionSource, VersionSource};

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot connect to {url}: {diagnostic}")]
    Connection { url: String, diagnostic: String },

    #[error("download of {} from {url} failed: {diagnostic}", path.display())]
    Download {
        url: String,
        path: PathBuf,
        diagnostic: String,
    },

    #[error("package '{package}' has no discovered version to download")]
    MissingVersion { package: String },

    #[error("package '{package}' does not belong to any repository")]
    MissingRepository { package: String },
}

impl CatalogError {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection Error",
            Self::Download { .. } => "Download Error",
            Self::MissingVersion { .. } | Self::MissingRepository { .. } => "Catalog Error",
        }
    }

    /// The connection variant in the shared three-part report shape.
    pub fn as_report(&self) -> Option<buildtree_core::Error> {
        match self {
            Self::Connection { url, diagnostic } => Some(buildtree_core::Error::Connection {
                url: url.clone(),
                diagnostic: diagnostic.clone(),
            }),
            _ => None,
        }
    }
}

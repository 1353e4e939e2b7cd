use thiserror::Error as ThisError;

/// Every failure the installer reports.
///
/// Each variant carries the package (or subject) it concerns and the raw
/// diagnostic text, so a failure can be rendered as the three-part report
/// used by every front end: [`Error::title`], [`Error::header`] and
/// [`Error::diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("failed to parse {subject}: {diagnostic}")]
    Parse { subject: String, diagnostic: String },

    #[error("error unpacking {package}: {diagnostic}")]
    Unpack { package: String, diagnostic: String },

    #[error("folder {package} is missing: {diagnostic}")]
    MissingFolder { package: String, diagnostic: String },

    #[error("a dependency of {package} is missing: {diagnostic}")]
    Configure { package: String, diagnostic: String },

    #[error("error while cleaning {package}: {diagnostic}")]
    Clean { package: String, diagnostic: String },

    #[error("error while building {package}: {diagnostic}")]
    Build { package: String, diagnostic: String },

    #[error("error while installing {package}: {diagnostic}")]
    Install { package: String, diagnostic: String },

    #[error("error removing {package}: {diagnostic}")]
    Removal { package: String, diagnostic: String },

    #[error("cannot connect to {url}: {diagnostic}")]
    Connection { url: String, diagnostic: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(subject: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::Parse {
            subject: subject.into(),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "Parsing Error",
            Self::Unpack { .. } => "Unpack Error",
            Self::MissingFolder { .. } => "Missing Folder",
            Self::Configure { .. } => "Error while configuring",
            Self::Clean { .. } => "Error while cleaning",
            Self::Build { .. } => "Error while building",
            Self::Install { .. } => "Error while installing",
            Self::Removal { .. } => "Removal Error",
            Self::Connection { .. } => "Connection Error",
        }
    }

    pub fn header(&self) -> String {
        match self {
            Self::Parse { subject, .. } => format!("Error parsing {subject}."),
            Self::Unpack { package, .. } => format!("Error unpacking {package}."),
            Self::MissingFolder { package, .. } => format!("Folder {package} is missing."),
            Self::Configure { package, .. } => format!("A dependency of {package} is missing."),
            Self::Clean { package, .. } => format!("Error while cleaning {package}."),
            Self::Build { package, .. } => format!("Error while building {package}."),
            Self::Install { package, .. } => format!("Error while installing {package}."),
            Self::Removal { package, .. } => format!("Error removing {package}."),
            Self::Connection { url, .. } => format!("Cannot connect to {url}."),
        }
    }

    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Parse { diagnostic, .. }
            | Self::Unpack { diagnostic, .. }
            | Self::MissingFolder { diagnostic, .. }
            | Self::Configure { diagnostic, .. }
            | Self::Clean { diagnostic, .. }
            | Self::Build { diagnostic, .. }
            | Self::Install { diagnostic, .. }
            | Self::Removal { diagnostic, .. }
            | Self::Connection { diagnostic, .. } => diagnostic,
        }
    }
}

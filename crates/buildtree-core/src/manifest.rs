use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::archive::ArchiveType;
use crate::error::{Error, Result};

/// The XML package manifest.
///
/// ```xml
/// <manifest>
///   <repository url="https://host/files/" version_url="https://host/showfiles.php?group_id=123456">
///     <package name="ildjit" pack_name="ildjit" type="tar.gz"/>
///     <package name="libjit" father="ildjit" pack_name="libjit" type="tar.gz"/>
///   </repository>
/// </manifest>
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    #[serde(rename = "repository", default)]
    pub repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepositoryEntry {
    pub url: String,
    pub version_url: String,
    #[serde(rename = "package", default)]
    pub packages: Vec<PackageEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub father: Option<String>,
    pub pack_name: String,
    #[serde(rename = "type")]
    pub archive_type: String,
}

impl PackageManifest {
    pub fn from_xml_str(input: &str) -> Result<Self> {
        let mut manifest: Self = serde_xml_rs::from_str(input)
            .map_err(|err| Error::parse("package manifest", err.to_string()))?;
        manifest.normalize();
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::parse(format!("package manifest {}", path.display()), err.to_string())
        })?;
        Self::from_xml_str(&raw).map_err(|err| match err {
            Error::Parse { diagnostic, .. } => Error::parse(
                format!("package manifest {}", path.display()),
                diagnostic,
            ),
            other => other,
        })
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageEntry> {
        self.repositories
            .iter()
            .flat_map(|repository| repository.packages.iter())
    }

    fn normalize(&mut self) {
        for repository in &mut self.repositories {
            repository.url = repository.url.trim().to_string();
            repository.version_url = repository.version_url.trim().to_string();
            for package in &mut repository.packages {
                package.name = package.name.trim().to_string();
                package.pack_name = package.pack_name.trim().to_string();
                package.archive_type = package.archive_type.trim().to_string();
                package.father = package
                    .father
                    .take()
                    .map(|father| father.trim().to_string())
                    .filter(|father| !father.is_empty());
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut root: Option<&str> = None;

        for package in self.packages() {
            if package.name.is_empty() {
                return Err(Error::parse("package manifest", "package name must not be empty"));
            }
            if package.pack_name.is_empty() {
                return Err(Error::parse(
                    "package manifest",
                    format!("package '{}' has an empty pack_name", package.name),
                ));
            }
            if ArchiveType::parse(&package.archive_type).is_none() {
                return Err(Error::parse(
                    "package manifest",
                    format!("package '{}' has an empty type", package.name),
                ));
            }
            if !names.insert(package.name.as_str()) {
                return Err(Error::parse(
                    "package manifest",
                    format!("duplicate package '{}'", package.name),
                ));
            }
            if package.father.is_none() {
                if let Some(existing) = root {
                    return Err(Error::parse(
                        "package manifest",
                        format!(
                            "packages '{existing}' and '{}' both omit 'father'; exactly one root is allowed",
                            package.name
                        ),
                    ));
                }
                root = Some(&package.name);
            }
        }

        if root.is_none() {
            return Err(Error::parse(
                "package manifest",
                "no package omits 'father'; exactly one root is required",
            ));
        }

        for package in self.packages() {
            if let Some(father) = &package.father {
                if father == &package.name {
                    return Err(Error::parse(
                        "package manifest",
                        format!("package '{}' is its own father", package.name),
                    ));
                }
                if !names.contains(father.as_str()) {
                    return Err(Error::parse(
                        "package manifest",
                        format!(
                            "package '{}' names unknown father '{father}'",
                            package.name
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

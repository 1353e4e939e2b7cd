/// Tool that unpacks an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extractor {
    /// `tar -xvf`, which detects the compression itself.
    Tar,
    Unzip,
}

/// The manifest `type` attribute, kept exactly as the manifest spells it.
///
/// Archive file names are `<pack_name>-<version>.<type>`, so the spelling
/// must survive untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveType(String);

impl ArchiveType {
    /// Accepts any non-empty type after trimming.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// File extension appended to `<pack_name>-<version>`.
    pub fn extension(&self) -> &str {
        &self.0
    }

    pub fn extractor(&self) -> Extractor {
        if self.0.eq_ignore_ascii_case("zip") {
            Extractor::Unzip
        } else {
            Extractor::Tar
        }
    }
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

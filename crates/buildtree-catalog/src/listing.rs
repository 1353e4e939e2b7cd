use std::collections::BTreeMap;

use regex::Regex;
use tracing::{trace, warn};

const ANCHOR_PATTERN: &str = r"(?is)<a\b([^>]*)>(.*?)</a\s*>";
const HREF_PATTERN: &str = r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#;
const PACKAGE_HREF_PATTERN: &str = r"showfiles\.php\?group_id=(\d+)&package_id=(\d+)$";
const RELEASE_HREF_PATTERN: &str =
    r"showfiles\.php\?group_id=(\d+)&package_id=(\d+)&release_id=(\d+)$";
const TAG_PATTERN: &str = r"<[^>]*>";

struct ListingPatterns {
    anchor: Regex,
    href: Regex,
    package_href: Regex,
    release_href: Regex,
    tag: Regex,
}

impl ListingPatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            anchor: Regex::new(ANCHOR_PATTERN)?,
            href: Regex::new(HREF_PATTERN)?,
            package_href: Regex::new(PACKAGE_HREF_PATTERN)?,
            release_href: Regex::new(RELEASE_HREF_PATTERN)?,
            tag: Regex::new(TAG_PATTERN)?,
        })
    }

    fn text_of(&self, inner_html: &str) -> String {
        let stripped = self.tag.replace_all(inner_html, " ");
        decode_entities(&stripped)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extract `package name -> latest version` pairs from a release listing page.
///
/// A package anchor (`showfiles.php?group_id=G&package_id=P`) names a package
/// by its text. The next release anchor
/// (`showfiles.php?group_id=G&package_id=P&release_id=R`) carries the version
/// as its text, and only counts when it refers to the same `package_id`. A
/// release anchor of another package discards the pending name. Later pairs
/// overwrite earlier ones.
pub fn parse_release_listing(html: &str) -> BTreeMap<String, String> {
    let mut versions = BTreeMap::new();
    let patterns = match ListingPatterns::compile() {
        Ok(patterns) => patterns,
        Err(err) => {
            warn!(error = %err, "release listing patterns failed to compile");
            return versions;
        }
    };

    let mut pending: Option<(String, String)> = None;
    for anchor in patterns.anchor.captures_iter(html) {
        let Some(href) = patterns.href.captures(&anchor[1]).and_then(|captures| {
            captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|href| decode_entities(href.as_str().trim()))
        }) else {
            continue;
        };
        let text = patterns.text_of(&anchor[2]);

        if let Some(captures) = patterns.release_href.captures(&href) {
            let package_id = &captures[2];
            match pending.take() {
                Some((pending_id, name)) if pending_id == package_id && !text.is_empty() => {
                    trace!(package = %name, version = %text, "release found");
                    versions.insert(name, text);
                }
                Some((_, name)) => {
                    trace!(package = %name, package_id, "release anchor of another package");
                }
                None => {}
            }
        } else if let Some(captures) = patterns.package_href.captures(&href) {
            pending = (!text.is_empty()).then(|| (captures[2].to_string(), text));
        }
    }
    versions
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

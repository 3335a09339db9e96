use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, WtdError};

/// Extension that terminates the archive part of an `archive-entry://` locator.
pub const ARCHIVE_EXTENSION: &str = ".zip";

const DIRECT_FILE: &str = "direct-file://";
const ARCHIVE_ENTRY: &str = "archive-entry://";
const CACHE_STORE: &str = "cache-store://";

// ---------------------------------------------------------------------------
// Locator – where a column's raw table comes from
// ---------------------------------------------------------------------------

/// URL-style data location.
///
/// ```text
/// direct-file://<path>
/// archive-entry://<archive>.zip/<entry>
/// cache-store://<store>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A tab-delimited raw recording on disk.
    DirectFile(PathBuf),
    /// A raw recording stored inside a zip archive.
    ArchiveEntry { archive: PathBuf, entry: String },
    /// A cache store; the table is addressed by the experiment key.
    CacheStore(PathBuf),
}

impl Locator {
    /// Parse a locator string. Unknown schemes are a configuration error.
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix(DIRECT_FILE) {
            non_empty(path, s)?;
            Ok(Locator::DirectFile(PathBuf::from(path)))
        } else if let Some(rest) = s.strip_prefix(ARCHIVE_ENTRY) {
            parse_archive_entry(rest, s)
        } else if let Some(path) = s.strip_prefix(CACHE_STORE) {
            non_empty(path, s)?;
            Ok(Locator::CacheStore(PathBuf::from(path)))
        } else {
            let head: String = s.chars().take(20).collect();
            Err(WtdError::Configuration(format!(
                "cannot tell data source type from '{head}...'"
            )))
        }
    }

    /// `true` for the backends that parse a raw recording.
    pub fn is_raw(&self) -> bool {
        !matches!(self, Locator::CacheStore(_))
    }
}

fn non_empty(path: &str, full: &str) -> Result<()> {
    if path.is_empty() {
        Err(WtdError::Configuration(format!("locator '{full}' has an empty path")))
    } else {
        Ok(())
    }
}

/// Split `<archive>.zip/<entry>`. More than one `.zip` in the path is
/// tolerated with a warning; the last occurrence ends the archive path.
fn parse_archive_entry(rest: &str, full: &str) -> Result<Locator> {
    let occurrences = rest.matches(ARCHIVE_EXTENSION).count();
    let Some(pos) = rest.rfind(ARCHIVE_EXTENSION) else {
        return Err(WtdError::Configuration(format!(
            "archive locator '{full}' has no {ARCHIVE_EXTENSION} archive"
        )));
    };
    if occurrences > 1 {
        log::warn!(
            "archive locator '{full}' contains {occurrences} '{ARCHIVE_EXTENSION}' extensions, \
             using the last one"
        );
    }
    let split = pos + ARCHIVE_EXTENSION.len();
    let archive = &rest[..split];
    let entry = rest[split..].trim_start_matches('/');
    if archive == ARCHIVE_EXTENSION || entry.is_empty() {
        return Err(WtdError::Configuration(format!(
            "archive locator '{full}' needs both an archive path and an entry path"
        )));
    }
    Ok(Locator::ArchiveEntry {
        archive: PathBuf::from(archive),
        entry: entry.to_string(),
    })
}

impl FromStr for Locator {
    type Err = WtdError;

    fn from_str(s: &str) -> Result<Self> {
        Locator::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::DirectFile(p) => write!(f, "{DIRECT_FILE}{}", p.display()),
            Locator::ArchiveEntry { archive, entry } => {
                write!(f, "{ARCHIVE_ENTRY}{}/{entry}", archive.display())
            }
            Locator::CacheStore(p) => write!(f, "{CACHE_STORE}{}", p.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_scheme() {
        assert_eq!(
            Locator::parse("direct-file:///data/run.csv").unwrap(),
            Locator::DirectFile(PathBuf::from("/data/run.csv"))
        );
        assert_eq!(
            Locator::parse("cache-store:///data/.cache").unwrap(),
            Locator::CacheStore(PathBuf::from("/data/.cache"))
        );
        assert_eq!(
            Locator::parse("archive-entry:///u/WTD_upload.zip/CO_1000/L2/1234").unwrap(),
            Locator::ArchiveEntry {
                archive: PathBuf::from("/u/WTD_upload.zip"),
                entry: "CO_1000/L2/1234".into(),
            }
        );
    }

    #[test]
    fn last_archive_extension_wins() {
        let loc = Locator::parse("archive-entry:///a.zip/b.zip/inner/file").unwrap();
        assert_eq!(
            loc,
            Locator::ArchiveEntry {
                archive: PathBuf::from("/a.zip/b.zip"),
                entry: "inner/file".into(),
            }
        );
    }

    #[test]
    fn malformed_locators_are_configuration_errors() {
        for bad in [
            "ftp://x",
            "direct-file://",
            "archive-entry:///no/archive/here",
            "archive-entry:///data.zip",
            "archive-entry://.zip/entry",
        ] {
            assert!(
                matches!(Locator::parse(bad), Err(WtdError::Configuration(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn display_round_trips() {
        let s = "archive-entry:///u/up.zip/CO_1000/L1/x";
        assert_eq!(Locator::parse(s).unwrap().to_string(), s);
        assert!(!Locator::parse("cache-store:///c").unwrap().is_raw());
    }
}

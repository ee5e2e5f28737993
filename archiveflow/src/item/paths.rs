//! Artifact path derivation.
//!
//! Source files live in the per-job working directory `<data_dir>/<ident>`;
//! target files live directly under `data_dir`. All functions here are pure.
//!
//! The ident and the base file name are joined onto `data_dir`, so both must
//! pass [`check_path_component`] first. `Path::join` with an absolute or
//! `..` argument would otherwise resolve outside `data_dir`.

use crate::errors::ArchiveflowError;
use crate::utils::{file_timestamp, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Suffix appended to the base file name of an aborted job.
pub const ABORTED_SUFFIX: &str = "-aborted";

/// Extension of the WARC artifact.
pub const WARC_EXTENSION: &str = "warc.gz";

/// Extension of the info file.
pub const INFO_EXTENSION: &str = "json";

/// File name of the fetch tool's cookie jar.
pub const COOKIE_JAR_FILE: &str = "cookies.txt";

/// Number of leading ident characters carried in file names.
pub const IDENT_PREFIX_LEN: usize = 5;

/// Final resting places of a job's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPaths {
    /// Destination of the WARC file.
    pub warc_file: PathBuf,
    /// Destination of the info file.
    pub info_file: PathBuf,
}

/// Every path a job touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPaths {
    /// Per-job working directory.
    pub item_dir: PathBuf,
    /// `<slug>-<timestamp>-<ident prefix>`, plus the aborted suffix if relabeled.
    pub warc_file_base: String,
    /// WARC file as written by the fetch.
    pub source_warc_file: PathBuf,
    /// Info file as written by `WriteInfo`.
    pub source_info_file: PathBuf,
    /// Cookie jar for the fetch tool.
    pub cookie_jar: PathBuf,
    /// Where the artifacts are moved at the end.
    pub target: TargetPaths,
}

impl ItemPaths {
    /// Relabels the artifacts as aborted.
    ///
    /// Only the target paths change; the working copies keep their names.
    pub fn mark_aborted(&mut self, data_dir: &Path) {
        if !self.warc_file_base.ends_with(ABORTED_SUFFIX) {
            self.warc_file_base.push_str(ABORTED_SUFFIX);
        }
        self.target = derive_target_paths(data_dir, &self.warc_file_base);
    }
}

/// Checks that `value` is exactly one plain file name.
///
/// Rejects empty values, absolute paths, separators, `.` and `..`.
pub fn check_path_component(attribute: &'static str, value: &str) -> Result<(), ArchiveflowError> {
    let mut components = Path::new(value).components();
    let plain = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name.to_str() == Some(value),
        _ => false,
    };

    if plain {
        Ok(())
    } else {
        Err(ArchiveflowError::InvalidPathComponent {
            attribute,
            value: value.to_string(),
        })
    }
}

/// Returns the working directory for a job.
///
/// `ident` must already have passed [`check_path_component`].
#[must_use]
pub fn item_dir(data_dir: &Path, ident: &str) -> PathBuf {
    data_dir.join(ident)
}

/// Builds `<slug>-<YYYYMMDD-HHMMSS>-<first five chars of ident>`.
#[must_use]
pub fn warc_file_base(slug: &str, timestamp: &Timestamp, ident: &str) -> String {
    let prefix: String = ident.chars().take(IDENT_PREFIX_LEN).collect();
    format!("{slug}-{}-{prefix}", file_timestamp(timestamp))
}

/// Derives the target paths for a base file name.
#[must_use]
pub fn derive_target_paths(data_dir: &Path, warc_file_base: &str) -> TargetPaths {
    TargetPaths {
        warc_file: data_dir.join(format!("{warc_file_base}.{WARC_EXTENSION}")),
        info_file: data_dir.join(format!("{warc_file_base}.{INFO_EXTENSION}")),
    }
}

/// Derives every path for a freshly prepared job.
#[must_use]
pub fn derive_paths(data_dir: &Path, ident: &str, slug: &str, timestamp: &Timestamp) -> ItemPaths {
    let item_dir = item_dir(data_dir, ident);
    let base = warc_file_base(slug, timestamp, ident);

    ItemPaths {
        source_warc_file: item_dir.join(format!("{base}.{WARC_EXTENSION}")),
        source_info_file: item_dir.join(format!("{base}.{INFO_EXTENSION}")),
        cookie_jar: item_dir.join(COOKIE_JAR_FILE),
        target: derive_target_paths(data_dir, &base),
        warc_file_base: base,
        item_dir,
    }
}

/// Fetch tool options derived from a job's fetch depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// `--recursive` or empty.
    pub recursive: String,
    /// `--level` or empty.
    pub level: String,
    /// The level limit, or empty.
    pub depth: String,
}

impl FetchOptions {
    /// Depth value meaning "this page only".
    pub const SHALLOW: &'static str = "shallow";

    /// Translates a fetch depth.
    ///
    /// A depth of zero means unlimited to the fetch tool, so "shallow" must
    /// turn recursion off entirely rather than pass a level.
    #[must_use]
    pub fn from_depth(depth: &str) -> Self {
        if depth == Self::SHALLOW {
            Self {
                recursive: String::new(),
                level: String::new(),
                depth: String::new(),
            }
        } else {
            Self {
                recursive: "--recursive".to_string(),
                level: "--level".to_string(),
                depth: depth.to_string(),
            }
        }
    }

    /// Returns true if the fetch should recurse.
    #[must_use]
    pub fn is_recursive(&self) -> bool {
        !self.recursive.is_empty()
    }

    /// The non-empty option tokens, in command-line order.
    #[must_use]
    pub fn as_args(&self) -> Vec<&str> {
        [&self.recursive, &self.level, &self.depth]
            .into_iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn ts() -> Timestamp {
        Utc.with_ymd_and_hms(2014, 3, 9, 17, 5, 42).unwrap()
    }

    #[test]
    fn test_plain_names_pass_component_check() {
        for value in ["abc123", "0f9e8d7c6b5a", "with.dots", "..hidden", "a-b_c"] {
            assert!(check_path_component("ident", value).is_ok(), "{value}");
        }
    }

    #[test]
    fn test_escaping_names_fail_component_check() {
        for value in ["", ".", "..", "/tmp/elsewhere", "/", "a/b", "../abc", "abc/", "./abc"] {
            let err = check_path_component("ident", value).unwrap_err();
            assert!(
                matches!(err, ArchiveflowError::InvalidPathComponent { attribute: "ident", .. }),
                "{value}"
            );
        }
    }

    #[test]
    fn test_absolute_ident_would_escape_data_dir() {
        let escaped = item_dir(Path::new("/data"), "/tmp/elsewhere");
        assert!(!escaped.starts_with("/data"));
        assert!(check_path_component("ident", "/tmp/elsewhere").is_err());
    }

    #[test]
    fn test_warc_file_base() {
        assert_eq!(
            warc_file_base("example", &ts(), "abc123xyz"),
            "example-20140309-170542-abc12"
        );
    }

    #[test]
    fn test_warc_file_base_short_ident() {
        assert_eq!(warc_file_base("s", &ts(), "ab"), "s-20140309-170542-ab");
    }

    #[test]
    fn test_derive_paths_layout() {
        let data = Path::new("/data");
        let paths = derive_paths(data, "abc123", "example", &ts());
        let base = "example-20140309-170542-abc12";

        assert_eq!(paths.item_dir, PathBuf::from("/data/abc123"));
        assert_eq!(paths.warc_file_base, base);
        assert_eq!(
            paths.source_warc_file,
            PathBuf::from(format!("/data/abc123/{base}.warc.gz"))
        );
        assert_eq!(
            paths.source_info_file,
            PathBuf::from(format!("/data/abc123/{base}.json"))
        );
        assert_eq!(paths.cookie_jar, PathBuf::from("/data/abc123/cookies.txt"));
        assert_eq!(
            paths.target.warc_file,
            PathBuf::from(format!("/data/{base}.warc.gz"))
        );
        assert_eq!(
            paths.target.info_file,
            PathBuf::from(format!("/data/{base}.json"))
        );
    }

    #[test]
    fn test_derive_paths_idempotent() {
        let data = Path::new("/data");
        assert_eq!(
            derive_paths(data, "abc123", "example", &ts()),
            derive_paths(data, "abc123", "example", &ts())
        );
    }

    #[test]
    fn test_mark_aborted_changes_only_target() {
        let data = Path::new("/data");
        let original = derive_paths(data, "abc123", "example", &ts());
        let mut relabeled = original.clone();
        relabeled.mark_aborted(data);

        assert_eq!(relabeled.item_dir, original.item_dir);
        assert_eq!(relabeled.source_warc_file, original.source_warc_file);
        assert_eq!(relabeled.source_info_file, original.source_info_file);
        assert_eq!(relabeled.cookie_jar, original.cookie_jar);
        assert_eq!(
            relabeled.target.warc_file,
            PathBuf::from("/data/example-20140309-170542-abc12-aborted.warc.gz")
        );
        assert_eq!(
            relabeled.target.info_file,
            PathBuf::from("/data/example-20140309-170542-abc12-aborted.json")
        );
    }

    #[test]
    fn test_mark_aborted_twice_is_stable() {
        let data = Path::new("/data");
        let mut once = derive_paths(data, "abc123", "example", &ts());
        once.mark_aborted(data);
        let mut twice = once.clone();
        twice.mark_aborted(data);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fetch_options_shallow() {
        let opts = FetchOptions::from_depth("shallow");
        assert_eq!(opts.recursive, "");
        assert_eq!(opts.level, "");
        assert_eq!(opts.depth, "");
        assert!(!opts.is_recursive());
        assert!(opts.as_args().is_empty());
    }

    #[test]
    fn test_fetch_options_levels() {
        let opts = FetchOptions::from_depth("5");
        assert_eq!(opts.recursive, "--recursive");
        assert_eq!(opts.level, "--level");
        assert_eq!(opts.depth, "5");
        assert!(opts.is_recursive());
        assert_eq!(opts.as_args(), vec!["--recursive", "--level", "5"]);
    }

    #[test]
    fn test_fetch_options_inf_passes_through() {
        assert_eq!(FetchOptions::from_depth("inf").depth, "inf");
    }
}

//! Directory rules: which timestamp strategy and which naming patterns apply
//! to a file, chosen by where the file currently lives.

use crate::error::{ErrorKind, Result};
use crate::template::NamePattern;
use datum_storage::validate_path;
use derive_more::Display;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use time::format_description::OwnedFormatItem;
use time::macros::format_description;

pub const DEFAULT_DIRECTORY_PATTERN: &str = "%Y/%Y-%m-%d";
pub const DEFAULT_FILE_PATTERN: &str = "%Y%m%d_%H%M%S_%f";

/// Where a file's timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Strategy {
    /// Embedded EXIF/QuickTime capture dates.
    #[default]
    #[display("metadata")]
    #[cfg_attr(feature = "serde", serde(alias = "exif", alias = "metadata-exif"))]
    Metadata,
    /// A date read off the image itself by a visual date service.
    #[display("visual-content")]
    #[cfg_attr(feature = "serde", serde(alias = "visual", alias = "image"))]
    VisualContent,
    /// The modification date reported by the metadata service.
    #[display("file-system-time")]
    #[cfg_attr(feature = "serde", serde(alias = "filesystem", alias = "file-system"))]
    FileSystemTime,
}

/// Strategy plus naming patterns, compiled once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRule {
    strategy: Strategy,
    directory: NamePattern,
    file: NamePattern,
}
impl DirectoryRule {
    /// Compile a rule. Fails with [`ErrorKind::Template`] when either pattern
    /// does not parse, or when the directory pattern asks for `%f`.
    pub fn new(strategy: Strategy, directory_pattern: &str, file_pattern: &str) -> Result<Self> {
        let directory: NamePattern = directory_pattern.parse()?;
        if directory.has_subsecond() {
            tracing::warn!(pattern = directory_pattern, "Directory patterns cannot contain %f");
            exn::bail!(ErrorKind::Template);
        }
        Ok(Self {
            strategy,
            directory,
            file: file_pattern.parse()?,
        })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn directory_pattern(&self) -> &NamePattern {
        &self.directory
    }

    pub fn file_pattern(&self) -> &NamePattern {
        &self.file
    }
}
impl Default for DirectoryRule {
    /// `Metadata`, [`DEFAULT_DIRECTORY_PATTERN`] and [`DEFAULT_FILE_PATTERN`],
    /// built from compile-time format descriptions.
    fn default() -> Self {
        let directory = format_description!("[year]/[year]-[month]-[day]");
        let file = format_description!("[year][month][day]_[hour][minute][second]_");
        Self {
            strategy: Strategy::Metadata,
            directory: NamePattern::from_parts(DEFAULT_DIRECTORY_PATTERN, vec![directory.into()]),
            file: NamePattern::from_parts(DEFAULT_FILE_PATTERN, vec![file.into(), OwnedFormatItem::Compound(Box::new([]))]),
        }
    }
}

/// Prefix-keyed rules plus the fallback rule.
///
/// Rules are kept most-specific-first (more path components first, then
/// lexical), so the first component-wise prefix match is the longest one.
///
/// ```
/// use datum_library::{DirectoryRule, RuleSet, Strategy};
/// use std::path::Path;
///
/// let scans = DirectoryRule::new(Strategy::VisualContent, "scans/%Y", "%Y%m%d").unwrap();
/// let rules = RuleSet::new(DirectoryRule::default()).with_rule("inbox/scans", scans).unwrap();
/// assert_eq!(rules.select(Path::new("inbox/scans/page.pdf")).strategy(), Strategy::VisualContent);
/// assert_eq!(rules.select(Path::new("inbox/scans2/page.pdf")).strategy(), Strategy::Metadata);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    default: DirectoryRule,
    rules: Vec<(PathBuf, DirectoryRule)>,
}
impl RuleSet {
    pub fn new(default: DirectoryRule) -> Self {
        Self {
            default,
            rules: Vec::new(),
        }
    }

    /// Register `rule` for every file below `prefix` (relative to the working
    /// directory). Registering the same prefix twice replaces the rule.
    pub fn with_rule(mut self, prefix: impl AsRef<Path>, rule: DirectoryRule) -> Result<Self> {
        let prefix = validate_path(prefix.as_ref()).or_raise(|| ErrorKind::Rules)?;
        self.rules.retain(|(existing, _)| existing != &prefix);
        self.rules.push((prefix, rule));
        self.rules.sort_by(|(a, _), (b, _)| {
            b.components().count().cmp(&a.components().count()).then_with(|| a.cmp(b))
        });
        Ok(self)
    }

    /// The rule for a file at `path` (relative to the working directory).
    pub fn select(&self, path: &Path) -> &DirectoryRule {
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|(_, rule)| rule)
            .unwrap_or(&self.default)
    }

    pub fn default_rule(&self) -> &DirectoryRule {
        &self.default
    }

    /// Prefix rules in match order.
    pub fn rules(&self) -> impl Iterator<Item = (&Path, &DirectoryRule)> {
        self.rules.iter().map(|(prefix, rule)| (prefix.as_path(), rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rule(strategy: Strategy, file: &str) -> DirectoryRule {
        DirectoryRule::new(strategy, "%Y", file).unwrap()
    }

    #[test]
    fn test_default_rule() {
        let rule = DirectoryRule::default();
        assert_eq!(rule.strategy(), Strategy::Metadata);
        assert_eq!(rule.directory_pattern().as_str(), "%Y/%Y-%m-%d");
        assert_eq!(rule.file_pattern().as_str(), "%Y%m%d_%H%M%S_%f");

        let compiled = DirectoryRule::new(Strategy::Metadata, DEFAULT_DIRECTORY_PATTERN, DEFAULT_FILE_PATTERN).unwrap();
        let ts = "2021:02:03 04:05:06.789+01:00".parse().unwrap();
        assert_eq!(crate::synthesize(&ts, &rule, ".jpg").unwrap(), crate::synthesize(&ts, &compiled, ".jpg").unwrap());
        assert_eq!(crate::synthesize(&ts, &rule, ".jpg").unwrap().name, "20210203_040506_789.jpg");
    }

    #[test]
    fn test_directory_pattern_rejects_subsecond() {
        assert!(DirectoryRule::new(Strategy::Metadata, "%Y/%f", "%Y").is_err());
        assert!(DirectoryRule::new(Strategy::Metadata, "%Y", "%Y_%f").is_ok());
    }

    #[rstest]
    #[case("a/b/c/file.jpg", "deep")]
    #[case("a/b/file.jpg", "shallow")]
    #[case("a/bc/file.jpg", "top")]
    #[case("a/file.jpg", "top")]
    #[case("z/file.jpg", "default")]
    #[case("file.jpg", "default")]
    fn test_longest_prefix_wins(#[case] path: &str, #[case] expected: &str) {
        let rules = RuleSet::new(rule(Strategy::Metadata, "default"))
            .with_rule("a", rule(Strategy::Metadata, "top"))
            .unwrap()
            .with_rule("a/b/c", rule(Strategy::VisualContent, "deep"))
            .unwrap()
            .with_rule("a/b", rule(Strategy::FileSystemTime, "shallow"))
            .unwrap();
        assert_eq!(rules.select(Path::new(path)).file_pattern().as_str(), expected);
    }

    #[test]
    fn test_rules_sorted_most_specific_first() {
        let rules = RuleSet::default()
            .with_rule("b", rule(Strategy::Metadata, "1"))
            .unwrap()
            .with_rule("a/x", rule(Strategy::Metadata, "2"))
            .unwrap()
            .with_rule("a", rule(Strategy::Metadata, "3"))
            .unwrap()
            .with_rule("./a/x/", rule(Strategy::Metadata, "4"))
            .unwrap();
        let order: Vec<_> = rules.rules().map(|(p, r)| (p.to_path_buf(), r.file_pattern().as_str().to_string())).collect();
        assert_eq!(
            order,
            vec![
                (PathBuf::from("a/x"), "4".to_string()),
                (PathBuf::from("a"), "3".to_string()),
                (PathBuf::from("b"), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefix_must_stay_inside() {
        assert!(RuleSet::default().with_rule("../elsewhere", DirectoryRule::default()).is_err());
    }
}

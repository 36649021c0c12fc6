//! Layered configuration for datum.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults.
//! 2. A configuration file: TOML, YAML or JSON, chosen by extension. Without
//!    an explicit path, `config.toml` in the platform configuration directory
//!    is used if it exists.
//! 3. Environment variables prefixed with `DATUM_`, with `__` separating
//!    nested keys (`DATUM_OPTIONS__RECURSIVE=true`).
//!
//! ```toml
//! exiftool = "/opt/bin/exiftool"
//!
//! [default]
//! strategy = "metadata"
//! directory_pattern = "%Y/%Y-%m-%d"
//! file_pattern = "%Y%m%d_%H%M%S_%f"
//!
//! [rules."scans"]
//! strategy = "visual-content"
//!
//! [options]
//! recursive = true
//! concurrency = 4
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use datum_library::{DEFAULT_DIRECTORY_PATTERN, DEFAULT_FILE_PATTERN, DirectoryRule, Options, RuleSet, Strategy};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "DATUM_";
const FILE_NAME: &str = "config.toml";

/// One directory rule, as written in configuration. Missing keys take the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleConfig {
    pub strategy: Strategy,
    pub directory_pattern: String,
    pub file_pattern: String,
}
impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            directory_pattern: DEFAULT_DIRECTORY_PATTERN.to_string(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}
impl RuleConfig {
    fn compile(&self) -> datum_library::error::Result<DirectoryRule> {
        DirectoryRule::new(self.strategy, &self.directory_pattern, &self.file_pattern)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Rule for files no prefix rule matches.
    #[serde(rename = "default")]
    pub default_rule: RuleConfig,
    /// Path prefix (relative to the working directory, or absolute inside
    /// it) to rule.
    pub rules: BTreeMap<PathBuf, RuleConfig>,
    pub options: Options,
    /// Path to the `exiftool` executable; looked up on `PATH` when unset.
    pub exiftool: Option<PathBuf>,
}

impl Config {
    /// Load the layered configuration. An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                if let Some(path) = default_path().filter(|p| p.is_file()) {
                    tracing::debug!(path = %path.display(), "Using default configuration file");
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Parse configuration from a string in the format named by `extension`
    /// (`toml`, `yaml`, `yml` or `json`), on top of the defaults. Environment
    /// variables are not consulted.
    pub fn from_str_with_format(contents: &str, extension: &str) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match extension {
            "toml" => figment.merge(Toml::string(contents)),
            "yaml" | "yml" => figment.merge(Yaml::string(contents)),
            "json" => figment.merge(Json::string(contents)),
            other => exn::bail!(ErrorKind::UnsupportedFormat(PathBuf::from(other))),
        };
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| exn::Exn::from(ErrorKind::Load(e.to_string())))?;
        // Compile once up front so that bad patterns fail here, not per file.
        config.default_rule.compile().or_raise(|| ErrorKind::Rule(PathBuf::new()))?;
        for (prefix, rule) in &config.rules {
            rule.compile().or_raise(|| ErrorKind::Rule(prefix.clone()))?;
        }
        Ok(config)
    }

    /// Compile the rules for a run rooted at `working_dir`.
    ///
    /// Absolute prefixes are made relative to `working_dir`; those outside
    /// it can never match and are dropped with a warning.
    pub fn rule_set(&self, working_dir: &Path) -> Result<RuleSet> {
        let default = self.default_rule.compile().or_raise(|| ErrorKind::Rule(PathBuf::new()))?;
        let mut rules = RuleSet::new(default);
        for (prefix, rule) in &self.rules {
            let relative = match prefix.is_absolute() {
                true => match prefix.strip_prefix(working_dir) {
                    Ok(relative) => relative,
                    Err(_) => {
                        tracing::warn!(prefix = %prefix.display(), "Ignoring rule outside the working directory");
                        continue;
                    },
                },
                false => prefix.as_path(),
            };
            let compiled = rule.compile().or_raise(|| ErrorKind::Rule(prefix.clone()))?;
            rules = rules.with_rule(relative, compiled).or_raise(|| ErrorKind::Rule(prefix.clone()))?;
        }
        Ok(rules)
    }

    pub fn options(&self) -> Options {
        self.options.clone()
    }
}

/// `config.toml` in the platform configuration directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "datum").map(|dirs| dirs.config_dir().join(FILE_NAME))
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    Ok(match extension.as_str() {
        "toml" => figment.merge(Toml::file_exact(path)),
        "yaml" | "yml" => figment.merge(Yaml::file_exact(path)),
        "json" => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    #[test]
    fn test_defaults() {
        let config = Config::from_str_with_format("", "toml").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.options(), Options::default());
        let rules = config.rule_set(Path::new("/photos")).unwrap();
        assert_eq!(rules.default_rule(), &DirectoryRule::default());
        assert_eq!(rules.rules().count(), 0);
    }

    #[rstest]
    #[case::toml(
        "toml",
        "exiftool = \"/opt/exiftool\"\n[default]\nfile_pattern = \"%Y%m%d\"\n[rules.scans]\nstrategy = \"visual-content\"\n[options]\nrecursive = true\nconcurrency = 4\n"
    )]
    #[case::yaml(
        "yaml",
        "exiftool: /opt/exiftool\ndefault:\n  file_pattern: \"%Y%m%d\"\nrules:\n  scans:\n    strategy: visual-content\noptions:\n  recursive: true\n  concurrency: 4\n"
    )]
    #[case::json(
        "json",
        r#"{"exiftool": "/opt/exiftool", "default": {"file_pattern": "%Y%m%d"}, "rules": {"scans": {"strategy": "visual-content"}}, "options": {"recursive": true, "concurrency": 4}}"#
    )]
    fn test_formats(#[case] extension: &str, #[case] contents: &str) {
        let config = Config::from_str_with_format(contents, extension).unwrap();
        assert_eq!(config.exiftool.as_deref(), Some(Path::new("/opt/exiftool")));
        assert_eq!(config.default_rule.file_pattern, "%Y%m%d");
        assert_eq!(config.default_rule.directory_pattern, DEFAULT_DIRECTORY_PATTERN);
        assert_eq!(config.rules[Path::new("scans")].strategy, Strategy::VisualContent);
        assert!(config.options.recursive);
        assert_eq!(config.options.concurrency, 4);
        assert!(!config.options.simulate);
    }

    #[rstest]
    #[case::directory_subsecond("[default]\ndirectory_pattern = \"%Y/%f\"\n")]
    #[case::rule_subsecond("[rules.scans]\ndirectory_pattern = \"scans/%f\"\n")]
    #[case::bad_strategy("[default]\nstrategy = \"astrology\"\n")]
    fn test_invalid_configuration(#[case] contents: &str) {
        assert!(Config::from_str_with_format(contents, "toml").is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let err = Config::from_str_with_format("", "ini").unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datum.yml");
        std::fs::write(&path, "options:\n  simulate: true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(config.options.simulate);

        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_prefix_outside_working_dir_is_rejected() {
        let config = Config::from_str_with_format("[rules.\"../outside\"]\n", "toml").unwrap();
        let err = config.rule_set(Path::new("/photos")).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Rule(p) if p == Path::new("../outside")));
    }

    #[test]
    fn test_rule_prefixes_relative_to_working_dir() {
        let contents = "[rules.\"/photos/scans\"]\nstrategy = \"visual-content\"\n[rules.\"/elsewhere\"]\nstrategy = \"file-system-time\"\n[rules.\"camera/old\"]\nstrategy = \"file-system-time\"\n";
        let config = Config::from_str_with_format(contents, "toml").unwrap();
        let rules = config.rule_set(Path::new("/photos")).unwrap();
        let prefixes: Vec<_> = rules.rules().map(|(prefix, rule)| (prefix.to_path_buf(), rule.strategy())).collect();
        assert_eq!(prefixes, vec![
            (PathBuf::from("camera/old"), Strategy::FileSystemTime),
            (PathBuf::from("scans"), Strategy::VisualContent),
        ]);
        assert_eq!(rules.select(Path::new("scans/a.pdf")).strategy(), Strategy::VisualContent);
        assert_eq!(rules.select(Path::new("other/a.jpg")).strategy(), Strategy::Metadata);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Number of files flattened per run unless configured otherwise.
pub const DEFAULT_MAX_FILES: usize = 3;

/// Directory names pruned from the walk at every depth unless configured otherwise.
pub const DEFAULT_IGNORE_FOLDERS: &[&str] = &["__pycache__"];

/// What to do when two source files flatten to the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// The later file replaces the earlier one; a warning is recorded.
    #[default]
    Overwrite,
    /// The later file gets a numeric suffix before its extension.
    Suffix,
    /// The run aborts.
    Error,
}

/// What to do with a file whose content is not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndecodablePolicy {
    #[default]
    Abort,
    /// Leave the file out without staging it and keep going.
    Skip,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "suffix" | "rename" => Ok(CollisionPolicy::Suffix),
            "error" | "fail" => Ok(CollisionPolicy::Error),
            other => Err(format!(
                "unknown collision policy '{other}' (expected overwrite, suffix or error)"
            )),
        }
    }
}

impl FromStr for UndecodablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(UndecodablePolicy::Abort),
            "skip" => Ok(UndecodablePolicy::Skip),
            other => Err(format!(
                "unknown undecodable-file policy '{other}' (expected abort or skip)"
            )),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Suffix => "suffix",
            CollisionPolicy::Error => "error",
        })
    }
}

impl fmt::Display for UndecodablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UndecodablePolicy::Abort => "abort",
            UndecodablePolicy::Skip => "skip",
        })
    }
}

/// Everything the flattener needs for one run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenConfig {
    pub source_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub max_files: usize,
    pub ignore_folders: Vec<String>,
    pub on_collision: CollisionPolicy,
    pub on_undecodable: UndecodablePolicy,
}

impl FlattenConfig {
    /// Config with default cap, ignore-list and policies.
    pub fn new(source_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            staging_dir: staging_dir.into(),
            max_files: DEFAULT_MAX_FILES,
            ignore_folders: DEFAULT_IGNORE_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            on_collision: CollisionPolicy::default(),
            on_undecodable: UndecodablePolicy::default(),
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_ignore_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.on_collision = policy;
        self
    }

    pub fn with_undecodable_policy(mut self, policy: UndecodablePolicy) -> Self {
        self.on_undecodable = policy;
        self
    }

    /// True when a directory with this name must not be descended into.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_folders.iter().any(|ignored| ignored == name)
    }

    pub fn trace_loaded(&self) {
        info!(
            source_dir = %self.source_dir.display(),
            staging_dir = %self.staging_dir.display(),
            max_files = self.max_files,
            on_collision = %self.on_collision,
            "Loaded FlattenConfig"
        );
        debug!(?self, "FlattenConfig loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = FlattenConfig::new("src", "output");
        assert_eq!(config.max_files, 3);
        assert_eq!(config.ignore_folders, vec!["__pycache__".to_string()]);
        assert_eq!(config.on_collision, CollisionPolicy::Overwrite);
        assert_eq!(config.on_undecodable, UndecodablePolicy::Abort);
        assert!(config.is_ignored("__pycache__"));
        assert!(!config.is_ignored("src"));
    }

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!("Suffix".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Suffix));
        assert_eq!(" ERROR ".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Error));
        assert_eq!("skip".parse::<UndecodablePolicy>(), Ok(UndecodablePolicy::Skip));
        assert!("merge".parse::<CollisionPolicy>().is_err());
        assert!("ignore".parse::<UndecodablePolicy>().is_err());
    }
}

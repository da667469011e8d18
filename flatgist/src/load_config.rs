//! `load_config`: layered resolution of run settings into immutable config values.
//!
//! Each setting is taken from the first layer that has it:
//!
//! 1. command-line flag
//! 2. environment variable (snapshotted once, never written back)
//! 3. YAML config file (`--config`), non-secret settings only
//! 4. interactive prompt, showing the default
//! 5. built-in default
//!
//! Settings without a prompt (cap, ignore-list, policies) skip layer 4.

use anyhow::{Context, Result};
use flatgist_core::config::{
    CollisionPolicy, FlattenConfig, UndecodablePolicy, DEFAULT_IGNORE_FOLDERS, DEFAULT_MAX_FILES,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::cli::{CheckArgs, FlattenArgs, PublishArgs};
use crate::prompt::Prompter;
use crate::upload::DEFAULT_API_URL;

pub const ENV_SOURCE_DIR: &str = "SOURCE_DIR";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_PROJECT_NAME: &str = "PROJECT_NAME";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_MAX_FILES: &str = "MAX_FILES";
pub const ENV_API_URL: &str = "GITHUB_API_URL";

pub const DEFAULT_SOURCE_DIR: &str = "src";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_DESCRIPTION: &str = "flatgist";

/// Snapshot of environment variables. Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Optional YAML settings file. Never holds the token.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub description: Option<String>,
    pub max_files: Option<usize>,
    pub ignore_folders: Option<Vec<String>>,
    pub on_collision: Option<CollisionPolicy>,
    pub on_undecodable: Option<UndecodablePolicy>,
}

/// Settings for a publish run.
#[derive(Debug, Clone)]
pub struct PublishInputs {
    pub flatten: FlattenConfig,
    pub description: String,
    pub token: String,
    pub api_url: String,
}

/// Settings for an API check.
#[derive(Debug, Clone)]
pub struct CheckInputs {
    pub token: String,
    pub api_url: String,
}

/// Which layer a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Flag,
    Env,
    File,
    Prompt,
    Default,
}

/// Everything a resolver reads from, besides the flags themselves.
pub struct Layers<'a> {
    pub env: &'a Environment,
    pub file: &'a FileConfig,
    pub prompter: &'a dyn Prompter,
    /// Base for the default source and staging directories.
    pub cwd: &'a Path,
}

/// Reads and parses the YAML settings file.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    match serde_yaml::from_str::<Option<FileConfig>>(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf.unwrap_or_default())
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Loads the file named by `--config`, or an empty file layer.
pub fn file_layer(args: &FlattenArgs) -> Result<FileConfig> {
    match &args.config {
        Some(path) => load_file_config(path),
        None => Ok(FileConfig::default()),
    }
}

pub fn resolve_flatten_config(args: &FlattenArgs, layers: &Layers<'_>) -> Result<FlattenConfig> {
    let default_source = layers.cwd.join(DEFAULT_SOURCE_DIR);
    let (source_dir, from) = resolve_text(
        args.source_dir.as_ref().map(|p| p.display().to_string()),
        ENV_SOURCE_DIR,
        layers.file.source_dir.as_ref().map(|p| p.display().to_string()),
        "Enter the folder path to flatten",
        &default_source.display().to_string(),
        layers,
    )?;
    debug!(value = %source_dir, layer = ?from, "Resolved source_dir");

    let default_staging = layers.cwd.join(DEFAULT_OUTPUT_DIR);
    let (staging_dir, from) = resolve_text(
        args.staging_dir.as_ref().map(|p| p.display().to_string()),
        ENV_OUTPUT_DIR,
        layers.file.staging_dir.as_ref().map(|p| p.display().to_string()),
        "Enter the output folder path",
        &default_staging.display().to_string(),
        layers,
    )?;
    debug!(value = %staging_dir, layer = ?from, "Resolved staging_dir");

    let max_files = match args.max_files {
        Some(n) => n,
        None => match layers.env.get(ENV_MAX_FILES) {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("{ENV_MAX_FILES} must be a non-negative integer, got '{raw}'"))?,
            None => layers.file.max_files.unwrap_or(DEFAULT_MAX_FILES),
        },
    };

    let ignore_folders = if !args.ignore.is_empty() {
        args.ignore.clone()
    } else if let Some(folders) = &layers.file.ignore_folders {
        folders.clone()
    } else {
        DEFAULT_IGNORE_FOLDERS.iter().map(|s| s.to_string()).collect()
    };

    let on_collision = args
        .on_collision
        .or(layers.file.on_collision)
        .unwrap_or_default();
    let on_undecodable = args
        .on_undecodable
        .or(layers.file.on_undecodable)
        .unwrap_or_default();

    Ok(FlattenConfig::new(source_dir, staging_dir)
        .with_max_files(max_files)
        .with_ignore_folders(ignore_folders)
        .with_collision_policy(on_collision)
        .with_undecodable_policy(on_undecodable))
}

pub fn resolve_publish_inputs(args: &PublishArgs, layers: &Layers<'_>) -> Result<PublishInputs> {
    let flatten = resolve_flatten_config(&args.flatten, layers)?;

    let (description, from) = resolve_text(
        args.description.clone(),
        ENV_PROJECT_NAME,
        layers.file.description.clone(),
        "Enter a description for the Gist",
        DEFAULT_DESCRIPTION,
        layers,
    )?;
    debug!(value = %description, layer = ?from, "Resolved description");

    Ok(PublishInputs {
        flatten,
        description,
        token: resolve_token(args.token.as_deref(), layers)?,
        api_url: resolve_api_url(args.api_url.as_deref(), layers.env),
    })
}

pub fn resolve_check_inputs(args: &CheckArgs, layers: &Layers<'_>) -> Result<CheckInputs> {
    Ok(CheckInputs {
        token: resolve_token(args.token.as_deref(), layers)?,
        api_url: resolve_api_url(args.api_url.as_deref(), layers.env),
    })
}

/// Flag > env > secret prompt > empty. Emptiness is checked by the pipeline.
pub fn resolve_token(flag: Option<&str>, layers: &Layers<'_>) -> Result<String> {
    if let Some(token) = flag.map(str::trim).filter(|t| !t.is_empty()) {
        debug!(layer = ?Layer::Flag, "Resolved token");
        return Ok(token.to_string());
    }
    if let Some(token) = layers.env.get(ENV_GITHUB_TOKEN) {
        debug!(layer = ?Layer::Env, "Resolved token");
        return Ok(token.to_string());
    }
    if let Some(token) = layers.prompter.secret("Enter your GitHub token")? {
        debug!(layer = ?Layer::Prompt, "Resolved token");
        return Ok(token);
    }
    Ok(String::new())
}

pub fn resolve_api_url(flag: Option<&str>, env: &Environment) -> String {
    flag.or_else(|| env.get(ENV_API_URL))
        .unwrap_or(DEFAULT_API_URL)
        .to_string()
}

fn resolve_text(
    flag: Option<String>,
    env_key: &str,
    file: Option<String>,
    prompt: &str,
    default: &str,
    layers: &Layers<'_>,
) -> Result<(String, Layer)> {
    if let Some(value) = flag {
        return Ok((value, Layer::Flag));
    }
    if let Some(value) = layers.env.get(env_key) {
        return Ok((value.to_string(), Layer::Env));
    }
    if let Some(value) = file {
        return Ok((value, Layer::File));
    }
    if let Some(value) = layers.prompter.text(prompt, default)? {
        return Ok((value, Layer::Prompt));
    }
    Ok((default.to_string(), Layer::Default))
}

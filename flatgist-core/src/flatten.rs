//! Flattener: turns a directory tree into a single level of uniquely named files.
//!
//! The walk is pre-order and sorted at every level (a directory's files before
//! its subdirectories, each group by name), so the same tree always yields the
//! same selection. Ignored directory names are pruned before descending. Each
//! selected file is copied into the staging directory under its flat name, read
//! back, sanitized and added to the gist file mapping.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::{CollisionPolicy, FlattenConfig, UndecodablePolicy};
use crate::contract::{FileEntry, GistFile, GistFiles};
use crate::error::FlattenError;
use crate::sanitize::json_safe;

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w.]").expect("flat name character class is a valid regex"));

/// Two source files that flattened to the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionWarning {
    pub flat_name: String,
    pub first: PathBuf,
    pub second: PathBuf,
    /// Name the second file was stored under.
    pub stored_as: String,
}

/// A file that made it into the mapping, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub source_path: PathBuf,
    pub flat_name: String,
}

#[derive(Debug, Default)]
pub struct FlattenOutput {
    pub files: GistFiles,
    pub processed: Vec<ProcessedFile>,
    pub collisions: Vec<CollisionWarning>,
    /// Files dropped under [`UndecodablePolicy::Skip`].
    pub skipped: Vec<PathBuf>,
}

impl FlattenOutput {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Flat name for a path relative to the walk root: separators become `_`, then
/// anything that is not a word character or `.` becomes `_`.
pub fn flat_name(relative_path: &Path) -> String {
    let joined = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_");
    UNSAFE_NAME_CHARS.replace_all(&joined, "_").into_owned()
}

/// Walk `config.source_dir`, stage up to `config.max_files` files and return the
/// sanitized mapping. An empty tree gives an empty mapping, not an error.
pub fn flatten(config: &FlattenConfig) -> Result<FlattenOutput, FlattenError> {
    let source_dir = &config.source_dir;
    info!(
        source_dir = %source_dir.display(),
        staging_dir = %config.staging_dir.display(),
        max_files = config.max_files,
        "Flattening directory"
    );

    if !source_dir.exists() {
        error!(path = %source_dir.display(), "Source directory does not exist");
        return Err(FlattenError::NotFound(source_dir.clone()));
    }
    if !source_dir.is_dir() {
        error!(path = %source_dir.display(), "Source path is not a directory");
        return Err(FlattenError::NotADirectory(source_dir.clone()));
    }

    let source_canonical = fs::canonicalize(source_dir).map_err(|e| FlattenError::Read {
        path: source_dir.clone(),
        source: e,
    })?;
    if fs::canonicalize(&config.staging_dir).is_ok_and(|staging| staging == source_canonical) {
        error!(path = %source_dir.display(), "Staging directory is the source directory");
        return Err(FlattenError::StagingIsSource(config.staging_dir.clone()));
    }

    fs::create_dir_all(&config.staging_dir).map_err(|e| {
        error!(error = ?e, path = %config.staging_dir.display(), "Failed to create staging directory");
        FlattenError::CreateStaging {
            path: config.staging_dir.clone(),
            source: e,
        }
    })?;
    let staging_canonical = fs::canonicalize(&config.staging_dir).ok();

    let walker = WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by(files_first_by_name)
        .into_iter()
        .filter_entry(|entry| keep_entry(entry, config, staging_canonical.as_deref()));

    let mut output = FlattenOutput::default();
    let mut owners: HashMap<String, PathBuf> = HashMap::new();

    for entry in walker {
        if output.processed.len() >= config.max_files {
            debug!(max_files = config.max_files, "File cap reached, stopping walk");
            break;
        }

        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_dir.clone());
            error!(error = %e, path = %path.display(), "Failed to walk source tree");
            FlattenError::Walk {
                path,
                source: e.into(),
            }
        })?;

        let source_path = entry.path();
        if !source_path.is_file() {
            continue;
        }

        if config.on_undecodable == UndecodablePolicy::Skip && !is_utf8_file(source_path)? {
            warn!(path = %source_path.display(), "Skipping file that is not valid UTF-8");
            output.skipped.push(source_path.to_path_buf());
            continue;
        }

        let relative_path = source_path
            .strip_prefix(source_dir)
            .unwrap_or(source_path)
            .to_path_buf();
        let name = claim_name(
            flat_name(&relative_path),
            source_path,
            config.on_collision,
            &mut owners,
            &mut output.collisions,
        )?;

        let staged_path = config.staging_dir.join(&name);
        stage_file(source_path, &staged_path)?;
        let content = read_staged(source_path, &staged_path)?;

        let file = FileEntry {
            source_path: source_path.to_path_buf(),
            relative_path,
            flat_name: name,
            content,
        };
        info!(
            source = %file.source_path.display(),
            flat_name = %file.flat_name,
            "Prepared for upload"
        );

        output.files.insert(
            file.flat_name.clone(),
            GistFile {
                content: json_safe(&file.content),
            },
        );
        output.processed.push(ProcessedFile {
            source_path: file.source_path,
            flat_name: file.flat_name,
        });
    }

    info!(
        count = output.files.len(),
        collisions = output.collisions.len(),
        skipped = output.skipped.len(),
        "Completed flattening"
    );
    Ok(output)
}

fn files_first_by_name(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn keep_entry(entry: &DirEntry, config: &FlattenConfig, staging: Option<&Path>) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if config.is_ignored(&name) {
        debug!(path = %entry.path().display(), "Skipping ignored directory");
        return false;
    }
    if let Some(staging) = staging {
        if fs::canonicalize(entry.path()).is_ok_and(|p| p == staging) {
            debug!(path = %entry.path().display(), "Skipping staging directory inside source");
            return false;
        }
    }
    true
}

/// Decide the name a file is stored under, recording or rejecting collisions.
fn claim_name(
    base: String,
    source_path: &Path,
    policy: CollisionPolicy,
    owners: &mut HashMap<String, PathBuf>,
    collisions: &mut Vec<CollisionWarning>,
) -> Result<String, FlattenError> {
    let Some(first) = owners.get(&base).cloned() else {
        owners.insert(base.clone(), source_path.to_path_buf());
        return Ok(base);
    };

    let stored_as = match policy {
        CollisionPolicy::Error => {
            error!(
                flat_name = %base,
                first = %first.display(),
                second = %source_path.display(),
                "Flat name collision"
            );
            return Err(FlattenError::Collision {
                flat_name: base,
                first,
                second: source_path.to_path_buf(),
            });
        }
        CollisionPolicy::Overwrite => base.clone(),
        CollisionPolicy::Suffix => next_free_name(&base, owners),
    };

    warn!(
        flat_name = %base,
        first = %first.display(),
        second = %source_path.display(),
        stored_as = %stored_as,
        policy = %policy,
        "Flat name collision"
    );
    collisions.push(CollisionWarning {
        flat_name: base,
        first,
        second: source_path.to_path_buf(),
        stored_as: stored_as.clone(),
    });
    owners.insert(stored_as.clone(), source_path.to_path_buf());
    Ok(stored_as)
}

/// `name_1.ext`, `name_2.ext`, ... until one is unused. A leading dot is part of
/// the stem, so `.env` becomes `.env_1`.
fn next_free_name(base: &str, owners: &HashMap<String, PathBuf>) -> String {
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => base.split_at(idx),
        _ => (base, ""),
    };
    (1..)
        .map(|n| format!("{stem}_{n}{ext}"))
        .find(|candidate| !owners.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}

fn is_utf8_file(path: &Path) -> Result<bool, FlattenError> {
    let bytes = fs::read(path).map_err(|e| FlattenError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(std::str::from_utf8(&bytes).is_ok())
}

/// Copy `from` to `to`, replacing whatever is there, and carry over the
/// modification time where the filesystem allows it. Never removes `from`.
fn stage_file(from: &Path, to: &Path) -> Result<(), FlattenError> {
    let source = fs::canonicalize(from)
        .and_then(|path| fs::File::open(&path).map(|_| path))
        .map_err(|e| {
            error!(error = ?e, path = %from.display(), "Failed to open source file");
            FlattenError::Read {
                path: from.to_path_buf(),
                source: e,
            }
        })?;
    if fs::canonicalize(to).is_ok_and(|dest| dest == source) {
        error!(path = %from.display(), "Staged path is the source file itself");
        return Err(FlattenError::SameFile(from.to_path_buf()));
    }

    let copy = || -> io::Result<u64> {
        match fs::remove_file(to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::copy(from, to)
    };
    let bytes = copy().map_err(|e| {
        error!(error = ?e, from = %from.display(), to = %to.display(), "Failed to stage file");
        FlattenError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        }
    })?;
    debug!(from = %from.display(), to = %to.display(), bytes, "Staged file");

    if let Err(e) = preserve_mtime(from, to) {
        debug!(error = ?e, path = %to.display(), "Could not preserve modification time");
    }
    Ok(())
}

fn preserve_mtime(from: &Path, to: &Path) -> io::Result<()> {
    let modified = fs::metadata(from)?.modified()?;
    fs::OpenOptions::new()
        .write(true)
        .open(to)?
        .set_modified(modified)
}

fn read_staged(source_path: &Path, staged_path: &Path) -> Result<String, FlattenError> {
    let bytes = fs::read(staged_path).map_err(|e| {
        error!(error = ?e, path = %staged_path.display(), "Failed to read staged file");
        FlattenError::Read {
            path: staged_path.to_path_buf(),
            source: e,
        }
    })?;
    String::from_utf8(bytes).map_err(|e| {
        error!(path = %source_path.display(), "File is not valid UTF-8 text");
        FlattenError::Encoding {
            path: source_path.to_path_buf(),
            source: e,
        }
    })
}

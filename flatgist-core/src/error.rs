use std::path::PathBuf;
use thiserror::Error;

/// Failures of a flatten run. Every variant names the path and stage involved.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("source directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("source path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("staging directory is the source directory: {}", .0.display())]
    StagingIsSource(PathBuf),

    #[error("failed to create staging directory {}: {source}", path.display())]
    CreateStaging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stage {} as {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to stage {} onto itself", .0.display())]
    SameFile(PathBuf),

    /// A source file that cannot be opened, or a staged copy that cannot be read back.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8 text", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("{} and {} both flatten to '{flat_name}'", first.display(), second.display())]
    Collision {
        flat_name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl FlattenError {
    /// Short name of the stage that failed, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            FlattenError::NotFound(_) | FlattenError::NotADirectory(_) => "source",
            FlattenError::StagingIsSource(_) | FlattenError::CreateStaging { .. } => "staging",
            FlattenError::Walk { .. } => "walk",
            FlattenError::Copy { .. } | FlattenError::SameFile(_) => "copy",
            FlattenError::Read { .. } => "read",
            FlattenError::Encoding { .. } => "decode",
            FlattenError::Collision { .. } => "naming",
        }
    }
}

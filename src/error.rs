use std::io;
use std::path::PathBuf;

/// Failures of a single backup run.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("source path '{}' does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot determine a folder name for '{}'", .0.display())]
    InvalidSource(PathBuf),

    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("cannot read directory '{}': {source}", path.display())]
    ListParent {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error creating backup '{backup}' at '{}': {source}", path.display())]
    CopyFailed {
        backup: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures that abort a compilation run outright.
///
/// Language-level findings never surface here; they are collected as
/// [`crate::diagnostic::Diagnostic`] values instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("expected a .k13 source file, got {}", .0.display())]
    WrongFileType(PathBuf),
}

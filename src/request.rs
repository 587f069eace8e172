//! Build requests
//!
//! A request captures everything about one conversion the caller asked
//! for: the source document, the target format, and the delivery mode.
//! Sources are either a file on disk or a snapshot of unsaved text
//! written to a temporary file; snapshots always deliver to a window
//! since no sensible output path exists for them.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

/// Target format plus the file extension its output takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFormat {
    /// Writer name passed to the external tool, e.g. `html`.
    pub format: String,
    /// Output extension including the leading dot, e.g. `.html`.
    pub extension: String,
}

impl TargetFormat {
    pub fn new(format: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            extension: extension.into(),
        }
    }
}

/// A temporary file holding snapshot text. The file is deleted when the
/// guard drops, so the request must outlive the build that reads it.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    _guard: TempPath,
}

impl SnapshotFile {
    /// Write `text` to a fresh temporary file with the given extension
    /// (no leading dot).
    pub fn from_text(text: &str, extension: &str) -> io::Result<Self> {
        let mut file = Builder::new()
            .prefix("pandrive-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        file.write_all(text.as_bytes())?;
        let guard = file.into_temp_path();
        Ok(Self {
            path: guard.to_path_buf(),
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The document a build reads from.
#[derive(Debug)]
pub enum SourceDocument {
    /// A saved file on disk.
    File(PathBuf),
    /// Unsaved text snapshotted to a temporary file. `original` is the
    /// on-disk path the text belongs to, when there is one; it names
    /// the output file if the build ever writes one.
    Snapshot {
        file: SnapshotFile,
        original: Option<PathBuf>,
    },
}

/// One conversion the caller asked for.
#[derive(Debug)]
pub struct BuildRequest {
    pub source: SourceDocument,
    pub to: TargetFormat,
    pub from: String,
    pub open_after_build: bool,
    pub preview_in_editor: bool,
    pub to_window: bool,
}

impl BuildRequest {
    /// A request reading a saved file.
    pub fn from_file(path: impl Into<PathBuf>, to: TargetFormat, from: impl Into<String>) -> Self {
        Self {
            source: SourceDocument::File(path.into()),
            to,
            from: from.into(),
            open_after_build: false,
            preview_in_editor: false,
            to_window: false,
        }
    }

    /// A request reading a snapshot of unsaved text. Snapshot builds
    /// always deliver to a window.
    pub fn from_snapshot(
        file: SnapshotFile,
        original: Option<PathBuf>,
        to: TargetFormat,
        from: impl Into<String>,
    ) -> Self {
        Self {
            source: SourceDocument::Snapshot { file, original },
            to,
            from: from.into(),
            open_after_build: false,
            preview_in_editor: false,
            to_window: true,
        }
    }

    /// The file handed to the external tool as its input.
    pub fn input_path(&self) -> &Path {
        match &self.source {
            SourceDocument::File(path) => path,
            SourceDocument::Snapshot { file, .. } => file.path(),
        }
    }

    /// Directory resolution and the child process run in. `None` for
    /// snapshots with no on-disk original.
    pub fn working_dir(&self) -> Option<&Path> {
        let anchor = match &self.source {
            SourceDocument::File(path) => Some(path.as_path()),
            SourceDocument::Snapshot { original, .. } => original.as_deref(),
        };
        anchor.and_then(Path::parent)
    }

    /// Where the output file lands: the source's stem with the target
    /// extension, next to the source. `None` in window mode.
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.to_window {
            return None;
        }
        let named = match &self.source {
            SourceDocument::File(path) => path.as_path(),
            SourceDocument::Snapshot { original, file } => {
                original.as_deref().unwrap_or_else(|| file.path())
            }
        };
        let stem = named.file_stem()?.to_string_lossy();
        let name = format!("{stem}{}", self.to.extension);
        Some(match named.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from(name),
        })
    }

    /// Derive a request reading a preprocessed snapshot of this one's
    /// source, keeping the original path so output naming and working
    /// directory are unchanged.
    pub fn with_preprocessed(self, file: SnapshotFile) -> Self {
        let Self {
            source,
            to,
            from,
            open_after_build,
            preview_in_editor,
            to_window,
        } = self;
        let original = match source {
            SourceDocument::File(path) => Some(path),
            SourceDocument::Snapshot { original, .. } => original,
        };
        Self {
            source: SourceDocument::Snapshot { file, original },
            to,
            from,
            open_after_build,
            preview_in_editor,
            to_window,
        }
    }
}

//! Upload handling.
//!
//! A [`VideoUpload`] is the raw payload a user handed us. For the duration of
//! one analysis it is copied to a [`ScopedVideoFile`], which is removed when
//! the analysis ends no matter how it ends.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tracing::{debug, warn};
use video_summarizer_common::error::{CleanupWarning, Error};

/// Advisory upper bound on upload size. Larger uploads are logged, not rejected.
pub const MAX_UPLOAD_BYTES_HINT: usize = 200 * 1024 * 1024;

/// Suffix given to every scoped copy regardless of the source container.
pub const TEMP_FILE_SUFFIX: &str = ".mp4";

/// Prefix of scoped copies, handy when inspecting a temp directory.
pub const TEMP_FILE_PREFIX: &str = "video-";

/// Accepted video container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Mp4,
    Mov,
    Avi,
}

/// Every accepted format, in display order.
pub const ACCEPTED_FORMATS: &[VideoFormat] = &[VideoFormat::Mp4, VideoFormat::Mov, VideoFormat::Avi];

impl VideoFormat {
    /// Match a bare extension (no dot), case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(VideoFormat::Mp4),
            "mov" => Some(VideoFormat::Mov),
            "avi" => Some(VideoFormat::Avi),
            _ => None,
        }
    }

    /// Detect the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Like [`VideoFormat::from_file_name`], but unsupported names are a
    /// validation error listing [`ACCEPTED_FORMATS`].
    pub fn require(file_name: &str) -> Result<Self, Error> {
        Self::from_file_name(file_name).ok_or_else(|| {
            let accepted: Vec<&str> = ACCEPTED_FORMATS.iter().map(|f| f.extension()).collect();
            Error::validation(format!(
                "Unsupported video file '{}'. Accepted formats: {}",
                file_name,
                accepted.join(", ")
            ))
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mov => "mov",
            VideoFormat::Avi => "avi",
        }
    }

    /// MIME type sent to the file processing service.
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Mov => "video/quicktime",
            VideoFormat::Avi => "video/x-msvideo",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A video payload supplied by the user.
///
/// Bytes are shared, so cloning an upload (e.g. from the session into a
/// running analysis) does not copy the video.
#[derive(Clone)]
pub struct VideoUpload {
    /// Original file name, used for format detection and as display name
    pub file_name: String,
    bytes: Arc<[u8]>,
}

impl VideoUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared extension of the original file name, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
    }

    /// Resolve the container format.
    ///
    /// # Errors
    /// Returns a validation error for extensions outside [`ACCEPTED_FORMATS`].
    pub fn format(&self) -> Result<VideoFormat, Error> {
        VideoFormat::require(&self.file_name)
    }

    /// Whether the upload is larger than [`MAX_UPLOAD_BYTES_HINT`].
    pub fn exceeds_size_hint(&self) -> bool {
        self.len() > MAX_UPLOAD_BYTES_HINT
    }
}

impl fmt::Debug for VideoUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoUpload")
            .field("file_name", &self.file_name)
            .field("extension", &self.extension())
            .field("len", &self.len())
            .finish()
    }
}

/// Temporary on-disk copy of an upload, owned by one analysis request.
///
/// Call [`ScopedVideoFile::cleanup`] when the request finishes. If the value
/// is dropped instead (panic, cancelled task), the file is still removed,
/// silently.
#[derive(Debug)]
pub struct ScopedVideoFile {
    path: TempPath,
}

impl ScopedVideoFile {
    /// Write the upload to a new temporary file.
    ///
    /// `dir` defaults to the system temp directory.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be created or written. A
    /// partially written file is removed before returning.
    pub async fn create(upload: &VideoUpload, dir: Option<&Path>) -> Result<Self, Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(TEMP_FILE_SUFFIX);

        let file = match dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        let path = file.into_temp_path();

        tokio::fs::write(&path, upload.bytes()).await?;

        debug!(path = %path.display(), bytes = upload.len(), "Wrote scoped video file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Runs exactly once because it consumes `self`.
    ///
    /// A file that is already gone counts as removed. Any other failure is
    /// returned as a warning rather than an error.
    pub fn cleanup(self) -> Option<CleanupWarning> {
        let path: PathBuf = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => {
                debug!(path = %path.display(), "Removed scoped video file");
                None
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove scoped video file");
                Some(CleanupWarning {
                    path,
                    message: e.to_string(),
                })
            }
        }
    }
}

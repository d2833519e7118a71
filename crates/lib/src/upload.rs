//! Upload coordination: pre-flight validation, the single multipart call, and
//! re-deriving the file set and stats from the server's answer.

use crate::api::{ApiError, Backend, RawFile, UploadResponse};
use crate::files::{FileDescriptor, FileKind, FileSet, StatsSummary, StatsTrust};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Rejected before any network call.
    #[error("Invalid file: \"{0}\". Only .csv and .pdf allowed.")]
    InvalidFileType(String),
    /// Server returned an error payload.
    #[error("Error: {0}")]
    Server(String),
    /// Network failure, timeout, or unparseable reply.
    #[error("Upload failed: {0}")]
    Transport(String),
    /// Another upload owns the status line.
    #[error("an upload is already in progress")]
    Busy,
}

impl From<ApiError> for UploadError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Server { detail, .. } => UploadError::Server(detail),
            other => UploadError::Transport(other.to_string()),
        }
    }
}

/// Upload status line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadStatus {
    #[default]
    Idle,
    InProgress,
    Success(String),
    Failed(UploadError),
    Cleared,
    RemovedLocally,
}

/// Colour class for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Progress,
    Success,
    Error,
    Warning,
    Info,
}

impl UploadStatus {
    pub fn text(&self) -> String {
        match self {
            UploadStatus::Idle => String::new(),
            UploadStatus::InProgress => "Uploading...".to_string(),
            UploadStatus::Success(message) => format!("✅ {}", message),
            UploadStatus::Failed(e) => format!("❌ {}", e),
            UploadStatus::Cleared => {
                "🔄 Files cleared. Upload new statements to continue.".to_string()
            }
            UploadStatus::RemovedLocally => {
                "ℹ️ Removed locally. Server data unchanged until re-upload.".to_string()
            }
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            UploadStatus::Idle => StatusTone::Neutral,
            UploadStatus::InProgress => StatusTone::Progress,
            UploadStatus::Success(_) => StatusTone::Success,
            UploadStatus::Failed(_) => StatusTone::Error,
            UploadStatus::Cleared => StatusTone::Warning,
            UploadStatus::RemovedLocally => StatusTone::Info,
        }
    }
}

/// What a successful upload reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub rows: u64,
    pub file_count: usize,
    pub message: String,
}

/// Outcome of a local removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalNotice {
    /// Last file removed: stats cleared, chat should be disabled.
    Cleared,
    /// Files remain; shares recomputed against the stale total.
    RemovedLocally,
}

/// Check every name before anything is sent. Returns the first offending file.
pub fn validate<S: AsRef<str>>(names: &[S]) -> Result<(), UploadError> {
    for name in names {
        let name = name.as_ref();
        if FileKind::from_name(name).is_none() {
            return Err(UploadError::InvalidFileType(name.to_string()));
        }
    }
    Ok(())
}

/// Owns the file set, the stats and the upload status line.
#[derive(Debug, Default)]
pub struct UploadCoordinator {
    files: FileSet,
    stats: Option<StatsSummary>,
    status: UploadStatus,
    /// Names of the files in the in-flight request.
    in_flight: Option<Vec<String>>,
}

impl UploadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileDescriptor] {
        self.files.files()
    }

    pub fn stats(&self) -> Option<&StatsSummary> {
        self.stats.as_ref()
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Validate and claim the status line for a new upload.
    ///
    /// `Ok(false)` means there was nothing to upload. `Ok(true)` means the caller must
    /// issue the request and pass its result to [`complete`](Self::complete).
    /// A second upload while one is in flight is rejected with [`UploadError::Busy`]
    /// and leaves everything unchanged.
    pub fn begin<S: AsRef<str>>(&mut self, names: &[S]) -> Result<bool, UploadError> {
        if names.is_empty() {
            return Ok(false);
        }
        if self.in_flight.is_some() {
            log::warn!("upload already in progress; rejecting {} file(s)", names.len());
            return Err(UploadError::Busy);
        }
        if let Err(e) = validate(names) {
            log::info!("upload rejected before sending: {}", e);
            self.status = UploadStatus::Failed(e.clone());
            return Err(e);
        }
        self.in_flight = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self.status = UploadStatus::InProgress;
        Ok(true)
    }

    /// Apply the server's answer to the in-flight upload. Failure leaves the file set untouched.
    pub fn complete(
        &mut self,
        result: Result<UploadResponse, ApiError>,
    ) -> Result<UploadSummary, UploadError> {
        let names = self.in_flight.take().unwrap_or_default();
        match result {
            Ok(res) => {
                self.files = FileSet::from_upload(&names, res.rows);
                self.stats = Some(StatsSummary {
                    total_rows: res.rows,
                    file_count: self.files.len(),
                    trust: StatsTrust::Authoritative,
                });
                log::info!("uploaded {} file(s), {} rows", self.files.len(), res.rows);
                self.status = UploadStatus::Success(res.message.clone());
                Ok(UploadSummary {
                    rows: res.rows,
                    file_count: self.files.len(),
                    message: res.message,
                })
            }
            Err(e) => {
                let err = UploadError::from(e);
                log::warn!("upload failed: {}", err);
                self.status = UploadStatus::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Validate, send one request, and apply the answer.
    /// `Ok(None)` when `files` is empty.
    pub async fn validate_and_upload(
        &mut self,
        backend: &dyn Backend,
        files: &[RawFile],
        password: Option<&str>,
    ) -> Result<Option<UploadSummary>, UploadError> {
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        if !self.begin(&names)? {
            return Ok(None);
        }
        let result = backend.upload(files, password).await;
        self.complete(result).map(Some)
    }

    /// Drop one file from the local set. The server is not told; its data stays as uploaded.
    pub fn remove_file_locally(&mut self, index: usize) -> Option<RemovalNotice> {
        let removed = self.files.remove(index)?;
        log::debug!("removed {} locally", removed.name);
        if self.files.is_empty() {
            self.stats = None;
            self.status = UploadStatus::Cleared;
            return Some(RemovalNotice::Cleared);
        }
        let total = self.stats.as_ref().map(|s| s.total_rows).unwrap_or(0);
        self.files.reshare(total);
        if let Some(stats) = self.stats.as_mut() {
            stats.trust = StatsTrust::Stale;
        }
        self.status = UploadStatus::RemovedLocally;
        Some(RemovalNotice::RemovedLocally)
    }
}

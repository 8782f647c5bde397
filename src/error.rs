use thiserror::Error;

/// Failure modes of a single upload attempt.
///
/// None of these are retried automatically except part uploads, which go
/// through the bounded retry policy in [`crate::retry`] before surfacing
/// as `PartUpload`.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A presign gateway call failed (non-success status or transport error).
    #[error("presign request failed: {0}")]
    Presign(String),

    /// The single-shot PUT of the whole file failed.
    #[error("upload failed: {0}")]
    Transfer(String),

    /// One part's PUT failed after exhausting retries.
    #[error("part {part_number} upload failed: {reason}")]
    PartUpload { part_number: u64, reason: String },

    /// The multipart completion call was rejected, or the part list failed
    /// validation before submission.
    #[error("multipart finalize failed: {0}")]
    Finalize(String),

    /// The caller cancelled the upload.
    #[error("upload aborted")]
    Aborted,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// The failing part number, when the failure is attributable to one part.
    pub fn part_number(&self) -> Option<u64> {
        match self {
            UploadError::PartUpload { part_number, .. } => Some(*part_number),
            _ => None,
        }
    }
}

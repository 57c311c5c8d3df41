//! Run-terminal error taxonomy.
//!
//! Every pipeline stage fails with exactly one of these codes. None of them
//! crash the process: the scan loop routes the code to the error sink and
//! returns to idle, and recovery is a fresh button press.

use thiserror::Error;

/// Failure codes for a single scan run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The camera collaborator failed or exceeded its capture sub-budget.
    #[error("image capture failed: {0}")]
    Capture(String),
    /// Decode error, unsupported layout or degenerate input during normalization.
    #[error("preprocessing failed: {0}")]
    Preprocess(String),
    /// No elongated foreground candidate passed the confidence threshold.
    #[error("no resistor found in the image")]
    RoiNotFound,
    /// Fewer than four plausible bands, or a band narrower than the minimum.
    #[error("band segmentation failed: {0}")]
    Segmentation(String),
    /// A band's best color match fell below the confidence threshold.
    #[error("band color below confidence threshold")]
    LowConfidenceColor,
    /// The label sequence does not form a valid 4-band code in either direction.
    #[error("labels do not form a valid 4-band code")]
    Resolve,
    /// The wall-clock deadline budget was exceeded between stages.
    #[error("deadline budget exceeded")]
    Timeout,
    /// Debug artifact persistence failed. Non-fatal: reported alongside the
    /// run's primary outcome, never instead of it.
    #[error("debug artifact persistence failed: {0}")]
    DebugPersistence(String),
}

impl ScanError {
    /// Short form rendered on the 4-character display.
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::Capture(_) => "E01",
            ScanError::Preprocess(_) => "E02",
            ScanError::RoiNotFound => "E03",
            ScanError::Segmentation(_) => "E04",
            ScanError::LowConfidenceColor => "E05",
            ScanError::Resolve => "E06",
            ScanError::Timeout => "E07",
            ScanError::DebugPersistence(_) => "E08",
        }
    }
}

use thiserror::Error;

/// Failures that stop a pipeline run.
///
/// Empty peak sets and beats without a usable ST window are not errors;
/// they flow through to a `Normal` classification.
#[derive(Debug, Error)]
pub enum EcgError {
    /// The image file is missing, unreadable, or undecodable.
    #[error("failed to load image {source_name}: {source}")]
    ImageLoad {
        source_name: String,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image did not yield a plausible ECG trace.
    #[error("no plausible ECG trace found: {0}")]
    Extraction(String),

    /// A filter, detector or threshold parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, EcgError>;

use thiserror::Error;

/// Errors surfaced anywhere in the SpeedReader inference core.
///
/// Scope follows the propagation policy: `InferenceFault` and
/// `PreprocessingFault` are per-job and surface only in that job's result;
/// `DecoderFault` terminates a video stream; `ResourceFault` fails pipeline
/// construction; `Cancelled` is per-invocation.
#[derive(Debug, Error, Clone)]
pub enum SpeedReaderError {
    #[error("inference fault: {0}")]
    InferenceFault(String),

    #[error("preprocessing fault: {0}")]
    PreprocessingFault(String),

    #[error("video decoder fault: {0}")]
    DecoderFault(String),

    #[error("resource fault: {0}")]
    ResourceFault(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl SpeedReaderError {
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceFault(msg.into())
    }

    pub fn preprocessing(msg: impl Into<String>) -> Self {
        Self::PreprocessingFault(msg.into())
    }

    pub fn decoder(msg: impl Into<String>) -> Self {
        Self::DecoderFault(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::ResourceFault(msg.into())
    }

    /// True for faults that are scoped to a single job rather than the
    /// whole pipeline or stream.
    pub fn is_per_job(&self) -> bool {
        matches!(self, Self::InferenceFault(_) | Self::PreprocessingFault(_))
    }
}

impl From<image::ImageError> for SpeedReaderError {
    fn from(err: image::ImageError) -> Self {
        SpeedReaderError::PreprocessingFault(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpeedReaderError>;

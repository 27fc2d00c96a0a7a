use crate::foundation::core::PresentationTime;

/// Convenience result type used across the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification of [`PipelineError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misuse; no frame work was performed.
    Usage,
    /// Pool/allocation or backpressure condition.
    Resource,
    /// Invalid frame script content.
    Data,
    /// Surfaced by the encoder/container sink.
    Encoder,
    /// Configuration, serialization and wrapped lower-level errors.
    Other,
}

/// Top-level error taxonomy reported through the completion channel.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// `start` called on a pipeline whose session already completed.
    #[error("usage error: pipeline already discarded")]
    AlreadyDiscarded,

    /// `start` called while a session is still in flight.
    #[error("usage error: a session is already in progress")]
    ConcurrentSessionRejected,

    /// The buffer pool could not hand out a render target.
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),

    /// A path group is not a well-formed command sequence.
    #[error("malformed path: {0}")]
    MalformedPath(String),

    /// The rasterizer failed to paint a frame.
    #[error("rasterization failed: {0}")]
    RasterizationFailed(String),

    /// A submission did not advance the session's presentation time.
    #[error("encoder error: timestamp {got} does not follow {last}")]
    TimestampOrderViolation {
        /// Last accepted presentation time.
        last: PresentationTime,
        /// Rejected presentation time.
        got: PresentationTime,
    },

    /// Container/muxing failure surfaced by the sink.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Invalid configuration or option values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing frame scripts and configs.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Build a [`PipelineError::PoolExhausted`] value.
    pub fn pool_exhausted(msg: impl Into<String>) -> Self {
        Self::PoolExhausted(msg.into())
    }

    /// Build a [`PipelineError::MalformedPath`] value.
    pub fn malformed_path(msg: impl Into<String>) -> Self {
        Self::MalformedPath(msg.into())
    }

    /// Build a [`PipelineError::RasterizationFailed`] value.
    pub fn rasterization(msg: impl Into<String>) -> Self {
        Self::RasterizationFailed(msg.into())
    }

    /// Build a [`PipelineError::Encoder`] value.
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder(msg.into())
    }

    /// Build a [`PipelineError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PipelineError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyDiscarded | Self::ConcurrentSessionRejected => ErrorKind::Usage,
            Self::PoolExhausted(_) => ErrorKind::Resource,
            Self::MalformedPath(_) | Self::RasterizationFailed(_) => ErrorKind::Data,
            Self::TimestampOrderViolation { .. } | Self::Encoder(_) => ErrorKind::Encoder,
            Self::Validation(_) | Self::Serde(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;

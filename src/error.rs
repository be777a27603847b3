use thiserror::Error;

pub type AnimationResult<T> = Result<T, AnimationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimationError {
    /// Frame count or duration missing, non-numeric or out of range.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// Upload could not be decoded, or decoded to an unusable size.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnimationError {
    pub fn bad_parameter(msg: impl Into<String>) -> Self {
        Self::BadParameter(msg.into())
    }

    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller sent something we can't work with, as opposed to us failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadParameter(_) | Self::InvalidImage(_))
    }
}

impl From<gif::EncodingError> for AnimationError {
    fn from(err: gif::EncodingError) -> Self {
        Self::EncodingFailure(err.to_string())
    }
}

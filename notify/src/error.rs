use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(Box<str>),

    #[error("value {value} of hint \"{key}\" is out of range for a byte")]
    ValueOutOfRange { key: Box<str>, value: i64 },

    #[error("out of memory")]
    ResourceExhausted,

    #[error("notification service unavailable: {0}")]
    BusUnavailable(#[source] zbus::Error),

    #[error("{0}")]
    BusCallFailed(#[source] zbus::Error),

    #[error("unsupported: {0}")]
    Unsupported(Box<str>),

    #[error("anchor has no window on screen")]
    NoWindow,

    #[error("failed to encode hint: {0}")]
    Variant(#[from] zbus::zvariant::Error),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<Box<str>>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

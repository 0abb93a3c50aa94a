use std::error::Error;

/// Signed exchange engine error.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SxgError(#[from] pub(crate) ErrorRepr);

#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorRepr {
    #[error("header rejected: {name}: {reason}")]
    HeaderRejected { name: String, reason: String },
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("signing failed: {0}")]
    Signing(Box<dyn Error + Send + Sync + 'static>),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Kind of an [`SxgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SxgErrorKind {
    /// A payload header violates the signed-exchange header policy.
    ///
    /// Recoverable: the caller may fix the header list and retry.
    HeaderRejected,
    /// A structural defect was hit while building a request or exchange,
    /// such as a malformed configured certificate.
    Encoding,
    /// The external signer rejected the message or errored.
    ///
    /// Recoverable by retrying signing.
    SigningFailed,
    /// Preset content lookup miss.
    NotFound,
}

impl SxgError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> SxgErrorKind {
        match self.0 {
            ErrorRepr::HeaderRejected { .. } => SxgErrorKind::HeaderRejected,
            ErrorRepr::Encoding(_) => SxgErrorKind::Encoding,
            ErrorRepr::Signing(_) => SxgErrorKind::SigningFailed,
            ErrorRepr::NotFound(_) => SxgErrorKind::NotFound,
        }
    }

    /// Returns the name of the offending header, if this is a header
    /// rejection.
    pub fn header_name(&self) -> Option<&str> {
        match &self.0 {
            ErrorRepr::HeaderRejected { name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn header_rejected(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self(ErrorRepr::HeaderRejected {
            name: name.into(),
            reason: reason.into(),
        })
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Self(ErrorRepr::Encoding(msg.into()))
    }

    pub(crate) fn signing<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self(ErrorRepr::Signing(err.into()))
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self(ErrorRepr::NotFound(msg.into()))
    }
}

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the browser collaborator and the elements it hands out.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("No page available")]
    NoPage,

    #[error("Script error: {0}")]
    Script(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

impl BrowserError {
    /// Whether this error means the element handle no longer refers to a live DOM node.
    pub fn is_stale(&self) -> bool {
        matches!(self, BrowserError::StaleElement(_))
    }
}

/// An assertion or action step found the element set in an unexpected state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AssertionError(pub String);

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by chain declaration and chain evaluation.
#[derive(Error, Debug)]
pub enum ChainError {
    /// A step was declared with invalid arguments. Raised while building, never retried.
    #[error("Invalid chain declaration: {0}")]
    InvalidDeclaration(String),

    /// The evaluation was cancelled. Never retried.
    #[error("Element chain evaluation was cancelled")]
    Cancelled,

    /// The retry budget ran out without the page ever reporting ready.
    #[error("Page did not become ready within {0:?}")]
    PageNotReady(Duration),

    /// A node callback or reducer failed; carries the original error untouched.
    #[error(transparent)]
    Node(#[from] anyhow::Error),
}

impl ChainError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChainError::Cancelled)
    }

    /// Look through a node failure to the error the callback actually returned.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            ChainError::Node(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Convert an error returned from a callback. Callbacks may hand back a
    /// `ChainError` (cancellation, a nested declaration failure); those keep their
    /// identity instead of being wrapped as a node failure.
    pub(crate) fn from_callback(err: anyhow::Error) -> Self {
        match err.downcast::<ChainError>() {
            Ok(chain_err) => chain_err,
            Err(other) => ChainError::Node(other),
        }
    }
}

impl From<BrowserError> for ChainError {
    fn from(err: BrowserError) -> Self {
        ChainError::Node(err.into())
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_error_keeps_original_identity() {
        let err = ChainError::from_callback(AssertionError::new("expected 1 element").into());

        assert!(matches!(err, ChainError::Node(_)));
        assert_eq!(
            err.downcast_ref::<AssertionError>(),
            Some(&AssertionError::new("expected 1 element"))
        );
        assert_eq!(err.to_string(), "expected 1 element");
    }

    #[test]
    fn test_chain_error_from_callback_is_not_wrapped() {
        let err = ChainError::from_callback(ChainError::Cancelled.into());
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_stale_detection() {
        assert!(BrowserError::StaleElement("gone".into()).is_stale());
        assert!(!BrowserError::NoPage.is_stale());
    }
}

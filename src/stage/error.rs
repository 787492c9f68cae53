//! Failure classes returned by a single stage call.

use thiserror::Error;

/// Why a stage call did not produce a usable payload.
///
/// - [`Transient`](StageError::Transient): connection refused, timeout, gateway
///   unavailable or rate limited. The runner retries these.
/// - [`Structural`](StageError::Structural): the stage answered, but with something
///   the next hand-off cannot use. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("malformed response: {0}")]
    Structural(String),
}

impl StageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StageError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_display() {
        let err = StageError::Transient("connection refused".into());
        assert_eq!(err.to_string(), "transient failure: connection refused");
        assert!(err.is_transient());
    }

    #[test]
    fn structural_is_not_transient() {
        let err = StageError::Structural("missing field `stems`".into());
        assert_eq!(err.to_string(), "malformed response: missing field `stems`");
        assert!(!err.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StageError>();
    }
}

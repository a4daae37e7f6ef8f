use event_consumer::ProcessingError;
use event_schema::SchemaError;
use thiserror::Error;

/// Raw bytes could not be turned into a valid change record
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid change record: {0}")]
    Invalid(#[from] SchemaError),

    #[error("{codec} decoding failed: {message}")]
    Codec { codec: String, message: String },
}

/// A handler could not apply a change
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("replica store error: {0}")]
    Store(String),

    #[error("change rejected: {0}")]
    Rejected(String),

    /// Store down or behind an open breaker; the message is held, not rejected
    #[error("replica store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl From<ParseError> for ProcessingError {
    fn from(err: ParseError) -> Self {
        ProcessingError::Parse(err.to_string())
    }
}

impl From<DispatchError> for ProcessingError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownOperation(_) => ProcessingError::Dispatch(err.to_string()),
            DispatchError::Handler(HandlerError::Unavailable(_)) => {
                ProcessingError::Unavailable(err.to_string())
            }
            DispatchError::Handler(inner) => ProcessingError::Handler(inner.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operation_maps_to_dispatch_error() {
        let err: ProcessingError = DispatchError::UnknownOperation("UNKNOWN".into()).into();
        assert_eq!(err.kind(), "dispatch_error");
        assert!(err.to_string().contains("unknown operation"));
    }

    #[test]
    fn test_handler_error_keeps_its_kind() {
        let err: ProcessingError =
            DispatchError::from(HandlerError::Store("ValidationException".into())).into();
        assert_eq!(err.kind(), "handler_error");
        assert!(err.to_string().contains("ValidationException"));
    }

    #[test]
    fn test_unavailable_store_does_not_spend_an_attempt() {
        let err: ProcessingError =
            DispatchError::from(HandlerError::Unavailable("circuit breaker is open".into())).into();
        assert_eq!(err.kind(), "unavailable");
        assert!(!err.counts_as_attempt());
    }
}

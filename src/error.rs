use thiserror::Error;
use winnow::error::{ContextError, ErrMode};

/// Crate-wide error taxonomy. Individual modules report their own error enums
/// through `rootcause::Report`; this is the flattened view for callers that
/// only care which class of failure happened.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Parse error: {detail}")]
    ParseError { detail: String },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[cfg(feature = "json")]
    #[error("Invalid JSON: {err}")]
    SerdeJson {
        #[from]
        err: serde_json::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error {
    pub kind: ErrorKind,
}

impl From<std::io::Error> for Error {
    fn from(x: std::io::Error) -> Error {
        Error { kind: x.into() }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(x: serde_json::Error) -> Error {
        Error { kind: x.into() }
    }
}

impl From<ErrMode<ContextError>> for Error {
    fn from(e: ErrMode<ContextError>) -> Self {
        Error { kind: e.into() }
    }
}

impl From<ErrMode<ContextError>> for ErrorKind {
    fn from(e: ErrMode<ContextError>) -> Self {
        ErrorKind::ParseError {
            detail: e.to_string(),
        }
    }
}

pub type IResult<T> = Result<T, Error>;

pub fn failure_from_kind(kind: ErrorKind) -> Error {
    Error { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_the_kind() {
        let err: Error = std::io::Error::other("disk gone").into();
        assert!(matches!(err.kind, ErrorKind::IoError(_)));

        let err: Error = ErrMode::Backtrack(ContextError::new()).into();
        assert!(matches!(err.kind, ErrorKind::ParseError { .. }));

        let err = failure_from_kind(ErrorKind::UnsupportedFormat("16-bit".into()));
        assert_eq!(err.to_string(), "Unsupported format: 16-bit");
    }
}

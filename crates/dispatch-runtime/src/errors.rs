use dispatch_proto::Status;
use thiserror::Error;

/// Errors raised by the coroutine engine and function registry (spec §4.3,
/// §4.5, §7). These are Rust-level errors; [`dispatch_proto::Status`] is
/// the wire-level taxonomy they get classified into at the response
/// boundary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("request input could not be unboxed: {0}")]
    InvalidInput(#[from] dispatch_proto::ValueError),

    #[error("coroutine state carries type url {found}, expected {expected}")]
    IncompatibleState { found: String, expected: String },

    #[error("no volatile coroutine is registered for handle {0}")]
    UnknownHandle(u64),

    #[error("coroutine state is malformed: {0}")]
    MalformedState(String),

    #[error("function name {requested} does not match registered handler {registered}")]
    FunctionNameMismatch {
        requested: String,
        registered: String,
    },

    #[error("no function is registered under the name {0}")]
    FunctionNotFound(String),

    #[error("poll result carried a top-level error: {0}")]
    PollFailed(dispatch_proto::Error),
}

impl RuntimeError {
    /// The wire [`Status`] a given `RuntimeError` reports as (spec §4.3,
    /// §4.5, §7) — unlike a function body's own error, which goes through
    /// [`dispatch_proto::error_status`] instead.
    pub fn status(&self) -> Status {
        match self {
            RuntimeError::FunctionNotFound(_) => Status::NotFound,
            RuntimeError::InvalidInput(_) | RuntimeError::FunctionNameMismatch { .. } => {
                Status::InvalidArgument
            }
            RuntimeError::IncompatibleState { .. } => Status::IncompatibleState,
            RuntimeError::UnknownHandle(_) | RuntimeError::MalformedState(_) => {
                Status::InvalidArgument
            }
            RuntimeError::PollFailed(_) => Status::PermanentError,
        }
    }

    /// The classifier name this error reports under an [`dispatch_proto::Error`]'s
    /// `type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            RuntimeError::InvalidInput(_) => "InvalidInput",
            RuntimeError::IncompatibleState { .. } => "IncompatibleState",
            RuntimeError::UnknownHandle(_) => "UnknownHandle",
            RuntimeError::MalformedState(_) => "MalformedState",
            RuntimeError::FunctionNameMismatch { .. } => "FunctionNameMismatch",
            RuntimeError::FunctionNotFound(_) => "FunctionNotFound",
            RuntimeError::PollFailed(_) => "PollFailed",
        }
    }
}

/// Adapts any `std::error::Error` into [`dispatch_proto::Error`] (spec §3
/// "Error", §7 propagation policy: "continuation body returning an error").
/// The `type` field defaults to the Rust type name of the concrete error,
/// the nearest analogue of the class-name classifier spec.md describes.
pub trait ClassifiedError: std::error::Error {
    fn error_type(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }

    fn into_protocol_error(&self) -> dispatch_proto::Error {
        dispatch_proto::Error::new(self.error_type(), self.to_string())
    }
}

impl<E: std::error::Error> ClassifiedError for E {}

/// A plain string error, the Rust analogue of Go's `errors.New`. Its
/// classifier name matches the scenario in spec §8 #3 (`type="errorString"`)
/// rather than this type's own Rust type name, since it exists specifically
/// to stand in for "some ad hoc error with no richer classification".
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SimpleError(pub String);

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn error_type(&self) -> &'static str {
        "errorString"
    }

    pub fn into_protocol_error(&self) -> dispatch_proto::Error {
        dispatch_proto::Error::new(self.error_type(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_error_classifies_as_error_string() {
        let err = SimpleError::new("invoke error");
        let proto = err.into_protocol_error();
        assert_eq!(proto.error_type, "errorString");
        assert_eq!(proto.message, "invoke error");
    }

    #[test]
    fn generic_error_uses_type_name() {
        #[derive(Debug, Error)]
        #[error("boom")]
        struct Boom;

        let proto = Boom.into_protocol_error();
        assert!(proto.error_type.ends_with("Boom"));
        assert_eq!(proto.message, "boom");
    }
}

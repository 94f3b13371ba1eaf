//! Protocol message carriers (spec §3): immutable, constructed by option
//! functions, compared structurally.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A request-to-do-work (§3 "Call"). Immutable once constructed — mutate
/// by rebuilding through [`Call::new`] plus option functions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub endpoint: String,
    pub function: String,
    pub input: Value,
    pub version: Option<String>,
    pub expiration: Option<Duration>,
    pub correlation_id: Option<u64>,
}

pub type CallOption = Box<dyn FnOnce(Call) -> Call>;

impl Call {
    /// Allocation: one `String` clone each for endpoint/function.
    pub fn new(endpoint: impl Into<String>, function: impl Into<String>, input: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            function: function.into(),
            input,
            version: None,
            expiration: None,
            correlation_id: None,
        }
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = CallOption>) -> Self {
        for opt in options {
            self = opt(self);
        }
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_correlation_id(mut self, id: u64) -> Self {
        self.correlation_id = Some(id);
        self
    }
}

pub fn with_version(version: impl Into<String>) -> CallOption {
    let version = version.into();
    Box::new(move |call| call.with_version(version))
}

pub fn with_expiration(expiration: Duration) -> CallOption {
    Box::new(move |call| call.with_expiration(expiration))
}

pub fn with_correlation_id(id: u64) -> CallOption {
    Box::new(move |call| call.with_correlation_id(id))
}

/// Opaque classifier chosen by the error producer (§3 "Error").
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Error {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub value: Option<Vec<u8>>,
    pub traceback: Option<Vec<u8>>,
}

impl Error {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            value: None,
            traceback: None,
        }
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_traceback(mut self, traceback: Vec<u8>) -> Self {
        self.traceback = Some(traceback);
        self
    }
}

/// §3 "CallResult". `output` and `error` may both be present (partial
/// result semantics).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CallResult {
    pub dispatch_id: Option<String>,
    pub correlation_id: Option<u64>,
    pub output: Option<Value>,
    pub error: Option<Error>,
}

impl CallResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_dispatch_id(mut self, dispatch_id: impl Into<String>) -> Self {
        self.dispatch_id = Some(dispatch_id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: u64) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// §3 "Exit". `tail_call` is mutually exclusive with `result`. Per the
/// spec's open question on `tail_call`, this repository exposes it only
/// as a faithfully round-tripped constructor option and invents no local
/// re-dispatch semantics for it (see DESIGN.md).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Exit {
    pub result: Option<CallResult>,
    pub tail_call: Option<Call>,
}

impl Exit {
    pub fn with_result(result: CallResult) -> Self {
        Self {
            result: Some(result),
            tail_call: None,
        }
    }

    pub fn with_tail_call(tail_call: Call) -> Self {
        Self {
            result: None,
            tail_call: Some(tail_call),
        }
    }
}

/// §3 "Poll". Invariant: `0 <= min_results <= max_results` and
/// `max_wait > 0` (validated by [`Poll::new`]).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Poll {
    pub min_results: i32,
    pub max_results: i32,
    pub max_wait: Duration,
    pub coroutine_state: Vec<u8>,
    pub calls: Vec<Call>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PollBuildError {
    #[error("min_results ({min}) must be <= max_results ({max})")]
    MinExceedsMax { min: i32, max: i32 },
    #[error("min_results must be >= 0, got {0}")]
    NegativeMin(i32),
    #[error("max_wait must be > 0")]
    NonPositiveMaxWait,
}

impl Poll {
    pub fn new(
        min_results: i32,
        max_results: i32,
        max_wait: Duration,
        coroutine_state: Vec<u8>,
        calls: Vec<Call>,
    ) -> Result<Self, PollBuildError> {
        if min_results < 0 {
            return Err(PollBuildError::NegativeMin(min_results));
        }
        if min_results > max_results {
            return Err(PollBuildError::MinExceedsMax {
                min: min_results,
                max: max_results,
            });
        }
        if max_wait.is_zero() {
            return Err(PollBuildError::NonPositiveMaxWait);
        }
        Ok(Self {
            min_results,
            max_results,
            max_wait,
            coroutine_state,
            calls,
        })
    }
}

/// §3 "PollResult".
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PollResult {
    pub coroutine_state: Vec<u8>,
    pub results: Vec<CallResult>,
    pub error: Option<Error>,
}

impl PollResult {
    pub fn new(coroutine_state: Vec<u8>) -> Self {
        Self {
            coroutine_state,
            results: Vec::new(),
            error: None,
        }
    }

    pub fn with_results(mut self, results: Vec<CallResult>) -> Self {
        self.results = results;
        self
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }
}

/// Tagged directive a [`Request`] carries — exactly one (§3 invariant).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum RequestDirective {
    Input(Value),
    PollResult(PollResult),
}

/// Tagged directive a [`Response`] carries — exactly one (§3 invariant).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ResponseDirective {
    Exit(Exit),
    Poll(Poll),
}

/// §3 "Request": the wire envelope the platform sends in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub function: String,
    pub dispatch_id: String,
    pub parent_id: Option<String>,
    pub root_id: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub directive: RequestDirective,
}

impl Request {
    pub fn new(function: impl Into<String>, dispatch_id: impl Into<String>, directive: RequestDirective) -> Self {
        Self {
            function: function.into(),
            dispatch_id: dispatch_id.into(),
            parent_id: None,
            root_id: None,
            creation_time: None,
            expiration_time: None,
            directive,
        }
    }

    pub fn input(&self) -> Option<&Value> {
        match &self.directive {
            RequestDirective::Input(v) => Some(v),
            RequestDirective::PollResult(_) => None,
        }
    }

    pub fn poll_result(&self) -> Option<&PollResult> {
        match &self.directive {
            RequestDirective::PollResult(p) => Some(p),
            RequestDirective::Input(_) => None,
        }
    }
}

/// §3 "Response": the wire envelope the endpoint sends back.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub status: crate::status::Status,
    pub directive: ResponseDirective,
}

impl Response {
    pub fn new(status: crate::status::Status, directive: ResponseDirective) -> Self {
        Self { status, directive }
    }

    pub fn exit(status: crate::status::Status, exit: Exit) -> Self {
        Self::new(status, ResponseDirective::Exit(exit))
    }

    pub fn poll(status: crate::status::Status, poll: Poll) -> Self {
        Self::new(status, ResponseDirective::Poll(poll))
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.directive, ResponseDirective::Exit(_))
    }

    pub fn is_poll(&self) -> bool {
        matches!(self.directive, ResponseDirective::Poll(_))
    }
}

//! Canonical binary wire form (spec §6 "Wire protocol", §8 round-trip laws).
//!
//! [`Request`]/[`Response`] are modeled as Rust enums so an in-process
//! caller cannot construct "no directive" or "both directives" — but the
//! bytes arriving over the wire can represent either of those malformed
//! shapes, so decoding goes through a raw, field-optional mirror type and
//! validates the "exactly one directive" invariant explicitly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{
    Call, Exit, Poll, PollResult, Request, RequestDirective, Response, ResponseDirective,
};
use crate::status::Status;
use crate::value::Value;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("request carries no directive (expected exactly one of Input, PollResult)")]
    MissingRequestDirective,
    #[error("request carries both Input and PollResult directives")]
    ConflictingRequestDirectives,
    #[error("response carries no directive (expected exactly one of Exit, Poll)")]
    MissingResponseDirective,
    #[error("response carries both Exit and Poll directives")]
    ConflictingResponseDirectives,
    #[error("failed to decode wire payload: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct RawRequest {
    function: String,
    dispatch_id: String,
    parent_id: Option<String>,
    root_id: Option<String>,
    creation_time: Option<chrono::DateTime<chrono::Utc>>,
    expiration_time: Option<chrono::DateTime<chrono::Utc>>,
    input: Option<Value>,
    poll_result: Option<PollResult>,
}

impl From<&Request> for RawRequest {
    fn from(r: &Request) -> Self {
        let (input, poll_result) = match &r.directive {
            RequestDirective::Input(v) => (Some(v.clone()), None),
            RequestDirective::PollResult(p) => (None, Some(p.clone())),
        };
        Self {
            function: r.function.clone(),
            dispatch_id: r.dispatch_id.clone(),
            parent_id: r.parent_id.clone(),
            root_id: r.root_id.clone(),
            creation_time: r.creation_time,
            expiration_time: r.expiration_time,
            input,
            poll_result,
        }
    }
}

impl TryFrom<RawRequest> for Request {
    type Error = ProtocolError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let directive = match (raw.input, raw.poll_result) {
            (Some(_), Some(_)) => return Err(ProtocolError::ConflictingRequestDirectives),
            (None, None) => return Err(ProtocolError::MissingRequestDirective),
            (Some(v), None) => RequestDirective::Input(v),
            (None, Some(p)) => RequestDirective::PollResult(p),
        };
        Ok(Request {
            function: raw.function,
            dispatch_id: raw.dispatch_id,
            parent_id: raw.parent_id,
            root_id: raw.root_id,
            creation_time: raw.creation_time,
            expiration_time: raw.expiration_time,
            directive,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct RawResponse {
    status: Status,
    exit: Option<Exit>,
    poll: Option<Poll>,
}

impl From<&Response> for RawResponse {
    fn from(r: &Response) -> Self {
        let (exit, poll) = match &r.directive {
            ResponseDirective::Exit(e) => (Some(e.clone()), None),
            ResponseDirective::Poll(p) => (None, Some(p.clone())),
        };
        Self {
            status: r.status,
            exit,
            poll,
        }
    }
}

impl TryFrom<RawResponse> for Response {
    type Error = ProtocolError;

    fn try_from(raw: RawResponse) -> Result<Self, Self::Error> {
        let directive = match (raw.exit, raw.poll) {
            (Some(_), Some(_)) => return Err(ProtocolError::ConflictingResponseDirectives),
            (None, None) => return Err(ProtocolError::MissingResponseDirective),
            (Some(e), None) => ResponseDirective::Exit(e),
            (None, Some(p)) => ResponseDirective::Poll(p),
        };
        Ok(Response {
            status: raw.status,
            directive,
        })
    }
}

pub fn encode_request(request: &Request) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(&RawRequest::from(request)).map_err(|e| ProtocolError::Decode(e.to_string()))
}

pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    let raw: RawRequest =
        bincode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    Request::try_from(raw)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(&RawResponse::from(response)).map_err(|e| ProtocolError::Decode(e.to_string()))
}

pub fn decode_response(bytes: &[u8]) -> Result<Response, ProtocolError> {
    let raw: RawResponse =
        bincode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    Response::try_from(raw)
}

/// Referenced by `dispatch-proto` consumers that need to construct a raw,
/// not-yet-validated wire call (e.g. a fuzzer or the base64 tunnel
/// adapter in `dispatch-http`); kept crate-public rather than exported so
/// callers are steered towards [`Call`] construction through `Call::new`.
#[allow(dead_code)]
fn _assert_call_is_serde(_: &Call) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CallResult;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn sample_request() -> Request {
        Request::new(
            "identity",
            "d1",
            RequestDirective::Input(Value::new("t", vec![1, 2, 3])),
        )
    }

    fn sample_response() -> Response {
        Response::exit(
            Status::Ok,
            Exit::with_result(CallResult::new().with_output(Value::new("t", vec![4, 5]))),
        )
    }

    #[test]
    fn request_round_trips() {
        let req = sample_request();
        let bytes = encode_request(&req).unwrap();
        let decoded = decode_request(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn response_round_trips() {
        let resp = sample_response();
        let bytes = encode_response(&resp).unwrap();
        let decoded = decode_response(&bytes).unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn poll_response_round_trips() {
        let poll = Poll::new(1, 1, Duration::from_secs(300), vec![9, 9], vec![]).unwrap();
        let resp = Response::poll(Status::Ok, poll);
        let bytes = encode_response(&resp).unwrap();
        assert_eq!(decode_response(&bytes).unwrap(), resp);
    }

    #[test]
    fn missing_request_directive_is_rejected() {
        let raw = RawRequest {
            function: "f".to_owned(),
            dispatch_id: "d".to_owned(),
            parent_id: None,
            root_id: None,
            creation_time: None,
            expiration_time: None,
            input: None,
            poll_result: None,
        };
        let bytes = bincode::serialize(&raw).unwrap();
        assert_eq!(
            decode_request(&bytes).unwrap_err(),
            ProtocolError::MissingRequestDirective
        );
    }

    #[test]
    fn conflicting_request_directives_are_rejected() {
        let raw = RawRequest {
            function: "f".to_owned(),
            dispatch_id: "d".to_owned(),
            parent_id: None,
            root_id: None,
            creation_time: None,
            expiration_time: None,
            input: Some(Value::new("t", vec![])),
            poll_result: Some(PollResult::new(vec![])),
        };
        let bytes = bincode::serialize(&raw).unwrap();
        assert_eq!(
            decode_request(&bytes).unwrap_err(),
            ProtocolError::ConflictingRequestDirectives
        );
    }

    #[test]
    fn malformed_bytes_produce_decode_error_not_panic() {
        let err = decode_request(&[0xff, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}

pub mod message;
pub mod status;
pub mod value;
mod varint;
pub mod wire;

pub use message::{
    with_correlation_id, with_expiration, with_version, Call, CallOption, CallResult, Error,
    Exit, Poll, PollBuildError, PollResult, Request, RequestDirective, Response,
    ResponseDirective,
};
pub use status::{
    error_status, DnsError, FlaggedError, HttpProtocolError, JoinedError, Status, StatusError,
    TlsError, UrlError,
};
pub use value::{
    box_message, unbox_message, Boxable, Unboxable, Value, ValueError, TYPE_URL_BOOL,
    TYPE_URL_BYTES, TYPE_URL_DOUBLE, TYPE_URL_DURATION, TYPE_URL_INT64, TYPE_URL_STRING,
    TYPE_URL_TIMESTAMP, TYPE_URL_UINT64,
};
pub use wire::{decode_request, decode_response, encode_request, encode_response, ProtocolError};

//! Closed status taxonomy and `error_status` classifier (spec §4.2).

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform status. Ordered identically on the wire — do not reorder
/// variants, the discriminants are part of the wire contract (§4.2).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Unspecified = 0,
    Ok = 1,
    Timeout = 2,
    Throttled = 3,
    InvalidArgument = 4,
    InvalidResponse = 5,
    TemporaryError = 6,
    PermanentError = 7,
    IncompatibleState = 8,
    DnsError = 9,
    TcpError = 10,
    TlsError = 11,
    HttpError = 12,
    Unauthenticated = 13,
    PermissionDenied = 14,
    NotFound = 15,
}

impl Status {
    pub const ALL: [Status; 16] = [
        Status::Unspecified,
        Status::Ok,
        Status::Timeout,
        Status::Throttled,
        Status::InvalidArgument,
        Status::InvalidResponse,
        Status::TemporaryError,
        Status::PermanentError,
        Status::IncompatibleState,
        Status::DnsError,
        Status::TcpError,
        Status::TlsError,
        Status::HttpError,
        Status::Unauthenticated,
        Status::PermissionDenied,
        Status::NotFound,
    ];

    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(v: i32) -> Option<Status> {
        Self::ALL.into_iter().find(|s| s.as_i32() == v)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sentinel error that is itself a status; classifying it recovers the
/// wrapped status exactly (§8 "status classification idempotence").
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("status error: {0}")]
pub struct StatusError(pub Status);

/// Adapter for foreign error types that expose ad hoc `Timeout()`/
/// `Temporary()` classification flags (§4.2 rule 9). Wrap a foreign error
/// in this type at the boundary where it enters dispatch code to preserve
/// those flags through the classifier.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FlaggedError {
    pub message: String,
    pub timeout: bool,
    pub temporary: bool,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

/// Marker for DNS resolution failures (§4.2 rule 6).
#[derive(Debug, Error)]
#[error("dns error: {0}")]
pub struct DnsError(pub String);

/// Marker for TLS certificate/record failures (§4.2 rule 6).
#[derive(Debug, Error)]
#[error("tls error: {0}")]
pub struct TlsError(pub String);

/// Marker for HTTP-library protocol errors: unsupported method, missing
/// multipart boundary, non-multipart content (§4.2 rule 6).
#[derive(Debug, Error)]
#[error("http protocol error: {0}")]
pub struct HttpProtocolError(pub String);

/// A networking URL error, optionally embedding an I/O error. `unexpected_eof`
/// or `malformed_response` select `InvalidResponse`; any other embedded I/O
/// error falls through to `TcpError` (§4.2 rule 7).
#[derive(Debug, Error)]
#[error("url error: {message}")]
pub struct UrlError {
    pub message: String,
    pub unexpected_eof: bool,
    pub malformed_response: bool,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

/// An aggregate of independently-raised errors (the Rust analogue of a
/// joined/multi error, §4.2 rule 8).
#[derive(Debug, Error)]
#[error("{} joined errors", children.len())]
pub struct JoinedError {
    pub children: Vec<Box<dyn StdError + Send + Sync + 'static>>,
}

const MAX_CHAIN_DEPTH: usize = 16;

/// `ErrorStatus(err)` (spec §4.2). `None` classifies as `Status::Ok`,
/// mirroring the `nil -> OK` rule for a caller that already distinguishes
/// `Result::Ok` from `Result::Err` before calling this.
pub fn error_status(err: Option<&(dyn StdError + 'static)>) -> Status {
    match err {
        None => Status::Ok,
        Some(err) => classify_chain(err, 0),
    }
}

fn classify_chain(err: &(dyn StdError + 'static), depth: usize) -> Status {
    if depth >= MAX_CHAIN_DEPTH {
        return Status::PermanentError;
    }

    if let Some(status_err) = err.downcast_ref::<StatusError>() {
        return status_err.0;
    }
    if let Some(joined) = err.downcast_ref::<JoinedError>() {
        return classify_joined(joined, depth);
    }
    if err.downcast_ref::<DnsError>().is_some() {
        return Status::DnsError;
    }
    if err.downcast_ref::<TlsError>().is_some() {
        return Status::TlsError;
    }
    if err.downcast_ref::<HttpProtocolError>().is_some() {
        return Status::HttpError;
    }
    if let Some(url_err) = err.downcast_ref::<UrlError>() {
        if url_err.unexpected_eof || url_err.malformed_response {
            return Status::InvalidResponse;
        }
        if let Some(source) = url_err.source.as_deref() {
            if let Some(io_err) = source.downcast_ref::<io::Error>() {
                return classify_io(io_err);
            }
        }
        return Status::TcpError;
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        return classify_io(io_err);
    }
    if let Some(flagged) = err.downcast_ref::<FlaggedError>() {
        if flagged.timeout {
            return Status::Timeout;
        }
        if flagged.temporary {
            return Status::TemporaryError;
        }
    }

    match err.source() {
        Some(source) => classify_chain(source, depth + 1),
        None => Status::PermanentError,
    }
}

fn classify_joined(joined: &JoinedError, depth: usize) -> Status {
    let mut statuses = joined
        .children
        .iter()
        .map(|child| classify_chain(child.as_ref(), depth + 1));
    let Some(first) = statuses.next() else {
        return Status::Unspecified;
    };
    if statuses.all(|s| s == first) {
        first
    } else {
        Status::Unspecified
    }
}

fn classify_io(err: &io::Error) -> Status {
    use io::ErrorKind::*;
    match err.kind() {
        InvalidInput | InvalidData => Status::InvalidArgument,
        PermissionDenied => Status::PermissionDenied,
        NotFound => Status::NotFound,
        ConnectionRefused | ConnectionReset | ConnectionAborted | BrokenPipe
        | NotConnected => Status::TcpError,
        TimedOut => Status::Timeout,
        WouldBlock | Interrupted => Status::TemporaryError,
        _ => classify_io_raw_os_error(err),
    }
}

fn classify_io_raw_os_error(err: &io::Error) -> Status {
    #[cfg(target_os = "linux")]
    {
        match err.raw_os_error() {
            Some(libc_like) if is_too_many_open_files(libc_like) => Status::TemporaryError,
            _ => Status::PermanentError,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = err;
        Status::PermanentError
    }
}

#[cfg(target_os = "linux")]
fn is_too_many_open_files(raw: i32) -> bool {
    const EMFILE: i32 = 24;
    const ENFILE: i32 = 23;
    raw == EMFILE || raw == ENFILE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nil_is_ok() {
        assert_eq!(error_status(None), Status::Ok);
    }

    #[test]
    fn status_error_is_idempotent() {
        for status in Status::ALL {
            if status == Status::Ok {
                continue;
            }
            let err = StatusError(status);
            assert_eq!(error_status(Some(&err)), status);
        }
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing");
        assert_eq!(error_status(Some(&err)), Status::NotFound);
    }

    #[test]
    fn io_timed_out_maps_to_timeout() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(error_status(Some(&err)), Status::Timeout);
    }

    #[test]
    fn io_connection_reset_maps_to_tcp_error() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(error_status(Some(&err)), Status::TcpError);
    }

    #[test]
    fn dns_error_maps_to_dns_error() {
        let err = DnsError("nxdomain".to_owned());
        assert_eq!(error_status(Some(&err)), Status::DnsError);
    }

    #[test]
    fn joined_error_with_agreement_propagates_status() {
        let joined = JoinedError {
            children: vec![
                Box::new(StatusError(Status::Timeout)),
                Box::new(StatusError(Status::Timeout)),
            ],
        };
        assert_eq!(error_status(Some(&joined)), Status::Timeout);
    }

    #[test]
    fn joined_error_with_disagreement_is_unspecified() {
        let joined = JoinedError {
            children: vec![
                Box::new(StatusError(Status::Timeout)),
                Box::new(StatusError(Status::NotFound)),
            ],
        };
        assert_eq!(error_status(Some(&joined)), Status::Unspecified);
    }

    #[test]
    fn unknown_error_is_permanent() {
        #[derive(Debug, Error)]
        #[error("boom")]
        struct Boom;
        assert_eq!(error_status(Some(&Boom)), Status::PermanentError);
    }

    #[test]
    fn flagged_timeout_wins_over_default() {
        let err = FlaggedError {
            message: "slow".to_owned(),
            timeout: true,
            temporary: false,
            source: None,
        };
        assert_eq!(error_status(Some(&err)), Status::Timeout);
    }

    #[test]
    fn chain_depth_is_bounded() {
        #[derive(Debug)]
        struct Wrap(Box<dyn StdError + 'static>);
        impl fmt::Display for Wrap {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "wrap")
            }
        }
        impl StdError for Wrap {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(self.0.as_ref())
            }
        }

        #[derive(Debug, Error)]
        #[error("root")]
        struct Root;

        let mut chain: Box<dyn StdError + 'static> = Box::new(Root);
        for _ in 0..32 {
            chain = Box::new(Wrap(chain));
        }
        assert_eq!(error_status(Some(chain.as_ref())), Status::PermanentError);
    }
}

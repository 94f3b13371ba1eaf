//! Public facade for the dispatch workspace.
//!
//! Default path: register functions against a [`Dispatch`], call or await
//! them with [`FunctionHandle`], and serve the registry with
//! [`Dispatch::endpoint`]. `dispatch::proto`/`dispatch::runtime` remain
//! available for applications that need the lower-level wire types or
//! coroutine primitives directly.

mod ergonomic;

pub use ergonomic::{await_one, gather, Dispatch, FunctionHandle, GatherError};

pub use dispatch_proto::{
    decode_request, decode_response, encode_request, encode_response, error_status, Boxable,
    Call, CallResult, Error, Exit, Poll, PollResult, ProtocolError, Request, RequestDirective,
    Response, ResponseDirective, Status, StatusError, Unboxable, Value, ValueError,
};
pub use dispatch_runtime::{
    await_calls, await_calls_with_wait, AwaitCtx, ClassifiedError, CoroutineMode, RuntimeError,
    SimpleError, Strategy, TypedFunction, DEFAULT_MAX_WAIT,
};
pub use dispatch_client::{ApiKeySource, Client, ClientConfig, ClientError, ConfigError};
pub use dispatch_http::{Endpoint, EndpointConfig, EndpointError, SigningError, TunnelError};

pub mod proto {
    pub use dispatch_proto::*;
}

pub mod runtime {
    pub use dispatch_runtime::*;
}

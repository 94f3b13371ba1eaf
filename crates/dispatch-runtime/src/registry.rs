//! Function registry and request dispatch (spec §4.5). Each registered
//! function picks a [`CoroutineMode`] once, at registration time; the
//! registry itself just looks the function up by name and hands the
//! request to the matching engine path in [`crate::coroutine`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dispatch_proto::{
    CallResult, Error as ProtoError, Exit, Request, RequestDirective, Response, ResponseDirective,
    Status,
};
use tracing::{info, warn};

use crate::coroutine::{self, DurableJournal, VolatileTable};
use crate::errors::RuntimeError;
use crate::function::Function;

/// Whether a registered function's continuation lives in-process between
/// requests (`Volatile`) or is re-executed from a replayed journal on
/// every request (`Durable`) — spec §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoroutineMode {
    Volatile,
    Durable,
}

struct Registered {
    function: Arc<dyn Function>,
    mode: CoroutineMode,
}

/// The function host an endpoint serves requests out of. One registry can
/// back any transport (`dispatch-http`'s axum handler, a local test
/// harness, `dispatch-cli`'s process entry point).
pub struct Registry {
    functions: Mutex<HashMap<String, Registered>>,
    volatile: VolatileTable,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            functions: Mutex::new(HashMap::new()),
            volatile: VolatileTable::new(),
        }
    }

    /// Registers `function` under `name` in `mode`. Overwrites any prior
    /// registration under the same name, the same as re-assigning a map
    /// entry — there is no separate "update" call.
    pub fn register(&self, name: impl Into<String>, mode: CoroutineMode, function: Arc<dyn Function>) {
        self.functions
            .lock()
            .unwrap()
            .insert(name.into(), Registered { function, mode });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.lock().unwrap().contains_key(name)
    }

    /// Handles one [`Request`], never returning an `Err`: anything that
    /// goes wrong is folded into the returned [`Response`]'s status and
    /// [`Exit`] error, matching the wire contract that a `Response` always
    /// carries exactly one directive.
    pub async fn run(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok((status, directive)) => Response::new(status, directive),
            Err(err) => {
                warn!(error = %err, "request failed before a function body could report its own error");
                let proto_error = ProtoError::new(err.error_type(), err.to_string());
                Response::exit(
                    err.status(),
                    Exit::with_result(CallResult::new().with_error(proto_error)),
                )
            }
        }
    }

    /// Iterates the live volatile continuations and aborts each one's
    /// underlying task (spec §4.5 "Close"). Durable handlers have nothing
    /// in-process to stop; their state lives entirely in the replayed
    /// journal the caller holds.
    pub fn close(&self) {
        self.volatile.close();
    }

    async fn dispatch(
        &self,
        request: Request,
    ) -> Result<(Status, ResponseDirective), RuntimeError> {
        let registered = self.lookup(&request.function)?;
        if registered.function.name() != request.function {
            return Err(RuntimeError::FunctionNameMismatch {
                requested: request.function,
                registered: registered.function.name().to_owned(),
            });
        }
        info!(function = %request.function, mode = ?registered.mode, "dispatching request");

        match (request.directive, registered.mode) {
            (RequestDirective::Input(input), CoroutineMode::Volatile) => {
                let function = registered.function.clone();
                coroutine::run_volatile(&self.volatile, move |ctx| async move {
                    function.call(ctx, input).await
                })
                .await
            }
            (RequestDirective::Input(input), CoroutineMode::Durable) => {
                let function = registered.function.clone();
                let journal = DurableJournal::fresh(input);
                coroutine::run_durable(journal, move |ctx, input| async move {
                    function.call(ctx, input).await
                })
                .await
            }
            (RequestDirective::PollResult(poll_result), CoroutineMode::Volatile) => {
                let handle = coroutine::decode_volatile_handle(&poll_result.coroutine_state)?;
                coroutine::resume_volatile(&self.volatile, handle, poll_result).await
            }
            (RequestDirective::PollResult(poll_result), CoroutineMode::Durable) => {
                let function = registered.function.clone();
                let mut journal = coroutine::decode_durable_journal(&poll_result.coroutine_state)?;
                journal.consumed.push(poll_result);
                coroutine::run_durable(journal, move |ctx, input| async move {
                    function.call(ctx, input).await
                })
                .await
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<LookupHandle, RuntimeError> {
        let table = self.functions.lock().unwrap();
        let registered = table
            .get(name)
            .ok_or_else(|| RuntimeError::FunctionNotFound(name.to_owned()))?;
        Ok(LookupHandle {
            function: registered.function.clone(),
            mode: registered.mode,
        })
    }
}

/// Owned copy of the bits of a [`Registered`] entry `dispatch` needs to
/// hold across an `.await` without keeping the functions table locked.
struct LookupHandle {
    function: Arc<dyn Function>,
    mode: CoroutineMode,
}

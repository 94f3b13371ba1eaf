//! The coroutine execution engine (spec §4.3). A function body suspends by
//! calling [`AwaitCtx::poll_once`]; the engine around it decides, per
//! request, whether that suspension is satisfied by replaying a previously
//! recorded [`PollResult`] or by genuinely parking the task and returning a
//! [`Poll`] directive to the caller.
//!
//! Two interchangeable modes share this same suspension primitive:
//!
//! - **Volatile**: the spawned task survives between requests. Resuming it
//!   means sending the new [`PollResult`] down a stashed `oneshot` and
//!   letting the task keep running from exactly where it left off.
//! - **Durable**: the task is re-spawned from scratch every request. Every
//!   [`PollResult`] the coroutine has ever received is replayed through it
//!   synchronously, in order, until the replay log is exhausted and the
//!   task reaches genuinely new ground.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dispatch_proto::{Exit, Poll, PollResult, Status};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::errors::RuntimeError;
use crate::state::{self, DURABLE_STATE_TYPE_URL, VOLATILE_STATE_TYPE_URL};

/// A function body's outcome: a boxed output, or the wire [`Status`] the
/// failure should report paired with its protocol-level [`dispatch_proto::Error`]
/// (spec §4.3 step 3 — the status a handler error reports as is computed
/// from the live Rust error at the point it is raised, before it is
/// erased into the wire `Error` carrier).
type Body = Result<dispatch_proto::Value, (Status, dispatch_proto::Error)>;

/// A suspension request a running body handed to the engine: the calls it
/// wants dispatched plus the bounds it wants to wait under, and the channel
/// the engine uses to hand the eventual [`PollResult`] back in.
pub struct PendingPoll {
    pub calls: Vec<dispatch_proto::Call>,
    pub min_results: i32,
    pub max_results: i32,
    pub max_wait: Duration,
    resume: oneshot::Sender<PollResult>,
}

/// Handed to a function body; the only way it can suspend (spec §4.3
/// "Polymorphism" — the body never sees Request/Response directly).
pub struct AwaitCtx {
    replay: Mutex<VecDeque<PollResult>>,
    consumed: Mutex<Vec<PollResult>>,
    yield_tx: mpsc::UnboundedSender<PendingPoll>,
}

impl AwaitCtx {
    fn new(replay: VecDeque<PollResult>, yield_tx: mpsc::UnboundedSender<PendingPoll>) -> Self {
        Self {
            replay: Mutex::new(replay),
            consumed: Mutex::new(Vec::new()),
            yield_tx,
        }
    }

    /// Suspends until a [`PollResult`] satisfying `calls` is available.
    /// Replays a previously recorded result without ever touching the
    /// yield channel; only falls through to a real suspension once the
    /// replay log is exhausted.
    pub async fn poll_once(
        &self,
        calls: Vec<dispatch_proto::Call>,
        min_results: i32,
        max_results: i32,
        max_wait: Duration,
    ) -> PollResult {
        let replayed = self.replay.lock().unwrap().pop_front();
        if let Some(replayed) = replayed {
            self.consumed.lock().unwrap().push(replayed.clone());
            return replayed;
        }
        let (resume_tx, resume_rx) = oneshot::channel();
        let pending = PendingPoll {
            calls,
            min_results,
            max_results,
            max_wait,
            resume: resume_tx,
        };
        // The sending half of `yield_tx` stays open for the life of the
        // task, so this send only fails if the engine driving us has
        // already abandoned the task (durable re-spawn, shutdown) — in
        // which case there is no one left to observe this future anyway.
        let _ = self.yield_tx.send(pending);
        let result = resume_rx
            .await
            .expect("coroutine engine dropped the resume channel while we were suspended");
        self.consumed.lock().unwrap().push(result.clone());
        result
    }

    fn consumed_so_far(&self) -> Vec<PollResult> {
        self.consumed.lock().unwrap().clone()
    }
}

enum StepOutcome {
    Done(Body),
    Suspended(PendingPoll),
}

/// Races the yield channel against task completion. Takes both by mutable
/// reference so the caller keeps ownership and can stash them away again if
/// the body suspends rather than finishes.
async fn drive(
    yield_rx: &mut mpsc::UnboundedReceiver<PendingPoll>,
    join: &mut JoinHandle<Body>,
) -> StepOutcome {
    tokio::select! {
        biased;
        pending = yield_rx.recv() => {
            match pending {
                Some(pending) => StepOutcome::Suspended(pending),
                None => StepOutcome::Done(join.await.expect("coroutine task panicked")),
            }
        }
        joined = join => {
            StepOutcome::Done(joined.expect("coroutine task panicked"))
        }
    }
}

fn exit_from(result: Body) -> (Status, Exit) {
    match result {
        Ok(value) => (
            Status::Ok,
            Exit::with_result(dispatch_proto::CallResult::new().with_output(value)),
        ),
        Err((status, error)) => (
            status,
            Exit::with_result(dispatch_proto::CallResult::new().with_error(error)),
        ),
    }
}

fn poll_from(pending: PendingPoll, coroutine_state: Vec<u8>) -> Poll {
    Poll::new(
        pending.min_results,
        pending.max_results,
        pending.max_wait,
        coroutine_state,
        pending.calls,
    )
    .expect("engine only ever builds in-bounds polls")
}

/// One still-suspended volatile coroutine: the task keeps running in the
/// background, parked on `resume`, while the caller holds only a handle.
struct LiveContinuation {
    join: JoinHandle<Body>,
    yield_rx: mpsc::UnboundedReceiver<PendingPoll>,
    resume: oneshot::Sender<PollResult>,
}

/// Registry of suspended volatile coroutines, keyed by a random handle
/// (spec §4.3: handles are never derived from a request-local counter, so a
/// stale handle from a previous process incarnation can never collide).
pub struct VolatileTable {
    live: Mutex<HashMap<u64, LiveContinuation>>,
    next_handle_hint: AtomicU64,
}

impl Default for VolatileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VolatileTable {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            next_handle_hint: AtomicU64::new(rand::thread_rng().gen()),
        }
    }

    fn fresh_handle(&self) -> u64 {
        self.next_handle_hint.fetch_add(1, Ordering::Relaxed)
    }

    /// Aborts every still-suspended continuation and empties the table
    /// (spec §4.3 point 4: "if the process is shutting down, stop all
    /// outstanding continuations and drain to completion"). A continuation
    /// parked on `resume` can never make further progress once its handle
    /// is gone, so aborting its task is the only way to actually stop it.
    pub fn close(&self) {
        let mut live = self.live.lock().unwrap();
        for (_, continuation) in live.drain() {
            continuation.join.abort();
        }
    }
}

/// Runs `body` against a brand-new input, in volatile mode: if it suspends,
/// the task and its channels are stashed in `table` under a fresh handle.
pub async fn run_volatile<Fut>(
    table: &VolatileTable,
    body: impl FnOnce(std::sync::Arc<AwaitCtx>) -> Fut,
) -> Result<(Status, dispatch_proto::ResponseDirective), RuntimeError>
where
    Fut: std::future::Future<Output = Body> + Send + 'static,
{
    let (yield_tx, yield_rx) = mpsc::unbounded_channel();
    let ctx = std::sync::Arc::new(AwaitCtx::new(VecDeque::new(), yield_tx));
    let join = tokio::spawn(body(ctx));
    step_volatile(table, yield_rx, join).await
}

/// Resumes an already-suspended volatile coroutine with the [`PollResult`]
/// the platform just delivered.
pub async fn resume_volatile(
    table: &VolatileTable,
    handle: u64,
    result: PollResult,
) -> Result<(Status, dispatch_proto::ResponseDirective), RuntimeError> {
    let live = table
        .live
        .lock()
        .unwrap()
        .remove(&handle)
        .ok_or(RuntimeError::UnknownHandle(handle))?;
    let _ = live.resume.send(result);
    step_volatile(table, live.yield_rx, live.join).await
}

async fn step_volatile(
    table: &VolatileTable,
    mut yield_rx: mpsc::UnboundedReceiver<PendingPoll>,
    mut join: JoinHandle<Body>,
) -> Result<(Status, dispatch_proto::ResponseDirective), RuntimeError> {
    match drive(&mut yield_rx, &mut join).await {
        StepOutcome::Done(result) => {
            let (status, exit) = exit_from(result);
            Ok((status, dispatch_proto::ResponseDirective::Exit(exit)))
        }
        StepOutcome::Suspended(pending) => {
            let handle = table.fresh_handle();
            let coroutine_state = state::wrap(VOLATILE_STATE_TYPE_URL, handle.to_le_bytes().to_vec());
            let PendingPoll {
                calls,
                min_results,
                max_results,
                max_wait,
                resume,
            } = pending;
            let poll = Poll::new(min_results, max_results, max_wait, coroutine_state, calls)
                .expect("engine only ever builds in-bounds polls");
            table.live.lock().unwrap().insert(
                handle,
                LiveContinuation {
                    join,
                    yield_rx,
                    resume,
                },
            );
            Ok((Status::Ok, dispatch_proto::ResponseDirective::Poll(poll)))
        }
    }
}

/// Everything a durable coroutine needs to be replayed from scratch: the
/// original boxed input (the platform only delivers it once, on the very
/// first request) and every [`PollResult`] it has been given since.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DurableJournal {
    pub input: dispatch_proto::Value,
    pub consumed: Vec<PollResult>,
}

impl DurableJournal {
    pub fn fresh(input: dispatch_proto::Value) -> Self {
        Self {
            input,
            consumed: Vec::new(),
        }
    }
}

/// Re-runs `body` from scratch against `journal.input`, replaying
/// `journal.consumed` through it synchronously, then, if it suspends on
/// genuinely new ground, returns the next [`Poll`] directive with the
/// updated journal folded into its `coroutine_state`.
pub async fn run_durable<Fut>(
    journal: DurableJournal,
    body: impl FnOnce(std::sync::Arc<AwaitCtx>, dispatch_proto::Value) -> Fut,
) -> Result<(Status, dispatch_proto::ResponseDirective), RuntimeError>
where
    Fut: std::future::Future<Output = Body> + Send + 'static,
{
    let (yield_tx, mut yield_rx) = mpsc::unbounded_channel();
    let ctx = std::sync::Arc::new(AwaitCtx::new(journal.consumed.clone().into(), yield_tx));
    let ctx_for_body = ctx.clone();
    let input = journal.input.clone();
    let mut join = tokio::spawn(async move { body(ctx_for_body, input).await });
    match drive(&mut yield_rx, &mut join).await {
        StepOutcome::Done(result) => {
            let (status, exit) = exit_from(result);
            Ok((status, dispatch_proto::ResponseDirective::Exit(exit)))
        }
        StepOutcome::Suspended(pending) => {
            let updated = DurableJournal {
                input: journal.input,
                consumed: ctx.consumed_so_far(),
            };
            let journal_bytes =
                bincode::serialize(&updated).expect("durable journal always serializes");
            let coroutine_state = state::wrap(DURABLE_STATE_TYPE_URL, journal_bytes);
            Ok((
                Status::Ok,
                dispatch_proto::ResponseDirective::Poll(poll_from(pending, coroutine_state)),
            ))
        }
    }
}

/// Deserializes a durable `coroutine_state` blob into its replay journal.
pub fn decode_durable_journal(coroutine_state: &[u8]) -> Result<DurableJournal, RuntimeError> {
    let payload = state::unwrap(coroutine_state, DURABLE_STATE_TYPE_URL)?;
    bincode::deserialize(&payload).map_err(|err| RuntimeError::MalformedState(err.to_string()))
}

/// Decodes a volatile `coroutine_state` blob into the handle it names.
pub fn decode_volatile_handle(coroutine_state: &[u8]) -> Result<u64, RuntimeError> {
    let payload = state::unwrap(coroutine_state, VOLATILE_STATE_TYPE_URL)?;
    let bytes: [u8; 8] = payload
        .try_into()
        .map_err(|_| RuntimeError::MalformedState("volatile handle is not 8 bytes".to_owned()))?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ClassifiedError;
    use dispatch_proto::Value;
    use pretty_assertions::assert_eq;

    fn sample_call() -> dispatch_proto::Call {
        dispatch_proto::Call::new("https://example/e", "double", Value::new("t", vec![1]))
    }

    #[tokio::test]
    async fn volatile_coroutine_runs_to_completion_without_awaiting() {
        let table = VolatileTable::new();
        let (status, directive) =
            run_volatile(&table, |_ctx| async move { Ok(Value::new("t", vec![7])) })
                .await
                .unwrap();
        assert_eq!(status, Status::Ok);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                let output = exit.result.unwrap().output.unwrap();
                assert_eq!(output, Value::new("t", vec![7]));
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }

    #[tokio::test]
    async fn volatile_coroutine_runs_to_an_error_exit_with_its_classified_status() {
        let table = VolatileTable::new();
        let (status, directive) = run_volatile(&table, |_ctx| async move {
            Err((
                Status::PermanentError,
                dispatch_proto::Error::new("errorString", "invoke error"),
            ))
        })
        .await
        .unwrap();

        assert_eq!(status, Status::PermanentError);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                let error = exit.result.unwrap().error.unwrap();
                assert_eq!(error.message, "invoke error");
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }

    #[tokio::test]
    async fn volatile_coroutine_suspends_and_resumes() {
        let table = VolatileTable::new();
        let (status, directive) = run_volatile(&table, |ctx| async move {
            let result = ctx
                .poll_once(vec![sample_call()], 1, 1, Duration::from_secs(300))
                .await;
            Ok(result.results[0].output.clone().unwrap())
        })
        .await
        .unwrap();
        assert_eq!(status, Status::Ok);

        let handle = match directive {
            dispatch_proto::ResponseDirective::Poll(poll) => {
                decode_volatile_handle(&poll.coroutine_state).unwrap()
            }
            dispatch_proto::ResponseDirective::Exit(_) => panic!("expected Poll"),
        };

        let poll_result = PollResult::new(vec![]).with_results(vec![dispatch_proto::CallResult::new()
            .with_output(Value::new("t", vec![42]))]);
        let (status, directive) = resume_volatile(&table, handle, poll_result).await.unwrap();
        assert_eq!(status, Status::Ok);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                let output = exit.result.unwrap().output.unwrap();
                assert_eq!(output, Value::new("t", vec![42]));
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }

    #[tokio::test]
    async fn unknown_volatile_handle_is_rejected() {
        let table = VolatileTable::new();
        let err = resume_volatile(&table, 999, PollResult::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownHandle(999)));
    }

    #[tokio::test]
    async fn close_aborts_an_outstanding_volatile_coroutine() {
        let table = VolatileTable::new();
        let (_, directive) = run_volatile(&table, |ctx| async move {
            let result = ctx
                .poll_once(vec![sample_call()], 1, 1, Duration::from_secs(300))
                .await;
            Ok(result.results[0].output.clone().unwrap())
        })
        .await
        .unwrap();
        let handle = match directive {
            dispatch_proto::ResponseDirective::Poll(poll) => {
                decode_volatile_handle(&poll.coroutine_state).unwrap()
            }
            dispatch_proto::ResponseDirective::Exit(_) => panic!("expected Poll"),
        };

        table.close();

        let err = resume_volatile(&table, handle, PollResult::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownHandle(h) if h == handle));
    }

    fn durable_body(
        ctx: std::sync::Arc<AwaitCtx>,
        input: Value,
    ) -> impl std::future::Future<Output = Body> {
        async move {
            let seed: i64 = input
                .unbox()
                .map_err(|e| (Status::InvalidArgument, e.into_protocol_error()))?;
            let first = ctx
                .poll_once(vec![sample_call()], 1, 1, Duration::from_secs(300))
                .await;
            let second = ctx
                .poll_once(vec![sample_call()], 1, 1, Duration::from_secs(300))
                .await;
            let a: i64 = first.results[0].output.clone().unwrap().unbox().unwrap();
            let b: i64 = second.results[0].output.clone().unwrap().unbox().unwrap();
            Value::boxed(&(seed + a + b))
                .map_err(|e| (Status::PermanentError, e.into_protocol_error()))
        }
    }

    #[tokio::test]
    async fn durable_coroutine_replays_journal_then_suspends_again() {
        // First execution: fresh journal, suspends on the first await.
        let journal = DurableJournal::fresh(Value::boxed(&1i64).unwrap());
        let (_, directive) = run_durable(journal, durable_body).await.unwrap();

        let journal_after_first = match directive {
            dispatch_proto::ResponseDirective::Poll(poll) => {
                decode_durable_journal(&poll.coroutine_state).unwrap()
            }
            dispatch_proto::ResponseDirective::Exit(_) => panic!("expected Poll"),
        };
        assert!(journal_after_first.consumed.is_empty());

        // Second execution: replays nothing new (journal still empty), but
        // this time a PollResult is fed in for the first await, so the
        // function runs further and suspends again on the second await.
        let first_result =
            PollResult::new(vec![]).with_results(vec![dispatch_proto::CallResult::new()
                .with_output(Value::boxed(&11i64).unwrap())]);
        let mut journal = journal_after_first;
        journal.consumed.push(first_result);

        let (_, directive) = run_durable(journal, durable_body).await.unwrap();

        let journal_after_second = match directive {
            dispatch_proto::ResponseDirective::Poll(poll) => {
                decode_durable_journal(&poll.coroutine_state).unwrap()
            }
            dispatch_proto::ResponseDirective::Exit(_) => panic!("expected Poll"),
        };
        assert_eq!(journal_after_second.consumed.len(), 1);

        // Third execution: both results known, the body runs to completion.
        let second_result =
            PollResult::new(vec![]).with_results(vec![dispatch_proto::CallResult::new()
                .with_output(Value::boxed(&30i64).unwrap())]);
        let mut journal = journal_after_second;
        journal.consumed.push(second_result);

        let (status, directive) = run_durable(journal, durable_body).await.unwrap();

        assert_eq!(status, Status::Ok);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                let output = exit.result.unwrap().output.unwrap();
                assert_eq!(output, Value::boxed(&42i64).unwrap());
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }
}

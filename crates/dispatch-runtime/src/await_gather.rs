//! Await/Gather (spec §4.4): the high-level helper a coroutine body calls
//! to fan a batch of [`Call`]s out and wait on their [`CallResult`]s,
//! built entirely on top of [`AwaitCtx::poll_once`].
//!
//! Correlation IDs are assigned starting from a random `u64`, never from
//! the batch's index — a stale result from an unrelated poll can never be
//! mistaken for the Nth call in a fresh batch just because it landed in
//! slot N. Once the first poll is sent, every follow-up poll re-sends an
//! empty call list: the platform already has the outstanding calls, there
//! is nothing new to dispatch, only more waiting to do.

use std::collections::HashMap;
use std::time::Duration;

use dispatch_proto::{Call, CallResult};
use rand::Rng;

use crate::coroutine::AwaitCtx;
use crate::errors::RuntimeError;

/// The default bound the platform is given to gather results by, absent a
/// caller-supplied deadline (spec §4.4).
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5 * 60);

/// Termination rule for a batch (spec §4.4 "AwaitAll"/"AwaitAny").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Wait until every call in the batch has a result.
    All,
    /// Wait until the first result arrives, then stop.
    Any,
}

/// Dispatches `calls` and waits on their results per `strategy`, returning
/// results in the same order as `calls` itself so order-sensitive callers
/// (`Gather` of a fixed tuple of operations) don't have to re-sort by
/// correlation ID themselves. Under [`Strategy::Any`] the entries for
/// calls that never resolved are simply absent.
///
/// Fails immediately, without returning any partial results, if a poll
/// comes back carrying a top-level [`PollResult`](dispatch_proto::PollResult)
/// error — the platform could not service the poll at all (spec §4.4 step 4).
pub async fn await_calls(
    ctx: &AwaitCtx,
    calls: Vec<Call>,
    strategy: Strategy,
) -> Result<Vec<CallResult>, RuntimeError> {
    await_calls_with_wait(ctx, calls, strategy, DEFAULT_MAX_WAIT).await
}

pub async fn await_calls_with_wait(
    ctx: &AwaitCtx,
    calls: Vec<Call>,
    strategy: Strategy,
    max_wait: Duration,
) -> Result<Vec<CallResult>, RuntimeError> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let start = rand::thread_rng().gen::<u64>();
    let ordered_ids: Vec<u64> = (0..calls.len() as u64).map(|i| start.wrapping_add(i)).collect();
    let numbered_calls: Vec<Call> = calls
        .into_iter()
        .zip(ordered_ids.iter())
        .map(|(call, &id)| call.with_correlation_id(id))
        .collect();

    let total = numbered_calls.len() as i32;
    let min_results = match strategy {
        Strategy::All => total,
        Strategy::Any => 1,
    };

    let mut collected: HashMap<u64, CallResult> = HashMap::new();
    let mut pending_calls = numbered_calls;

    loop {
        let poll_result = ctx
            .poll_once(pending_calls, min_results, total, max_wait)
            .await;

        if let Some(error) = poll_result.error {
            return Err(RuntimeError::PollFailed(error));
        }

        for result in poll_result.results {
            if let Some(id) = result.correlation_id {
                collected.insert(id, result);
            }
        }

        let done = match strategy {
            // Stop the moment any slot has failed, not just once every
            // slot has an answer — a failure is terminal, it doesn't need
            // company (spec §4.4 "on the first failure, return").
            Strategy::All => {
                collected.len() as i32 >= total || collected.values().any(|r| r.error.is_some())
            }
            // Stop at the first success; only fall through to "every slot
            // failed" once nothing is left pending.
            Strategy::Any => {
                collected.values().any(|r| r.error.is_none()) || collected.len() as i32 >= total
            }
        };
        if done {
            break;
        }
        // Every subsequent poll just keeps waiting on calls already
        // dispatched; nothing new goes out.
        pending_calls = Vec::new();
    }

    Ok(ordered_ids
        .into_iter()
        .filter_map(|id| collected.remove(&id))
        .collect())
}

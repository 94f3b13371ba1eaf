//! Scenario 5: `repeat_gather(3)` fans three `identity("x")` calls out
//! concurrently instead of sequencing them, and resolves in one exchange
//! regardless of the order the results arrive back in.

use dispatch::{gather, CallResult, Dispatch, PollResult, ResponseDirective, Status};

#[tokio::main]
async fn main() {
    let dispatch = Dispatch::new();
    let identity = dispatch.function(
        "identity",
        dispatch::CoroutineMode::Volatile,
        |_ctx, s: String| async move { Ok::<String, std::convert::Infallible>(s) },
    );

    let table = dispatch::runtime::VolatileTable::new();
    let (_, directive) = dispatch::runtime::run_volatile(&table, move |ctx| async move {
        let calls = (0..3)
            .map(|_| identity.new_call("https://example/e", &"x".to_owned()).unwrap())
            .collect();
        let pieces: Vec<String> = gather(&ctx, calls).await.map_err(|err| {
            (
                Status::PermanentError,
                dispatch::Error::new("GatherError", err.to_string()),
            )
        })?;
        let out = pieces.concat();
        dispatch::Value::boxed(&out).map_err(|e| {
            (
                Status::PermanentError,
                dispatch::ClassifiedError::into_protocol_error(&e),
            )
        })
    })
    .await
    .expect("volatile engine never fails outright");

    let poll = match directive {
        ResponseDirective::Poll(poll) => poll,
        ResponseDirective::Exit(_) => unreachable!("gather always suspends at least once"),
    };
    assert_eq!(poll.calls.len(), 3);

    // Deliver the three results out of order to show correlation, not
    // index, decides which piece is which.
    let handle = dispatch::runtime::decode_volatile_handle(&poll.coroutine_state).unwrap();
    let mut results: Vec<CallResult> = poll
        .calls
        .iter()
        .map(|call| {
            CallResult::new()
                .with_correlation_id(call.correlation_id.unwrap())
                .with_output(call.input.clone())
        })
        .collect();
    results.reverse();
    let poll_result = PollResult::new(vec![]).with_results(results);

    let (_, directive) = dispatch::runtime::resume_volatile(&table, handle, poll_result)
        .await
        .unwrap();
    match directive {
        ResponseDirective::Exit(exit) => {
            let output: String = exit.result.unwrap().output.unwrap().unbox().unwrap();
            println!("repeat_gather(3) = {output:?}");
        }
        ResponseDirective::Poll(_) => unreachable!("one exchange resolves all three calls"),
    }
}

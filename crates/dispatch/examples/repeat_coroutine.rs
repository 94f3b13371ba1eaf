//! Scenario 4: a coroutine that awaits another function `n` times in
//! sequence, driving the Poll/PollResult exchange by hand the way a
//! platform would.

use dispatch::{
    CallResult, ClassifiedError, CoroutineMode, Dispatch, PollResult, ResponseDirective, Status,
    Value,
};

#[tokio::main]
async fn main() {
    let dispatch = Dispatch::new();
    let identity = dispatch.function(
        "identity",
        CoroutineMode::Volatile,
        |_ctx, s: String| async move { Ok::<String, std::convert::Infallible>(s) },
    );

    let repeat_identity = identity.clone();
    let table = dispatch::runtime::VolatileTable::new();
    let n = 3;
    let (_, mut directive) = dispatch::runtime::run_volatile(&table, move |ctx| async move {
        let mut out = String::new();
        for _ in 0..n {
            let piece: String = repeat_identity
                .call(&ctx, "https://example/e", &"x".to_owned())
                .await
                .map_err(|err| {
                    (
                        Status::PermanentError,
                        dispatch::Error::new("GatherError", err.to_string()),
                    )
                })?;
            out.push_str(&piece);
        }
        Value::boxed(&out).map_err(|e| (Status::PermanentError, e.into_protocol_error()))
    })
    .await
    .expect("volatile engine never fails outright");

    let mut step = 0;
    loop {
        match directive {
            ResponseDirective::Exit(exit) => {
                let output: String = exit.result.unwrap().output.unwrap().unbox().unwrap();
                println!("repeat(3) = {output:?} after {step} poll exchanges");
                break;
            }
            ResponseDirective::Poll(poll) => {
                step += 1;
                let handle = dispatch::runtime::decode_volatile_handle(&poll.coroutine_state).unwrap();
                let results: Vec<CallResult> = poll
                    .calls
                    .iter()
                    .map(|call| {
                        CallResult::new()
                            .with_correlation_id(call.correlation_id.unwrap())
                            .with_output(call.input.clone())
                    })
                    .collect();
                let poll_result = PollResult::new(vec![]).with_results(results);
                let (_, next) = dispatch::runtime::resume_volatile(&table, handle, poll_result)
                    .await
                    .unwrap();
                directive = next;
            }
        }
    }
}

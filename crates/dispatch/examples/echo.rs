//! Scenario 1 from the endpoint's testable properties: register `identity`
//! and run it directly against the registry, no HTTP involved.

use dispatch::{CoroutineMode, Dispatch, Request, RequestDirective, ResponseDirective, Status, Value};

#[tokio::main]
async fn main() {
    let dispatch = Dispatch::new();
    let identity = dispatch.function(
        "identity",
        CoroutineMode::Volatile,
        |_ctx, s: String| async move { Ok::<String, std::convert::Infallible>(s) },
    );

    let request = Request::new(
        identity.name(),
        "d1",
        RequestDirective::Input(Value::boxed(&"hello".to_owned()).unwrap()),
    );
    let response = dispatch.registry().run(request).await;

    assert_eq!(response.status, Status::Ok);
    match response.directive {
        ResponseDirective::Exit(exit) => {
            let output: String = exit.result.unwrap().output.unwrap().unbox().unwrap();
            println!("identity(\"hello\") = {output:?}");
        }
        ResponseDirective::Poll(_) => unreachable!("identity never suspends"),
    }
}

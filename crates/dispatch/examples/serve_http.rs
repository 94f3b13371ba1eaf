//! Mounts a small registry behind the HTTP endpoint, the same shape
//! `dispatch-cli` wires up, but built directly from application code
//! through the `dispatch` facade.

use dispatch::{CoroutineMode, Dispatch};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let dispatch = Dispatch::new();
    dispatch.function(
        "identity",
        CoroutineMode::Volatile,
        |_ctx, s: String| async move { Ok::<String, std::convert::Infallible>(s) },
    );

    let endpoint = dispatch.endpoint().unwrap_or_else(|err| {
        eprintln!("DISPATCH_VERIFICATION_KEY is malformed: {err}");
        std::process::exit(1);
    });

    let addr: std::net::SocketAddr = std::env::var("DISPATCH_EXAMPLE_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_owned())
        .parse()
        .expect("DISPATCH_EXAMPLE_BIND must be a socket address");

    endpoint.serve(addr).await
}

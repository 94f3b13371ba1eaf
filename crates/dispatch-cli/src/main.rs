//! Minimal process entry point that mounts a function registry behind
//! `dispatch-http`'s endpoint and serves it (spec §6 "CLI surface": the
//! core does not own a host process, this binary is the ambient glue a
//! runnable repository still needs). It is deliberately thin: argument
//! parsing and wiring only.
//!
//! Real applications register their own functions against a
//! [`dispatch_runtime::Registry`] (typically through the `dispatch`
//! facade crate) rather than linking this binary; the `identity`
//! function registered below exists only so `dispatch-serve` is
//! runnable out of the box as a smoke test.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dispatch_runtime::{CoroutineMode, Registry, TypedFunction};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dispatch-serve", about = "Serve a dispatch function registry over HTTP")]
struct Args {
    /// Address to bind the endpoint on.
    #[arg(long, env = "DISPATCH_CLI_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let registry = Arc::new(demo_registry());

    let endpoint = dispatch_http::Endpoint::from_env(registry).unwrap_or_else(|err| {
        tracing::error!(error = %err, "DISPATCH_VERIFICATION_KEY is malformed");
        std::process::exit(1);
    });

    endpoint.serve(args.bind).await
}

fn demo_registry() -> Registry {
    let registry = Registry::new();
    registry.register(
        "identity",
        CoroutineMode::Volatile,
        Arc::new(TypedFunction::new(
            "identity",
            |_ctx, input: String| async move { Ok::<String, std::convert::Infallible>(input) },
        )),
    );
    registry
}

//! Ergonomic layer over [`dispatch_runtime`] (spec §4.4, §4.5): a
//! [`Dispatch`] registry wrapper that hands back a typed [`FunctionHandle`]
//! per registration, plus the `gather`/`await_one` free functions that
//! implement `F.Await(input) = Gather(F.NewCall(input))[0]` directly.

use std::marker::PhantomData;
use std::sync::Arc;

use dispatch_proto::{Boxable, Call, Unboxable, Value, ValueError};
use dispatch_runtime::{
    await_calls, AwaitCtx, CoroutineMode, Function, Registry, Strategy, TypedFunction,
};
use thiserror::Error;

/// Everything that can go wrong turning a [`CallResult`](dispatch_proto::CallResult)
/// back into a typed value: the call itself failed, or it succeeded but
/// didn't unbox to the caller's expected type.
#[derive(Debug, Error)]
pub enum GatherError {
    #[error("call failed: {} ({})", .0.error_type, .0.message)]
    CallFailed(dispatch_proto::Error),
    #[error("call result did not carry an output value")]
    MissingOutput,
    #[error("failed to unbox call result: {0}")]
    Unbox(#[from] ValueError),
    #[error(transparent)]
    PollFailed(#[from] dispatch_runtime::RuntimeError),
}

/// Registry wrapper applications build their function surface against
/// (spec §4.5). Thin: it exists to hand back a [`FunctionHandle`] per
/// registration instead of making callers juggle string names themselves.
#[derive(Clone)]
pub struct Dispatch {
    registry: Arc<Registry>,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }

    /// Registers `handler` under `name` in `mode` and returns a handle
    /// callers use to build [`Call`]s against it without repeating the
    /// name or its input/output types at every call site.
    pub fn function<F, Fut, In, Out, E>(
        &self,
        name: impl Into<String>,
        mode: CoroutineMode,
        handler: F,
    ) -> FunctionHandle<In, Out>
    where
        F: Fn(Arc<AwaitCtx>, In) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Out, E>> + Send + 'static,
        In: Unboxable + Send + 'static,
        Out: Boxable + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let name = name.into();
        let function: Arc<dyn Function> = Arc::new(TypedFunction::new(name.clone(), handler));
        self.registry.register(name.clone(), mode, function);
        FunctionHandle {
            name,
            _marker: PhantomData,
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Builds the HTTP endpoint this registry is served behind (spec §6).
    pub fn endpoint(&self) -> Result<dispatch_http::Endpoint, dispatch_http::SigningError> {
        dispatch_http::Endpoint::from_env(self.registry.clone())
    }
}

/// A typed reference to a registered function: builds [`Call`]s against it
/// and, from inside a coroutine body, awaits a single invocation directly.
pub struct FunctionHandle<In, Out> {
    name: String,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out> Clone for FunctionHandle<In, Out> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<In, Out> FunctionHandle<In, Out>
where
    In: Boxable,
    Out: Unboxable,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a [`Call`] targeting `endpoint` with a boxed `input`
    /// (spec §4.4 "NewCall").
    pub fn new_call(&self, endpoint: impl Into<String>, input: &In) -> Result<Call, ValueError> {
        let boxed = Value::boxed(input)?;
        Ok(Call::new(endpoint, self.name.clone(), boxed))
    }

    /// `F.Await(input) = Gather(F.NewCall(input))[0]` (spec §4.4): builds
    /// a single-element batch, waits for it, and unboxes the one result.
    pub async fn call(
        &self,
        ctx: &AwaitCtx,
        endpoint: impl Into<String>,
        input: &In,
    ) -> Result<Out, GatherError> {
        let call = self.new_call(endpoint, input)?;
        await_one(ctx, call).await
    }
}

/// Dispatches `calls` concurrently and waits for every result, unboxing
/// each into `O` or propagating its first failure (spec §4.4 "Gather").
pub async fn gather<O: Unboxable>(ctx: &AwaitCtx, calls: Vec<Call>) -> Result<Vec<O>, GatherError> {
    let results = await_calls(ctx, calls, Strategy::All).await?;
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        if let Some(error) = result.error {
            return Err(GatherError::CallFailed(error));
        }
        let output = result.output.ok_or(GatherError::MissingOutput)?;
        out.push(output.unbox()?);
    }
    Ok(out)
}

/// `Gather(calls)[0]` for the single-call case (spec §4.4).
pub async fn await_one<O: Unboxable>(ctx: &AwaitCtx, call: Call) -> Result<O, GatherError> {
    let mut results = gather(ctx, vec![call]).await?;
    Ok(results.remove(0))
}

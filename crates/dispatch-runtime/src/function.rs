//! Function trait and the typed wrapper registered functions are built
//! from (spec §4.3 "Polymorphism"): callers write ordinary async Rust
//! against their own input/output types, and boxing happens at the edge.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dispatch_proto::{error_status, Boxable, Status, Unboxable, Value};

use crate::coroutine::AwaitCtx;
use crate::errors::ClassifiedError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The type-erased shape every registered function reduces to once boxed:
/// a suspension context in, a boxed value out, or the classified status
/// and protocol error a failure should report as (spec §4.3 step 3).
pub trait Function: Send + Sync {
    /// The name this handler declares itself under, independent of
    /// whatever key the registry happens to dispatch requests through
    /// (spec §4.3 "function-name dispatch").
    fn name(&self) -> &str;

    fn call(
        &self,
        ctx: Arc<AwaitCtx>,
        input: Value,
    ) -> BoxFuture<Result<Value, (Status, dispatch_proto::Error)>>;
}

/// Adapts a strongly-typed async handler `Fn(AwaitCtx, In) -> Future<Output
/// = Result<Out, E>>` into a [`Function`], unboxing the input and boxing
/// the output (or classifying the error) at the boundary.
pub struct TypedFunction<F> {
    name: String,
    handler: Arc<F>,
}

impl<F> TypedFunction<F> {
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

impl<F, Fut, In, Out, E> Function for TypedFunction<F>
where
    F: Fn(Arc<AwaitCtx>, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, E>> + Send + 'static,
    In: Unboxable + Send + 'static,
    Out: Boxable + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(
        &self,
        ctx: Arc<AwaitCtx>,
        input: Value,
    ) -> BoxFuture<Result<Value, (Status, dispatch_proto::Error)>> {
        let handler = self.handler.clone();
        Box::pin(async move {
            // Input un-box failure is always InvalidArgument (spec §7),
            // not whatever `error_status` would otherwise guess for a
            // bare `ValueError`.
            let typed_input: In = input
                .unbox()
                .map_err(|e| (Status::InvalidArgument, e.into_protocol_error()))?;
            let output = (handler)(ctx, typed_input).await.map_err(|e| {
                (error_status(Some(&e)), e.into_protocol_error())
            })?;
            output
                .box_value()
                .map_err(|e| (error_status(Some(&e)), e.into_protocol_error()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::VolatileTable;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn typed_function_boxes_and_unboxes_at_the_boundary() {
        let doubling = TypedFunction::new("double", |_ctx: Arc<AwaitCtx>, n: i64| async move {
            Ok::<i64, std::convert::Infallible>(n * 2)
        });
        assert_eq!(doubling.name(), "double");

        let table = VolatileTable::new();
        let (status, directive) = crate::coroutine::run_volatile(&table, |ctx| {
            let input = Value::boxed(&21i64).unwrap();
            async move { doubling.call(ctx, input).await }
        })
        .await
        .unwrap();

        assert_eq!(status, Status::Ok);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                let output: i64 = exit.result.unwrap().output.unwrap().unbox().unwrap();
                assert_eq!(output, 42);
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }

    #[tokio::test]
    async fn typed_function_rejects_wrong_shaped_input() {
        let expects_string =
            TypedFunction::new("expects_string", |_ctx: Arc<AwaitCtx>, s: String| async move {
                Ok::<String, std::convert::Infallible>(s)
            });
        let table = VolatileTable::new();
        let (status, directive) = crate::coroutine::run_volatile(&table, |ctx| {
            let input = Value::boxed(&7i64).unwrap();
            async move { expects_string.call(ctx, input).await }
        })
        .await
        .unwrap();

        assert_eq!(status, Status::InvalidArgument);
        match directive {
            dispatch_proto::ResponseDirective::Exit(exit) => {
                assert!(exit.result.unwrap().error.is_some());
            }
            dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
        }
    }
}

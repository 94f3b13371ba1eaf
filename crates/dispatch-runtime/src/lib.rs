pub mod await_gather;
pub mod coroutine;
pub mod errors;
pub mod function;
pub mod registry;
mod state;

pub use await_gather::{await_calls, await_calls_with_wait, Strategy, DEFAULT_MAX_WAIT};
pub use coroutine::{
    decode_durable_journal, decode_volatile_handle, resume_volatile, run_durable, run_volatile,
    AwaitCtx, DurableJournal, VolatileTable,
};
pub use errors::{ClassifiedError, RuntimeError, SimpleError};
pub use function::{BoxFuture, Function, TypedFunction};
pub use registry::{CoroutineMode, Registry};

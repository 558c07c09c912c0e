//! Uniform wrapper over async and blocking handlers.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use quill_core::Interaction;

use crate::error::BoxError;
use crate::extractor::{Invocation, ParamSpec};
use crate::handler::{BlockingHandler, Handler, HandlerResult, IntoReply};
use crate::pool::BlockingPool;

type AsyncFn = Arc<dyn Fn(Invocation) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type BlockingFn = Arc<dyn Fn(Invocation) -> HandlerResult + Send + Sync>;

/// Marks a synchronous handler for registration.
///
/// ```rust,ignore
/// fn roll() -> String {
///     format!("{}", rand::random::<u8>() % 6 + 1)
/// }
///
/// app.command("roll", "Roll a die").build(blocking(roll))?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Blocking<F>(pub F);

/// Wraps a synchronous handler, check or error handler so it runs on the
/// blocking pool.
pub fn blocking<F>(f: F) -> Blocking<F> {
    Blocking(f)
}

#[doc(hidden)]
pub struct AsyncMarker<T>(PhantomData<fn() -> T>);

#[doc(hidden)]
pub struct BlockingMarker<T>(PhantomData<fn() -> T>);

// ============================================================================
// Callable
// ============================================================================

#[derive(Clone)]
enum CallableKind {
    Async(AsyncFn),
    Blocking(BlockingFn),
}

/// A registered handler with its parameter plan.
#[derive(Clone)]
pub struct Callable {
    kind: CallableKind,
    params: Arc<[ParamSpec]>,
}

impl Callable {
    /// Parameter plan computed at registration.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Whether the handler runs on the blocking pool.
    pub fn is_blocking(&self) -> bool {
        matches!(self.kind, CallableKind::Blocking(_))
    }

    /// `Some(required)` if the handler takes an invocation context.
    pub fn context_param(&self) -> Option<bool> {
        self.params.iter().find_map(|p| match p {
            ParamSpec::Context { required } => Some(*required),
            _ => None,
        })
    }

    /// Runs the handler.
    pub async fn invoke(&self, inv: Invocation, pool: &BlockingPool) -> HandlerResult {
        match &self.kind {
            CallableKind::Async(f) => f(inv).await,
            CallableKind::Blocking(f) => {
                let f = f.clone();
                pool.run(move || f(inv)).await
            }
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("blocking", &self.is_blocking())
            .field("params", &self.params)
            .finish()
    }
}

/// Anything that can be registered as a handler.
///
/// Implemented for async functions directly and for synchronous functions
/// wrapped in [`Blocking`].
pub trait IntoCallable<M> {
    /// Builds the callable.
    fn into_callable(self) -> Callable;
}

impl<F, T> IntoCallable<AsyncMarker<T>> for F
where
    F: Handler<T>,
    T: 'static,
{
    fn into_callable(self) -> Callable {
        Callable {
            params: F::params().into(),
            kind: CallableKind::Async(Arc::new(move |inv| self.clone().call(inv))),
        }
    }
}

impl<F, T> IntoCallable<BlockingMarker<T>> for Blocking<F>
where
    F: BlockingHandler<T>,
    T: 'static,
{
    fn into_callable(self) -> Callable {
        let f = self.0;
        Callable {
            params: F::params().into(),
            kind: CallableKind::Blocking(Arc::new(move |inv| f.clone().call(inv))),
        }
    }
}

// ============================================================================
// ErrorHandler
// ============================================================================

type AsyncErrorFn =
    Arc<dyn Fn(Interaction, BoxError) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type BlockingErrorFn = Arc<dyn Fn(Interaction, BoxError) -> HandlerResult + Send + Sync>;

#[derive(Clone)]
enum ErrorHandlerKind {
    Async(AsyncErrorFn),
    Blocking(BlockingErrorFn),
}

/// Turns an error raised by a check or handler into a reply.
///
/// Receives the interaction as it was before any check ran. Returning `Err`
/// hands the error on to the next handler in the chain.
#[derive(Clone)]
pub struct ErrorHandler {
    kind: ErrorHandlerKind,
}

impl ErrorHandler {
    /// Runs the error handler.
    pub async fn handle(
        &self,
        interaction: Interaction,
        error: BoxError,
        pool: &BlockingPool,
    ) -> HandlerResult {
        match &self.kind {
            ErrorHandlerKind::Async(f) => f(interaction, error).await,
            ErrorHandlerKind::Blocking(f) => {
                let f = f.clone();
                pool.run(move || f(interaction, error)).await
            }
        }
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorHandlerKind::Async(_) => "async",
            ErrorHandlerKind::Blocking(_) => "blocking",
        };
        f.debug_tuple("ErrorHandler").field(&kind).finish()
    }
}

/// Anything that can be registered as an error handler.
pub trait IntoErrorHandler<M> {
    /// Builds the error handler.
    fn into_error_handler(self) -> ErrorHandler;
}

impl<F, Fut, R> IntoErrorHandler<AsyncMarker<(Fut, R)>> for F
where
    F: Fn(Interaction, BoxError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply + 'static,
{
    fn into_error_handler(self) -> ErrorHandler {
        ErrorHandler {
            kind: ErrorHandlerKind::Async(Arc::new(move |interaction, error| {
                let fut = self(interaction, error);
                Box::pin(async move { fut.await.into_reply() })
            })),
        }
    }
}

impl<F, R> IntoErrorHandler<BlockingMarker<R>> for Blocking<F>
where
    F: Fn(Interaction, BoxError) -> R + Send + Sync + 'static,
    R: IntoReply + 'static,
{
    fn into_error_handler(self) -> ErrorHandler {
        let f = self.0;
        ErrorHandler {
            kind: ErrorHandlerKind::Blocking(Arc::new(move |interaction, error| {
                f(interaction, error).into_reply()
            })),
        }
    }
}

impl IntoErrorHandler<()> for ErrorHandler {
    fn into_error_handler(self) -> ErrorHandler {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppHandle;
    use crate::extractor::Options;
    use crate::handler::Reply;
    use crate::response::Response;
    use quill_core::Snowflake;
    use quill_state::{ManagedState, MemoryBackend};
    use serde_json::json;

    fn invocation() -> Invocation {
        let interaction = serde_json::from_value(json!({
            "id": "1", "application_id": "1", "type": 2, "token": "t",
            "data": { "name": "ping" }
        }))
        .unwrap();
        let app = AppHandle::new(Snowflake::new(1), ManagedState::new(MemoryBackend::new()));
        Invocation::new(interaction, app)
    }

    async fn ping(interaction: Interaction) -> String {
        format!("pong {}", interaction.id)
    }

    fn sync_ping() -> Response {
        Response::new().content("pong").ephemeral()
    }

    async fn with_options(Options(()): Options<()>) {}

    #[tokio::test]
    async fn async_handlers_are_awaited() {
        let callable = ping.into_callable();
        assert!(!callable.is_blocking());
        assert_eq!(callable.params(), &[ParamSpec::Interaction]);

        let reply = callable
            .invoke(invocation(), &BlockingPool::default())
            .await
            .unwrap();
        let Reply::Response(response) = reply else {
            panic!("expected a response");
        };
        assert_eq!(response.content_str(), Some("pong 1"));
    }

    #[tokio::test]
    async fn blocking_handlers_run_on_the_pool() {
        let callable = blocking(sync_ping).into_callable();
        assert!(callable.is_blocking());
        let reply = callable
            .invoke(invocation(), &BlockingPool::new(1))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Response(r) if r.is_ephemeral()));
    }

    #[test]
    fn params_are_recorded_once() {
        let callable = with_options.into_callable();
        assert!(matches!(callable.params(), [ParamSpec::Options(_)]));
        assert_eq!(callable.context_param(), None);
    }

    #[tokio::test]
    async fn error_handlers_can_decline() {
        let handler = (|_: Interaction, err: BoxError| async move {
            Err::<(), _>(err)
        })
        .into_error_handler();
        let interaction = invocation().interaction().clone();
        let result = handler
            .handle(interaction, "boom".into(), &BlockingPool::default())
            .await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}

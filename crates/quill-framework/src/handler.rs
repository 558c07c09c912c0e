//! Handler traits.
//!
//! Handlers are plain functions. Every parameter implements
//! [`FromInvocation`] and the return type implements [`IntoReply`]; blanket
//! implementations cover functions of up to 16 parameters, similar to Axum.
//!
//! ```rust,ignore
//! // No parameters, plain text reply
//! async fn ping() -> &'static str {
//!     "pong"
//! }
//!
//! // Typed options plus the raw interaction
//! async fn greet(Options(args): Options<GreetArgs>, interaction: Interaction) -> Response {
//!     Response::new().content(format!("hello {}", args.name))
//! }
//!
//! // Blocking work runs on the bounded pool
//! fn digest(Options(args): Options<DigestArgs>) -> Result<String, std::io::Error> {
//!     std::fs::read_to_string(args.path)
//! }
//! app.command("digest", "Hash a file").build(blocking(digest))?;
//! ```
//!
//! The parameter list is turned into a `Vec<ParamSpec>` once, when the
//! handler is registered. Registries validate it and derive option schemas
//! from it; nothing is inspected per call.

use std::future::Future;

use futures::future::BoxFuture;
use quill_core::{CompletedOption, ResponsePayload};

use crate::error::BoxError;
use crate::extractor::{FromInvocation, Invocation, ParamSpec};
use crate::response::Response;

// ============================================================================
// Reply - what a handler produced
// ============================================================================

/// The result of a handler, before normalization.
#[derive(Debug)]
pub enum Reply {
    /// Nothing to say; acknowledged as a deferred update.
    Empty,
    /// A message, possibly with components and context.
    Response(Response),
    /// A fully built wire payload, sent as is.
    Payload(ResponsePayload),
    /// Autocomplete suggestions.
    Choices(Vec<CompletedOption>),
}

/// Outcome of a handler call.
pub type HandlerResult = Result<Reply, BoxError>;

/// Types handlers may return.
pub trait IntoReply: Send {
    /// Converts the value into a reply.
    fn into_reply(self) -> HandlerResult;
}

impl IntoReply for () {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Empty)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> HandlerResult {
        Ok(self)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Response(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Response(Response::new().content(self)))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> HandlerResult {
        self.to_owned().into_reply()
    }
}

impl IntoReply for ResponsePayload {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Payload(self))
    }
}

impl IntoReply for Vec<CompletedOption> {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Choices(self))
    }
}

/// `None` is an empty reply.
impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Some(t) => t.into_reply(),
            None => Ok(Reply::Empty),
        }
    }
}

/// `Err` goes to the error handler chain.
impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send,
{
    fn into_reply(self) -> HandlerResult {
        self.map_err(Into::into).and_then(IntoReply::into_reply)
    }
}

// ============================================================================
// Handler traits
// ============================================================================

/// An async handler taking the parameters `T`.
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// What each parameter needs from the invocation.
    fn params() -> Vec<ParamSpec>;

    /// Extracts the parameters and runs the handler.
    fn call(self, inv: Invocation) -> BoxFuture<'static, HandlerResult>;
}

/// A synchronous handler taking the parameters `T`.
///
/// Runs on the [`BlockingPool`](crate::BlockingPool); wrap it with
/// [`blocking`](crate::blocking) when registering.
pub trait BlockingHandler<T>: Clone + Send + Sync + 'static {
    /// What each parameter needs from the invocation.
    fn params() -> Vec<ParamSpec>;

    /// Extracts the parameters and runs the handler.
    fn call(self, inv: Invocation) -> HandlerResult;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply + 'static,
            $( $ty: FromInvocation + 'static, )*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$($ty::param(),)*]
            }

            fn call(self, mut inv: Invocation) -> BoxFuture<'static, HandlerResult> {
                Box::pin(async move {
                    $(
                        let $ty = $ty::from_invocation(&mut inv)?;
                    )*
                    (self)($($ty,)*).await.into_reply()
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Res, $($ty,)*> BlockingHandler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Res + Clone + Send + Sync + 'static,
            Res: IntoReply + 'static,
            $( $ty: FromInvocation + 'static, )*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$($ty::param(),)*]
            }

            fn call(self, mut inv: Invocation) -> HandlerResult {
                $(
                    let $ty = $ty::from_invocation(&mut inv)?;
                )*
                (self)($($ty,)*).into_reply()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

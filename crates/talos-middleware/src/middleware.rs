//! The middleware trait and chain linkage.
//!
//! Middleware receives the mutable exchange context, the request, and a
//! [`Next`] handle onto the rest of the chain. The forward-vs-finalise
//! contract is structural: `Next::run` consumes the handle, so a stage
//! either invokes it once or returns its own response, never both.

use std::future::Future;
use std::pin::Pin;

use crate::context::ExchangeContext;
use crate::types::{Request, Response};

/// A boxed future returned by middleware.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of the enforcement chain.
pub trait Middleware: Send + Sync + 'static {
    /// The stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Whether the stage participates in the chain. Disabled stages are
    /// skipped at chain construction time.
    fn enabled(&self) -> bool {
        true
    }

    /// Handles the exchange: enrich the context, then either forward via
    /// `next.run(...)` or finalise with an error response.
    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExchangeContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Handle onto the remainder of the chain.
///
/// Consumed by [`Next::run`], so it can be invoked at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Stage {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(Box<dyn FnOnce(&mut ExchangeContext, Request) -> BoxFuture<'static, Response> + Send + 'a>),
}

impl<'a> Next<'a> {
    /// Links a middleware in front of the rest of the chain.
    pub(crate) fn stage(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Stage {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// The terminal element: the business handler.
    pub(crate) fn handler<F>(handler: F) -> Self
    where
        F: FnOnce(&mut ExchangeContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(handler)),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut ExchangeContext, request: Request) -> Response {
        match self.inner {
            NextInner::Stage { middleware, next } => middleware.handle(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

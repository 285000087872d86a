//! Chain composition.
//!
//! Stages are composed left-to-right; the last element invokes the business
//! handler. Disabled stages are filtered out when the chain is built, so a
//! disabled stage costs nothing per exchange.

use std::sync::Arc;

use crate::context::ExchangeContext;
use crate::engine::Engine;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::{
    JwtVerifyMiddleware, ResponseValidationMiddleware, SpecMatchMiddleware, ValidatorMiddleware,
};
use crate::types::{Request, Response};

/// An ordered, immutable middleware chain.
pub struct Chain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates a chain builder.
    #[must_use]
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// The standard enforcement chain for an engine:
    /// spec-match → jwt-verify → request-validate → response-validate.
    #[must_use]
    pub fn standard(engine: &Arc<Engine>) -> Self {
        Self::builder()
            .stage(SpecMatchMiddleware::new(engine.clone()))
            .stage(JwtVerifyMiddleware::new(engine.clone()))
            .stage(ValidatorMiddleware::new(engine.clone()))
            .stage(ResponseValidationMiddleware::new(engine.clone()))
            .build()
    }

    /// Runs one exchange through the chain and into the handler.
    pub async fn handle<H>(
        &self,
        ctx: &mut ExchangeContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut ExchangeContext, Request) -> BoxFuture<'static, Response> + Send,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::stage(middleware.as_ref(), next);
        }
        next.run(ctx, request).await
    }

    /// Names of the enabled stages, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }
}

/// Builder for a [`Chain`].
#[derive(Default)]
pub struct ChainBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl ChainBuilder {
    /// Appends a stage. Stages reporting `enabled() == false` are dropped.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        if middleware.enabled() {
            self.stages.push(Arc::new(middleware));
        } else {
            tracing::debug!(stage = middleware.name(), "stage disabled, skipped");
        }
        self
    }

    /// Builds the chain.
    #[must_use]
    pub fn build(self) -> Chain {
        Chain {
            stages: self.stages,
        }
    }
}

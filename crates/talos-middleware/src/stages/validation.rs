//! Request and response validation stages.
//!
//! Request validation runs before the handler; response validation wraps it
//! and checks the produced payload on the way out. Schema-engine panics are
//! caught at this boundary and converted to the generic internal status so
//! a malformed schema can never take the worker down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use talos_core::Status;
use talos_spec::{ResolveError, SpecOperation};
use talos_validator::{RequestValidationOptions, RequestValidator, ResponseValidator};

use crate::context::ExchangeContext;
use crate::engine::Engine;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, RequestBody, Response, ResponseExt};

/// The media type response payloads are validated under.
const JSON_MEDIA_TYPE: &str = "application/json";

/// Middleware validating the request shape against the matched operation.
#[derive(Clone)]
pub struct ValidatorMiddleware {
    engine: Arc<Engine>,
    validator: RequestValidator,
}

impl ValidatorMiddleware {
    /// Creates the stage over a shared engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            validator: RequestValidator::new(),
        }
    }

    fn finalise(&self, status: Status) -> Response {
        if self.engine.validator_config().log_error {
            tracing::error!(%status, "request validation failed");
        }
        Response::from_status(&status)
    }

    /// The operation from the audit context, resolving it here when the
    /// spec-match stage is not in the chain.
    fn ensure_operation(
        &self,
        ctx: &mut ExchangeContext,
        request: &Request,
    ) -> Result<Arc<SpecOperation>, Status> {
        if let Some(operation) = ctx.audit().and_then(|a| a.operation.clone()) {
            return Ok(operation);
        }
        let request_path = self.engine.spec().normalise(request.uri().path());
        let method = request.method().as_str().to_ascii_lowercase();
        let operation = self
            .engine
            .spec()
            .resolve(&request_path, &method)
            .map_err(|e| match e {
                ResolveError::PathNotFound => {
                    Status::new("ERR10007", &[request_path.normalised()])
                }
                ResolveError::MethodNotAllowed => {
                    Status::new("ERR10008", &[&method, request_path.normalised()])
                }
            })?;
        let audit = ctx.audit_mut();
        audit.endpoint = Some(operation.endpoint());
        audit.operation = Some(operation.clone());
        Ok(operation)
    }
}

impl Middleware for ValidatorMiddleware {
    fn name(&self) -> &'static str {
        "request_validation"
    }

    fn enabled(&self) -> bool {
        self.engine.validator_config().enabled
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExchangeContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let operation = match self.ensure_operation(ctx, &request) {
                Ok(operation) => operation,
                Err(status) => return self.finalise(status),
            };

            let request_path = self.engine.spec().normalise(request.uri().path());
            let options = RequestValidationOptions {
                body_parser_enabled: self.engine.body_parser_enabled(),
                skip_body_validation: self.engine.validator_config().skip_body_validation,
            };
            let body = request.extensions().get::<RequestBody>().map(|b| &b.0);

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.validator
                    .validate_request(&request_path, &request, &operation, body, options)
            }));

            match outcome {
                Err(_) => {
                    tracing::error!(endpoint = %operation.endpoint(), "schema validator panicked");
                    Response::from_status(&Status::internal_error())
                }
                Ok(Some(status)) => self.finalise(status),
                Ok(None) => next.run(ctx, request).await,
            }
        })
    }
}

/// Middleware validating the response payload after the handler ran.
#[derive(Clone)]
pub struct ResponseValidationMiddleware {
    engine: Arc<Engine>,
    validator: ResponseValidator,
}

impl ResponseValidationMiddleware {
    /// Creates the stage over a shared engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            validator: ResponseValidator::new(),
        }
    }
}

impl Middleware for ResponseValidationMiddleware {
    fn name(&self) -> &'static str {
        "response_validation"
    }

    fn enabled(&self) -> bool {
        self.engine.validator_config().enabled
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExchangeContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let response = next.run(ctx, request).await;

            let Some(operation) = ctx.audit().and_then(|a| a.operation.clone()) else {
                return response;
            };
            // Error responses produced upstream carry the status envelope,
            // not the operation's declared content.
            if !response.status().is_success() {
                return response;
            }
            let json_content = response
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with(JSON_MEDIA_TYPE));
            if !json_content {
                return response;
            }

            let (parts, body) = response.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };
            let text = String::from_utf8_lossy(&bytes);
            let content = ResponseValidator::parse_content(&text);
            let status_key = parts.status.as_u16().to_string();

            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.validator.validate_response_content(
                    content.as_ref(),
                    &operation,
                    &status_key,
                    JSON_MEDIA_TYPE,
                )
            }));

            match outcome {
                Err(_) => {
                    tracing::error!(endpoint = %operation.endpoint(), "schema validator panicked");
                    Response::from_status(&Status::internal_error())
                }
                Ok(Some(status)) => {
                    if self.engine.validator_config().log_error {
                        tracing::error!(%status, "response validation failed");
                    }
                    Response::from_status(&status)
                }
                Ok(None) => http::Response::from_parts(parts, Full::new(bytes)),
            }
        })
    }
}

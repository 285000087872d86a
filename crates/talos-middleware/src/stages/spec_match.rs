//! The spec-match stage.
//!
//! Resolves the incoming request to a specification operation and seeds the
//! audit context with the `endpoint` string and the interned operation
//! handle, so the security and validation stages can use the operation
//! without resolving it again.

use std::sync::Arc;

use talos_core::Status;
use talos_spec::ResolveError;

use crate::context::ExchangeContext;
use crate::engine::Engine;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Middleware resolving requests against the spec index.
#[derive(Clone)]
pub struct SpecMatchMiddleware {
    engine: Arc<Engine>,
}

impl SpecMatchMiddleware {
    /// Creates the stage over a shared engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

impl Middleware for SpecMatchMiddleware {
    fn name(&self) -> &'static str {
        "spec_match"
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExchangeContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_path = self.engine.spec().normalise(request.uri().path());
            let method = request.method().as_str().to_ascii_lowercase();

            match self.engine.spec().resolve(&request_path, &method) {
                Ok(operation) => {
                    let endpoint = operation.endpoint();
                    tracing::debug!(endpoint = %endpoint, "request matched to operation");
                    let audit = ctx.audit_mut();
                    audit.endpoint = Some(endpoint);
                    audit.operation = Some(operation);
                    next.run(ctx, request).await
                }
                Err(ResolveError::PathNotFound) => {
                    let status = Status::new("ERR10007", &[request_path.normalised()]);
                    Response::from_status(&status)
                }
                Err(ResolveError::MethodNotAllowed) => {
                    let status = Status::new("ERR10008", &[&method, request_path.normalised()]);
                    Response::from_status(&status)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use talos_spec::SpecIndex;

    const SPEC: &str = r#"
openapi: "3.0.0"
info:
  title: Test
  version: 1.0.0
servers:
  - url: https://api.example.com/v1
paths:
  /pets:
    get:
      responses:
        "200":
          description: ok
"#;

    fn engine() -> Arc<Engine> {
        let spec = SpecIndex::from_str(SPEC).expect("spec parses");
        Arc::new(Engine::builder(spec).build().expect("engine builds"))
    }

    fn request(method: &str, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn handler() -> Next<'static> {
        Next::handler(|_ctx, _req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from("ok")))
                    .unwrap()
            })
        })
    }

    #[tokio::test]
    async fn matched_request_seeds_audit_and_forwards() {
        let stage = SpecMatchMiddleware::new(engine());
        let mut ctx = ExchangeContext::new();

        let response = stage.handle(&mut ctx, request("GET", "/v1/pets"), handler()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let audit = ctx.audit().expect("audit seeded");
        assert_eq!(audit.endpoint.as_deref(), Some("/pets@get"));
        assert_eq!(audit.operation.as_ref().unwrap().method(), "get");
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_does_not_forward() {
        let stage = SpecMatchMiddleware::new(engine());
        let mut ctx = ExchangeContext::new();

        let response = stage
            .handle(&mut ctx, request("GET", "/v1/unknown"), handler())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!ctx.has_audit());
    }

    #[tokio::test]
    async fn undeclared_method_is_405() {
        let stage = SpecMatchMiddleware::new(engine());
        let mut ctx = ExchangeContext::new();

        let response = stage
            .handle(&mut ctx, request("POST", "/v1/pets"), handler())
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

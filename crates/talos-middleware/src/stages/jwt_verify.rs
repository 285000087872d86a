//! The JWT verification and scope check stage.
//!
//! Verifies the bearer token from `Authorization`, enriches the audit
//! context with its claims, and — for OpenAPI 3 documents with scope
//! verification enabled — checks the token's scopes against the scope list
//! of the first security requirement referencing a declared oauth2 scheme.
//! A secondary `X-Scope-Token` header, when extraction is enabled, carries
//! the scopes instead of the auth token.

use std::sync::Arc;

use serde_json::Value;
use talos_core::Status;
use talos_security::{matched_scopes, token_from_authorization, JwtError};
use talos_spec::{ResolveError, SpecOperation};

use crate::context::ExchangeContext;
use crate::engine::Engine;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};

/// Header carrying the secondary scope token.
pub const SCOPE_TOKEN_HEADER: &str = "x-scope-token";

/// Middleware verifying bearer tokens and operation scopes.
#[derive(Clone)]
pub struct JwtVerifyMiddleware {
    engine: Arc<Engine>,
}

impl JwtVerifyMiddleware {
    /// Creates the stage over a shared engine.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Runs the verification sequence, returning the status that finalises
    /// the exchange on failure.
    async fn verify_exchange(
        &self,
        ctx: &mut ExchangeContext,
        request: &Request,
    ) -> Result<(), Status> {
        let authorization = request
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let Some(token) = token_from_authorization(authorization) else {
            return Err(Status::new("ERR10002", &[]));
        };

        let claims = match self.engine.verifier().verify(token, false).await {
            Ok(claims) => claims,
            Err(JwtError::Expired) => {
                tracing::error!("auth token expired");
                return Err(Status::new("ERR10001", &[]));
            }
            Err(e) => {
                tracing::error!(error = %e, "auth token rejected");
                return Err(Status::new("ERR10000", &[]));
            }
        };

        {
            let audit = ctx.audit_mut();
            audit.client_id = claims.string_claim("client_id");
            audit.user_id = claims.string_claim("user_id");
            audit.subject_claims = Some(claims.clone());
        }

        let config = self.engine.security_config();
        if !(config.enable_verify_scope && self.engine.spec().is_openapi3()) {
            return Ok(());
        }

        let operation = self.ensure_operation(ctx, request)?;

        // A present scope token carries the scopes to check; otherwise the
        // auth token's own scopes are used.
        let scope_header = if config.enable_extract_scope_token {
            request
                .headers()
                .get(SCOPE_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
        } else {
            None
        };

        let mut secondary_scopes: Option<Vec<String>> = None;
        if let Some(scope_jwt) = token_from_authorization(scope_header) {
            let scope_claims = match self.engine.verifier().verify(scope_jwt, false).await {
                Ok(claims) => claims,
                Err(JwtError::Expired) => {
                    tracing::error!("scope token expired");
                    return Err(Status::new("ERR10004", &[]));
                }
                Err(e) => {
                    tracing::error!(error = %e, "scope token rejected");
                    return Err(Status::new("ERR10003", &[]));
                }
            };
            secondary_scopes =
                Some(scope_claims.scopes().map_err(|_| Status::new("ERR10003", &[]))?);
            let audit = ctx.audit_mut();
            audit.scope_client_id = scope_claims.string_claim("client_id");
            audit.access_claims = Some(scope_claims);
        }

        let spec_scopes = spec_scopes(&operation, self.engine.spec().oauth2_names());

        if scope_header.is_some() {
            match &secondary_scopes {
                Some(scopes) if matched_scopes(scopes, spec_scopes.as_deref()) => {}
                _ => {
                    return Err(Status::new(
                        "ERR10006",
                        &[
                            &join_scopes(secondary_scopes.as_deref()),
                            &join_scopes(spec_scopes.as_deref()),
                        ],
                    ));
                }
            }
        } else {
            let primary_scopes = claims.scopes().map_err(|_| Status::new("ERR10000", &[]))?;
            if !matched_scopes(&primary_scopes, spec_scopes.as_deref()) {
                return Err(Status::new(
                    "ERR10005",
                    &[
                        &join_scopes(Some(&primary_scopes)),
                        &join_scopes(spec_scopes.as_deref()),
                    ],
                ));
            }
        }

        Ok(())
    }

    /// The operation from the audit context, resolving it here when the
    /// spec-match stage did not run.
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

impl Middleware for JwtVerifyMiddleware {
    fn name(&self) -> &'static str {
        "jwt_verify"
    }

    fn enabled(&self) -> bool {
        self.engine.security_config().enable_verify_jwt
    }

    fn handle<'a>(
        &'a self,
        ctx: &'a mut ExchangeContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match self.verify_exchange(ctx, &request).await {
                Ok(()) => next.run(ctx, request).await,
                Err(status) => Response::from_status(&status),
            }
        })
    }
}

/// The scope list of the first security requirement that references an
/// oauth2 scheme declared by the document. Requirements after the first
/// match are not consulted.
fn spec_scopes(operation: &SpecOperation, oauth2_names: &[String]) -> Option<Vec<String>> {
    let requirements = operation.security_requirements()?;
    for requirement in requirements {
        for name in oauth2_names {
            if let Some(scopes) = requirement.get(name).and_then(Value::as_array) {
                return Some(
                    scopes
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                );
            }
        }
    }
    None
}

fn join_scopes(scopes: Option<&[String]>) -> String {
    match scopes {
        Some(scopes) if !scopes.is_empty() => scopes.join(" "),
        _ => "(none)".to_string(),
    }
}

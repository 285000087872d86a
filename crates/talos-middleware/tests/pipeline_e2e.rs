//! End-to-end chain tests against a Petstore specification.
//!
//! The full enforcement chain runs here: spec-match, JWT verification with
//! scope checking, request validation and response validation, with HS256
//! test tokens and a stub business handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use talos_core::{JwtConfig, SecurityConfig, ValidatorConfig};
use talos_middleware::{
    Chain, Engine, ExchangeContext, Request, RequestBody, Response,
};
use talos_security::{JwtVerifier, KeyStore};
use talos_spec::SpecIndex;

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");
const SECRET: &[u8] = b"talos-e2e-secret";
const KID: &str = "e2e-kid";

fn engine() -> Arc<Engine> {
    let spec = SpecIndex::from_str(PETSTORE).expect("petstore parses");
    let security = SecurityConfig {
        enable_verify_jwt: true,
        enable_verify_scope: true,
        enable_extract_scope_token: true,
        bootstrap_from_key_service: false,
        jwt: JwtConfig::default(),
    };
    let validator = ValidatorConfig {
        enabled: true,
        log_error: false,
        skip_body_validation: false,
    };
    let keys = KeyStore::from_config(&JwtConfig::default())
        .expect("key store")
        .with_key(KID, DecodingKey::from_secret(SECRET));
    let verifier = JwtVerifier::with_key_store(JwtConfig::default(), keys);

    Arc::new(
        Engine::builder(spec)
            .security_config(security)
            .validator_config(validator)
            .verifier(verifier)
            .build()
            .expect("engine builds"),
    )
}

fn now_plus(seconds: i64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs() as i64;
    (now + seconds) as u64
}

fn token(scope: &str, exp_offset: i64) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    let claims = json!({
        "sub": "alice",
        "client_id": "test-client",
        "user_id": "alice",
        "scope": scope,
        "exp": now_plus(exp_offset)
    });
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).expect("token encodes")
}

fn bearer(scope: &str) -> String {
    format!("Bearer {}", token(scope, 300))
}

/// Runs a request through the standard chain with a handler that records
/// whether it was invoked and answers per operation.
async fn run(request: Request) -> (Response, ExchangeContext, bool) {
    let engine = engine();
    let chain = Chain::standard(&engine);
    let mut ctx = ExchangeContext::new();
    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_flag = invoked.clone();

    let response = chain
        .handle(&mut ctx, request, move |_ctx, req| {
            invoked_flag.store(true, Ordering::SeqCst);
            Box::pin(async move {
                match (req.method().as_str(), req.uri().path()) {
                    ("GET", "/v1/pets") => http::Response::builder()
                        .status(StatusCode::OK)
                        .header("content-type", "application/json")
                        .body(Full::new(Bytes::from(
                            r#"[{"id": 1, "name": "rex"}]"#,
                        )))
                        .unwrap(),
                    ("POST", _) => http::Response::builder()
                        .status(StatusCode::CREATED)
                        .body(Full::new(Bytes::new()))
                        .unwrap(),
                    _ => http::Response::builder()
                        .status(StatusCode::OK)
                        .header("content-type", "application/json")
                        .body(Full::new(Bytes::from(r#"{"id": 42, "name": "rex"}"#)))
                        .unwrap(),
                }
            })
        })
        .await;

    let was_invoked = invoked.load(Ordering::SeqCst);
    (response, ctx, was_invoked)
}

async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn get(uri: &str) -> http::request::Builder {
    http::Request::builder().method("GET").uri(uri)
}

#[tokio::test]
async fn authorised_request_forwards_and_seeds_audit() {
    let request = get("/v1/pets?limit=10")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(invoked);

    let audit = ctx.audit().expect("audit seeded");
    assert_eq!(audit.endpoint.as_deref(), Some("/pets@get"));
    assert_eq!(audit.client_id.as_deref(), Some("test-client"));
    assert_eq!(audit.user_id.as_deref(), Some("alice"));
    assert!(audit.subject_claims.is_some());
}

#[tokio::test]
async fn path_parameter_request_matches_templated_operation() {
    let request = get("/v1/pets/42")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(invoked);

    let operation = ctx.audit().unwrap().operation.clone().expect("operation");
    assert_eq!(operation.endpoint(), "/pets/{petId}@get");
    assert!(operation.path_template().is_param(2));
}

#[tokio::test]
async fn body_with_wrong_type_is_rejected_as_400() {
    let mut request = http::Request::builder()
        .method("POST")
        .uri("/v1/pets")
        .header("authorization", bearer("write:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    request
        .extensions_mut()
        .insert(RequestBody(json!({"id": "abc", "name": "rex"})));

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!invoked);

    let body = body_json(response).await;
    assert_eq!(body["code"], "ERR11004");
}

#[tokio::test]
async fn missing_auth_header_is_401_and_never_forwards() {
    let request = http::Request::builder()
        .method("POST")
        .uri("/v1/pets")
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!invoked);

    let body = body_json(response).await;
    assert_eq!(body["code"], "ERR10002");
    assert_eq!(body["statusCode"], 401);
}

#[tokio::test]
async fn expired_token_is_401() {
    let request = get("/v1/pets")
        .header("authorization", format!("Bearer {}", token("read:pets", -300)))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR10001");
}

#[tokio::test]
async fn unknown_path_is_404_without_audit_mutation() {
    let request = get("/v1/unknown")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!invoked);
    assert!(!ctx.has_audit());
    assert_eq!(body_json(response).await["code"], "ERR10007");
}

#[tokio::test]
async fn undeclared_method_is_405() {
    let request = http::Request::builder()
        .method("PATCH")
        .uri("/v1/pets")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR10008");
}

#[tokio::test]
async fn token_without_required_scope_is_rejected() {
    let request = get("/v1/pets")
        .header("authorization", bearer("delete:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR10005");
}

#[tokio::test]
async fn scope_token_carries_the_scopes_when_present() {
    let request = get("/v1/pets")
        .header("authorization", bearer(""))
        .header("x-scope-token", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(invoked);

    let audit = ctx.audit().expect("audit");
    assert!(audit.access_claims.is_some());
    assert_eq!(audit.scope_client_id.as_deref(), Some("test-client"));
}

#[tokio::test]
async fn scope_token_with_wrong_scopes_is_rejected() {
    let request = get("/v1/pets")
        .header("authorization", bearer("read:pets"))
        .header("x-scope-token", bearer("delete:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR10006");
}

#[tokio::test]
async fn expired_scope_token_is_rejected() {
    let request = get("/v1/pets")
        .header("authorization", bearer("read:pets"))
        .header("x-scope-token", format!("Bearer {}", token("read:pets", -300)))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR10004");
}

#[tokio::test]
async fn invalid_query_parameter_is_400() {
    let request = get("/v1/pets?limit=0")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!invoked);
    assert_eq!(body_json(response).await["code"], "ERR11011");
}

#[tokio::test]
async fn conforming_response_passes_validation_unchanged() {
    let request = get("/v1/pets")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (response, _ctx, _invoked) = run(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["name"], "rex");
}

#[tokio::test]
async fn nonconforming_response_is_flagged() {
    // A handler answering GET /v1/pets/{petId} with a pet missing its
    // required name: response validation catches it on the way out.
    let engine = engine();
    let chain = Chain::standard(&engine);
    let mut ctx = ExchangeContext::new();

    let request = get("/v1/pets/42")
        .header("authorization", bearer("read:pets"))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let response = chain
        .handle(&mut ctx, request, |_ctx, _req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/json")
                    .body(Full::new(Bytes::from(r#"{"id": 42}"#)))
                    .unwrap()
            })
        })
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "ERR11004");
}

//! HTTP types used throughout the middleware chain.

use bytes::Bytes;
use http_body_util::Full;
use talos_core::Status;

/// The HTTP request type flowing through the chain.
///
/// A standard `http::Request` with a fully materialised `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type flowing through the chain.
pub type Response = http::Response<Full<Bytes>>;

/// The parsed request body, placed into the request's extensions by the
/// body-parsing collaborator before request validation runs.
#[derive(Debug, Clone)]
pub struct RequestBody(pub serde_json::Value);

/// Extension trait for building status responses.
pub trait ResponseExt {
    /// Builds the error response for a status: the status's HTTP code with
    /// the serialised status object as a JSON body.
    fn from_status(status: &Status) -> Response;
}

impl ResponseExt for Response {
    fn from_status(status: &Status) -> Response {
        let body = serde_json::to_vec(status).expect("status serialises to JSON");
        http::Response::builder()
            .status(status.http_status())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .expect("failed to build status response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn status_response_carries_code_and_json_body() {
        let status = Status::new("ERR10002", &[]);
        let response = Response::from_status(&status);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn routing_status_maps_to_404() {
        let status = Status::new("ERR10007", &["/nope"]);
        let response = Response::from_status(&status);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

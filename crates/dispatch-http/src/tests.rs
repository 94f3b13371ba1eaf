use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dispatch_proto::{RequestDirective, Status, Value};
use dispatch_runtime::{CoroutineMode, Registry, TypedFunction};
use ed25519_dalek::SigningKey;
use pretty_assertions::assert_eq;
use rand::rngs::OsRng;
use tower::ServiceExt;

use super::*;

fn registry_with_echo() -> Arc<Registry> {
    let registry = Registry::new();
    registry.register(
        "identity",
        CoroutineMode::Volatile,
        Arc::new(TypedFunction::new(
            "identity",
            |_ctx, s: String| async move { Ok::<String, std::convert::Infallible>(s) },
        )),
    );
    Arc::new(registry)
}

fn sample_request_bytes() -> Vec<u8> {
    let request = dispatch_proto::Request::new(
        "identity",
        "d1",
        RequestDirective::Input(Value::boxed(&"hello".to_owned()).unwrap()),
    );
    dispatch_proto::encode_request(&request).unwrap()
}

#[tokio::test]
async fn unsigned_request_is_accepted_when_no_key_is_configured() {
    let endpoint = Endpoint::new(registry_with_echo(), RequestVerifier::disabled());
    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_PATH)
                .header("content-type", OCTET_STREAM)
                .body(Body::from(sample_request_bytes()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = dispatch_proto::decode_response(&body).unwrap();
    assert_eq!(decoded.status, Status::Ok);
    match decoded.directive {
        dispatch_proto::ResponseDirective::Exit(exit) => {
            let output: String = exit.result.unwrap().output.unwrap().unbox().unwrap();
            assert_eq!(output, "hello");
        }
        dispatch_proto::ResponseDirective::Poll(_) => panic!("expected Exit"),
    }
}

#[tokio::test]
async fn unknown_function_yields_not_found_response_with_http_ok() {
    let endpoint = Endpoint::new(registry_with_echo(), RequestVerifier::disabled());
    let request = dispatch_proto::Request::new(
        "nope",
        "d1",
        RequestDirective::Input(Value::boxed(&1i64).unwrap()),
    );
    let bytes = dispatch_proto::encode_request(&request).unwrap();

    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_PATH)
                .header("content-type", OCTET_STREAM)
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap();

    // The directive error (NotFound) is carried inside the decoded
    // Response's own status, not as an HTTP-level failure (spec §7).
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = dispatch_proto::decode_response(&body).unwrap();
    assert_eq!(decoded.status, Status::NotFound);
}

#[tokio::test]
async fn missing_signature_is_rejected_when_key_is_configured() {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifier = RequestVerifier::new(Some(signing_key.verifying_key()));
    let endpoint = Endpoint::new(registry_with_echo(), verifier);

    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_PATH)
                .header("content-type", OCTET_STREAM)
                .body(Body::from(sample_request_bytes()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn valid_signature_is_accepted() {
    let signing_key = SigningKey::generate(&mut OsRng);
    let signer =
        RequestSigner::from_base64(&BASE64.encode(signing_key.to_bytes())).unwrap();
    let verifier = RequestVerifier::new(Some(signing_key.verifying_key()));
    let endpoint = Endpoint::new(registry_with_echo(), verifier);

    let body = sample_request_bytes();
    let sig = signer.sign("POST", RUN_PATH, OCTET_STREAM, &body);

    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_PATH)
                .header("content-type", OCTET_STREAM)
                .header(signing::SIGNATURE_HEADER, sig)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tunnel_round_trips_a_request_and_response() {
    let endpoint = Endpoint::new(registry_with_echo(), RequestVerifier::disabled());
    let tunneled = tunnel::encode(&sample_request_bytes());

    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_TUNNEL_PATH)
                .header("content-type", "application/json")
                .body(Body::from(tunneled))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded_bytes = tunnel::decode(&body).unwrap();
    let decoded = dispatch_proto::decode_response(&decoded_bytes).unwrap();
    assert_eq!(decoded.status, Status::Ok);
}

#[tokio::test]
async fn tunnel_rejects_payload_missing_outer_quotes() {
    let endpoint = Endpoint::new(registry_with_echo(), RequestVerifier::disabled());
    let bare_base64 = BASE64.encode(sample_request_bytes());

    let response = endpoint
        .router()
        .oneshot(
            Request::post(RUN_TUNNEL_PATH)
                .header("content-type", "application/json")
                .body(Body::from(bare_base64))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

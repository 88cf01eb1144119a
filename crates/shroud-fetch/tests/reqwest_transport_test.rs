use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use shroud_crypto::{
    decrypt_json, encrypt_json, extract_encrypted_data, generate_key, is_encrypted,
    validate_encrypted_format, wrap_encrypted, EncryptionKey,
};
use shroud_fetch::{
    EncryptedClient, FetchError, ReqwestTransport, RequestOptions, StatusCode, Transport,
};
use shroud_keystore::{KeyStore, MemoryStore};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Server side of the envelope protocol: opens the request, echoes it back
/// under `"echo"`, sealed with the same key.
struct EncryptingEcho {
    key: EncryptionKey,
}

impl Respond for EncryptingEcho {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        if !is_encrypted(&body) {
            return ResponseTemplate::new(400).set_body_json(json!({"error": "expected envelope"}));
        }
        let Some(data) = extract_encrypted_data(&body) else {
            return ResponseTemplate::new(400);
        };
        if !validate_encrypted_format(data) {
            return ResponseTemplate::new(400);
        }
        let Ok(payload) = decrypt_json::<Value>(data, &self.key) else {
            return ResponseTemplate::new(401);
        };

        let sealed = encrypt_json(&json!({"echo": payload}), &self.key).unwrap();
        ResponseTemplate::new(200).set_body_json(wrap_encrypted(sealed))
    }
}

fn transport(server: &MockServer) -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
}

fn keyed_store() -> (KeyStore, EncryptionKey) {
    let key = generate_key().unwrap();
    let keys = KeyStore::new(Arc::new(MemoryStore::new()));
    keys.save_key(&key.to_base64()).unwrap();
    (keys, key)
}

#[tokio::test]
async fn round_trip_through_encrypting_server() {
    let server = MockServer::start().await;
    let (keys, key) = keyed_store();
    Mock::given(method("POST"))
        .and(path("/api/transfers"))
        .and(header("content-type", "application/json"))
        .respond_with(EncryptingEcho { key })
        .mount(&server)
        .await;

    let client = EncryptedClient::new(transport(&server), keys).unwrap();
    let response = client
        .call(
            "/api/transfers",
            RequestOptions::post().body(r#"{"amount": 100, "note": "rent"}"#),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>().unwrap(),
        json!({"echo": {"amount": 100, "note": "rent"}})
    );

    // Nothing readable went over the wire
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let wire = String::from_utf8(received[0].body.clone()).unwrap();
    assert!(!wire.contains("rent"));
}

#[tokio::test]
async fn server_with_other_key_rejects_request() {
    let server = MockServer::start().await;
    let (keys, _key) = keyed_store();
    Mock::given(method("POST"))
        .respond_with(EncryptingEcho {
            key: generate_key().unwrap(),
        })
        .mount(&server)
        .await;

    let client = EncryptedClient::new(transport(&server), keys).unwrap();
    let response = client
        .call("/api/transfers", RequestOptions::post().body("{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plain_endpoints_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.2.3"})))
        .mount(&server)
        .await;

    let (keys, _key) = keyed_store();
    let client = EncryptedClient::new(transport(&server), keys).unwrap();

    let health = client.call("/health", RequestOptions::get()).await.unwrap();
    assert_eq!(health.text(), "ok");

    let version = client.call("/version", RequestOptions::get()).await.unwrap();
    assert_eq!(version.json::<Value>().unwrap(), json!({"version": "1.2.3"}));

    // GETs carry no body, so nothing was rewritten
    for request in server.received_requests().await.unwrap() {
        assert!(request.body.is_empty());
    }
}

#[tokio::test]
async fn error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "missing"})))
        .mount(&server)
        .await;

    let response = transport(&server)
        .send("/nowhere", RequestOptions::get())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.status_text(), "Not Found");
    assert!(response.is_json());
}

#[tokio::test]
async fn per_request_timeout_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let result = transport(&server)
        .send(
            "/slow",
            RequestOptions::get().timeout(Duration::from_millis(100)),
        )
        .await;

    assert!(matches!(result, Err(FetchError::Http(e)) if e.is_timeout()));
}

#[tokio::test]
async fn headers_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-trace-id", "t-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let options = RequestOptions::get().try_header("X-Trace-Id", "t-1").unwrap();
    let response = transport(&server).send("/traced", options).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

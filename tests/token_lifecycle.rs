// End-to-end token lifecycle tests
//
// These run the real client against a mock node: token issuance, bearer
// attachment, single-flight refresh, and 401 recovery.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use mero_client::{AuthError, Client, ClientConfig, ClientError, Credentials};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Build an unsigned JWT with the given claims object
fn make_jwt(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    format!("{header}.{payload}.signature")
}

fn token_body(access_token: &str, refresh_token: &str) -> String {
    json!({
        "data": {
            "access_token": access_token,
            "refresh_token": refresh_token,
        }
    })
    .to_string()
}

fn test_client(server: &ServerGuard) -> Client {
    let config = ClientConfig::new(Url::parse(&server.url()).unwrap())
        .with_credentials(Credentials::new("admin", "admin123"))
        .with_max_retries(2);
    Client::new(config).unwrap()
}

// ==================================================================================================
// Authentication and Expiry
// ==================================================================================================

#[tokio::test]
async fn test_authenticate_parses_jwt_expiry() {
    let mut server = Server::new_async().await;
    let exp = now_secs() + 3600;
    let access_token = make_jwt(json!({ "exp": exp, "sub": "admin" }));

    let issue = server
        .mock("POST", "/auth/token")
        .match_body(Matcher::PartialJson(json!({
            "auth_method": "user_password",
            "public_key": "admin",
            "provider_data": { "username": "admin", "password": "admin123" },
        })))
        .with_status(200)
        .with_body(token_body(&access_token, "refresh-1"))
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    let tokens = client.authenticate().await.unwrap();

    assert_eq!(tokens.expires_at, exp * 1000);
    assert_eq!(tokens.refresh_token, "refresh-1");
    assert!(client.is_authenticated().await);
    issue.assert_async().await;
}

#[tokio::test]
async fn test_authenticate_rejected_credentials() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/token")
        .with_status(401)
        .with_body(r#"{"error": "invalid credentials"}"#)
        .create_async()
        .await;

    let client = test_client(&server);
    let err = client.authenticate().await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Auth(AuthError::AuthenticationFailed(_))
    ));
    assert!(!client.is_authenticated().await);
}

// ==================================================================================================
// End-to-end Scenario: issue, expire, single-flight refresh with fallback expiry
// ==================================================================================================

#[tokio::test]
async fn test_lifecycle_issue_then_single_flight_refresh() {
    let mut server = Server::new_async().await;

    // Issued token expires in 60s, inside the 5-minute buffer, so the next
    // get_valid_token() must refresh.
    let stale_access = make_jwt(json!({ "exp": now_secs() + 60 }));
    server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(token_body(&stale_access, "refresh-1"))
        .expect(1)
        .create_async()
        .await;

    // Refresh must carry both tokens and must be called exactly once
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_body(Matcher::Json(json!({
            "access_token": stale_access,
            "refresh_token": "refresh-1",
        })))
        .with_status(200)
        .with_body(token_body("fresh-opaque-token", "refresh-2"))
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    client.authenticate().await.unwrap();

    let manager = client.token_manager();
    let before = now_ms();
    let (a, b) = tokio::join!(manager.get_valid_token(), manager.get_valid_token());
    let after = now_ms();

    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(a.access_token, "fresh-opaque-token");
    assert_eq!(a.refresh_token, "refresh-2");

    // Opaque token: expiry comes from the 24h fallback at refresh time
    let day_ms = 24 * 60 * 60 * 1000;
    assert!(a.expires_at >= before + day_ms);
    assert!(a.expires_at <= after + day_ms);

    refresh.assert_async().await;
}

#[tokio::test]
async fn test_refresh_failure_clears_session() {
    let mut server = Server::new_async().await;

    let stale_access = make_jwt(json!({ "exp": now_secs() + 60 }));
    server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(token_body(&stale_access, "refresh-1"))
        .create_async()
        .await;
    server
        .mock("POST", "/auth/refresh")
        .with_status(401)
        .with_body(r#"{"error": "refresh token expired"}"#)
        .create_async()
        .await;

    let client = test_client(&server);
    client.authenticate().await.unwrap();

    let err = client.token_manager().get_valid_token().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Auth(AuthError::TokenRefreshFailed(_))
    ));
    assert!(!client.is_authenticated().await);
}

// ==================================================================================================
// Transport Behavior
// ==================================================================================================

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let mut server = Server::new_async().await;

    let access_token = make_jwt(json!({ "exp": now_secs() + 3600 }));
    server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(token_body(&access_token, "refresh-1"))
        .create_async()
        .await;

    let peers = server
        .mock("GET", "/admin/peers")
        .match_header("authorization", format!("Bearer {access_token}").as_str())
        .with_status(200)
        .with_body(r#"{"data": {"count": 3}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    client.authenticate().await.unwrap();

    let response: Value = client.get("admin/peers").await.unwrap();
    assert_eq!(response["count"], 3);
    peers.assert_async().await;
}

#[tokio::test]
async fn test_unauthenticated_requests_have_no_auth_header() {
    let mut server = Server::new_async().await;

    let health = server
        .mock("GET", "/admin/health")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"data": {"status": "ok"}}"#)
        .expect(1)
        .create_async()
        .await;

    // No credentials configured, never authenticated
    let client = Client::new(ClientConfig::new(Url::parse(&server.url()).unwrap())).unwrap();
    let response: Value = client.get("admin/health").await.unwrap();

    assert_eq!(response["status"], "ok");
    health.assert_async().await;
}

#[tokio::test]
async fn test_401_clears_tokens_and_reauthenticates_once() {
    let mut server = Server::new_async().await;

    let first_access = make_jwt(json!({ "exp": now_secs() + 3600, "gen": 1 }));
    let second_access = make_jwt(json!({ "exp": now_secs() + 3600, "gen": 2 }));

    // Issuance returns a different token on each call
    let issue_count = AtomicUsize::new(0);
    let bodies = [
        token_body(&first_access, "refresh-1"),
        token_body(&second_access, "refresh-2"),
    ];
    let issue = server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body_from_request(move |_request| {
            let call = issue_count.fetch_add(1, Ordering::SeqCst);
            bodies[call.min(1)].clone().into_bytes()
        })
        .expect(2)
        .create_async()
        .await;

    // The first token is rejected; the replacement is accepted
    let rejected = server
        .mock("GET", "/admin/apps")
        .match_header("authorization", format!("Bearer {first_access}").as_str())
        .with_status(401)
        .with_body(r#"{"error": "token revoked"}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/admin/apps")
        .match_header("authorization", format!("Bearer {second_access}").as_str())
        .with_status(200)
        .with_body(r#"{"data": {"apps": []}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server);
    client.authenticate().await.unwrap();

    let response: Value = client.get("admin/apps").await.unwrap();
    assert_eq!(response["apps"], json!([]));

    issue.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;

    // The session now holds the replacement pair
    let held = client.token_manager().token_data().await.unwrap();
    assert_eq!(held.access_token, second_access);
}

#[tokio::test]
async fn test_401_without_default_credentials_is_terminal() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/admin/apps")
        .with_status(401)
        .with_body(r#"{"error": "unauthenticated"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = Client::new(ClientConfig::new(Url::parse(&server.url()).unwrap())).unwrap();
    let err = client.get::<Value>("admin/apps").await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_unexpected_response_shape_is_rejected() {
    let mut server = Server::new_async().await;

    // Payload without the data envelope must be rejected, not probed
    server
        .mock("GET", "/admin/contexts")
        .with_status(200)
        .with_body(r#"{"contexts": []}"#)
        .create_async()
        .await;

    let client = Client::new(ClientConfig::new(Url::parse(&server.url()).unwrap())).unwrap();
    let err = client.get::<Value>("admin/contexts").await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn test_logout_discards_session() {
    let mut server = Server::new_async().await;

    let access_token = make_jwt(json!({ "exp": now_secs() + 3600 }));
    server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(token_body(&access_token, "refresh-1"))
        .create_async()
        .await;

    let client = test_client(&server);
    client.authenticate().await.unwrap();
    assert!(client.is_authenticated().await);

    client.logout().await;
    assert!(!client.is_authenticated().await);
    assert!(client
        .token_manager()
        .get_valid_token()
        .await
        .unwrap()
        .is_none());
}

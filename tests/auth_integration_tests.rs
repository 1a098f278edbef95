use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use blogicum::{
    AppState, InMemoryRepository, SystemClock,
    auth::{AuthUser, Claims, MaybeUser},
    config::{AppConfig, Env},
    models::User,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

// --- Test Constants & Helpers ---

const TEST_JWT_SECRET: &str = "auth-integration-test-secret";
const TEST_USER_ID: Uuid = Uuid::from_u128(0x5eed);

fn create_token(sub: Uuid, expires_in_secs: i64, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub,
        exp: (now + expires_in_secs) as usize,
        iat: now as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn create_app_state(env: Env, users: Vec<User>) -> AppState {
    let repo = InMemoryRepository::new();
    for user in users {
        repo.insert_user(user).await;
    }

    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        repo: Arc::new(repo),
        clock: Arc::new(SystemClock),
        config,
    }
}

fn test_user(id: Uuid, role: &str) -> User {
    User {
        id,
        username: "tester".to_string(),
        email: "test@example.com".to_string(),
        role: role.to_string(),
        ..User::default()
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

fn with_bypass(parts: &mut Parts, id: Uuid) {
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&id.to_string()).unwrap(),
    );
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state =
        create_app_state(Env::Production, vec![test_user(TEST_USER_ID, "user")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET));

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, "user");
    assert!(!user.is_admin());
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_wrong_secret() {
    let app_state =
        create_app_state(Env::Production, vec![test_user(TEST_USER_ID, "user")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, 3600, "some-other-secret"));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let app_state =
        create_app_state(Env::Production, vec![test_user(TEST_USER_ID, "user")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Well past the decoder's default leeway.
    with_bearer(&mut parts, &create_token(TEST_USER_ID, -3600, TEST_JWT_SECRET));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_unknown_user() {
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let admin_id = Uuid::new_v4();
    let app_state = create_app_state(Env::Local, vec![test_user(admin_id, "admin")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, admin_id);

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(user.id, admin_id);
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_local_bypass_requires_known_user() {
    let app_state = create_app_state(Env::Local, vec![]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, Uuid::new_v4());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let user_id = Uuid::new_v4();
    let app_state = create_app_state(Env::Production, vec![test_user(user_id, "admin")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bypass(&mut parts, user_id);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_maybe_user_is_anonymous_without_credentials() {
    let app_state = create_app_state(Env::Production, vec![]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, "not-a-jwt");

    let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert!(user.is_none());
}

#[tokio::test]
async fn test_maybe_user_resolves_valid_token() {
    let app_state =
        create_app_state(Env::Production, vec![test_user(TEST_USER_ID, "user")]).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET));

    let requester = MaybeUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(requester.id(), Some(TEST_USER_ID));
}

use actix_web::{dev::Payload, test, FromRequest};
use ideahub::auth::{create_jwt, Auth, Claims};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::env;

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", SECRET);
}

async fn extract(header: Option<String>) -> Result<Auth, actix_web::Error> {
    let mut req = test::TestRequest::default();
    if let Some(h) = header {
        req = req.insert_header(("Authorization", h));
    }
    let req = req.to_http_request();
    let mut pl = Payload::None;
    Auth::from_request(&req, &mut pl).await
}

#[actix_web::test]
#[serial_test::serial]
async fn jwt_roundtrip_ok() {
    set_secret();
    let token = create_jwt("resident-42").expect("token");
    let auth = extract(Some(format!("Bearer {token}"))).await.expect("extract");
    assert_eq!(auth.0.sub, "resident-42");
    assert_eq!(auth.0.actor_id().as_str(), "resident-42");
}

#[actix_web::test]
#[serial_test::serial]
async fn extractor_rejects_invalid_or_missing_token() {
    set_secret();
    assert!(extract(Some("Bearer notatoken".into())).await.is_err());
    assert!(extract(None).await.is_err());
}

#[actix_web::test]
#[serial_test::serial]
async fn extractor_rejects_expired_token() {
    set_secret();
    let claims = Claims { sub: "old".into(), exp: (chrono::Utc::now().timestamp() - 3600) as usize };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    assert!(extract(Some(format!("Bearer {token}"))).await.is_err());
}

#[actix_web::test]
#[serial_test::serial]
async fn token_signed_with_other_secret_is_rejected() {
    set_secret();
    let claims = Claims { sub: "mallory".into(), exp: (chrono::Utc::now().timestamp() + 3600) as usize };
    let forged = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"another-secret-also-32-bytes-long!!")).unwrap();
    assert!(extract(Some(format!("Bearer {forged}"))).await.is_err());
}

use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::malformed("bad_input", "oops").http_status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::unauthenticated("auth", "no").http_status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::forbidden("forbidden", "blocked").http_status(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::conflict("conflict", "dup").http_status(), StatusCode::CONFLICT);
    assert_eq!(AppError::internal("internal", "panic").http_status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn display_includes_code_and_message() {
    let e = AppError::conflict("username_taken", "username already taken");
    assert_eq!(e.to_string(), "username_taken: username already taken");
    assert_eq!(e.code_str(), "username_taken");
}

#[tokio::test]
async fn response_body_is_error_object_only() {
    let resp = AppError::unauthenticated("missing_auth", "authentication required").into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], br#"{"error":"authentication required"}"#);
}

#[test]
fn anyhow_errors_do_not_leak_detail() {
    let e: AppError = anyhow::anyhow!("connection refused to 10.0.0.3:3306").into();
    assert_eq!(e.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!e.message().contains("10.0.0.3"));
}

#[test]
fn store_errors_map_to_generic_internal() {
    let e = AppError::from_store("failed to load user", &StoreError::Unavailable("disk on fire".into()));
    assert_eq!(e.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(e.message(), "failed to load user");
}

//! Requests that must be rejected before any database work happens.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{bearer, offline_app, send, user_model};

fn product_body(unit_price: &str) -> serde_json::Value {
    json!({
        "title": "Desk Lamp",
        "unit_price": unit_price,
        "inventory": 3,
        "collection": 1
    })
}

#[tokio::test]
async fn writes_without_token_are_unauthorized() {
    let (status, body) = send(offline_app(), "POST", "/api/products", None, Some(product_body("10.00"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["data"]["error"], "Missing Authorization header");

    let (status, _) = send(
        offline_app(),
        "POST",
        "/api/collections",
        Some("Bearer not-a-jwt"),
        Some(json!({ "title": "Garden" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(offline_app(), "GET", "/api/orders", Some("Token abc"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_writes_require_staff() {
    let customer = bearer(&user_model(7, false, false));

    let (status, _) = send(
        offline_app(),
        "POST",
        "/api/products",
        Some(&customer),
        Some(product_body("10.00")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(offline_app(), "DELETE", "/api/collections/1", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(offline_app(), "GET", "/api/customers", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_management_requires_permissions() {
    let customer = bearer(&user_model(8, false, false));

    let (status, _) = send(
        offline_app(),
        "PATCH",
        "/api/orders/1",
        Some(&customer),
        Some(json!({ "payment_status": "C" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(offline_app(), "DELETE", "/api/orders/1", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(offline_app(), "POST", "/api/orders/1/cancel", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let staff = bearer(&user_model(1, true, true));

    let (status, body) = send(
        offline_app(),
        "POST",
        "/api/products",
        Some(&staff),
        Some(product_body("0.50")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["fields"]["unit_price"].is_array());

    let (status, body) = send(
        offline_app(),
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "username": "someone",
            "password": "long-enough-password"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["fields"]["email"].is_array());
}

#[tokio::test]
async fn cart_items_do_not_accept_put() {
    let uri = format!("/api/carts/{}/items/1", uuid::Uuid::new_v4());
    let (status, _) = send(offline_app(), "PUT", &uri, None, Some(json!({ "quantity": 2 }))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn undecodable_bodies_get_the_error_envelope() {
    let uri = format!("/api/carts/{}/items", uuid::Uuid::new_v4());
    let (status, body) = send(offline_app(), "POST", &uri, None, Some(json!({ "product_id": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
    assert!(
        body["data"]["error"]
            .as_str()
            .is_some_and(|reason| reason.contains("quantity"))
    );

    let (status, body) = send(
        offline_app(),
        "POST",
        "/api/auth/login",
        None,
        Some(json!(42)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
}

#[tokio::test]
async fn partial_updates_still_validate_present_fields() {
    let staff = bearer(&user_model(1, true, true));

    let (status, body) = send(
        offline_app(),
        "PATCH",
        "/api/collections/1",
        Some(&staff),
        Some(json!({ "title": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["fields"]["title"].is_array());

    let (status, body) = send(
        offline_app(),
        "PATCH",
        "/api/products/1/reviews/1",
        None,
        Some(json!({ "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["fields"]["name"].is_array());
}

//! Routes exercised through the full router with `oneshot`.

#![allow(clippy::unwrap_used)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use larkspur_integration_tests::{ADMIN_TOKEN, checkout_request, seeded_backend, test_app};
use larkspur_storefront::store::{Backend, InventoryStore};

const CLIENT_IP: &str = "203.0.113.7";

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn admin(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_owned);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

#[tokio::test]
async fn test_health_and_readiness() {
    let backend = seeded_backend(3).await;
    let app = test_app(backend.clone());

    let (status, _, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);

    backend.set_offline(true);
    let (status, _, _) = send(&app, get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_cart_checkout_and_tracking() {
    let backend = seeded_backend(3).await;
    let app = test_app(backend.clone());

    let (status, cookie, body) = send(
        &app,
        post_json(
            "/api/cart/add",
            &json!({ "productId": "P1", "size": "38" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["itemCount"], 1);
    assert_eq!(body["total"], "57.50");
    let cookie = cookie.expect("session cookie");

    let request = checkout_request("a@b.com");
    let (status, _, body) = send(
        &app,
        post_json(
            "/api/checkout",
            &json!({
                "name": request.name,
                "email": request.email,
                "phone": request.phone,
                "address": request.address,
                "paymentMethod": request.payment_method,
            }),
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["orderType"], "guest");
    let number = body["order"]["orderNumber"].as_str().unwrap().to_owned();

    let (_, _, cart) = send(
        &app,
        Request::get("/api/cart")
            .header("x-forwarded-for", CLIENT_IP)
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(cart["itemCount"], 0);

    assert_eq!(
        backend
            .inventory()
            .quantity(&"P1".into(), Some("38"))
            .await
            .unwrap(),
        Some(2)
    );

    let (status, _, body) = send(
        &app,
        get(&format!("/api/orders/track?orderNumber={number}&email=A%40B.com")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_number"], number.as_str());
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["payment_status"], "completed");

    let (wrong_email_status, _, wrong_email) = send(
        &app,
        get(&format!("/api/orders/track?orderNumber={number}&email=x%40b.com")),
    )
    .await;
    let (wrong_number_status, _, wrong_number) = send(
        &app,
        get("/api/orders/track?orderNumber=ORD-000000-000&email=a%40b.com"),
    )
    .await;
    assert_eq!(wrong_email_status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_email_status, wrong_number_status);
    assert_eq!(wrong_email, wrong_number);
}

#[tokio::test]
async fn test_checkout_with_missing_size_is_rejected() {
    let backend = seeded_backend(3).await;
    let app = test_app(backend.clone());

    let (_, cookie, _) = send(
        &app,
        post_json("/api/cart/add", &json!({ "productId": "P1" }), None),
    )
    .await;

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/checkout",
            &json!({
                "name": "Ada Lovelace",
                "email": "a@b.com",
                "phone": "555-0100",
                "address": "1 Analytical Way",
                "paymentMethod": "pm_card_visa",
            }),
            cookie.as_deref(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Trail Runner"));
    assert!(backend.gateway().calls().is_empty());
}

#[tokio::test]
async fn test_unknown_product_cannot_be_added() {
    let app = test_app(seeded_backend(3).await);
    let (status, _, body) = send(
        &app,
        post_json("/api/cart/add", &json!({ "productId": "NOPE" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let app = test_app(seeded_backend(3).await);

    let (status, _, _) = send(&app, get("/admin/api/dashboard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::get("/admin/api/orders")
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, "Bearer not-the-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_feed_and_dashboard() {
    let backend = seeded_backend(3).await;
    let app = test_app(backend.clone());

    let (_, _, _) = send(
        &app,
        post_json(
            "/api/contact",
            &json!({
                "name": "Grace",
                "email": "grace@b.com",
                "subject": "Sizing",
                "message": "Do the runners fit narrow?",
            }),
            None,
        ),
    )
    .await;

    let (status, _, feed) = send(&app, admin("GET", "/admin/api/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["unreadCount"], 1);
    let id = feed["notifications"][0]["id"].as_str().unwrap().to_owned();

    let (status, _, _) = send(
        &app,
        admin("POST", &format!("/admin/api/notifications/{id}/read")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, feed) = send(&app, admin("GET", "/admin/api/notifications")).await;
    assert_eq!(feed["unreadCount"], 0);
    assert_eq!(feed["notifications"][0]["read"], true);

    let (status, _, dashboard) = send(&app, admin("GET", "/admin/api/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["success"], true);
}

#[tokio::test]
async fn test_product_sizes() {
    let app = test_app(seeded_backend(3).await);

    let (status, _, body) = send(&app, get("/api/products/P1/sizes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sizes"], json!(["38"]));
    assert!(body.get("inStock").is_none());

    let (_, _, body) = send(&app, get("/api/products/BAG-01/sizes")).await;
    assert_eq!(body["sizes"], json!([]));
    assert_eq!(body["inStock"], true);

    let (status, _, _) = send(&app, get("/api/products/NOPE/sizes")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

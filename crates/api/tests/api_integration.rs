//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, ShippingDetailsId, UserId};
use domain::StockPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryStore, NewProduct, NewShippingDetails, StorefrontStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    store: InMemoryStore,
}

impl TestApp {
    fn new() -> Self {
        Self::with_policy(StockPolicy::OnPlacement)
    }

    fn with_policy(policy: StockPolicy) -> Self {
        let store = InMemoryStore::new();
        let state = api::create_default_state(store.clone(), policy);
        let app = api::create_app(state, get_metrics_handle());
        Self { app, store }
    }

    async fn product(&self, name: &str, cents: i64, stock: u32) -> ProductId {
        self.store
            .insert_product(NewProduct::new(name, Money::from_cents(cents), stock))
            .await
            .unwrap()
            .id
    }

    async fn address(&self, user_id: UserId) -> ShippingDetailsId {
        self.store
            .insert_shipping_details(NewShippingDetails {
                user_id,
                street: "10 Downing Street".to_string(),
                city: "London".to_string(),
                state: "LDN".to_string(),
                pincode: "SW1A2AA".to_string(),
                country: "UK".to_string(),
                phone: "02079250918".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn stock_of(&self, product_id: ProductId) -> u32 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock_qty
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.send(request(method, uri, user, None, body)).await
    }

    async fn admin_call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(method, uri, Some(UserId::new()), Some("ADMIN"), body))
            .await
    }
}

fn request(
    method: &str,
    uri: &str,
    user: Option<UserId>,
    role: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    if let Some(role) = role {
        builder = builder.header("x-user-role", role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, json) = app.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = TestApp::new();

        let (status, json) = app.call("GET", "/cart", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_identity_is_unauthorized() {
        let app = TestApp::new();
        let req = Request::builder()
            .uri("/order/user")
            .header("x-user-id", "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let (status, _) = app.send(req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let app = TestApp::new();

        let (status, _) = app
            .call("GET", "/admin/orders", Some(UserId::new()), None)
            .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn add_then_get_cart() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("Kettle", 2_499, 5).await;

        let (status, json) = app
            .call(
                "POST",
                "/cart/add-cart",
                Some(user),
                Some(json!({ "productId": product, "quantity": 2 })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Product added to cart successfully");
        assert_eq!(json["data"]["totalCents"], 4_998);

        let (status, json) = app.call("GET", "/cart", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["items"][0]["quantity"], 2);
        assert_eq!(json["data"]["items"][0]["product"]["name"], "Kettle");
        assert_eq!(json["data"]["items"][0]["product"]["stockQty"], 5);
    }

    #[tokio::test]
    async fn get_cart_without_cart_is_not_found() {
        let app = TestApp::new();

        let (status, _) = app.call("GET", "/cart", Some(UserId::new()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_without_quantity_is_bad_request() {
        let app = TestApp::new();
        let product = app.product("Kettle", 2_499, 5).await;

        let (status, json) = app
            .call(
                "POST",
                "/cart/add-cart",
                Some(UserId::new()),
                Some(json!({ "productId": product })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Product ID and valid quantity are required");
    }

    #[tokio::test]
    async fn add_zero_or_negative_quantity_is_bad_request() {
        let app = TestApp::new();
        let product = app.product("Kettle", 2_499, 5).await;

        for quantity in [json!(0), json!(-1)] {
            let (status, _) = app
                .call(
                    "POST",
                    "/cart/add-cart",
                    Some(UserId::new()),
                    Some(json!({ "productId": product, "quantity": quantity })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn add_unknown_product_is_not_found() {
        let app = TestApp::new();

        let (status, _) = app
            .call(
                "POST",
                "/cart/add-cart",
                Some(UserId::new()),
                Some(json!({ "productId": ProductId::new(), "quantity": 1 })),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn add_beyond_stock_is_bad_request() {
        let app = TestApp::new();
        let product = app.product("Kettle", 2_499, 2).await;

        let (status, json) = app
            .call(
                "POST",
                "/cart/add-cart",
                Some(UserId::new()),
                Some(json!({ "productId": product, "quantity": 3 })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Insufficient stock for product Kettle. Available: 2"
        );
    }

    #[tokio::test]
    async fn remove_item_not_in_cart_is_not_found() {
        let app = TestApp::new();
        let user = UserId::new();
        let kettle = app.product("Kettle", 2_499, 5).await;
        let toaster = app.product("Toaster", 3_000, 5).await;
        app.call(
            "POST",
            "/cart/add-cart",
            Some(user),
            Some(json!({ "productId": kettle, "quantity": 1 })),
        )
        .await;

        let (status, _) = app
            .call(
                "DELETE",
                "/cart/remove-item",
                Some(user),
                Some(json!({ "productId": toaster })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = app
            .call(
                "DELETE",
                "/cart/remove-item",
                Some(user),
                Some(json!({ "productId": kettle })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["totalCents"], 0);
    }

    #[tokio::test]
    async fn clear_cart_is_idempotent() {
        let app = TestApp::new();
        let user = UserId::new();

        let (status, json) = app.call("DELETE", "/cart/clear-cart", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Cart has been cleared successfully");

        let product = app.product("Kettle", 2_499, 5).await;
        app.call(
            "POST",
            "/cart/add-cart",
            Some(user),
            Some(json!({ "productId": product, "quantity": 1 })),
        )
        .await;

        for _ in 0..2 {
            let (status, _) = app.call("DELETE", "/cart/clear-cart", Some(user), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, json) = app.call("GET", "/cart", Some(user), None).await;
        assert_eq!(json["data"]["totalCents"], 0);
        assert_eq!(json["data"]["items"].as_array().unwrap().len(), 0);
    }
}

mod orders {
    use super::*;

    async fn place(app: &TestApp, user: UserId, product: ProductId, quantity: u32) -> Value {
        let shipping = app.address(user).await;
        app.call(
            "POST",
            "/cart/add-cart",
            Some(user),
            Some(json!({ "productId": product, "quantity": quantity })),
        )
        .await;
        let (status, json) = app
            .call(
                "POST",
                "/order/create-order",
                Some(user),
                Some(json!({ "shippingDetailsId": shipping })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json
    }

    #[tokio::test]
    async fn create_order_snapshots_and_reserves() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("Widget", 1_000, 5).await;

        let json = place(&app, user, product, 3).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Order created successfully.");
        assert_eq!(json["order"]["status"], "PENDING");
        assert_eq!(json["order"]["totalCents"], 3_000);
        assert_eq!(json["order"]["items"][0]["productName"], "Widget");
        assert_eq!(json["order"]["items"][0]["salesPriceCents"], 1_000);
        assert_eq!(json["order"]["shippingDetails"]["city"], "London");
        assert_eq!(app.stock_of(product).await, 2);

        let (_, cart) = app.call("GET", "/cart", Some(user), None).await;
        assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn create_order_without_shipping_id_is_bad_request() {
        let app = TestApp::new();

        let (status, json) = app
            .call("POST", "/order/create-order", Some(UserId::new()), Some(json!({})))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Shipping details id is required.");
    }

    #[tokio::test]
    async fn create_order_without_cart_is_not_found() {
        let app = TestApp::new();
        let user = UserId::new();
        let shipping = app.address(user).await;

        let (status, json) = app
            .call(
                "POST",
                "/order/create-order",
                Some(user),
                Some(json!({ "shippingDetailsId": shipping })),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Cart not found or does not belong to the user.");
    }

    #[tokio::test]
    async fn create_order_with_empty_cart_is_bad_request() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("Widget", 1_000, 5).await;
        place(&app, user, product, 1).await;
        let shipping = app.address(user).await;

        let (status, json) = app
            .call(
                "POST",
                "/order/create-order",
                Some(user),
                Some(json!({ "shippingDetailsId": shipping })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Cart is empty.");
    }

    #[tokio::test]
    async fn list_my_orders() {
        let app = TestApp::new();
        let user = UserId::new();

        let (status, json) = app.call("GET", "/order/user", Some(user), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "No orders found for this user.");

        let product = app.product("Widget", 1_000, 5).await;
        place(&app, user, product, 1).await;
        place(&app, user, product, 2).await;

        let (status, json) = app.call("GET", "/order/user", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        let orders = json["data"].as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0]["items"][0]["quantity"], 2);
    }

    #[tokio::test]
    async fn get_order_by_id() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("Widget", 1_000, 5).await;
        let placed = place(&app, user, product, 1).await;
        let order_id = placed["order"]["id"].as_str().unwrap().to_string();

        let (status, json) = app
            .call("GET", &format!("/order/{order_id}"), Some(user), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["id"], order_id.as_str());

        let (status, _) = app
            .call("GET", &format!("/order/{order_id}"), Some(UserId::new()), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.call("GET", "/order/not-an-id", Some(user), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod admin {
    use super::*;

    async fn pending_order(app: &TestApp, stock: u32, quantity: u32) -> (String, ProductId) {
        let user = UserId::new();
        let product = app.product("Gadget", 5_000, stock).await;
        let shipping = app.address(user).await;
        app.call(
            "POST",
            "/cart/add-cart",
            Some(user),
            Some(json!({ "productId": product, "quantity": quantity })),
        )
        .await;
        let (_, json) = app
            .call(
                "POST",
                "/order/create-order",
                Some(user),
                Some(json!({ "shippingDetailsId": shipping })),
            )
            .await;
        (json["order"]["id"].as_str().unwrap().to_string(), product)
    }

    async fn update(app: &TestApp, order_id: &str, status: &str) -> (StatusCode, Value) {
        app.admin_call(
            "PATCH",
            "/admin/orders/update-status",
            Some(json!({ "orderId": order_id, "newStatus": status })),
        )
        .await
    }

    #[tokio::test]
    async fn confirm_returns_next_options() {
        let app = TestApp::new();
        let (order_id, _) = pending_order(&app, 5, 1).await;

        let (status, json) = update(&app, &order_id, "CONFIRMED").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Order status updated successfully");
        assert_eq!(json["data"]["status"], "CONFIRMED");
        assert_eq!(json["availableStatusOptions"], json!(["COMPLETED"]));
    }

    #[tokio::test]
    async fn invalid_transition_is_bad_request() {
        let app = TestApp::new();
        let (order_id, _) = pending_order(&app, 5, 1).await;

        let (status, json) = update(&app, &order_id, "COMPLETED").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Invalid status transition from PENDING to COMPLETED"
        );
    }

    #[tokio::test]
    async fn unknown_status_is_bad_request() {
        let app = TestApp::new();
        let (order_id, _) = pending_order(&app, 5, 1).await;

        let (status, json) = update(&app, &order_id, "SHIPPED").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Unknown order status: SHIPPED");
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let app = TestApp::new();

        let (status, json) = app
            .admin_call(
                "PATCH",
                "/admin/orders/update-status",
                Some(json!({ "newStatus": "CONFIRMED" })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "orderId and newStatus are required");
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let app = TestApp::new();

        let (status, _) = update(&app, &common::OrderId::new().to_string(), "CONFIRMED").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn confirmation_policy_takes_stock_on_confirm() {
        let app = TestApp::with_policy(StockPolicy::OnConfirmation);
        let (order_id, product) = pending_order(&app, 5, 3).await;
        assert_eq!(app.stock_of(product).await, 5);

        let (status, _) = update(&app, &order_id, "CONFIRMED").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.stock_of(product).await, 2);

        let (status, _) = update(&app, &order_id, "CONFIRMED").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.stock_of(product).await, 2);
    }

    #[tokio::test]
    async fn list_groups_by_user() {
        let app = TestApp::new();
        pending_order(&app, 5, 1).await;
        pending_order(&app, 5, 1).await;

        let (status, json) = app.admin_call("GET", "/admin/orders", None).await;

        assert_eq!(status, StatusCode::OK);
        let grouped = json["data"].as_object().unwrap();
        assert_eq!(grouped.len(), 2);
        assert!(grouped.values().all(|orders| orders.as_array().unwrap().len() == 1));
    }
}

//! End-to-end tests for the JSON API.
//!
//! Each test builds the real router over the in-memory store and in-memory
//! sessions, then drives it with `oneshot`, carrying the session cookie by
//! hand between requests.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use taiwanese_house_core::menu::{AddOn, MenuCategory, MenuItem};
use taiwanese_house_core::{AddOnId, CodePurpose, Identifier, MenuItemId, Price, UserId};
use taiwanese_house_server::config::HouseConfig;
use taiwanese_house_server::db::{MemoryStore, Store};
use taiwanese_house_server::middleware::create_session_layer;
use taiwanese_house_server::routes;
use taiwanese_house_server::services::notify::{NotifyError, Notifier};
use taiwanese_house_server::state::AppState;

/// Notifier that keeps every code it is asked to send.
#[derive(Default)]
struct Outbox(Mutex<Vec<(String, String)>>);

impl Outbox {
    fn last_code_for(&self, destination: &str) -> String {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == destination)
            .map(|(_, code)| code.clone())
            .unwrap()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send_code(
        &self,
        to: &Identifier,
        _purpose: CodePurpose,
        code: &str,
    ) -> Result<(), NotifyError> {
        self.0
            .lock()
            .unwrap()
            .push((to.as_str().to_string(), code.to_string()));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn Store>,
    outbox: Arc<Outbox>,
    cookie: Option<String>,
}

impl TestApp {
    async fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed_menu(store.as_ref()).await;

        let outbox = Arc::new(Outbox::default());
        let config = HouseConfig::for_tests();
        let session_layer =
            create_session_layer(tower_sessions::MemoryStore::default(), &config);
        let state = AppState::new(config, store.clone(), outbox.clone());

        Self {
            router: routes::router(state).layer(session_layer),
            store,
            outbox,
            cookie: None,
        }
    }

    /// Send a request, remembering any session cookie the response sets.
    async fn send(&mut self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn signup(&mut self) -> UserId {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/signup",
                Some(json!({
                    "name": "Mei Lin",
                    "email": "mei@example.com",
                    "phone": "012-345 6789",
                    "password": "braised4pork",
                    "confirm_password": "braised4pork",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        UserId::new(i32::try_from(body["user"]["id"].as_i64().unwrap()).unwrap())
    }
}

async fn seed_menu(store: &dyn Store) {
    store
        .upsert_category(&MenuCategory {
            slug: "rice".to_string(),
            name: "Rice Bowls".to_string(),
            sort_order: 1,
        })
        .await
        .unwrap();
    store
        .upsert_menu_item(&MenuItem {
            id: MenuItemId::new(1),
            name: "Lu Rou Fan".to_string(),
            description: "Braised pork rice".to_string(),
            category: "rice".to_string(),
            base_price: Price::new(Decimal::new(1290, 2)),
            image_url: None,
            available: true,
            add_ons: vec![AddOn {
                id: AddOnId::new(10),
                name: "Braised Egg".to_string(),
                price: Price::new(Decimal::new(200, 2)),
            }],
            removable: vec!["scallions".to_string()],
        })
        .await
        .unwrap();
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

#[tokio::test]
async fn test_health() {
    let mut app = TestApp::new().await;
    let (status, _) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("GET", "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let mut app = TestApp::new().await;
    for uri in ["/api/account", "/api/cart", "/api/orders", "/api/feedback"] {
        let (status, body) = app.send("GET", uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_menu_is_public() {
    let mut app = TestApp::new().await;
    let (status, body) = app.send("GET", "/api/menu", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sections"][0]["items"][0]["name"], "Lu Rou Fan");

    let (status, _) = app.send("GET", "/api/menu/items/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signup_logout_login() {
    let mut app = TestApp::new().await;
    app.signup().await;

    let (status, body) = app.send("GET", "/api/account", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "mei@example.com");
    assert_eq!(body["phone"], "+60123456789");
    assert_eq!(body["coins"], 0);

    let (status, _) = app.send("POST", "/api/auth/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.cookie = None;

    let (status, _) = app.send("GET", "/api/account", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "identifier": "+60123456789", "password": "wrong-pass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "identifier": "+60123456789", "password": "braised4pork" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "phone_password");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let mut app = TestApp::new().await;
    app.signup().await;
    app.cookie = None;

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/signup",
            Some(json!({
                "name": "Someone Else",
                "email": "MEI@example.com",
                "phone": "0198765432",
                "password": "another1pass",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_phone_code_login() {
    let mut app = TestApp::new().await;
    app.signup().await;
    app.cookie = None;

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/phone/start",
            Some(json!({ "phone": "0123456789" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(!body["sent_to"].as_str().unwrap().contains("3456"));

    let code = app.outbox.last_code_for("+60123456789");
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/phone/verify",
            Some(json!({ "phone": "0123456789", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "phone_code");

    let (status, _) = app.send("GET", "/api/account", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_recovery() {
    let mut app = TestApp::new().await;
    app.signup().await;
    app.send("POST", "/api/auth/logout", None).await;
    app.cookie = None;

    // Reset before verifying is out of order.
    let (status, _) = app
        .send(
            "POST",
            "/api/auth/recovery/reset",
            Some(json!({ "password": "fresh5noodles" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/recovery/start",
            Some(json!({ "identifier": "mei@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/recovery/verify",
            Some(json!({ "code": "000000x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = app.outbox.last_code_for("mei@example.com");
    let (status, body) = app
        .send(
            "POST",
            "/api/auth/recovery/verify",
            Some(json!({ "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "verified");

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/recovery/reset",
            Some(json!({ "password": "fresh5noodles", "confirm_password": "fresh5noodles" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "identifier": "mei@example.com", "password": "fresh5noodles" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cart_and_checkout_with_coins() {
    let mut app = TestApp::new().await;
    let user = app.signup().await;
    app.store.adjust_coins(user, 500).await.unwrap();

    let (status, body) = app
        .send(
            "POST",
            "/api/cart/items",
            Some(json!({
                "menu_item_id": 1,
                "quantity": 2,
                "add_on_ids": [10],
                "removals": ["scallions"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&body["quote"]["subtotal"]), Decimal::new(2980, 2));

    let (status, body) = app.send("GET", "/api/cart?coins=300", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["quote"]["discount"]), Decimal::new(300, 2));
    assert_eq!(decimal(&body["quote"]["total"]), Decimal::new(2680, 2));

    let (status, order) = app
        .send(
            "POST",
            "/api/checkout",
            Some(json!({
                "coins": 300,
                "payment": {
                    "method": "card",
                    "number": "4242 4242 4242 4242",
                    "expiry": "12/99",
                    "cvv": "123",
                    "holder": "MEI LIN",
                },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["payment"]["status"], "paid");
    assert_eq!(order["payment"]["card"]["last4"], "4242");
    assert_eq!(order["quote"]["coins_earned"], 26);

    let (_, account) = app.send("GET", "/api/account", None).await;
    assert_eq!(account["coins"], 500 - 300 + 26);

    let (_, cart) = app.send("GET", "/api/cart", None).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let (status, orders) = app.send("GET", "/api/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let id = order["id"].as_i64().unwrap();
    let (status, _) = app.send("GET", &format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_declined_card_changes_nothing() {
    let mut app = TestApp::new().await;
    app.signup().await;
    app.send("POST", "/api/cart/items", Some(json!({ "menu_item_id": 1 })))
        .await;

    let (status, body) = app
        .send(
            "POST",
            "/api/checkout",
            Some(json!({
                "payment": {
                    "method": "card",
                    "number": "4000 0000 0002 0000",
                    "expiry": "12/99",
                    "cvv": "123",
                    "holder": "MEI LIN",
                },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED, "{body}");

    let (_, cart) = app.send("GET", "/api/cart", None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    let (_, orders) = app.send("GET", "/api/orders", None).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let mut app = TestApp::new().await;
    app.signup().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/checkout",
            Some(json!({ "payment": { "method": "cash" } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback() {
    let mut app = TestApp::new().await;
    app.signup().await;

    let (status, _) = app
        .send(
            "POST",
            "/api/feedback",
            Some(json!({ "rating": 6, "message": "Great" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            "POST",
            "/api/feedback",
            Some(json!({ "rating": 5, "message": "  Best lu rou fan in town  " })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Best lu rou fan in town");

    let (_, list) = app.send("GET", "/api/feedback", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account() {
    let mut app = TestApp::new().await;
    app.signup().await;

    let (status, _) = app
        .send(
            "DELETE",
            "/api/account",
            Some(json!({ "password": "not-it-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            "DELETE",
            "/api/account",
            Some(json!({ "password": "braised4pork" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    app.cookie = None;

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "identifier": "mei@example.com", "password": "braised4pork" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use oms_api::app::{build_app, services::AppServices};
use oms_infra::OrderStore;
use oms_infra::store::InMemoryStore;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(InMemoryStore::new(), Duration::from_secs(30)).await
    }

    // Same router as prod over the given store, on an ephemeral port.
    async fn spawn_with(store: InMemoryStore, request_timeout: Duration) -> Self {
        let services = Arc::new(AppServices::with_in_memory(store));
        let app = build_app(services, request_timeout);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn create_product(
    client: &reqwest::Client,
    srv: &TestServer,
    code: &str,
    price: &str,
    stock: i64,
) -> i64 {
    let (status, body) = post(
        client,
        srv.url("/products"),
        json!({ "product_code": code, "name": format!("{code} name"), "price": price, "initial_quantity": stock }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body={body}");
    body["id"].as_i64().unwrap()
}

async fn create_customer(client: &reqwest::Client, srv: &TestServer, name: &str) -> i64 {
    let (status, body) = post(
        client,
        srv.url("/customers"),
        json!({ "name": name, "email": "buyer@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body={body}");
    body["id"].as_i64().unwrap()
}

async fn stock_of(client: &reqwest::Client, srv: &TestServer, product_id: i64) -> i64 {
    let (status, body) = get(client, srv.url("/products")).await;
    assert_eq!(status, StatusCode::OK);
    body.as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == product_id)
        .map(|p| p["quantity"].as_i64().unwrap())
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, srv.url("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["time"].is_string());
}

#[tokio::test]
async fn product_catalog_create_list_and_duplicate() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, created) = post(
        &client,
        srv.url("/products"),
        json!({ "product_code": "SKU-1", "name": "Widget", "price": 12.5, "initial_quantity": 4 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["price"], "12.50");
    assert_eq!(created["status"], "ACTIVE");
    assert_eq!(created["description"], "");
    assert_eq!(created["quantity"], 4);

    post(
        &client,
        srv.url("/products"),
        json!({ "product_code": "SKU-2", "name": "Retired", "price": "1.00", "status": "INACTIVE" }),
    )
    .await;

    let (status, listed) = get(&client, srv.url("/products")).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["product_code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["SKU-1"]);

    let (status, body) = post(
        &client,
        srv.url("/products"),
        json!({ "product_code": "SKU-1", "name": "Again", "price": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = post(&client, srv.url("/products"), json!({ "name": "No code" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn restock_increments_inventory() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let product = create_product(&client, &srv, "R-1", "2.00", 1).await;

    let (status, body) = post(
        &client,
        srv.url(&format!("/products/{product}/restock")),
        json!({ "quantity": 9 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 10);

    let (status, _) = post(&client, srv.url("/products/999/restock"), json!({ "quantity": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &client,
        srv.url(&format!("/products/{product}/restock")),
        json!({ "quantity": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_lifecycle_create_read_list() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = create_customer(&client, &srv, "Ada").await;
    let product = create_product(&client, &srv, "P-10", "10.00", 5).await;

    let (status, created) = post(
        &client,
        srv.url("/orders"),
        json!({ "customer_id": customer, "items": [{ "product_id": product, "quantity": 3 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body={created}");
    assert_eq!(created["order"]["customer_id"], customer);
    assert_eq!(created["order"]["total_amount"], "30.00");
    assert_eq!(created["order"]["status"], "NEW");
    assert_eq!(created["order"]["customer"]["name"], "Ada");
    assert_eq!(created["items"][0]["qty"], 3);
    assert_eq!(created["items"][0]["price"], "10.00");
    assert_eq!(created["items"][0]["product_code"], "P-10");
    assert_eq!(created["items"][0]["product_name"], "P-10 name");

    let order_id = created["order"]["id"].as_i64().unwrap();

    let (status, first) = get(&client, srv.url(&format!("/orders/{order_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = get(&client, srv.url(&format!("/orders/{order_id}"))).await;
    assert_eq!(first, second);

    // Read Order puts the header at the top level; it matches the created one.
    let header = created["order"].as_object().unwrap();
    for (field, value) in header {
        assert_eq!(&first[field.as_str()], value, "field {field}");
    }
    assert_eq!(first["customer"]["name"], "Ada");
    assert_eq!(first["items"], created["items"]);
    assert!(first.get("order").is_none());

    let (status, listed) = get(&client, srv.url("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], order_id);

    assert_eq!(stock_of(&client, &srv, product).await, 2);
}

#[tokio::test]
async fn insufficient_stock_is_409_and_changes_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = create_customer(&client, &srv, "Ada").await;
    let product = create_product(&client, &srv, "LOW", "10.00", 2).await;

    let (status, body) = post(
        &client,
        srv.url("/orders"),
        json!({ "customer_id": customer, "items": [{ "product_id": product, "quantity": 3 }] }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["product_id"], product);
    assert_eq!(body["available"], 2);
    assert!(body["message"].as_str().unwrap().contains("available 2"));

    assert_eq!(stock_of(&client, &srv, product).await, 2);
    let (_, listed) = get(&client, srv.url("/orders")).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_product_is_422_and_rolls_back() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = create_customer(&client, &srv, "Ada").await;
    let product = create_product(&client, &srv, "OK", "1.00", 10).await;

    let (status, body) = post(
        &client,
        srv.url("/orders"),
        json!({
            "customer_id": customer,
            "items": [
                { "product_id": product, "quantity": 2 },
                { "product_id": 4242, "quantity": 1 }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "product_not_found");
    assert!(body["message"].as_str().unwrap().contains("4242"));
    assert_eq!(stock_of(&client, &srv, product).await, 10);
}

#[tokio::test]
async fn client_supplied_price_is_used() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = create_customer(&client, &srv, "Ada").await;
    let product = create_product(&client, &srv, "CAT", "12.00", 5).await;

    let (status, body) = post(
        &client,
        srv.url("/orders"),
        json!({
            "customer_id": customer,
            "items": [{ "product_id": product, "quantity": 2, "unit_price": "4.50" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["items"][0]["price"], "4.50");
    assert_eq!(body["order"]["total_amount"], "9.00");
}

#[tokio::test]
async fn malformed_requests_get_structured_400s() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/orders"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = post(&client, srv.url("/orders"), json!({ "customer_id": 1, "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "items must be a non-empty list");

    let (status, body) = post(
        &client,
        srv.url("/orders"),
        json!({ "customer_id": 1, "items": [{ "product_id": 1, "quantity": -1 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("items[0].quantity"));
}

#[tokio::test]
async fn unknown_or_malformed_order_ids() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = get(&client, srv.url("/orders/987654")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = get(&client, srv.url("/orders/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn slow_requests_time_out_with_a_json_body() {
    let store = InMemoryStore::new();
    let srv = TestServer::spawn_with(store.clone(), Duration::from_millis(200)).await;
    let client = reqwest::Client::new();

    // An open unit of work blocks every placement behind it.
    let held = store.begin().await.unwrap();

    let (status, body) = post(
        &client,
        srv.url("/orders"),
        json!({ "customer_id": 1, "items": [{ "product_id": 1, "quantity": 1 }] }),
    )
    .await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "timeout");
    drop(held);
}

#[tokio::test]
async fn overlong_customer_fields_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        srv.url("/customers"),
        json!({ "name": "A".repeat(256) }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    const CLIENTS: i64 = 6;
    const QTY: i64 = 2;

    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let customer = create_customer(&client, &srv, "Ada").await;
    let product = create_product(&client, &srv, "HOT", "1.00", (CLIENTS - 1) * QTY).await;

    let url = srv.url("/orders");
    let handles: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                client
                    .post(url)
                    .json(&json!({
                        "customer_id": customer,
                        "items": [{ "product_id": product, "quantity": QTY }]
                    }))
                    .send()
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(created, CLIENTS - 1);
    assert_eq!(conflicts, 1);
    assert_eq!(stock_of(&client, &srv, product).await, 0);
}

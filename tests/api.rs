use axum::{body::Body, http::{Request, StatusCode}, Router};
use opensase_catalog::api::{create_router, AppState};
use opensase_catalog::config::StorefrontConfig;
use opensase_catalog::domain::aggregates::{AttributeGroup, AttributeKey, Product};
use opensase_catalog::domain::value_objects::Money;
use opensase_catalog::service::VariationService;
use opensase_catalog::store::{MemoryStore, StoreOp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    store_id: Uuid,
    product: Product,
    color: AttributeGroup,
    size: AttributeGroup,
}

async fn setup() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let store_id = Uuid::new_v4();

    let mut color = AttributeGroup::new(store_id, AttributeKey::Color, "Cor", 0);
    color.push_value("Preto");
    color.push_value("Branco");
    let mut size = AttributeGroup::new(store_id, AttributeKey::Size, "Tamanho", 1);
    for label in ["P", "M", "G"] { size.push_value(label); }
    store.insert_group(color.clone()).await;
    store.insert_group(size.clone()).await;

    let mut product = Product::new(store_id, "Camiseta", Money::brl(Decimal::from(50)));
    product.stock = 10;
    store.insert_product(product.clone()).await;

    let storefront = StorefrontConfig { name: "Loja Teste".into(), currency: "BRL".into(), whatsapp_number: Some("5511988887777".into()), delivery_fee: Decimal::from(7) };
    let service = VariationService::new(store.clone(), storefront, Duration::ZERO);
    TestApp { router: create_router(AppState::new(service)), store, store_id, product, color, size }
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, value)
}

async fn open(app: &TestApp) -> String {
    let (status, body) = send(app, "POST", "/api/v1/sessions", Some(json!({ "store_id": app.store_id, "product_id": app.product.id }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn toggle(app: &TestApp, session: &str, group: &AttributeGroup, index: usize) -> (StatusCode, Value) {
    let command = json!({ "command": "toggle_value", "group_id": group.id, "value_id": group.values[index].id });
    send(app, "POST", &format!("/api/v1/sessions/{session}/commands"), Some(command)).await
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_list_attributes_in_position_order() {
    let app = setup().await;
    let (status, body) = send(&app, "GET", &format!("/api/v1/stores/{}/attributes", app.store_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body.as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["name"], "Cor");
    assert_eq!(groups[1]["values"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_automatic_generation_through_commands() {
    let app = setup().await;
    let session = open(&app).await;
    toggle(&app, &session, &app.color, 0).await;
    toggle(&app, &session, &app.color, 1).await;
    toggle(&app, &session, &app.size, 0).await;
    let (status, body) = toggle(&app, &session, &app.size, 1).await;
    assert_eq!(status, StatusCode::OK);

    let labels: Vec<&str> = body["session"]["variations"].as_array().unwrap().iter()
        .map(|v| v["color"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["Preto", "Preto", "Branco", "Branco"]);
}

#[tokio::test]
async fn test_duplicate_custom_value_conflicts() {
    let app = setup().await;
    let session = open(&app).await;
    let uri = format!("/api/v1/sessions/{session}/commands");
    let command = json!({ "command": "add_custom_value", "group_id": app.color.id, "label": "preto" });
    let (status, body) = send(&app, "POST", &uri, Some(command)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["validation"], true);
}

#[tokio::test]
async fn test_custom_value_is_listed_after_adding() {
    let app = setup().await;
    let session = open(&app).await;
    let command = json!({ "command": "add_custom_value", "group_id": app.size.id, "label": "GG" });
    let (status, body) = send(&app, "POST", &format!("/api/v1/sessions/{session}/commands"), Some(command)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["variations"][0]["size"], "GG");

    let (_, body) = send(&app, "GET", &format!("/api/v1/stores/{}/attributes", app.store_id), None).await;
    let labels: Vec<&str> = body[1]["values"].as_array().unwrap().iter().map(|v| v["label"].as_str().unwrap()).collect();
    assert_eq!(labels, ["P", "M", "G", "GG"]);
}

#[tokio::test]
async fn test_manual_combination_rejects_duplicates() {
    let app = setup().await;
    let (_, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({ "store_id": app.store_id, "product_id": app.product.id, "mode": "manual" }))).await;
    let session = body["id"].as_str().unwrap().to_string();
    toggle(&app, &session, &app.color, 0).await;

    let uri = format!("/api/v1/sessions/{session}/commands");
    let add = json!({ "command": "add_combination", "picks": [{ "group_id": app.color.id, "value_id": app.color.values[0].id }] });
    let (status, body) = send(&app, "POST", &uri, Some(add.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["variations"].as_array().unwrap().len(), 1);
    let (status, _) = send(&app, "POST", &uri, Some(add)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_save_then_list_product_variations() {
    let app = setup().await;
    let session = open(&app).await;
    toggle(&app, &session, &app.color, 0).await;
    toggle(&app, &session, &app.size, 2).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/sessions/{session}/save"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["variations"][0]["id"]["state"], "stored");

    let (status, body) = send(&app, "GET", &format!("/api/v1/products/{}/variations", app.product.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["size"], "G");
}

#[tokio::test]
async fn test_failed_delete_reports_and_keeps_variation() {
    let app = setup().await;
    let session = open(&app).await;
    toggle(&app, &session, &app.color, 0).await;
    let (_, body) = send(&app, "POST", &format!("/api/v1/sessions/{session}/save"), None).await;
    let variation_id = body["variations"][0]["id"]["id"].as_str().unwrap().to_string();

    app.store.set_failing(StoreOp::Delete, true).await;
    let uri = format!("/api/v1/sessions/{session}/variations/{variation_id}");
    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["validation"], false);

    let (_, body) = send(&app, "GET", &format!("/api/v1/sessions/{session}"), None).await;
    assert_eq!(body["variations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_image_upload() {
    let app = setup().await;
    let session = open(&app).await;
    let (_, body) = toggle(&app, &session, &app.color, 0).await;
    let variation_id = body["session"]["variations"][0]["id"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/sessions/{session}/variations/{variation_id}/image");

    let text = Request::builder().method("POST").uri(&uri).header("content-type", "text/plain").body(Body::from("hello")).unwrap();
    assert_eq!(app.router.clone().oneshot(text).await.unwrap().status(), StatusCode::BAD_REQUEST);

    let png = Request::builder().method("POST").uri(&uri).header("content-type", "image/png").header("x-file-name", "preto.png")
        .body(Body::from(vec![137u8, 80, 78, 71])).unwrap();
    let response = app.router.clone().oneshot(png).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let url = serde_json::from_slice::<Value>(&bytes).unwrap()["url"].as_str().unwrap().to_string();

    let image_id = url.rsplit('/').next().unwrap();
    let response = app.router.clone().oneshot(Request::builder().uri(format!("/api/v1/images/{image_id}")).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let (_, body) = send(&app, "GET", &format!("/api/v1/sessions/{session}"), None).await;
    assert_eq!(body["variations"][0]["image_url"], url.as_str());
}

#[tokio::test]
async fn test_closed_session_is_gone() {
    let app = setup().await;
    let session = open(&app).await;
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/sessions/{session}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = toggle(&app, &session, &app.color, 0).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_place_order() {
    let app = setup().await;
    let order = json!({
        "items": [{ "product_id": app.product.id, "quantity": 2 }],
        "checkout": {
            "customer_name": "Maria", "phone": "(11) 98888-7777", "email": null,
            "delivery": "delivery", "payment": "cash", "change_for": "200", "notes": null,
            "address": { "street": "Rua A", "number": "10", "complement": null, "district": "Centro", "city": "São Paulo" }
        }
    });
    let (status, body) = send(&app, "POST", "/api/v1/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["status"], "confirmed");
    assert_eq!(body["order"]["order_number"], "1001");
    assert!(body["confirmation"]["whatsapp_url"].as_str().unwrap().starts_with("https://wa.me/5511988887777"));

    let mut pickup_with_change = order;
    pickup_with_change["checkout"]["payment"] = json!("pix");
    let (status, _) = send(&app, "POST", "/api/v1/orders", Some(pickup_with_change)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.store.orders().await.len(), 1);
}

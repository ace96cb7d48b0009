mod common;

use common::*;
use model_deploy::api::routes::create_router;
use model_deploy::{InMemoryStore, ModelDeployer};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}

async fn spawn_server(store: Arc<InMemoryStore>) -> TestClient {
    let mut models = models();
    models
        .update(&path("definition=D/field=F/attribute=label/key=en"), Some("Hello".into()))
        .unwrap();
    models
        .update(&path(&format!("class={}/attribute=title/key=en", CASE)), Some("Legal case".into()))
        .unwrap();
    let deployer = Arc::new(ModelDeployer::new(models, store));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app: axum::Router = create_router().with_state(deployer);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestClient::new(format!("http://{}", address))
}

#[tokio::test]
async fn test_candidates_then_pinned_deploy() {
    let store = Arc::new(store());
    let client = spawn_server(store.clone()).await;

    let health = client.get("/health").await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let candidates: Value = client
        .get("/deployment/candidates")
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(candidates["version"], json!(2));
    let paths: Vec<Value> = candidates["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["path"].clone())
        .collect();
    assert_eq!(paths.len(), 2);

    let response = client
        .post(
            "/deployment/deploy",
            json!({ "version": candidates["version"], "paths": paths }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["groups"].as_array().unwrap().len(), 2);
    assert_eq!(outcome["reloaded"], json!(true));
    assert_eq!(store.label("D.F.label").unwrap().get("en").map(String::as_str), Some("Hello"));

    let candidates: Value = client
        .get("/deployment/candidates")
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(candidates["nodes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_endpoint_reports_missing_statements() {
    let store = Arc::new(InMemoryStore::new().with_code_list("CL1"));
    let client = spawn_server(store).await;

    let response = client
        .post(
            "/deployment/validate",
            json!({ "path": format!("class={}", CASE) }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    let messages = report["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["severity"], json!("error"));
}

#[tokio::test]
async fn test_deploy_rejects_future_version() {
    let client = spawn_server(Arc::new(store())).await;

    let response = client
        .post(
            "/deployment/deploy",
            json!({ "version": 99, "paths": ["definition=D"] }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("99"));

    let response = client
        .post("/deployment/deploy", json!({ "paths": [] }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

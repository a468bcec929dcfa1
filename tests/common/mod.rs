// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use transcript_quiz::{
    config::{Config, GenerationConfig},
    db::{DataStore, SqliteStore},
    routes,
    state::AppState,
    store::StateStore,
};

/// Test configuration. `generation_url` points the generator at a fake upstream.
pub fn test_config(generation_url: Option<String>) -> Config {
    Config {
        database_url: Some("sqlite::memory:".to_string()),
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
        allow_guests: true,
        session_ttl: std::time::Duration::from_secs(3600),
        max_sessions: 100,
        generation: GenerationConfig {
            api_key: generation_url.as_ref().map(|_| "test-key".to_string()),
            base_url: generation_url.unwrap_or_else(|| "http://127.0.0.1:9".to_string()),
            model: "test-model".to_string(),
        },
    }
}

/// Loads a state store over any `DataStore`.
pub async fn state_store(db: Arc<dyn DataStore>) -> Arc<StateStore> {
    Arc::new(
        StateStore::load(db)
            .await
            .expect("Failed to load the state store"),
    )
}

/// Spawns the app on a random port. Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_with(store: Option<Arc<StateStore>>, config: Config) -> String {
    let generator = transcript_quiz::generation::QuestionGenerator::from_config(&config.generation);
    let state = AppState::new(store, generator, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// App over a fresh in-memory database, guests allowed, no generator.
pub async fn spawn_app() -> String {
    let db = SqliteStore::in_memory()
        .await
        .expect("Failed to open in-memory database");
    let store = state_store(Arc::new(db)).await;
    spawn_with(Some(store), test_config(None)).await
}

pub async fn create_user(client: &reqwest::Client, address: &str, name: &str) -> Value {
    let response = client
        .post(format!("{}/api/admin/users", address))
        .json(&json!({ "name": name, "role": "employee" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

/// Creates a published project whose questions have the given correct options.
pub async fn create_project(client: &reqwest::Client, address: &str, answers: &[u8]) -> Value {
    let questions: Vec<Value> = answers
        .iter()
        .enumerate()
        .map(|(i, &correct)| {
            json!({
                "question_text": format!("Question {}", i + 1),
                "options": ["A", "B", "C", "D"],
                "correct_answer": correct,
            })
        })
        .collect();

    let response = client
        .post(format!("{}/api/admin/projects", address))
        .json(&json!({
            "name": "Weekly sync",
            "transcript": "Alice: ship on Friday.",
            "questions": questions,
            "is_published": true,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

pub fn question_ids(project: &Value) -> Vec<i64> {
    project["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect()
}

/// POSTs to a session action and returns `(status, body)`.
pub async fn session_action(
    client: &reqwest::Client,
    address: &str,
    session_id: &str,
    action: &str,
    body: Option<Value>,
) -> (u16, Value) {
    let mut request = client.post(format!(
        "{}/api/quiz/sessions/{}/{}",
        address, session_id, action
    ));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Failed to execute request");
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or(Value::Null))
}

pub async fn open_session(client: &reqwest::Client, address: &str, project_id: i64) -> String {
    let response = client
        .post(format!("{}/api/quiz/sessions", address))
        .json(&json!({ "project_id": project_id }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["state"], "start");
    body["id"].as_str().unwrap().to_string()
}

pub async fn answer(
    client: &reqwest::Client,
    address: &str,
    session_id: &str,
    question_id: i64,
    option: u8,
) -> (u16, Value) {
    let response = client
        .put(format!("{}/api/quiz/sessions/{}/answers", address, session_id))
        .json(&json!({ "question_id": question_id, "option": option }))
        .send()
        .await
        .expect("Failed to execute request");
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or(Value::Null))
}

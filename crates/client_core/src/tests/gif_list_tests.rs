use super::*;
use crate::{
    polling::{JsonEndpoint, PollingStateSync},
    test_support::{spawn_server, unreachable_url},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;

struct RecordingPrompt {
    answer: bool,
    confirmations: Mutex<Vec<GifName>>,
    alerts: Mutex<Vec<String>>,
}

impl RecordingPrompt {
    fn answering(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            confirmations: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl UserPrompt for RecordingPrompt {
    async fn confirm_delete(&self, name: &GifName) -> bool {
        self.confirmations.lock().await.push(name.clone());
        self.answer
    }

    async fn alert(&self, message: &str) {
        self.alerts.lock().await.push(message.to_string());
    }
}

#[derive(Clone)]
struct DeleteServer {
    status: StatusCode,
    body: serde_json::Value,
    deleted: Arc<Mutex<Vec<String>>>,
}

async fn handle_delete(
    State(state): State<DeleteServer>,
    Path(name): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.deleted.lock().await.push(name);
    (state.status, Json(state.body.clone()))
}

async fn spawn_delete_server(
    status: StatusCode,
    body: serde_json::Value,
) -> (String, Arc<Mutex<Vec<String>>>) {
    let deleted = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/list",
            get(|| async { Json(json!({ "gifs": ["a.gif", "b.gif"] })) }),
        )
        .route("/delete/:name", delete(handle_delete))
        .with_state(DeleteServer {
            status,
            body,
            deleted: deleted.clone(),
        });
    (spawn_server(app).await, deleted)
}

fn loaded_list(raw: &[&str]) -> Observable<Vec<GifName>> {
    let state = Observable::new();
    state.replace(raw.iter().map(|name| GifName::from(*name)).collect());
    state
}

#[tokio::test]
async fn polled_list_then_delete_leaves_the_rest() {
    let (url, deleted) = spawn_delete_server(StatusCode::OK, json!({})).await;
    let client = BalloonClient::new(&url).expect("client");
    let sync = PollingStateSync::start(
        Arc::new(JsonEndpoint::gif_list(&client)),
        Duration::from_secs(3600),
    );

    let mut rx = sync.state().subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(Option::is_some))
        .await
        .expect("list loaded")
        .expect("state channel open");

    let prompt = RecordingPrompt::answering(true);
    let controller = GifListController::new(client, sync.state().clone(), prompt.clone());
    assert_eq!(controller.items(), ["a.gif", "b.gif"]);

    let outcome = controller.delete(&GifName::from("a.gif")).await;
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(controller.items(), ["b.gif"]);
    assert_eq!(*deleted.lock().await, ["a.gif"]);
    assert_eq!(*prompt.confirmations.lock().await, ["a.gif"]);
    assert!(prompt.alerts.lock().await.is_empty());
}

#[tokio::test]
async fn delete_removes_only_the_named_entry() {
    let (url, _deleted) = spawn_delete_server(StatusCode::NO_CONTENT, json!(null)).await;
    let client = BalloonClient::new(&url).expect("client");
    let state = loaded_list(&["a.gif", "b.gif", "c.gif"]);
    let controller = GifListController::new(client, state.clone(), RecordingPrompt::answering(true));

    let outcome = controller.delete(&GifName::from("b.gif")).await;
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(controller.items(), ["a.gif", "c.gif"]);
}

#[tokio::test]
async fn declined_confirmation_sends_nothing() {
    let (url, deleted) = spawn_delete_server(StatusCode::OK, json!({})).await;
    let client = BalloonClient::new(&url).expect("client");
    let prompt = RecordingPrompt::answering(false);
    let controller =
        GifListController::new(client, loaded_list(&["a.gif", "b.gif"]), prompt.clone());

    let outcome = controller.delete(&GifName::from("a.gif")).await;
    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(controller.items(), ["a.gif", "b.gif"]);
    assert!(deleted.lock().await.is_empty());
    assert!(prompt.alerts.lock().await.is_empty());
}

#[tokio::test]
async fn server_failure_keeps_list_and_alerts_once() {
    let (url, deleted) = spawn_delete_server(
        StatusCode::NOT_FOUND,
        json!({ "error": "File not found" }),
    )
    .await;
    let client = BalloonClient::new(&url).expect("client");
    let prompt = RecordingPrompt::answering(true);
    let controller =
        GifListController::new(client, loaded_list(&["a.gif", "b.gif"]), prompt.clone());

    let outcome = controller.delete(&GifName::from("a.gif")).await;
    assert_eq!(
        outcome,
        DeleteOutcome::Failed("Failed to delete a.gif: File not found".to_string())
    );
    assert_eq!(controller.items(), ["a.gif", "b.gif"]);
    assert_eq!(deleted.lock().await.len(), 1);
    assert_eq!(
        *prompt.alerts.lock().await,
        ["Failed to delete a.gif: File not found"]
    );
}

#[tokio::test]
async fn transport_failure_keeps_list_and_alerts_once() {
    let client = BalloonClient::new(&unreachable_url().await).expect("client");
    let prompt = RecordingPrompt::answering(true);
    let controller =
        GifListController::new(client, loaded_list(&["a.gif", "b.gif"]), prompt.clone());

    let outcome = controller.delete(&GifName::from("a.gif")).await;
    assert!(matches!(outcome, DeleteOutcome::Failed(_)));
    assert_eq!(controller.items(), ["a.gif", "b.gif"]);

    let alerts = prompt.alerts.lock().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("could not reach the server"));
}

#[tokio::test]
async fn names_with_reserved_characters_reach_the_server_intact() {
    let (url, deleted) = spawn_delete_server(StatusCode::OK, json!({})).await;
    let client = BalloonClient::new(&url).expect("client");
    let controller = GifListController::new(
        client,
        loaded_list(&["dance party.gif", "a.gif"]),
        RecordingPrompt::answering(true),
    );

    let outcome = controller.delete(&GifName::from("dance party.gif")).await;
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(*deleted.lock().await, ["dance party.gif"]);
    assert_eq!(controller.items(), ["a.gif"]);
}

#[tokio::test]
async fn items_are_empty_while_loading() {
    let client = BalloonClient::new("http://balloon.local").expect("client");
    let controller =
        GifListController::new(client, Observable::new(), RecordingPrompt::answering(true));
    assert!(controller.items().is_empty());
}

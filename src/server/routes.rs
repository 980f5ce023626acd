//! HTTP route handlers for the Parlor agent API.

use std::sync::Arc;

use async_stream::stream;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::conversations::core::errors::ConversationError;
use crate::conversations::core::owner::Owner;
use crate::conversations::stream::StreamPhase;
use crate::conversations::types::{ConversationOverview, ConversationView, MessageEntry};

use super::state::AppState;

/// Create the API router with all routes.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/health", get(health_check))
        .route("/api/conversations", get(list_names).post(create_conversation))
        .route("/api/conversations/current", get(current_conversation))
        .route("/api/conversations/select", post(select_conversation))
        .route("/api/conversations/update", post(update_conversation))
        .route("/api/conversations/rename", post(rename_conversation))
        .route("/api/conversations/delete", post(delete_conversation))
        .route("/api/chat", post(chat))
        .fallback_service(static_files)
        .with_state(state)
}

fn internal(err: ConversationError) -> (StatusCode, String) {
    tracing::error!("Conversation store error: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Store error: {err}"))
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "parlor-agent",
        "model": state.model_name,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Conversation plus the refreshed name list for the sidebar.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Selected conversation name.
    pub name: String,
    /// Selected conversation transcript.
    pub transcript: Vec<MessageEntry>,
    /// Live names, newest first.
    pub names: Vec<String>,
}

/// Request naming a single conversation.
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    /// Conversation name.
    pub name: String,
}

/// Create request; the previous conversation is saved when both fields are set.
#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    /// Name of the conversation being left.
    pub name: Option<String>,
    /// Transcript of the conversation being left.
    pub transcript: Option<Vec<MessageEntry>>,
}

/// Transcript update request.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Conversation name.
    pub name: String,
    /// Transcript to persist.
    pub transcript: Vec<MessageEntry>,
}

/// Rename request.
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// Current name.
    pub name: String,
    /// Requested name.
    pub new_name: String,
}

/// Rename response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RenameResponse {
    /// Name in effect afterwards.
    pub name: String,
    /// User-visible notice when the rename was refused.
    pub notice: Option<String>,
    /// Live names, newest first.
    pub names: Vec<String>,
}

/// Chat submission.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub prompt: String,
    /// Current conversation name.
    pub name: String,
    /// Current transcript.
    #[serde(default)]
    pub transcript: Vec<MessageEntry>,
}

/// First event of a chat stream: the (possibly renamed) conversation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatStarted {
    /// Conversation name after the message was added.
    pub name: String,
    /// Live names, newest first.
    pub names: Vec<String>,
}

async fn list_names(
    State(state): State<Arc<AppState>>,
    owner: Owner,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let names = state.store.list_names(&owner).await.map_err(internal)?;
    Ok(Json(names))
}

async fn current_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
) -> Result<Json<ConversationOverview>, (StatusCode, String)> {
    let overview = state.store.overview(&owner).await.map_err(internal)?;
    Ok(Json(overview))
}

async fn with_names(
    state: &AppState,
    owner: &Owner,
    view: ConversationView,
) -> Result<Json<ConversationResponse>, (StatusCode, String)> {
    let names = state.store.list_names(owner).await.map_err(internal)?;
    Ok(Json(ConversationResponse {
        name: view.name,
        transcript: view.transcript,
        names,
    }))
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<CreateRequest>,
) -> Result<Json<ConversationResponse>, (StatusCode, String)> {
    let view = state
        .store
        .create(&owner, request.name.as_deref(), request.transcript.as_deref())
        .await
        .map_err(internal)?;
    with_names(&state, &owner, view).await
}

async fn select_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<NameRequest>,
) -> Result<Json<ConversationView>, (StatusCode, String)> {
    let view = state
        .store
        .get_by_name(&owner, &request.name)
        .await
        .map_err(internal)?;
    Ok(Json(view))
}

async fn update_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<UpdateRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .store
        .update(&owner, &request.name, &request.transcript)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, (StatusCode, String)> {
    let outcome = state
        .store
        .rename(&owner, &request.name, &request.new_name)
        .await
        .map_err(internal)?;
    let names = state.store.list_names(&owner).await.map_err(internal)?;
    Ok(Json(RenameResponse {
        name: outcome.name,
        notice: outcome.notice.map(|n| n.to_string()),
        names,
    }))
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<NameRequest>,
) -> Result<Json<ConversationResponse>, (StatusCode, String)> {
    let view = state
        .store
        .soft_delete(&owner, &request.name)
        .await
        .map_err(internal)?;
    with_names(&state, &owner, view).await
}

/// Add the user message, then stream transcript snapshots as server-sent events.
/// The transcript is persisted once the answer is done; a failed answer is not saved.
async fn chat(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, String)> {
    let view = state
        .store
        .append_user_message(&owner, &request.prompt, &request.name, request.transcript)
        .await
        .map_err(internal)?;
    let names = state.store.list_names(&owner).await.map_err(internal)?;

    let store = Arc::clone(&state.store);
    let mut snapshots = state.assembler.run(view.transcript);
    let name = view.name;

    let events = stream! {
        yield Event::default().event("conversation").json_data(ChatStarted {
            name: name.clone(),
            names,
        });

        while let Some(snapshot) = snapshots.next().await {
            let persisted = match snapshot.phase {
                StreamPhase::Done => store.update(&owner, &name, &snapshot.transcript).await,
                _ => Ok(()),
            };
            if let Err(err) = persisted {
                tracing::error!("Failed to persist conversation `{name}` for {owner}: {err}");
            }
            yield Event::default().event("snapshot").json_data(&snapshot);
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tokio_rusqlite::Connection;
    use tower::ServiceExt;

    use super::*;
    use crate::conversations::service::ConversationStore;
    use crate::conversations::store::SqliteConversationRepository;
    use crate::llm::oracle::{
        ChatMessage, ChatOracle, OracleError, OracleEvent, OracleFuture, OracleResult, OracleStream,
    };
    use crate::server::identity::{SESSION_HEADER, USER_HEADER};

    struct EchoOracle {
        fail: bool,
    }

    impl ChatOracle for EchoOracle {
        fn stream_chat(
            &self,
            history: Vec<ChatMessage>,
        ) -> OracleFuture<'_, OracleResult<OracleStream>> {
            let fail = self.fail || history.is_empty();
            Box::pin(async move {
                let events: Vec<OracleResult<OracleEvent>> = if fail {
                    vec![Err(OracleError::Remote("offline".to_string()))]
                } else {
                    vec![
                        Ok(OracleEvent::TextDelta("Hi ".to_string())),
                        Ok(OracleEvent::TextDelta("there".to_string())),
                    ]
                };
                let stream: OracleStream = Box::pin(futures::stream::iter(events));
                Ok(stream)
            })
        }
    }

    async fn app(fail: bool) -> (Router, Arc<AppState>) {
        let conn = Connection::open_in_memory().await.unwrap();
        let repo = SqliteConversationRepository::with_connection(Arc::new(conn), "conversations")
            .await
            .unwrap();
        let oracle = Arc::new(EchoOracle { fail });
        let state = AppState::new(
            ConversationStore::new(Arc::new(repo)),
            oracle,
            "test-model",
            concat!(env!("CARGO_MANIFEST_DIR"), "/static"),
        );
        (create_router(Arc::clone(&state)), state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(USER_HEADER, "alice")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[allow(dead_code)]
    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(USER_HEADER, "alice")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn alice() -> Owner {
        Owner::new("alice").unwrap()
    }

    #[tokio::test]
    async fn health_reports_model() {
        let (router, _) = app(false).await;
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("test-model"));
    }

    #[tokio::test]
    async fn serves_the_browser_page() {
        let (router, _) = app(false).await;
        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("/api/conversations/current"));
        assert!(page.contains("x-parlor-session"));
    }

    #[tokio::test]
    async fn requests_without_identity_are_rejected() {
        let (router, _) = app(false).await;
        let response = router
            .oneshot(Request::builder().uri("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_username_is_unauthorized_but_session_works() {
        let (router, _) = app(false).await;
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/conversations")
                    .header(USER_HEADER, "no")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/conversations/current")
                    .header(SESSION_HEADER, "anon-7f3a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let overview: ConversationOverview =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(overview.current.name, "New chat (1)");
    }

    #[tokio::test]
    async fn create_rename_and_delete_round() {
        let (router, _) = app(false).await;

        let response = router
            .clone()
            .oneshot(post_json("/api/conversations", serde_json::json!({})))
            .await
            .unwrap();
        let created: ConversationResponse =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(created.name, "New chat (1)");
        assert_eq!(created.names, vec!["New chat (1)"]);

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/conversations/rename",
                serde_json::json!({"name": "New chat (1)", "new_name": ""}),
            ))
            .await
            .unwrap();
        let refused: RenameResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(refused.name, "New chat (1)");
        assert_eq!(refused.notice.as_deref(), Some("The name can not be empty!"));

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/conversations/rename",
                serde_json::json!({"name": "New chat (1)", "new_name": "recipes"}),
            ))
            .await
            .unwrap();
        let renamed: RenameResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(renamed.name, "recipes");
        assert_eq!(renamed.names, vec!["recipes"]);

        let response = router
            .oneshot(post_json(
                "/api/conversations/delete",
                serde_json::json!({"name": "recipes"}),
            ))
            .await
            .unwrap();
        let after: ConversationResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(after.name, "New chat (1)");
        assert_eq!(after.names, vec!["New chat (1)"]);
    }

    #[tokio::test]
    async fn chat_streams_snapshots_and_persists_on_done() {
        let (router, state) = app(false).await;
        state.store.get_latest(&alice()).await.unwrap();

        let response = router
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"prompt": "say hi", "name": "New chat (1)", "transcript": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;

        assert_eq!(body.matches("event: conversation").count(), 1);
        assert_eq!(body.matches("event: snapshot").count(), 4);
        assert!(body.contains("\"phase\":\"done\""));

        let saved = state.store.get_by_name(&alice(), "say hi").await.unwrap();
        assert_eq!(saved.transcript.len(), 3);
        assert_eq!(saved.transcript[2], MessageEntry::assistant("Hi there"));
    }

    #[tokio::test]
    async fn failed_answer_is_not_persisted() {
        let (router, state) = app(true).await;
        state.store.get_latest(&alice()).await.unwrap();

        let response = router
            .oneshot(post_json(
                "/api/chat",
                serde_json::json!({"prompt": "hello", "name": "New chat (1)"}),
            ))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("\"phase\":\"failed\""));

        // Only the renaming first message was stored.
        let saved = state.store.get_by_name(&alice(), "hello").await.unwrap();
        assert_eq!(saved.transcript, vec![MessageEntry::user("hello")]);
    }
}

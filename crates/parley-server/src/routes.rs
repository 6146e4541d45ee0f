use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use parley_api::auth::{self, AppState};
use parley_api::middleware::require_auth;
use parley_api::{groups, messages, reactions, toxicity};
use parley_gateway::connection::{self, HandshakeQuery};
use parley_types::api::HealthResponse;

/// Assemble the HTTP and WebSocket surface.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/messages/send/{id}", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_messages))
        .route(
            "/messages/{id}/reactions",
            get(reactions::list_reactions)
                .post(reactions::add_reaction)
                .delete(reactions::remove_reaction),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/toxicity/analyze", post(toxicity::analyze))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        online: state.dispatcher.presence().len(),
    })
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<HandshakeQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_id = connection::resolve_identity(&query, &state.jwt_secret);
    if user_id.is_none() {
        warn!("gateway handshake without a resolvable identity; accepting unauthenticated");
    }
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, user_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use parley_api::{AppStateInner, MessagePipeline};
    use parley_classifier::{Classifier, ClassifierConfig, ToxicityMethod};
    use parley_crypto::ShiftCipher;
    use parley_db::Database;
    use parley_gateway::{Dispatcher, PresenceRegistry};

    use super::*;

    fn test_state() -> AppState {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new(PresenceRegistry::new());
        let classifier = Arc::new(
            Classifier::new(ClassifierConfig {
                method: ToxicityMethod::Keyword,
                enhanced_sentiment: false,
                ..ClassifierConfig::default()
            })
            .unwrap(),
        );
        let pipeline = MessagePipeline::new(
            db.clone(),
            classifier.clone(),
            ShiftCipher::new(4),
            dispatcher.clone(),
        );
        Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
            dispatcher,
            pipeline,
            classifier,
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> (String, String) {
        let (status, body) = call(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["userId"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_reports_online_count() {
        let app = build_router(test_state());
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "online": 0 }));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_router(test_state());
        let (status, body) = call(&app, Method::GET, "/groups", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn register_login_and_duplicate() {
        let app = build_router(test_state());
        let (user_id, _) = register(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "another pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, body) = call(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], user_id.as_str());

        let (status, _) = call(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn send_and_fetch_direct_messages() {
        let app = build_router(test_state());
        let (alice, alice_token) = register(&app, "alice").await;
        let (bob, bob_token) = register(&app, "bob").await;

        let (status, sent) = call(
            &app,
            Method::POST,
            &format!("/messages/send/{bob}"),
            Some(&alice_token),
            Some(json!({ "text": "  Hello  " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["text"], "Hello");
        assert_eq!(sent["senderId"], alice.as_str());
        assert_eq!(sent["receiverId"], bob.as_str());
        assert_eq!(sent["isEncrypted"], true);
        assert_eq!(sent["encryptionMethod"], "cipher");
        assert_eq!(sent["sentiment"], "neutral");

        let (status, history) =
            call(&app, Method::GET, &format!("/messages/{alice}"), Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().map(Vec::len), Some(1));
        assert_eq!(history[0]["text"], "Hello");
    }

    #[tokio::test]
    async fn pipeline_errors_become_structured_responses() {
        let app = build_router(test_state());
        let (_, token) = register(&app, "alice").await;
        let stranger = uuid::Uuid::new_v4();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/messages/send/{stranger}"),
            Some(&token),
            Some(json!({ "text": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_TARGET");
    }

    #[tokio::test]
    async fn extractor_failures_use_the_error_envelope() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (_, token) = register(&app, "alice").await;
        let (status, body) =
            call(&app, Method::GET, "/messages/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/messages/{}?groupId=nope", uuid::Uuid::new_v4()),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn group_messages_and_reactions() {
        let app = build_router(test_state());
        let (_, alice_token) = register(&app, "alice").await;
        let (bob, bob_token) = register(&app, "bob").await;

        let (status, group) = call(
            &app,
            Method::POST,
            "/groups",
            Some(&alice_token),
            Some(json!({ "name": "book club", "memberIds": [bob] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = group["id"].as_str().unwrap().to_string();
        assert_eq!(group["memberIds"].as_array().map(Vec::len), Some(2));

        let (status, sent) = call(
            &app,
            Method::POST,
            &format!("/messages/send/{group_id}"),
            Some(&alice_token),
            Some(json!({ "text": "chapter 3 tonight", "groupId": group_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["groupId"], group_id.as_str());
        let message_id = sent["id"].as_str().unwrap().to_string();

        let reactions_uri = format!("/messages/{message_id}/reactions");
        let (status, _) = call(&app, Method::POST, &reactions_uri, Some(&bob_token), Some(json!({ "type": "👍" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, reaction) = call(&app, Method::POST, &reactions_uri, Some(&bob_token), Some(json!({ "type": "❤️" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reaction["type"], "❤️");
        let (status, _) = call(&app, Method::POST, &reactions_uri, Some(&bob_token), Some(json!({ "type": "🦀" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, list) = call(&app, Method::GET, &reactions_uri, Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
        assert_eq!(list["summary"]["❤️"], json!([bob]));

        let (status, _) = call(&app, Method::DELETE, &reactions_uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &reactions_uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, history) = call(
            &app,
            Method::GET,
            &format!("/messages/{group_id}?groupId={group_id}"),
            Some(&bob_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history[0]["text"], "chapter 3 tonight");
    }

    #[tokio::test]
    async fn analyze_flags_toxic_text() {
        let app = build_router(test_state());
        let (_, token) = register(&app, "alice").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/toxicity/analyze",
            Some(&token),
            Some(json!({ "text": "you idiot" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "you idiot");
        assert_eq!(body["toxicity"]["isToxic"], true);
        assert_eq!(body["sentiment"]["value"], "negative");
    }
}

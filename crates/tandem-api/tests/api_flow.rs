//! End-to-end tests against the in-process router: real database, real
//! auth, scripted model seam.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tandem_api::{AppStateInner, router};
use tandem_db::Database;
use tandem_gateway::{AdventureConcept, DmReply, GatewayError, Narrator, Turn};
use tandem_pipeline::TurnPipeline;
use tandem_types::api::Claims;
use tandem_types::models::Lane;

const SECRET: &str = "test-secret";

struct ScriptedNarrator {
    fail_lane_two: bool,
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(
        &self,
        lane: Lane,
        _system_prompt: &str,
        _history: &[Turn],
        input: &str,
    ) -> DmReply {
        if self.fail_lane_two && lane == Lane::Two {
            DmReply::Degraded {
                model: "gemini-2.5-flash".into(),
            }
        } else {
            DmReply::Text(format!("dm{} answers: {}", lane.dm_version(), input))
        }
    }

    async fn improvise(&self) -> Result<AdventureConcept, GatewayError> {
        Ok(AdventureConcept {
            title: "The Hollow Crown".into(),
            prompt: "You are the DM for a wandering cleric.".into(),
        })
    }
}

fn app() -> Router {
    app_with(ScriptedNarrator {
        fail_lane_two: false,
    })
}

fn app_with(narrator: ScriptedNarrator) -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let narrator: Arc<dyn Narrator> = Arc::new(narrator);
    let state = Arc::new(AppStateInner {
        db: db.clone(),
        pipeline: TurnPipeline::new(db, narrator.clone()),
        narrator,
        jwt_secret: SECRET.into(),
    });
    router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
    let (status, _) = send(
        app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn lane_senders(messages: &[Value], lane: u64) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m["dm_version"] == lane)
        .map(|m| m["sender"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let app = app();

    let body = json!({ "username": "kaelen", "password": "pw123secure" });
    let (status, resp) = send(&app, "POST", "/register", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(resp["user_id"].is_string());

    let (status, _) = send(&app, "POST", "/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "ka", "password": "pw123secure" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "kaelen2", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app();
    register_and_login(&app, "kaelen", "pw123secure").await;

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "kaelen", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "pw123secure" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_is_401_and_bad_token_is_403() {
    let app = app();

    let (status, _) = send(&app, "GET", "/games", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/games", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Properly signed but expired
    let claims = Claims {
        sub: uuid::Uuid::new_v4(),
        username: "kaelen".into(),
        exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize,
    };
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _) = send(&app, "GET", "/games", Some(&expired), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn full_adventure_scenario() {
    let app = app();
    let token = register_and_login(&app, "kaelen", "pw123").await;

    // Create: snapshot carries one opening per lane
    let (status, created) = send(
        &app,
        "POST",
        "/games",
        Some(&token),
        Some(json!({ "title": "T", "system_prompt": "P" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["game"]["title"], "T");
    let openings = created["messages"].as_array().unwrap();
    assert_eq!(openings.len(), 2);
    assert!(openings.iter().all(|m| m["sender"] == "ai"));

    let game_id = created["game"]["id"].as_str().unwrap().to_string();

    // Act: transcript grows to 6 = 2 openings + 2 user + 2 ai
    let (status, acted) = send(
        &app,
        "POST",
        &format!("/games/{}/action", game_id),
        Some(&token),
        Some(json!({ "action": "open the door" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let responses = acted["responses"].as_array().unwrap();
    assert_eq!(responses.len(), 6);

    // History agrees with the action snapshot
    let (status, history) = send(
        &app,
        "GET",
        &format!("/games/{}/history", game_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = history.as_array().unwrap();
    assert_eq!(messages.len(), 6);

    for lane in [1, 2] {
        assert_eq!(lane_senders(messages, lane), ["ai", "user", "ai"]);
    }

    // The listing shows the one game
    let (status, games) = send(&app, "GET", "/games", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(games.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lane_two_degradation_still_returns_200() {
    let app = app_with(ScriptedNarrator {
        fail_lane_two: true,
    });
    let token = register_and_login(&app, "kaelen", "pw123secure").await;

    let (_, created) = send(
        &app,
        "POST",
        "/games",
        Some(&token),
        Some(json!({ "title": "T", "system_prompt": "P" })),
    )
    .await;
    let game_id = created["game"]["id"].as_str().unwrap().to_string();

    let (status, acted) = send(
        &app,
        "POST",
        &format!("/games/{}/action", game_id),
        Some(&token),
        Some(json!({ "action": "open the door" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let responses = acted["responses"].as_array().unwrap();
    let lane_one_reply = responses
        .iter()
        .filter(|m| m["dm_version"] == 1 && m["sender"] == "ai")
        .next_back()
        .unwrap();
    assert_eq!(lane_one_reply["text"], "dm1 answers: open the door");

    let lane_two_reply = responses
        .iter()
        .filter(|m| m["dm_version"] == 2 && m["sender"] == "ai")
        .next_back()
        .unwrap();
    assert!(
        lane_two_reply["text"]
            .as_str()
            .unwrap()
            .contains("lost contact with the material plane")
    );
}

#[tokio::test]
async fn games_are_invisible_across_users() {
    let app = app();
    let owner = register_and_login(&app, "kaelen", "pw123secure").await;
    let stranger = register_and_login(&app, "mira", "pw456secure").await;

    let (_, created) = send(
        &app,
        "POST",
        "/games",
        Some(&owner),
        Some(json!({ "title": "T", "system_prompt": "P" })),
    )
    .await;
    let game_id = created["game"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/games/{}/history", game_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{}/action", game_id),
        Some(&stranger),
        Some(json!({ "action": "loot everything" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/games/{}", game_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, games) = send(&app, "GET", "/games", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(games.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleted_game_history_is_not_found() {
    let app = app();
    let token = register_and_login(&app, "kaelen", "pw123secure").await;

    let (_, created) = send(
        &app,
        "POST",
        "/games",
        Some(&token),
        Some(json!({ "title": "T", "system_prompt": "P" })),
    )
    .await;
    let game_id = created["game"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/games/{}", game_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/games/{}/history", game_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_fields_are_rejected_before_any_model_call() {
    let app = app();
    let token = register_and_login(&app, "kaelen", "pw123secure").await;

    let (status, _) = send(
        &app,
        "POST",
        "/games",
        Some(&token),
        Some(json!({ "title": "  ", "system_prompt": "P" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = send(
        &app,
        "POST",
        "/games",
        Some(&token),
        Some(json!({ "title": "T", "system_prompt": "P" })),
    )
    .await;
    let game_id = created["game"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/games/{}/action", game_id),
        Some(&token),
        Some(json!({ "action": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn randomize_returns_a_structured_concept() {
    let app = app();
    let token = register_and_login(&app, "kaelen", "pw123secure").await;

    let (status, concept) = send(&app, "POST", "/games/randomize", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(concept["title"], "The Hollow Crown");
    assert!(concept["prompt"].as_str().unwrap().contains("DM"));
}

// End-to-end tests for the HTTP API: demon and player CRUD, progress
// updates, player stats and leaderboard ordering.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use demonlist_backend::api;
use demonlist_backend::scoring::points_for_rank;
use demonlist_backend::store::{JsonFileStore, MemoryStore, Repository};

fn test_app() -> Router {
    api::app(Repository::new(Arc::new(MemoryStore::new())), None)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_demon(app: &Router, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/demons",
        Some(json!({ "name": name, "creator": "Someone" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_player(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/api/players", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn set_progress(app: &Router, player_id: &str, demon_id: &str, progress: i64) -> Value {
    let (status, body) = send(
        app,
        "PUT",
        &format!("/api/players/{player_id}/demons"),
        Some(json!({ "demonId": demon_id, "progress": progress })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "progress update failed: {body}");
    body
}

// ── Service endpoints ────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/news", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    demonlist_backend::metrics::register_metrics();
    let app = test_app();
    send(&app, "GET", "/api/demons", None).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("demonlist_api_requests_total"));
}

// ── Demons ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_demon_defaults() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/demons",
        Some(json!({ "name": "Sonic Wave", "creator": "Cyclic" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("demon_"));
    assert_eq!(
        body["image"],
        "https://via.placeholder.com/240x135/333333/ffffff?text=Sonic%20Wave"
    );
    assert_eq!(body["videoUrl"], "");
    assert_eq!(body["description"], "");
    assert_eq!(body["createdAt"], body["updatedAt"]);
}

#[tokio::test]
async fn test_create_demon_requires_name_and_creator() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/api/demons", Some(json!({ "name": "Lonely" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name and creator are required");

    let (_, list) = send(&app, "GET", "/api/demons", None).await;
    assert!(list["demons"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_demons_in_rank_order() {
    let app = test_app();
    let a = create_demon(&app, "Tartarus").await;
    let b = create_demon(&app, "Acheron").await;

    let (status, body) = send(&app, "GET", "/api/demons", None).await;
    assert_eq!(status, StatusCode::OK);
    let demons = body["demons"].as_array().unwrap();
    assert_eq!(demons.len(), 2);
    assert_eq!(demons[0]["id"], a.as_str());
    assert_eq!(demons[0]["rank"], 1);
    assert_eq!(demons[0]["points"], 1000);
    assert_eq!(demons[1]["id"], b.as_str());
    assert_eq!(demons[1]["rank"], 2);
}

#[tokio::test]
async fn test_get_demon() {
    let app = test_app();
    let id = create_demon(&app, "Tartarus").await;

    let (status, body) = send(&app, "GET", &format!("/api/demons/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Tartarus");

    let (status, body) = send(&app, "GET", "/api/demons/demon_0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Demon not found");
}

#[tokio::test]
async fn test_update_demon_merges_fields() {
    let app = test_app();
    let id = create_demon(&app, "Tartarus").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/demons/{id}"),
        Some(json!({ "description": "Hard", "videoUrl": "https://example.com/v" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["name"], "Tartarus");
    assert_eq!(body["creator"], "Someone");
    assert_eq!(body["description"], "Hard");
    assert_eq!(body["videoUrl"], "https://example.com/v");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/demons/demon_0",
        Some(json!({ "name": "Nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_demon_shifts_ranks() {
    let app = test_app();
    let a = create_demon(&app, "First").await;
    let b = create_demon(&app, "Second").await;

    let (status, body) = send(&app, "DELETE", &format!("/api/demons/{a}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Demon deleted successfully");

    let (_, body) = send(&app, "GET", &format!("/api/demons/{b}"), None).await;
    assert_eq!(body["rank"], 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/demons/{a}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Players ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_player_defaults() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/api/players", Some(json!({ "name": "Zoink" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_str().unwrap().starts_with("player_"));
    assert_eq!(body["avatar"], "👤");
    assert_eq!(body["completedDemons"], json!([]));
    assert_eq!(body["progress"], json!({}));

    let (status, body) = send(&app, "POST", "/api/players", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name is required");
}

#[tokio::test]
async fn test_update_and_delete_player() {
    let app = test_app();
    let id = create_player(&app, "Zoink").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/players/{id}"),
        Some(json!({ "avatar": "🔥" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Zoink");
    assert_eq!(body["avatar"], "🔥");

    let (status, _) = send(&app, "DELETE", &format!("/api/players/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", &format!("/api/players/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Player not found");
}

#[tokio::test]
async fn test_progress_validation() {
    let app = test_app();
    let player = create_player(&app, "Zoink").await;
    let uri = format!("/api/players/{player}/demons");

    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "demonId": "demon_1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Demon ID and progress are required");

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "progress": 80 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for bad in [-1, 101] {
        let (status, body) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({ "demonId": "demon_1", "progress": bad })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Progress must be between 0 and 100");
    }

    let (status, _) = send(
        &app,
        "PUT",
        "/api/players/player_0/demons",
        Some(json!({ "demonId": "demon_1", "progress": 80 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let app = test_app();
    let player = create_player(&app, "Zoink").await;
    let uri = format!("/api/players/{player}/demons");

    // Wrong field type
    let (status, body) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "demonId": "demon_1", "progress": "80" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "expected JSON error, got {body}");

    let (status, body) = send(&app, "POST", "/api/demons", Some(json!({ "name": 7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/api/players")
        .header("content-type", "application/json")
        .body(Body::from("{ name: "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    // The player is untouched
    let (_, body) = send(&app, "GET", &format!("/api/players/{player}"), None).await;
    assert_eq!(body["progress"], json!({}));
}

#[tokio::test]
async fn test_progress_keeps_completed_list_in_step() {
    let app = test_app();
    let demon = create_demon(&app, "Tartarus").await;
    let player = create_player(&app, "Zoink").await;

    let body = set_progress(&app, &player, &demon, 75).await;
    assert_eq!(body["completedDemons"], json!([demon]));
    assert_eq!(body["progress"][&demon], 75);

    let again = set_progress(&app, &player, &demon, 75).await;
    assert_eq!(again["completedDemons"], body["completedDemons"]);
    assert_eq!(again["progress"], body["progress"]);

    let body = set_progress(&app, &player, &demon, 40).await;
    assert_eq!(body["completedDemons"], json!([]));
    assert_eq!(body["progress"][&demon], 40);
}

#[tokio::test]
async fn test_player_detail_stats() {
    let app = test_app();
    let a = create_demon(&app, "A").await;
    let b = create_demon(&app, "B").await;
    let _c = create_demon(&app, "C").await;
    let player = create_player(&app, "Zoink").await;
    set_progress(&app, &player, &a, 100).await;
    set_progress(&app, &player, &b, 60).await;

    let (status, body) = send(&app, "GET", &format!("/api/players/{player}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Zoink");
    assert_eq!(
        body["totalPoints"],
        points_for_rank(1) + points_for_rank(2) / 4
    );
    assert_eq!(body["completedCount"], 2);
    assert_eq!(body["hardestDemon"]["demon"]["id"], a.as_str());
    assert_eq!(body["averageRank"], 1.5);
    assert_eq!(body["rank"], 1);

    let completions = body["completions"].as_array().unwrap();
    assert_eq!(completions.len(), 2);
    assert_eq!(completions[0]["demon"]["id"], a.as_str());
    assert_eq!(completions[0]["points"], 1000);
    assert_eq!(completions[1]["demon"]["id"], b.as_str());
    assert_eq!(completions[1]["points"], 245);
    assert_eq!(completions[1]["progress"], 60);
}

#[tokio::test]
async fn test_player_without_completions() {
    let app = test_app();
    create_demon(&app, "A").await;
    let player = create_player(&app, "Newbie").await;

    let (_, body) = send(&app, "GET", &format!("/api/players/{player}"), None).await;
    assert_eq!(body["totalPoints"], 0);
    assert_eq!(body["completedCount"], 0);
    assert_eq!(body["hardestDemon"], Value::Null);
    assert_eq!(body["averageRank"], 0.0);
    assert_eq!(body["rank"], 1);
}

// ── Leaderboard ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_leaderboard_ties_and_unranked_players() {
    let app = test_app();
    let demon = create_demon(&app, "Only").await;
    let x = create_player(&app, "X").await;
    let y = create_player(&app, "Y").await;
    let z = create_player(&app, "Z").await;
    set_progress(&app, &x, &demon, 100).await;
    set_progress(&app, &y, &demon, 100).await;
    set_progress(&app, &z, &demon, 30).await;

    let (status, body) = send(&app, "GET", "/api/players", None).await;
    assert_eq!(status, StatusCode::OK);
    let players = body["players"].as_array().unwrap();
    let order: Vec<&str> = players.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(order, vec![x.as_str(), y.as_str(), z.as_str()]);
    assert_eq!(players[0]["totalPoints"], 1000);
    assert_eq!(players[2]["totalPoints"], 0);

    for (id, expected) in [(&x, 1), (&y, 2), (&z, 3)] {
        let (_, body) = send(&app, "GET", &format!("/api/players/{id}"), None).await;
        assert_eq!(body["rank"], expected, "rank of {id}");
    }
}

#[tokio::test]
async fn test_leaderboard_orders_by_points() {
    let app = test_app();
    let top = create_demon(&app, "Top").await;
    let second = create_demon(&app, "Second").await;
    let casual = create_player(&app, "Casual").await;
    let pro = create_player(&app, "Pro").await;
    set_progress(&app, &casual, &second, 100).await;
    set_progress(&app, &pro, &top, 100).await;
    set_progress(&app, &pro, &second, 100).await;

    let (_, body) = send(&app, "GET", "/api/players", None).await;
    let players = body["players"].as_array().unwrap();
    assert_eq!(players[0]["id"], pro.as_str());
    assert_eq!(players[0]["totalPoints"], 1980);
    assert_eq!(players[1]["id"], casual.as_str());
    assert_eq!(players[1]["totalPoints"], 980);
}

#[tokio::test]
async fn test_deleted_demon_drops_from_score() {
    let app = test_app();
    let a = create_demon(&app, "A").await;
    let b = create_demon(&app, "B").await;
    let player = create_player(&app, "Zoink").await;
    set_progress(&app, &player, &a, 100).await;
    set_progress(&app, &player, &b, 100).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/demons/{a}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/api/players/{player}"), None).await;
    assert_eq!(status, StatusCode::OK);
    // B is now the #1 demon; A's id stays in the stored list but scores nothing
    assert_eq!(body["totalPoints"], 1000);
    assert_eq!(body["completedCount"], 1);
    assert_eq!(body["completedDemons"], json!([a, b]));
}

// ── File-backed persistence ──────────────────────────────────────────

#[tokio::test]
async fn test_json_files_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::app(
        Repository::new(Arc::new(JsonFileStore::new(dir.path()))),
        None,
    );
    let demon = create_demon(&app, "Persistent").await;
    let player = create_player(&app, "Zoink").await;
    set_progress(&app, &player, &demon, 100).await;

    let text = std::fs::read_to_string(dir.path().join("demons.json")).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["demons"][0]["name"], "Persistent");

    // A fresh app over the same directory sees the same state
    let restarted = api::app(
        Repository::new(Arc::new(JsonFileStore::new(dir.path()))),
        None,
    );
    let (_, body) = send(&restarted, "GET", &format!("/api/players/{player}"), None).await;
    assert_eq!(body["totalPoints"], 1000);
}

#[tokio::test]
async fn test_corrupt_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("players.json"), "not json").unwrap();
    let app = api::app(
        Repository::new(Arc::new(JsonFileStore::new(dir.path()))),
        None,
    );
    let (status, body) = send(&app, "GET", "/api/players", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"], json!([]));
}

#[tokio::test]
async fn test_legacy_records_survive_a_create() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = json!({
        "players": [
            { "id": "player_1", "name": "Nulls", "progress": null },
            { "id": "player_2", "name": "Fraction", "completedDemons": ["d1"],
              "progress": { "d1": 75.5 } },
            { "id": "player_3", "name": "Broken", "progress": { "d1": [75] } }
        ]
    });
    std::fs::write(dir.path().join("players.json"), legacy.to_string()).unwrap();
    let app = api::app(
        Repository::new(Arc::new(JsonFileStore::new(dir.path()))),
        None,
    );

    let (_, body) = send(&app, "GET", "/api/players", None).await;
    assert_eq!(body["players"].as_array().unwrap().len(), 2);

    create_player(&app, "Newcomer").await;

    let text = std::fs::read_to_string(dir.path().join("players.json")).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    let stored = doc["players"].as_array().unwrap();
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0]["id"], "player_1");
    assert_eq!(stored[1]["progress"]["d1"], 75);
    // Unreadable entry is written back exactly as found
    assert_eq!(stored[2], legacy["players"][2]);
    assert_eq!(stored[3]["name"], "Newcomer");
    // No timestamps are made up for records that had none
    assert!(stored[0].get("createdAt").is_none());
}

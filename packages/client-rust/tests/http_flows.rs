//! End-to-end flows against an in-process fake of the CrossPoint API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crosspoint_client::{
    ClientConfig, CrossPoint, ErrorKind, ExploreCategory, StaticIdentity, ToggleOutcome,
};
use crosspoint_core::models::NewPlaylist;
use crosspoint_core::{GameId, User, UserId};
use parking_lot::Mutex;
use serde_json::{json, Value};

const TOKEN: &str = "integration-token";

#[derive(Debug, Clone)]
struct Hit {
    method: String,
    path: String,
    auth: Option<String>,
}

#[derive(Default)]
struct Backend {
    hits: Vec<Hit>,
    liked: Vec<u64>,
    playlists: Vec<Value>,
    next_playlist: u64,
}

#[derive(Clone, Default)]
struct Fake {
    inner: Arc<Mutex<Backend>>,
}

impl Fake {
    fn hits(&self, method: &str, path: &str) -> Vec<Hit> {
        self.inner
            .lock()
            .hits
            .iter()
            .filter(|h| h.method == method && h.path == path)
            .cloned()
            .collect()
    }
}

async fn record(State(fake): State<Fake>, req: Request, next: Next) -> Response {
    let auth = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    fake.inner.lock().hits.push(Hit {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        auth,
    });
    next.run(req).await
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Not authenticated"}))).into_response()
}

fn games(prefix: u64, n: usize) -> Vec<Value> {
    (0..n as u64)
        .map(|i| json!({"id": prefix + i, "name": format!("Game {}", prefix + i)}))
        .collect()
}

async fn explore(Path(slug): Path<String>, Query(q): Query<HashMap<String, String>>) -> Response {
    let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
    match slug.as_str() {
        "hidden-gems" => (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response(),
        "most-anticipated" => Json(json!([])).into_response(),
        "upcoming" => Json(json!(games(1000, limit))).into_response(),
        "trending" => Json(json!(games(2000, limit))).into_response(),
        _ => Json(json!({"results": games(3000, limit)})).into_response(),
    }
}

async fn search(Query(q): Query<HashMap<String, String>>) -> Response {
    let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(50);
    let total = 7;
    let shown = limit.min(total);
    Json(json!({"results": games(500, shown), "count": total})).into_response()
}

async fn game(Path(id): Path<u64>) -> Response {
    if id == 404 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "game not found"}))).into_response();
    }
    Json(json!({"id": id, "name": "Outer Wilds", "platforms": [{"id": 6, "name": "PC (Microsoft Windows)"}]}))
        .into_response()
}

async fn liked(State(fake): State<Fake>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let liked = fake.inner.lock().liked.contains(&id);
    Json(json!({"liked": liked})).into_response()
}

async fn like(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = body["game_id"].as_u64().unwrap_or_default();
    if id == 13 {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "internal error"})))
            .into_response();
    }
    fake.inner.lock().liked.push(id);
    Json(json!({"message": "liked"})).into_response()
}

async fn unlike(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = body["game_id"].as_u64().unwrap_or_default();
    fake.inner.lock().liked.retain(|g| *g != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn my_playlists(State(fake): State<Fake>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let playlists = fake.inner.lock().playlists.clone();
    Json(json!({"playlists": playlists})).into_response()
}

async fn create_playlist(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut backend = fake.inner.lock();
    backend.next_playlist += 1;
    let playlist = json!({
        "id": backend.next_playlist,
        "user_id": "user-1",
        "name": body["name"],
        "is_public": body["is_public"],
        "games": [],
    });
    backend.playlists.push(playlist.clone());
    Json(json!({"playlist": playlist})).into_response()
}

async fn add_game(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let game_id = body["game_id"].as_u64().unwrap_or_default();
    if game_id == 999 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "game not found"}))).into_response();
    }
    let mut backend = fake.inner.lock();
    if let Some(p) = backend.playlists.iter_mut().find(|p| p["id"] == id) {
        if let Some(games) = p["games"].as_array_mut() {
            games.push(json!({"game_id": game_id}));
        }
    }
    Json(json!({"message": "added"})).into_response()
}

async fn init_user(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"initialized": true})).into_response()
}

async fn serve() -> (SocketAddr, Fake) {
    let fake = Fake::default();
    let app = Router::new()
        .route("/games/explore/{slug}", get(explore))
        .route("/games/search", get(search))
        .route("/games/like", post(like).delete(unlike))
        .route("/games/{id}", get(game))
        .route("/games/{id}/liked", get(liked))
        .route("/playlists/me", get(my_playlists))
        .route("/playlists", post(create_playlist))
        .route("/playlists/{id}/games", post(add_game))
        .route("/users/me/init", post(init_user))
        .layer(middleware::from_fn_with_state(fake.clone(), record))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fake)
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::default().with_base_url(format!("http://{addr}/"))
}

async fn signed_in(addr: SocketAddr) -> CrossPoint {
    let user = User {
        uid: UserId("user-1".to_string()),
        email: Some("player@example.com".to_string()),
        display_name: None,
    };
    let client = CrossPoint::new(config(addr), Arc::new(StaticIdentity::signed_in(user, TOKEN)));
    client.start().await.unwrap();
    client
}

async fn anonymous(addr: SocketAddr) -> CrossPoint {
    let client = CrossPoint::new(config(addr), Arc::new(StaticIdentity::anonymous()));
    client.start().await.unwrap();
    client
}

#[tokio::test]
async fn like_commits_and_sends_bearer_token() {
    let (addr, fake) = serve().await;
    let client = signed_in(addr).await;

    let toggle = client.like_toggle(GameId(42)).await;
    assert!(!toggle.displayed());
    assert_eq!(toggle.like().await, ToggleOutcome::Committed(true));
    assert!(toggle.displayed());
    assert_eq!(toggle.error(), None);

    let hits = fake.hits("POST", "/games/like");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].auth.as_deref(), Some("Bearer integration-token"));

    let again = client.like_toggle(GameId(42)).await;
    assert!(again.displayed());
    assert_eq!(again.unlike().await, ToggleOutcome::Committed(false));
    client.shutdown().await;
}

#[tokio::test]
async fn failed_like_reverts_with_server_detail() {
    let (addr, _fake) = serve().await;
    let client = signed_in(addr).await;

    let toggle = client.like_toggle(GameId(13)).await;
    let outcome = toggle.like().await;
    assert_eq!(
        outcome,
        ToggleOutcome::Reverted {
            error: "internal error".to_string()
        }
    );
    assert!(!toggle.displayed());
    assert_eq!(toggle.error().as_deref(), Some("internal error"));
    client.shutdown().await;
}

#[tokio::test]
async fn anonymous_like_never_reaches_the_server() {
    let (addr, fake) = serve().await;
    let client = anonymous(addr).await;

    let toggle = client.like_toggle(GameId(42)).await;
    assert_eq!(toggle.like().await, ToggleOutcome::SignInRequired);
    assert!(!toggle.displayed());
    assert!(fake.hits("GET", "/games/42/liked").is_empty());
    assert!(fake.hits("POST", "/games/like").is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn created_playlist_shows_game_without_refetch() {
    let (addr, fake) = serve().await;
    let client = signed_in(addr).await;

    let mine = client.my_playlists();
    assert_eq!(mine.load().await.value, Some(Vec::new()));

    let picker = client.playlist_picker(GameId(101));
    picker.load().await.unwrap();
    let created = picker
        .create_and_add(NewPlaylist::new("  Favorites ", true))
        .await
        .unwrap();
    assert_eq!(created.name.as_deref(), Some("Favorites"));
    assert!(created.contains(GameId(101)));
    assert!(picker.is_marked(created.id));

    let listed = mine.current().value.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].contains(GameId(101)));
    // one from the list view, one from the picker
    assert_eq!(fake.hits("GET", "/playlists/me").len(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn failed_attach_keeps_new_playlist_without_game() {
    let (addr, _fake) = serve().await;
    let client = signed_in(addr).await;

    let picker = client.playlist_picker(GameId(999));
    picker.load().await.unwrap();
    let err = picker
        .create_and_add(NewPlaylist::new("Favorites", true))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "game not found");
    assert_eq!(err.status(), Some(404));

    let playlists = picker.playlists();
    assert_eq!(playlists.len(), 1);
    assert!(!playlists[0].contains(GameId(999)));
    assert!(!picker.is_marked(playlists[0].id));
    assert_eq!(picker.error().as_deref(), Some("game not found"));
    client.shutdown().await;
}

#[tokio::test]
async fn explore_renders_partial_results_with_fallback_error_text() {
    let (addr, _fake) = serve().await;
    let client = anonymous(addr).await;

    let data = client.explore_feed().load().await;
    assert!(!data.loading);
    assert_eq!(data.error.as_deref(), Some("Request failed with status 503"));
    assert_eq!(data.games(ExploreCategory::Upcoming).len(), 20);
    assert_eq!(data.games(ExploreCategory::Trending).len(), 20);
    assert_eq!(data.games(ExploreCategory::Recent).len(), 20);
    assert!(data.games(ExploreCategory::MostAnticipated).is_empty());
    assert!(data.games(ExploreCategory::HiddenGems).is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn search_grows_until_results_run_out() {
    let (addr, fake) = serve().await;
    let mut config = config(addr);
    config.search_page_size = 5;
    let client = CrossPoint::new(config, Arc::new(StaticIdentity::anonymous()));

    let mut pager = client.search("  zelda ");
    let first = pager.load().await.unwrap();
    assert_eq!(first.value.unwrap().results.len(), 5);
    assert!(pager.can_load_more());

    let second = pager.load_more().await.unwrap();
    assert_eq!(second.value.unwrap().results.len(), 7);
    assert!(!pager.can_load_more());
    assert_eq!(fake.hits("GET", "/games/search").len(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn authenticated_calls_map_missing_token_and_server_errors() {
    let (addr, fake) = serve().await;
    let client = anonymous(addr).await;

    let err = client.api().my_playlists().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert!(fake.hits("GET", "/playlists/me").is_empty());

    let err = client.api().game(GameId(404)).await.unwrap_err();
    assert_eq!(err.to_string(), "game not found");

    let game = client.api().game(GameId(7)).await.unwrap();
    assert_eq!(game.title(), "Outer Wilds");
    assert_eq!(game.platform_labels(), vec!["PC".to_string()]);
    client.shutdown().await;
}

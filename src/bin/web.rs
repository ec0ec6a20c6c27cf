//! Single binary admin/read surface for the bracket controller and the
//! rating ladders, REST over actix-web.
//! Run with: cargo run --bin web
//! Override with env: HOST (e.g. 0.0.0.0), PORT (e.g. 8080), DATA_DIR
//! (tournament + ladder files, default "data"), TOURNEY_CONFIG (defaults
//! JSON, default "tourney.json").

use actix_web::{
    get, post,
    web::{Data, Json, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use battle_ladder_web::{load_defaults, BracketController, BracketError, LadderRegistry};
use serde::Deserialize;
use std::path::PathBuf;

/// Shared state: the single bracket controller plus the ladder registry.
struct AppState {
    controller: BracketController,
    ladders: LadderRegistry,
}

type State = Data<AppState>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct CreateTournamentBody {
    format: String,
    players: Vec<String>,
    #[serde(default = "default_best_of")]
    best_of: u32,
    /// Shuffle the entrants before seeding.
    #[serde(default)]
    shuffle: bool,
}

fn default_best_of() -> u32 {
    3
}

#[derive(Deserialize)]
struct BattleResultBody {
    winner: String,
    loser: String,
}

#[derive(Deserialize)]
struct ForceWinBody {
    winner: String,
}

#[derive(Deserialize)]
struct MatchCheckQuery {
    p1: String,
    p2: String,
}

#[derive(Deserialize)]
struct LadderResultBody {
    p1: String,
    p2: String,
    /// p1's result: 1 win, 0 loss, 0.5 tie; negative invalidates the battle.
    p1score: f64,
}

#[derive(Deserialize)]
struct TopQuery {
    prefix: Option<String>,
}

fn admin_error(e: BracketError) -> HttpResponse {
    match e {
        BracketError::Storage(_) => {
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }))
        }
        _ => HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() })),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "battle-ladder-web",
    })
}

/// Create a tournament (admin).
#[post("/api/tournament")]
async fn api_create(state: State, body: Json<CreateTournamentBody>) -> HttpResponse {
    match state
        .controller
        .initialize(&body.format, &body.players, body.best_of, body.shuffle)
    {
        Ok(()) => HttpResponse::Ok().body(state.controller.status()),
        Err(e) => admin_error(e),
    }
}

/// Clear the tournament and its file (admin).
#[post("/api/tournament/reset")]
async fn api_reset(state: State) -> HttpResponse {
    match state.controller.reset() {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => admin_error(e),
    }
}

/// Stop advancement until resume (admin).
#[post("/api/tournament/freeze")]
async fn api_freeze(state: State) -> HttpResponse {
    match state.controller.freeze() {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => admin_error(e),
    }
}

/// Unfreeze and place blocked winners (admin).
#[post("/api/tournament/resume")]
async fn api_resume(state: State) -> HttpResponse {
    match state.controller.resume() {
        Ok(()) => HttpResponse::Ok().body(state.controller.status()),
        Err(e) => admin_error(e),
    }
}

/// End a player's series immediately (admin).
#[post("/api/tournament/force-win")]
async fn api_force_win(state: State, body: Json<ForceWinBody>) -> HttpResponse {
    match state.controller.force_win(&body.winner) {
        Ok(()) => HttpResponse::Ok().body(state.controller.status()),
        Err(e) => admin_error(e),
    }
}

/// Battle-end hook: report a bracket battle winner. Always 200; unknown
/// pairings are logged server-side.
#[post("/api/tournament/result")]
async fn api_result(state: State, body: Json<BattleResultBody>) -> HttpResponse {
    state.controller.record_win(&body.winner, &body.loser);
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

/// Human-readable bracket overview.
#[get("/api/tournament/status")]
async fn api_status(state: State) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(state.controller.status())
}

#[get("/api/tournament/initialized")]
async fn api_initialized(state: State) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "initialized": state.controller.is_initialized(),
        "frozen": state.controller.is_frozen(),
    }))
}

/// May these two battle each other right now?
#[get("/api/tournament/can-match")]
async fn api_can_match(state: State, query: Query<MatchCheckQuery>) -> HttpResponse {
    let ok = state.controller.can_match(&query.p1, &query.p2);
    HttpResponse::Ok().json(serde_json::json!({ "canMatch": ok }))
}

#[get("/api/tournament/can-search/{user}")]
async fn api_can_search(state: State, path: Path<String>) -> HttpResponse {
    let ok = state.controller.can_search(&path);
    HttpResponse::Ok().json(serde_json::json!({ "canSearch": ok }))
}

#[get("/api/tournament/opponent/{user}")]
async fn api_opponent(state: State, path: Path<String>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "opponent": state.controller.opponent_of(&path) }))
}

/// A player's current ELO on one format's ladder (1000 when unrated).
#[get("/api/ladder/{format}/rating/{user}")]
async fn api_ladder_rating(state: State, path: Path<(String, String)>) -> HttpResponse {
    let (format, user) = path.into_inner();
    let store = state.ladders.get(&format);
    HttpResponse::Ok().json(serde_json::json!({
        "format": store.format(),
        "user": user,
        "elo": store.rating(&user),
    }))
}

/// Battle-end hook: submit a finished rated battle.
#[post("/api/ladder/{format}/result")]
async fn api_ladder_result(
    state: State,
    path: Path<String>,
    body: Json<LadderResultBody>,
) -> HttpResponse {
    let store = state.ladders.get(&path);
    let mut lines: Vec<String> = Vec::new();
    let (score, p1_elo, p2_elo) = store.update_rating(&body.p1, &body.p2, body.p1score, &mut lines);
    HttpResponse::Ok().json(serde_json::json!({
        "p1score": score,
        "p1elo": p1_elo,
        "p2elo": p2_elo,
        "messages": lines,
    }))
}

/// Toplist as an HTML block, optionally filtered by id prefix.
#[get("/api/ladder/{format}/top")]
async fn api_ladder_top(state: State, path: Path<String>, query: Query<TopQuery>) -> HttpResponse {
    let store = state.ladders.get(&path);
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(store.top_html(query.prefix.as_deref()))
}

/// One player's rating summary row (empty body when unrated).
#[get("/api/ladder/{format}/user/{user}")]
async fn api_ladder_user(state: State, path: Path<(String, String)>) -> HttpResponse {
    let (format, user) = path.into_inner();
    let store = state.ladders.get(&format);
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(store.user_html(&user))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| default_host());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(default_port);
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let config_path = PathBuf::from(
        std::env::var("TOURNEY_CONFIG").unwrap_or_else(|_| "tourney.json".to_string()),
    );

    let defaults = load_defaults(&config_path);
    let controller = BracketController::new(data_dir.join("tournament.csv"), defaults);
    controller.load_or_initialize();
    let state = Data::new(AppState {
        controller,
        ladders: LadderRegistry::new(data_dir.join("ladders")),
    });

    let bind = (host.as_str(), port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(api_health)
            .service(api_create)
            .service(api_reset)
            .service(api_freeze)
            .service(api_resume)
            .service(api_force_win)
            .service(api_result)
            .service(api_status)
            .service(api_initialized)
            .service(api_can_match)
            .service(api_can_search)
            .service(api_opponent)
            .service(api_ladder_rating)
            .service(api_ladder_result)
            .service(api_ladder_top)
            .service(api_ladder_user)
    })
    .bind(bind)?
    .run()
    .await
}

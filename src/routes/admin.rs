use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    dto::{
        admin::{
            ActionResponse, AddPlayerRequest, AddTeamRequest, ImportParams, IndexResponse,
            NextStepResponse, PassRequest, PlayerCreatedResponse, PressOutcomeResponse,
            SelectLadderTeamRequest, SetRoundsRequest, SimulatedPressRequest, StandingsResponse,
            StartRoundParams, StealRequest, TeamCreatedResponse,
        },
        game::{CreateGameRequest, GameListItem, GameSummary, StoredGameItem},
        sse::{AnswerRevealedEvent, BombExplodedEvent, LadderBankedEvent, StealExecutedEvent},
    },
    error::AppError,
    services::{admin_service, game_service, sse_service},
    state::{
        SharedState,
        game::{GameSettings, RoundResult},
    },
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only management endpoints for configuring and driving games.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/games", get(list_games).post(create_game))
        .route("/admin/games/stored", get(list_stored_games))
        .route("/admin/games/import", post(import_game))
        .route("/admin/games/{id}", get(get_game).delete(delete_game))
        .route("/admin/games/{id}/export", get(export_game))
        .route("/admin/games/{id}/load", post(load_game))
        .route("/admin/games/{id}/settings", put(update_settings))
        .route("/admin/games/{id}/teams", post(add_team))
        .route("/admin/games/{id}/teams/{team_id}", delete(remove_team))
        .route("/admin/games/{id}/teams/{team_id}/players", post(add_player))
        .route("/admin/games/{id}/rounds", put(set_rounds))
        .route("/admin/games/{id}/setup", post(begin_setup))
        .route("/admin/games/{id}/start", post(start_game))
        .route("/admin/games/{id}/rounds/start", post(start_round))
        .route("/admin/games/{id}/questions/start", post(start_question))
        .route("/admin/games/{id}/press", post(simulate_press))
        .route("/admin/games/{id}/reveal", post(reveal))
        .route("/admin/games/{id}/show-points", post(show_points))
        .route("/admin/games/{id}/next", post(next))
        .route("/admin/games/{id}/end-round", post(end_round))
        .route("/admin/games/{id}/retry-round", post(retry_round))
        .route("/admin/games/{id}/pause", post(pause_game))
        .route("/admin/games/{id}/resume", post(resume_game))
        .route("/admin/games/{id}/end", post(end_game))
        .route("/admin/games/{id}/ladder/bank", post(bank))
        .route("/admin/games/{id}/ladder/team", post(select_ladder_team))
        .route("/admin/games/{id}/bomb/pass", post(pass_bomb))
        .route("/admin/games/{id}/bomb/explode", post(explode_bomb))
        .route("/admin/games/{id}/steal/begin", post(begin_steal))
        .route("/admin/games/{id}/steal", post(steal))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

fn done(message: &str) -> Json<ActionResponse> {
    Json(ActionResponse {
        message: message.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

/// List the games hosted in memory.
#[utoipa::path(
    get,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Hosted games", body = [GameListItem]))
)]
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<GameListItem>> {
    Json(game_service::list_games(&state))
}

/// Create and host a new game.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameSummary),
        (status = 400, description = "Invalid payload or too many hosted games")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::create_game(&state, payload)?))
}

/// List the games known to the storage backend.
#[utoipa::path(
    get,
    path = "/admin/games/stored",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Stored games", body = [StoredGameItem]),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_stored_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<StoredGameItem>>, AppError> {
    Ok(Json(game_service::list_stored_games(&state).await?))
}

/// Host a game from an exported snapshot.
#[utoipa::path(
    post,
    path = "/admin/games/import",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ImportParams
    ),
    request_body = GameEntity,
    responses(
        (status = 200, description = "Game imported", body = GameSummary),
        (status = 409, description = "Game already hosted")
    )
)]
pub async fn import_game(
    State(state): State<SharedState>,
    Query(params): Query<ImportParams>,
    Json(payload): Json<GameEntity>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::import_snapshot(
        &state,
        payload,
        params.replace,
    )?))
}

/// Retrieve the summary of a hosted game.
#[utoipa::path(
    get,
    path = "/admin/games/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game", body = GameSummary))
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::game_summary(&state, id)?))
}

/// Stop hosting a game and delete its stored snapshot.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game to delete")),
    responses((status = 204, description = "Game deleted"))
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    game_service::delete_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Export the full snapshot of a hosted game, answers included.
#[utoipa::path(
    get,
    path = "/admin/games/{id}/export",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game snapshot", body = GameEntity))
)]
pub async fn export_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameEntity>, AppError> {
    Ok(Json(game_service::export_snapshot(&state, id)?))
}

/// Host a stored game.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/load",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game to load")),
    responses((status = 200, description = "Game loaded", body = GameSummary))
)]
pub async fn load_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::load_game(&state, id).await?))
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Replace the timing settings of a game.
#[utoipa::path(
    put,
    path = "/admin/games/{id}/settings",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = GameSettings,
    responses((status = 200, description = "Settings updated", body = ActionResponse))
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GameSettings>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::update_settings(&state, id, payload)?;
    Ok(done("settings updated"))
}

/// Add a team to a game.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/teams",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = AddTeamRequest,
    responses((status = 200, description = "Team created", body = TeamCreatedResponse))
)]
pub async fn add_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddTeamRequest>>,
) -> Result<Json<TeamCreatedResponse>, AppError> {
    Ok(Json(admin_service::add_team(&state, id, payload)?))
}

/// Remove a team and its players.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}/teams/{team_id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game"),
    ("team_id" = String, Path, description = "Identifier of the team to remove")),
    responses((status = 204, description = "Team removed"))
)]
pub async fn remove_team(
    State(state): State<SharedState>,
    Path((id, team_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    admin_service::remove_team(&state, id, team_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bind a player of a team to a controller slot.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/teams/{team_id}/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game"),
    ("team_id" = String, Path, description = "Identifier of the team")),
    request_body = AddPlayerRequest,
    responses((status = 200, description = "Player created", body = PlayerCreatedResponse))
)]
pub async fn add_player(
    State(state): State<SharedState>,
    Path((id, team_id)): Path<(Uuid, Uuid)>,
    Valid(Json(payload)): Valid<Json<AddPlayerRequest>>,
) -> Result<Json<PlayerCreatedResponse>, AppError> {
    Ok(Json(admin_service::add_player(&state, id, team_id, payload)?))
}

/// Replace the rounds of a game.
#[utoipa::path(
    put,
    path = "/admin/games/{id}/rounds",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = SetRoundsRequest,
    responses((status = 200, description = "Rounds replaced", body = ActionResponse))
)]
pub async fn set_rounds(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SetRoundsRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::set_rounds(&state, id, payload)?;
    Ok(done("rounds updated"))
}

/// Move a game from the lobby into setup.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/setup",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game in setup", body = ActionResponse))
)]
pub async fn begin_setup(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::begin_setup(&state, id)?;
    Ok(done("game in setup"))
}

/// Start playing a configured game.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game started", body = ActionResponse),
        (status = 400, description = "Game has no players or no rounds")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::start_game(&state, id)?;
    Ok(done("game started"))
}

// ---------------------------------------------------------------------------
// Gameplay
// ---------------------------------------------------------------------------

/// Activate a round.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/rounds/start",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the game"),
        StartRoundParams
    ),
    responses((status = 200, description = "Round started", body = IndexResponse))
)]
pub async fn start_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(params): Query<StartRoundParams>,
) -> Result<Json<IndexResponse>, AppError> {
    Ok(Json(admin_service::start_round(
        &state,
        id,
        params.round_index,
    )?))
}

/// Put the next question of the active round on screen.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/questions/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Question started", body = IndexResponse))
)]
pub async fn start_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexResponse>, AppError> {
    Ok(Json(admin_service::start_question(&state, id)?))
}

/// Inject a controller press.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/press",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = SimulatedPressRequest,
    responses((status = 200, description = "Press handled", body = PressOutcomeResponse))
)]
pub async fn simulate_press(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SimulatedPressRequest>>,
) -> Result<Json<PressOutcomeResponse>, AppError> {
    Ok(Json(admin_service::simulate_press(&state, id, payload)?))
}

/// Reveal the answer of the current question and commit staged points.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/reveal",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Answer revealed", body = AnswerRevealedEvent),
        (status = 409, description = "Answer already revealed")
    )
)]
pub async fn reveal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnswerRevealedEvent>, AppError> {
    Ok(Json(admin_service::reveal(&state, id)?))
}

/// Show the scoreboard after a reveal.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/show-points",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Points shown", body = StandingsResponse))
)]
pub async fn show_points(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StandingsResponse>, AppError> {
    Ok(Json(admin_service::show_points(&state, id)?))
}

/// Move on to the next question, round or the end of the game.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/next",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Next step", body = NextStepResponse))
)]
pub async fn next(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NextStepResponse>, AppError> {
    Ok(Json(admin_service::next(&state, id)?))
}

/// Close the active round.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/end-round",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Round ended", body = RoundResult))
)]
pub async fn end_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundResult>, AppError> {
    Ok(Json(admin_service::end_round(&state, id)?))
}

/// Replay the active round from its first question, restoring the scores it started with.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/retry-round",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Round restarted", body = IndexResponse))
)]
pub async fn retry_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IndexResponse>, AppError> {
    Ok(Json(admin_service::retry_round(&state, id)?))
}

/// Pause a game, cancelling its timers.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/pause",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game paused", body = ActionResponse))
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::pause(&state, id)?;
    Ok(done("game paused"))
}

/// Resume a paused game.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/resume",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game resumed", body = ActionResponse))
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::resume(&state, id)?;
    Ok(done("game resumed"))
}

/// Finish a game and publish the final standings.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Game over", body = StandingsResponse))
)]
pub async fn end_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StandingsResponse>, AppError> {
    Ok(Json(admin_service::end_game(&state, id)?))
}

// ---------------------------------------------------------------------------
// Archetype operations
// ---------------------------------------------------------------------------

/// Bank the unbanked ladder points.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/ladder/bank",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Points banked", body = LadderBankedEvent))
)]
pub async fn bank(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LadderBankedEvent>, AppError> {
    Ok(Json(admin_service::bank(&state, id)?))
}

/// Choose the team climbing the ladder.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/ladder/team",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = SelectLadderTeamRequest,
    responses((status = 200, description = "Ladder team selected", body = ActionResponse))
)]
pub async fn select_ladder_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectLadderTeamRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::select_ladder_team(&state, id, payload.team_id)?;
    Ok(done("ladder team selected"))
}

/// Hand the bomb to a player.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/bomb/pass",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = PassRequest,
    responses((status = 200, description = "Bomb passed", body = ActionResponse))
)]
pub async fn pass_bomb(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PassRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::pass(&state, id, payload.player_id)?;
    Ok(done("bomb passed"))
}

/// Detonate the bomb now.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/bomb/explode",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Bomb exploded", body = BombExplodedEvent))
)]
pub async fn explode_bomb(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BombExplodedEvent>, AppError> {
    Ok(Json(admin_service::explode(&state, id)?))
}

/// Open the steal choice for the team that answered.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/steal/begin",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    responses((status = 200, description = "Steal phase opened", body = ActionResponse))
)]
pub async fn begin_steal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::begin_steal(&state, id)?;
    Ok(done("steal phase opened"))
}

/// Steal points from a team.
#[utoipa::path(
    post,
    path = "/admin/games/{id}/steal",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the game")),
    request_body = StealRequest,
    responses((status = 200, description = "Points stolen", body = StealExecutedEvent))
)]
pub async fn steal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StealRequest>,
) -> Result<Json<StealExecutedEvent>, AppError> {
    Ok(Json(admin_service::steal(&state, id, payload.target_team_id)?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    sse_service::ensure_admin_token(&state, provided).await?;
    Ok(next.run(req).await)
}

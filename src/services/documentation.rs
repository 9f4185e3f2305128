use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the trivia show backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::list_games,
        crate::routes::public::get_game_state,
        crate::routes::public::get_scoreboard,
        crate::routes::public::get_palette,
        crate::routes::admin::list_games,
        crate::routes::admin::create_game,
        crate::routes::admin::list_stored_games,
        crate::routes::admin::import_game,
        crate::routes::admin::get_game,
        crate::routes::admin::delete_game,
        crate::routes::admin::export_game,
        crate::routes::admin::load_game,
        crate::routes::admin::update_settings,
        crate::routes::admin::add_team,
        crate::routes::admin::remove_team,
        crate::routes::admin::add_player,
        crate::routes::admin::set_rounds,
        crate::routes::admin::begin_setup,
        crate::routes::admin::start_game,
        crate::routes::admin::start_round,
        crate::routes::admin::start_question,
        crate::routes::admin::simulate_press,
        crate::routes::admin::reveal,
        crate::routes::admin::show_points,
        crate::routes::admin::next,
        crate::routes::admin::end_round,
        crate::routes::admin::retry_round,
        crate::routes::admin::pause_game,
        crate::routes::admin::resume_game,
        crate::routes::admin::end_game,
        crate::routes::admin::bank,
        crate::routes::admin::select_ladder_team,
        crate::routes::admin::pass_bomb,
        crate::routes::admin::explode_bomb,
        crate::routes::admin::begin_steal,
        crate::routes::admin::steal,
    ),
    components(
        schemas(
            crate::dto::ws::ControllerInboundMessage,
            crate::dto::ws::ControllerAck,
            crate::dto::ws::PressFeedback,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::BuzzAcceptedEvent,
            crate::dto::sse::QuestionStartedEvent,
            crate::dto::sse::AnswerReceivedEvent,
            crate::dto::sse::PointsShownEvent,
            crate::dto::sse::RoundStartedEvent,
            crate::dto::sse::RoundRetriedEvent,
            crate::dto::sse::RoundEndedEvent,
            crate::dto::sse::LadderRungChangedEvent,
            crate::dto::sse::BombTickEvent,
            crate::dto::sse::BombPassedEvent,
            crate::dto::sse::StealPhaseChangedEvent,
            crate::dto::sse::TimerTickEvent,
            crate::dto::sse::TimeUpEvent,
            crate::dto::sse::GameOverEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "controllers", description = "WebSocket endpoint for controller hubs"),
        (name = "public", description = "Read-only views for screens"),
        (name = "admin", description = "Game setup and host controls"),
    )
)]
pub struct ApiDoc;

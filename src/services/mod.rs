/// Admin helpers driving one engine operation per route.
pub mod admin_service;
/// Timers derived from the phase of a game.
pub mod auto_advance;
/// Buzz arbitration per round archetype.
pub mod buzz_arbiter;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game engine operations.
pub mod engine;
/// Façade serialising mutations of hosted games.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Public service for read-only game information.
pub mod public_service;
/// Point values per archetype.
pub mod scoring;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events subscriptions.
pub mod sse_service;
/// Storage connection supervisor.
pub mod storage_supervisor;
/// Named per-game timers.
pub mod timers;
/// Controller hub WebSocket handling.
pub mod websocket_service;

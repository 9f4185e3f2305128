use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// A subscription ready to be turned into an SSE response.
pub struct Subscription {
    receiver: broadcast::Receiver<ServerEvent>,
    handshake: ServerEvent,
    filter: Option<Uuid>,
    kind: StreamKind,
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Carries the shared state so teardown can release the admin token.
    Admin(SharedState),
}

/// Subscribe to the public stream, optionally restricted to one game.
pub fn subscribe_public(
    state: &SharedState,
    filter: Option<Uuid>,
) -> Result<Subscription, ServiceError> {
    let handshake = handshake_event("public", state.is_degraded(), None)?;
    Ok(Subscription {
        receiver: state.public_sse().subscribe(),
        handshake,
        filter,
        kind: StreamKind::Public,
    })
}

/// Subscribe to the admin stream, claiming the admin token.
pub async fn subscribe_admin(
    state: &SharedState,
    filter: Option<Uuid>,
) -> Result<Subscription, ServiceError> {
    let token = claim_admin_token(state).await?;
    let handshake = match handshake_event("admin", state.is_degraded(), Some(token)) {
        Ok(event) => event,
        Err(err) => {
            reset_admin_token(state.clone()).await;
            return Err(err);
        }
    };
    Ok(Subscription {
        receiver: state.admin_sse().subscribe(),
        handshake,
        filter,
        kind: StreamKind::Admin(state.clone()),
    })
}

fn handshake_event(
    stream: &str,
    degraded: bool,
    token: Option<String>,
) -> Result<ServerEvent, ServiceError> {
    ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            stream: stream.to_string(),
            message: format!("{stream} stream connected"),
            degraded,
            token,
        },
    )
    .map_err(|err| ServiceError::InvalidState(format!("failed to encode handshake: {err}")))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a subscription into an SSE response, forwarding matching events
/// and cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        handshake,
        filter,
        kind,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake))).await.is_ok() {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    recv_result = receiver.recv() => {
                        match recv_result {
                            Ok(payload) => {
                                if !payload.matches(filter) {
                                    continue;
                                }
                                if tx.send(Ok(to_event(payload))).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Closed) => break,
                            Err(RecvError::Lagged(skipped)) => {
                                debug!(skipped, "SSE subscriber lagging, events skipped");
                                continue;
                            }
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!(game_id = ?filter, "public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                info!(game_id = ?filter, "admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, generating one when none exists
/// and failing if another connection already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Check a token presented by an admin request against the active admin stream.
pub async fn ensure_admin_token(
    state: &SharedState,
    provided: Option<&str>,
) -> Result<(), ServiceError> {
    let provided = provided.ok_or_else(|| {
        ServiceError::Unauthorized("missing admin token header `X-Admin-Token`".into())
    })?;
    let guard = state.admin_token().lock().await;
    match guard.as_deref() {
        Some(token) if token == provided => Ok(()),
        Some(_) => Err(ServiceError::Unauthorized("invalid admin token".into())),
        None => Err(ServiceError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}

/// Clear any stored admin token so the next admin connection negotiates a
/// fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn only_one_admin_stream_at_a_time() {
        let state = AppState::new(AppConfig::default());
        let subscription = subscribe_admin(&state, None).await.unwrap();
        let handshake: serde_json::Value =
            serde_json::from_str(&subscription.handshake.data).unwrap();
        let token = handshake["token"].as_str().unwrap().to_string();
        assert_eq!(handshake["degraded"], true);

        assert!(matches!(
            subscribe_admin(&state, None).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(ensure_admin_token(&state, Some(&token)).await.is_ok());
        assert!(ensure_admin_token(&state, Some("nope")).await.is_err());
        assert!(ensure_admin_token(&state, None).await.is_err());

        reset_admin_token(state.clone()).await;
        assert!(ensure_admin_token(&state, Some(&token)).await.is_err());
        assert!(subscribe_admin(&state, None).await.is_ok());
    }

    #[tokio::test]
    async fn public_handshake_carries_no_token() {
        let state = AppState::new(AppConfig::default());
        let subscription = subscribe_public(&state, Some(Uuid::nil())).unwrap();
        let handshake: serde_json::Value =
            serde_json::from_str(&subscription.handshake.data).unwrap();
        assert_eq!(handshake["stream"], "public");
        assert!(handshake.get("token").is_none());
        assert_eq!(subscription.filter, Some(Uuid::nil()));
    }
}

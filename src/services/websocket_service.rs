use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ControllerAck, ControllerInboundMessage, PressFeedback},
    error::ServiceError,
    services::{
        engine::{Button, PressAction, PressOutcome},
        game_service,
    },
    state::{ControllerConnection, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while serving one controller hub connection.
#[derive(Debug, Error)]
enum HubError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Frame could not be parsed.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// First frame of the connection was something else than an identification.
    #[error("first message was not identification")]
    NotIdentified,
    /// Identification named a game that is not hosted.
    #[error("unknown game `{0}`")]
    UnknownGame(Uuid),
}

/// Handle the full lifecycle of a controller hub WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let game_id = match identify(&state, &initial_message) {
        Ok(game_id) => game_id,
        Err(err) => {
            warn!(error = %err, "controller hub identification rejected");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    state.controllers().insert(
        connection_id,
        ControllerConnection {
            game_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(connection_id = %connection_id, game_id = %game_id, "controller hub connected");

    let ack = ControllerAck {
        game_id,
        status: "identified".into(),
    };
    if send_message_to_websocket(&outbound_tx, &ack).is_err() {
        info!(connection_id = %connection_id, "connection closed during acknowledgement, terminating");
        state.controllers().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection_id, payload = %text, "received controller message");

                match serde_json::from_str::<ControllerInboundMessage>(&text) {
                    Ok(ControllerInboundMessage::Press {
                        slot,
                        button,
                        action,
                        timestamp_ms,
                    }) => {
                        let feedback =
                            handle_press(&state, game_id, slot, button, action, timestamp_ms);
                        if let Some(feedback) = feedback
                            && send_message_to_websocket(&outbound_tx, &feedback).is_err()
                        {
                            info!(connection_id = %connection_id, "connection closed during press feedback, terminating");
                            break;
                        }
                    }
                    Ok(ControllerInboundMessage::Identification { .. }) => {
                        warn!(connection_id = %connection_id, "ignoring duplicate identification message");
                    }
                    Ok(ControllerInboundMessage::Unknown) => {
                        debug!(connection_id = %connection_id, "ignoring unknown controller message");
                    }
                    Err(err) => {
                        warn!(connection_id = %connection_id, error = %err, "failed to parse controller message");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection_id = %connection_id, "controller hub closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.controllers().remove(&connection_id);
    info!(connection_id = %connection_id, game_id = %game_id, "controller hub disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse the first frame of a connection and check that the game is hosted.
fn identify(state: &SharedState, text: &str) -> Result<Uuid, HubError> {
    let message: ControllerInboundMessage = serde_json::from_str(text)?;
    let game_id = message
        .identification_game()
        .ok_or(HubError::NotIdentified)?;
    if !state.registry().contains(game_id) {
        return Err(HubError::UnknownGame(game_id));
    }
    Ok(game_id)
}

/// Run one press through the engine and build the feedback for the hub.
///
/// Releases are acknowledged silently.
fn handle_press(
    state: &SharedState,
    game_id: Uuid,
    slot: u8,
    button: Button,
    action: PressAction,
    timestamp_ms: Option<u64>,
) -> Option<PressFeedback> {
    let result = game_service::submit_press(state, game_id, slot, button, action, timestamp_ms);
    if action == PressAction::Release && result.is_ok() {
        return None;
    }
    Some(press_feedback(slot, result))
}

fn press_feedback(slot: u8, result: Result<PressOutcome, ServiceError>) -> PressFeedback {
    let (accepted, detail) = match result {
        Ok(PressOutcome::Ignored(reason)) => (false, reason.to_string()),
        Ok(PressOutcome::BuzzAccepted(record)) if record.was_first => {
            (true, "buzz accepted first".to_string())
        }
        Ok(PressOutcome::BuzzAccepted(_)) => (true, "buzz queued".to_string()),
        Ok(PressOutcome::AnswerRecorded) => (true, "answer recorded".to_string()),
        Ok(PressOutcome::BombPassed) => (true, "bomb passed".to_string()),
        Err(err) => (false, err.to_string()),
    };
    PressFeedback {
        slot,
        accepted,
        detail,
    }
}

/// Close every hub connection playing for `game_id`.
pub fn disconnect_game(state: &SharedState, game_id: Uuid) -> usize {
    let mut closed = 0;
    state.controllers().retain(|connection_id, connection| {
        if connection.game_id != game_id {
            return true;
        }
        if connection.tx.send(Message::Close(None)).is_err() {
            debug!(connection_id = %connection_id, "controller hub writer already closed");
        }
        closed += 1;
        false
    });
    closed
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), HubError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| HubError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dto::game::CreateGameRequest, state::AppState};

    fn hosted_game(state: &SharedState) -> Uuid {
        game_service::create_game(
            state,
            CreateGameRequest {
                name: "Quiz".into(),
                settings: None,
            },
        )
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn identification_requires_a_hosted_game() {
        let state = AppState::new(AppConfig::default());
        let game_id = hosted_game(&state);

        let text = format!(r#"{{ "type": "identification", "game_id": "{game_id}" }}"#);
        assert_eq!(identify(&state, &text).unwrap(), game_id);

        let unknown = format!(
            r#"{{ "type": "identification", "game_id": "{}" }}"#,
            Uuid::new_v4()
        );
        assert!(identify(&state, &unknown).is_err());
        assert!(identify(&state, r#"{ "type": "press", "slot": 1, "button": "buzz" }"#).is_err());
    }

    #[tokio::test]
    async fn presses_in_the_lobby_are_ignored() {
        let state = AppState::new(AppConfig::default());
        let game_id = hosted_game(&state);

        let feedback = handle_press(&state, game_id, 1, Button::Buzz, PressAction::Press, None)
            .unwrap();
        assert_eq!(feedback.slot, 1);
        assert!(!feedback.accepted);

        let out_of_range =
            handle_press(&state, game_id, 7, Button::Buzz, PressAction::Press, None).unwrap();
        assert!(!out_of_range.accepted);
    }

    #[tokio::test]
    async fn disconnect_closes_only_the_game_hubs() {
        let state = AppState::new(AppConfig::default());
        let game_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (other_tx, _other_rx) = mpsc::unbounded_channel();
        state
            .controllers()
            .insert(Uuid::new_v4(), ControllerConnection { game_id, tx });
        state.controllers().insert(
            Uuid::new_v4(),
            ControllerConnection {
                game_id: Uuid::new_v4(),
                tx: other_tx,
            },
        );

        assert_eq!(disconnect_game(&state, game_id), 1);
        assert!(matches!(rx.try_recv(), Ok(Message::Close(None))));
        assert_eq!(state.controllers().len(), 1);
    }
}

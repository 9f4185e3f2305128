use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::engine::{Button, PressAction};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from the controller hub WebSocket.
#[serde(tag = "type")]
pub enum ControllerInboundMessage {
    /// First message of a connection: the game the hub plays for.
    #[serde(rename = "identification")]
    Identification { game_id: Uuid },
    /// Button event from a controller.
    #[serde(rename = "press")]
    Press {
        slot: u8,
        button: Button,
        #[serde(default = "default_action")]
        action: PressAction,
        /// Hub clock; the server clock is used when omitted.
        #[serde(default)]
        timestamp_ms: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

fn default_action() -> PressAction {
    PressAction::Press
}

impl ControllerInboundMessage {
    pub fn identification_game(&self) -> Option<Uuid> {
        match self {
            Self::Identification { game_id } => Some(*game_id),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Positive acknowledgement sent to a hub after successful identification.
pub struct ControllerAck {
    pub game_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Feedback sent to the hub after a press, used to drive controller lights.
pub struct PressFeedback {
    pub slot: u8,
    pub accepted: bool,
    pub detail: String,
}

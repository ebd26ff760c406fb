use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::gesture::{BodyAnchor, VolumeSpec};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from headset WebSocket clients.
#[serde(tag = "type")]
pub enum HeadsetInboundMessage {
    /// First frame of a connection, binding it to a player.
    #[serde(rename = "identification")]
    Identification { player_id: String },
    /// `other` entered the volume `volume_id`.
    #[serde(rename = "overlap")]
    Overlap { volume_id: Uuid, other: String },
    /// Any other message type.
    #[serde(other)]
    Unknown,
}

impl HeadsetInboundMessage {
    /// Player announced by an identification frame.
    pub fn identification_player_id(&self) -> Option<&str> {
        match self {
            Self::Identification { player_id } => Some(player_id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Positive acknowledgement sent to a headset after successful identification.
pub struct HeadsetAck {
    pub player_id: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Volume commands pushed to the headset that hosts the proximity sensors.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeadsetCommand {
    SpawnVolume { volume_id: Uuid, volume: VolumeSpec },
    AttachVolume { volume_id: Uuid, anchor: BodyAnchor },
    DetachVolume { volume_id: Uuid },
    DestroyVolume { volume_id: Uuid },
}

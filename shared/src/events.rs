use serde::{Deserialize, Serialize};

use crate::alert::{Broadcast, SosAlert};
use crate::entity::EntityId;
use crate::error::ChannelError;
use crate::geo::{GeoPoint, lenient_count};
use crate::incident::Incident;
use crate::resource::Resource;
use crate::shelter::Shelter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationUpdate {
    pub incident_id: EntityId,
    #[serde(deserialize_with = "lenient_count", default)]
    pub verification_count: Option<u32>,
}

/// Server-initiated events. Frames are `{"event": NAME, "data": PAYLOAD}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    IncidentVerified(VerificationUpdate),
    NewIncident(Incident),
    NewResource(Resource),
    NewShelter(Shelter),
    ShelterUpdated(Shelter),
    SosAlert(SosAlert),
    EmergencyBroadcast(Broadcast),
}

const INBOUND_EVENTS: &[&str] = &[
    "incident_verified",
    "new_incident",
    "new_resource",
    "new_shelter",
    "shelter_updated",
    "sos_alert",
    "emergency_broadcast",
];

#[derive(Deserialize)]
struct Envelope {
    event: String,
}

impl InboundEvent {
    /// Decode one frame. Events this client does not handle yield `Ok(None)`.
    pub fn decode(frame: &str) -> Result<Option<Self>, ChannelError> {
        let envelope: Envelope =
            serde_json::from_str(frame).map_err(|e| ChannelError::Decode(e.to_string()))?;
        if !INBOUND_EVENTS.contains(&envelope.event.as_str()) {
            return Ok(None);
        }
        serde_json::from_str(frame)
            .map(Some)
            .map_err(|e| ChannelError::Decode(format!("{}: {e}", envelope.event)))
    }
}

/// Client-initiated events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    UpdateLocation(GeoPoint),
    Broadcast(Broadcast),
    NewResource(Resource),
    UpdateResource(Resource),
}

impl OutboundEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UpdateLocation(_) => "update_location",
            Self::Broadcast(_) => "broadcast",
            Self::NewResource(_) => "new_resource",
            Self::UpdateResource(_) => "update_resource",
        }
    }

    pub fn encode(&self) -> Result<String, ChannelError> {
        serde_json::to_string(self).map_err(|e| ChannelError::Encode(e.to_string()))
    }
}

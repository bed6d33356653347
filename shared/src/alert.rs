use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Fields};
use crate::geo::{lenient_coordinate, nan};
use crate::icons::{self, Halo, MarkerIcon};
use crate::render::{escape_html, format_clock, or_default};

pub const DEFAULT_BROADCAST_RADIUS_KM: f64 = 5.0;
pub const DEFAULT_BROADCAST_SENDER: &str = "Emergency Services";

/// A distress call raised by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: EntityId,
    #[serde(default, alias = "username")]
    pub user: Option<String>,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub longitude: f64,
    #[serde(default, alias = "created_at")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Entity for SosAlert {
    const KIND: EntityKind = EntityKind::Sos;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    fn icon(&self) -> MarkerIcon {
        icons::SOS_ICON
    }

    fn popup_fields(&self) -> Fields {
        vec![
            ("id", escape_html(self.id.as_str())),
            ("user", escape_html(or_default(self.user.as_deref(), "Unknown user"))),
            ("message", escape_html(or_default(self.message.as_deref(), ""))),
            ("time", format_clock(self.time.as_deref())),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
        ]
    }
}

/// An area-wide emergency message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: EntityId,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(deserialize_with = "lenient_radius", default = "default_radius")]
    pub radius: f64,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub longitude: f64,
    #[serde(default, alias = "created_at")]
    pub time: Option<String>,
}

fn default_radius() -> f64 {
    DEFAULT_BROADCAST_RADIUS_KM
}

fn lenient_radius<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let radius = lenient_coordinate(deserializer)?;
    Ok(if radius.is_finite() && radius > 0.0 {
        radius
    } else {
        DEFAULT_BROADCAST_RADIUS_KM
    })
}

impl Entity for Broadcast {
    const KIND: EntityKind = EntityKind::Broadcast;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    fn icon(&self) -> MarkerIcon {
        icons::BROADCAST_ICON
    }

    fn halo(&self) -> Option<Halo> {
        Some(icons::broadcast_halo(self.radius))
    }

    fn popup_fields(&self) -> Fields {
        vec![
            ("id", escape_html(self.id.as_str())),
            ("message", escape_html(&self.message)),
            (
                "sender",
                escape_html(or_default(self.sender.as_deref(), DEFAULT_BROADCAST_SENDER)),
            ),
            ("radius", format!("{}", self.radius)),
            ("time", format_clock(self.time.as_deref())),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
        ]
    }
}

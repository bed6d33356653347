use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Fields, wire_enum};
use crate::geo::{lenient_coordinate, nan};
use crate::icons::{self, Halo, MarkerIcon};
use crate::render::{escape_html, format_timestamp, type_label};

wire_enum! {
    pub enum IncidentType (default = Other) {
        Flood => "flood",
        Fire => "fire",
        Collapse => "collapse",
        Roadblock => "roadblock",
        Medical => "medical",
        Other => "other",
    }
}

wire_enum! {
    pub enum Urgency (default = Medium) {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

pub const NO_DESCRIPTION: &str = "No description provided";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: EntityId,
    #[serde(rename = "type", default)]
    pub kind: IncidentType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub longitude: f64,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub reported_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_verification_count")]
    pub verification_count: u32,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn lenient_verification_count<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<u32, D::Error> {
    Ok(crate::geo::lenient_count(deserializer)?.unwrap_or(0))
}

impl Incident {
    pub fn description_or_default(&self) -> &str {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_DESCRIPTION)
    }

    /// Apply a server-pushed verification count; never moves the count backwards.
    pub fn record_verification(&mut self, count: u32) -> bool {
        if count > self.verification_count {
            self.verification_count = count;
            true
        } else {
            false
        }
    }
}

impl Entity for Incident {
    const KIND: EntityKind = EntityKind::Incident;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    fn category(&self) -> &'static str {
        self.kind.as_str()
    }

    fn icon(&self) -> MarkerIcon {
        icons::incident_icon(self.kind)
    }

    fn halo(&self) -> Option<Halo> {
        icons::urgency_halo(self.urgency)
    }

    fn popup_fields(&self) -> Fields {
        let image_path = self
            .image_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(|path| format!("/{}", path.trim_start_matches('/')))
            .unwrap_or_default();
        let image_display = if image_path.is_empty() { "none" } else { "block" };

        vec![
            ("id", escape_html(self.id.as_str())),
            ("type", type_label(self.kind.as_str())),
            ("description", escape_html(self.description_or_default())),
            ("time", format_timestamp(self.reported_at.as_deref())),
            ("urgency", self.urgency.as_str().to_string()),
            ("verification_count", self.verification_count.to_string()),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("image_path", escape_html(&image_path)),
            ("image_display", image_display.to_string()),
        ]
    }

    fn merge_from(&mut self, incoming: Self) {
        let verification_count = self.verification_count.max(incoming.verification_count);
        let image_path = incoming.image_path.or_else(|| self.image_path.take());
        let audio_path = incoming.audio_path.or_else(|| self.audio_path.take());
        let reported_at = incoming.reported_at.or_else(|| self.reported_at.take());
        *self = Self {
            verification_count,
            image_path,
            audio_path,
            reported_at,
            ..incoming
        };
    }
}

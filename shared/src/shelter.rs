use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Fields, wire_enum};
use crate::geo::{lenient_coordinate, lenient_count, nan};
use crate::icons::{self, Halo, MarkerIcon};
use crate::incident::NO_DESCRIPTION;
use crate::render::{escape_html, or_default, shelter_tags_html};
use crate::resource::{NO_CONTACT, UNKNOWN};

wire_enum! {
    pub enum ShelterStatus (default = Operational) {
        Operational => "operational",
        Limited => "limited",
        Full => "full",
    }
}

/// One supply line item stocked at a shelter, e.g. "Blankets (5)".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelterResourceTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(deserialize_with = "lenient_count", default)]
    pub quantity: Option<u32>,
}

impl ShelterResourceTag {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: None,
            name: name.into(),
            quantity: Some(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
    pub longitude: f64,
    #[serde(deserialize_with = "lenient_count", default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub status: ShelterStatus,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub resources: Vec<ShelterResourceTag>,
}

fn lenient_tags<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ShelterResourceTag>, D::Error> {
    Ok(Option::<Vec<ShelterResourceTag>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Entity for Shelter {
    const KIND: EntityKind = EntityKind::Shelter;

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
        icons::SHELTER_ICON
    }

    fn halo(&self) -> Option<Halo> {
        Some(icons::shelter_halo(self.status))
    }

    fn popup_fields(&self) -> Fields {
        vec![
            ("id", escape_html(self.id.as_str())),
            ("name", escape_html(&self.name)),
            (
                "description",
                escape_html(or_default(self.description.as_deref(), NO_DESCRIPTION)),
            ),
            (
                "capacity",
                self.capacity
                    .map(|capacity| capacity.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "contact",
                escape_html(or_default(self.contact.as_deref(), NO_CONTACT)),
            ),
            ("status", self.status.as_str().to_string()),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("resources_tags", shelter_tags_html(&self.resources)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_integer_ids_and_null_resources() {
        let shelter: Shelter = serde_json::from_str(
            r#"{"id": 7, "name": "Gym", "status": "full", "capacity": "120",
                "latitude": 10.0, "longitude": 20.0, "resources": null}"#,
        )
        .unwrap();
        assert_eq!(shelter.id.as_str(), "7");
        assert_eq!(shelter.status, ShelterStatus::Full);
        assert_eq!(shelter.capacity, Some(120));
        assert!(shelter.resources.is_empty());
        assert_eq!(shelter.halo().map(|h| h.color), Some("#e74c3c"));
    }

    #[test]
    fn tag_order_is_preserved() {
        let shelter: Shelter = serde_json::from_str(
            r#"{"id": 1, "latitude": 0, "longitude": 0, "resources": [
                {"id": 3, "name": "Water", "quantity": 10},
                {"name": "Cots", "quantity": "4"}
            ]}"#,
        )
        .unwrap();
        let names: Vec<_> = shelter.resources.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Water", "Cots"]);
        assert_eq!(shelter.resources[1].quantity, Some(4));
    }
}

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind, Fields, wire_enum};
use crate::geo::{lenient_coordinate, lenient_count, nan};
use crate::icons::{self, MarkerIcon};
use crate::incident::NO_DESCRIPTION;
use crate::render::{escape_html, or_default, type_label};

wire_enum! {
    pub enum ResourceType (default = Other) {
        Hospital => "hospital",
        Food => "food",
        Water => "water",
        Volunteer => "volunteer",
        Shelter => "shelter",
        Other => "other",
    }
}

wire_enum! {
    pub enum ResourceStatus (default = Operational) {
        Operational => "operational",
        Limited => "limited",
        Unavailable => "unavailable",
    }
}

pub const NO_CONTACT: &str = "No contact information";
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: EntityId,
    #[serde(rename = "type", default)]
    pub kind: ResourceType,
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
    pub status: ResourceStatus,
    /// Free-text place name typed by whoever registered the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Entity for Resource {
    const KIND: EntityKind = EntityKind::Resource;

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
        icons::resource_icon(self.kind)
    }

    fn popup_fields(&self) -> Fields {
        vec![
            ("id", escape_html(self.id.as_str())),
            ("name", escape_html(&self.name)),
            (
                "description",
                escape_html(or_default(self.description.as_deref(), NO_DESCRIPTION)),
            ),
            ("type", type_label(self.kind.as_str())),
            (
                "contact",
                escape_html(or_default(self.contact.as_deref(), NO_CONTACT)),
            ),
            (
                "capacity",
                self.capacity
                    .map(|capacity| capacity.to_string())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            ("status", self.status.as_str().to_string()),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
        ]
    }

    fn merge_from(&mut self, incoming: Self) {
        // `new_resource` pushes carry a subset of fields.
        let capacity = incoming.capacity.or(self.capacity);
        let contact = incoming.contact.or_else(|| self.contact.take());
        let location = incoming.location.or_else(|| self.location.take());
        *self = Self {
            capacity,
            contact,
            location,
            ..incoming
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_defaults_for_sparse_resource() {
        let resource: Resource = serde_json::from_str(
            r#"{"id": "r1", "type": "water", "name": "Well", "latitude": 1, "longitude": 2}"#,
        )
        .unwrap();
        let fields = resource.popup_fields();
        let get = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
                .unwrap_or_default()
                .to_string()
        };
        assert_eq!(get("description"), NO_DESCRIPTION);
        assert_eq!(get("contact"), NO_CONTACT);
        assert_eq!(get("capacity"), UNKNOWN);
        assert_eq!(get("status"), "operational");
        assert_eq!(get("type"), "Water");
    }

    #[test]
    fn partial_push_keeps_known_contact() {
        let mut current: Resource = serde_json::from_str(
            r#"{"id": "r1", "type": "food", "name": "Kitchen", "contact": "555-0100",
                "capacity": 80, "latitude": 1, "longitude": 2}"#,
        )
        .unwrap();
        let incoming: Resource = serde_json::from_str(
            r#"{"id": "r1", "type": "food", "name": "Kitchen (north)", "latitude": 1, "longitude": 2}"#,
        )
        .unwrap();

        current.merge_from(incoming);

        assert_eq!(current.name, "Kitchen (north)");
        assert_eq!(current.contact.as_deref(), Some("555-0100"));
        assert_eq!(current.capacity, Some(80));
    }
}

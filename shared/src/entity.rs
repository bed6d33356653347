use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo::GeoPoint;
use crate::icons::{Halo, MarkerIcon};

/// Declares a string-backed wire enum that decodes leniently: matching is
/// case-insensitive, and unknown or null values fall back to the default variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (default = $default:ident) {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            /// Exact match on the wire name, ignoring case and surrounding space.
            pub fn parse(value: &str) -> Option<Self> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($wire) {
                        return Some(Self::$variant);
                    }
                )+
                None
            }

            pub fn from_wire(value: &str) -> Self {
                Self::parse(value).unwrap_or(Self::$default)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <Option<String> as ::serde::Deserialize>::deserialize(deserializer)?;
                Ok(raw.as_deref().map(Self::from_wire).unwrap_or_default())
            }
        }
    };
}
pub(crate) use wire_enum;

/// Identifier of an entity within its kind.
///
/// The server hands out UUID strings for most kinds and integers for shelters,
/// so both decode into the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the id was minted on this client rather than by the server.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }
}

pub(crate) const LOCAL_ID_PREFIX: &str = "local-";

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Int(n) => Self(n.to_string()),
            RawId::Float(n) => Self(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Incident,
    Resource,
    Shelter,
    Sos,
    Broadcast,
}

impl EntityKind {
    pub const ALL: [Self; 5] = [
        Self::Incident,
        Self::Resource,
        Self::Shelter,
        Self::Sos,
        Self::Broadcast,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Resource => "resource",
            Self::Shelter => "shelter",
            Self::Sos => "sos",
            Self::Broadcast => "broadcast",
        }
    }

    /// DOM id of the popup template used for markers of this kind.
    pub const fn popup_template(self) -> &'static str {
        match self {
            Self::Incident => "incident-popup-template",
            Self::Resource => "resource-popup-template",
            Self::Shelter => "shelter-popup-template",
            Self::Sos => "sos-popup-template",
            Self::Broadcast => "broadcast-popup-template",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, already-formatted values a template can substitute.
pub type Fields = Vec<(&'static str, String)>;

/// Common surface of every entity the dashboard stores and plots.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    fn set_id(&mut self, id: EntityId);

    /// Raw coordinates as received; may be non-finite when the payload was bad.
    fn coordinates(&self) -> (f64, f64);

    /// Wire name of the entity's sub-type, used for filtering and tallies.
    fn category(&self) -> &'static str {
        Self::KIND.as_str()
    }

    fn icon(&self) -> MarkerIcon;

    fn halo(&self) -> Option<Halo> {
        None
    }

    /// Values for popup placeholders, defaults already applied.
    fn popup_fields(&self) -> Fields;

    /// Overwrite `self` with a newer payload for the same id.
    fn merge_from(&mut self, incoming: Self) {
        *self = incoming;
    }

    fn position(&self) -> Option<GeoPoint> {
        let (latitude, longitude) = self.coordinates();
        GeoPoint::new(latitude, longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    wire_enum! {
        pub enum Flavor (default = Plain) {
            Plain => "plain",
            Spicy => "spicy",
        }
    }

    #[test]
    fn entity_id_accepts_strings_and_integers() {
        let text: EntityId = serde_json::from_str("\"9b2f\"").unwrap();
        let int: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(text.as_str(), "9b2f");
        assert_eq!(int.as_str(), "42");
        assert_eq!(serde_json::to_string(&int).unwrap(), "\"42\"");
    }

    #[test]
    fn wire_enum_falls_back_on_unknown_and_null() {
        let spicy: Flavor = serde_json::from_str("\"SPICY\"").unwrap();
        let unknown: Flavor = serde_json::from_str("\"sour\"").unwrap();
        let null: Flavor = serde_json::from_str("null").unwrap();
        assert_eq!(spicy, Flavor::Spicy);
        assert_eq!(unknown, Flavor::Plain);
        assert_eq!(null, Flavor::Plain);
    }

    #[test]
    fn local_ids_are_recognized() {
        assert!(EntityId::new("local-17-1").is_local());
        assert!(!EntityId::new("17").is_local());
    }
}

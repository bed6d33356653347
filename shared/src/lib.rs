pub mod alert;
pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod geo;
pub mod icons;
pub mod incident;
pub mod registry;
pub mod render;
pub mod resource;
pub mod shelter;
pub mod stats;
pub mod store;
pub mod submit;
pub mod surface;
pub mod sync;
pub mod templates;

pub use alert::{Broadcast, SosAlert};
pub use api::{DashboardApi, IncidentQuery, IncidentReport, NewShelter, TimeWindow};
pub use config::DashboardConfig;
pub use entity::{Entity, EntityId, EntityKind};
pub use error::*;
pub use events::{InboundEvent, OutboundEvent, VerificationUpdate};
pub use geo::GeoPoint;
pub use icons::{Halo, MarkerIcon};
pub use incident::{Incident, IncidentType, Urgency};
pub use registry::MarkerRegistry;
pub use render::TemplateSet;
pub use resource::{Resource, ResourceStatus, ResourceType};
pub use shelter::{Shelter, ShelterResourceTag, ShelterStatus};
pub use stats::DashboardStats;
pub use store::EntityStore;
pub use submit::SubmissionHandler;
pub use surface::{LayerHandle, MapSurface};
pub use sync::{LoadRequest, LoadState, SyncController};

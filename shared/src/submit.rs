use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::alert::{Broadcast, DEFAULT_BROADCAST_RADIUS_KM, DEFAULT_BROADCAST_SENDER};
use crate::api::{DashboardApi, IncidentReport, NewShelter};
use crate::entity::{Entity, EntityId, LOCAL_ID_PREFIX};
use crate::error::SubmitError;
use crate::events::OutboundEvent;
use crate::geo::{GeoPoint, parse_point};
use crate::incident::{Incident, IncidentType, Urgency};
use crate::render::shelter_tags_html;
use crate::resource::{Resource, ResourceStatus, ResourceType};
use crate::shelter::{Shelter, ShelterResourceTag, ShelterStatus};
use crate::store::Stored;
use crate::surface::MapSurface;
use crate::sync::SyncController;

pub const NO_LOCATION_LABEL: &str = "No location selected";

/// Incident report form. `A` is the platform's file handle type.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentForm<A> {
    pub kind: IncidentType,
    pub description: String,
    pub urgency: Urgency,
    pub image: Option<A>,
    pub audio: Option<A>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShelterForm {
    pub name: String,
    pub description: String,
    pub capacity: String,
    pub contact: String,
    pub status: ShelterStatus,
}

/// Where a resource or broadcast is pinned.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementChoice {
    /// The device's current position.
    Current(GeoPoint),
    /// Coordinates typed into the form.
    Custom { latitude: String, longitude: String },
}

impl PlacementChoice {
    pub fn resolve(&self) -> Result<GeoPoint, SubmitError> {
        match self {
            Self::Current(point) => Ok(*point),
            Self::Custom {
                latitude,
                longitude,
            } => parse_point(latitude, longitude).ok_or_else(|| SubmitError::InvalidField {
                field: "location",
                reason: format!("'{latitude}, {longitude}' is not a valid coordinate"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceForm {
    pub kind: ResourceType,
    pub name: String,
    pub description: String,
    pub capacity: String,
    pub contact: String,
    pub status: ResourceStatus,
    pub placement: PlacementChoice,
    /// Only read for custom placements; current positions are labelled by coordinates.
    pub location_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastForm {
    pub message: String,
    pub radius_km: String,
    pub placement: PlacementChoice,
}

/// Form-side state shared by the report, shelter, resource and broadcast flows.
#[derive(Debug, Default)]
pub struct SubmissionHandler {
    selected: Option<GeoPoint>,
    pending_tags: Vec<ShelterResourceTag>,
    next_tag: u64,
    next_local: u64,
}

impl SubmissionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_location(&mut self, at: GeoPoint) {
        self.selected = Some(at);
    }

    pub fn selected_location(&self) -> Option<GeoPoint> {
        self.selected
    }

    pub fn location_label(&self) -> String {
        self.selected
            .map(|point| point.label())
            .unwrap_or_else(|| NO_LOCATION_LABEL.to_string())
    }

    /// Queue a supply line for the next shelter submission.
    pub fn add_shelter_tag(&mut self, name: &str, quantity: u32) -> Result<&ShelterResourceTag, SubmitError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SubmitError::InvalidField {
                field: "resource name",
                reason: "must not be empty".into(),
            });
        }
        if quantity == 0 {
            return Err(SubmitError::InvalidField {
                field: "quantity",
                reason: "must be at least 1".into(),
            });
        }
        self.next_tag += 1;
        let mut tag = ShelterResourceTag::new(name, quantity);
        tag.id = Some(EntityId::from(self.next_tag.to_string()));
        self.pending_tags.push(tag);
        Ok(&self.pending_tags[self.pending_tags.len() - 1])
    }

    pub fn remove_shelter_tag(&mut self, id: &EntityId) -> bool {
        let before = self.pending_tags.len();
        self.pending_tags.retain(|tag| tag.id.as_ref() != Some(id));
        self.pending_tags.len() != before
    }

    pub fn pending_tags(&self) -> &[ShelterResourceTag] {
        &self.pending_tags
    }

    pub fn pending_tags_html(&self) -> String {
        shelter_tags_html(&self.pending_tags)
    }

    /// Client-minted id, `local-<millis>-<seq>`.
    pub fn next_local_id(&mut self, now: DateTime<Utc>) -> EntityId {
        self.next_local += 1;
        EntityId::new(format!(
            "{LOCAL_ID_PREFIX}{}-{}",
            now.timestamp_millis(),
            self.next_local
        ))
    }

    fn require_location(&self) -> Result<GeoPoint, SubmitError> {
        self.selected.ok_or(SubmitError::NoLocation)
    }

    pub fn incident_report<A>(&self, form: IncidentForm<A>) -> Result<IncidentReport<A>, SubmitError> {
        let location = self.require_location()?;
        Ok(IncidentReport {
            kind: form.kind,
            description: form.description.trim().to_string(),
            location,
            urgency: form.urgency,
            image: form.image,
            audio: form.audio,
        })
    }

    pub fn shelter_request(&self, form: &ShelterForm) -> Result<NewShelter, SubmitError> {
        let location = self.require_location()?;
        let name = form.name.trim();
        if name.is_empty() {
            return Err(SubmitError::InvalidField {
                field: "name",
                reason: "must not be empty".into(),
            });
        }
        Ok(NewShelter {
            name: name.to_string(),
            description: form.description.trim().to_string(),
            capacity: parse_capacity(&form.capacity)?,
            contact: form.contact.trim().to_string(),
            status: form.status,
            latitude: location.latitude,
            longitude: location.longitude,
            resources: self.pending_tags.clone(),
        })
    }

    /// Clear the selected location and pending tags after a successful submit.
    pub fn reset(&mut self) {
        self.selected = None;
        self.pending_tags.clear();
    }

    /// Prefer the server's echo of the entity; fall back to what was sent,
    /// keyed by the server id if one came back or a local id otherwise.
    fn adopt<E: Entity>(&mut self, response: &Value, mut sent: E, now: DateTime<Utc>) -> E {
        if let Ok(echoed) = serde_json::from_value::<E>(response.clone()) {
            if !echoed.id().is_empty() && echoed.position().is_some() {
                return echoed;
            }
        }
        let id = response
            .get("id")
            .filter(|id| !id.is_null())
            .and_then(|id| serde_json::from_value::<EntityId>(id.clone()).ok())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.next_local_id(now));
        sent.set_id(id);
        sent
    }

    pub fn resource_from_form(&mut self, form: ResourceForm, now: DateTime<Utc>) -> Result<Resource, SubmitError> {
        let at = form.placement.resolve()?;
        let name = form.name.trim();
        if name.is_empty() {
            return Err(SubmitError::InvalidField {
                field: "name",
                reason: "must not be empty".into(),
            });
        }
        let location = match &form.placement {
            PlacementChoice::Current(point) => format!("{:.4}, {:.4}", point.latitude, point.longitude),
            PlacementChoice::Custom { .. } => form.location_name.trim().to_string(),
        };
        Ok(Resource {
            id: self.next_local_id(now),
            kind: form.kind,
            name: name.to_string(),
            description: non_empty(&form.description),
            latitude: at.latitude,
            longitude: at.longitude,
            capacity: parse_capacity(&form.capacity)?,
            contact: non_empty(&form.contact),
            status: form.status,
            location: Some(location).filter(|label| !label.is_empty()),
        })
    }

    pub fn broadcast_from_form(&mut self, form: BroadcastForm, now: DateTime<Utc>) -> Result<Broadcast, SubmitError> {
        let at = form.placement.resolve()?;
        let message = form.message.trim();
        if message.is_empty() {
            return Err(SubmitError::InvalidField {
                field: "message",
                reason: "must not be empty".into(),
            });
        }
        let radius = match form.radius_km.trim() {
            "" => DEFAULT_BROADCAST_RADIUS_KM,
            raw => raw
                .parse::<f64>()
                .ok()
                .filter(|radius| radius.is_finite() && *radius > 0.0)
                .ok_or_else(|| SubmitError::InvalidField {
                    field: "radius",
                    reason: format!("'{raw}' is not a positive number of kilometres"),
                })?,
        };
        Ok(Broadcast {
            id: self.next_local_id(now),
            message: message.to_string(),
            sender: Some(DEFAULT_BROADCAST_SENDER.to_string()),
            radius,
            latitude: at.latitude,
            longitude: at.longitude,
            time: Some(now.to_rfc3339()),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_capacity(raw: &str) -> Result<Option<u32>, SubmitError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| SubmitError::InvalidField {
            field: "capacity",
            reason: format!("'{raw}' is not a whole number"),
        })
}

fn insert_submitted<S: MapSurface, E: Stored>(controller: &RefCell<SyncController<S>>, entity: E) {
    if let Err(error) = controller.borrow_mut().insert_local(entity) {
        warn!(%error, "submitted entity could not be drawn");
    }
}

/// Send an incident report and, on success, show it immediately.
///
/// Without a selected location nothing is sent. On failure the form state is
/// kept so the user can retry.
pub async fn submit_incident<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    handler: &RefCell<SubmissionHandler>,
    api: &A,
    form: IncidentForm<A::Attachment>,
    now: DateTime<Utc>,
) -> Result<Incident, SubmitError> {
    let report = handler.borrow().incident_report(form)?;
    let sent = Incident {
        id: EntityId::new(""),
        kind: report.kind,
        description: non_empty(&report.description),
        latitude: report.location.latitude,
        longitude: report.location.longitude,
        urgency: report.urgency,
        reported_at: Some(now.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()),
        verification_count: 0,
        image_path: None,
        audio_path: None,
        status: Some("active".into()),
    };

    let response = api.create_incident(report).await.map_err(|e| {
        warn!(error = %e, "incident report failed");
        SubmitError::from(e)
    })?;

    let incident = handler.borrow_mut().adopt(&response, sent, now);
    debug!(id = %incident.id, "incident reported");
    insert_submitted(controller, incident.clone());
    handler.borrow_mut().reset();
    Ok(incident)
}

/// Register a shelter with the pending supply tags.
pub async fn submit_shelter<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    handler: &RefCell<SubmissionHandler>,
    api: &A,
    form: &ShelterForm,
    now: DateTime<Utc>,
) -> Result<Shelter, SubmitError> {
    let request = handler.borrow().shelter_request(form)?;

    let response = api.create_shelter(&request).await.map_err(|e| {
        warn!(error = %e, "shelter registration failed");
        SubmitError::from(e)
    })?;

    let sent = Shelter {
        id: EntityId::new(""),
        name: request.name,
        description: non_empty(&request.description),
        latitude: request.latitude,
        longitude: request.longitude,
        capacity: request.capacity,
        contact: non_empty(&request.contact),
        status: request.status,
        resources: request.resources,
    };
    let shelter = handler.borrow_mut().adopt(&response, sent, now);
    debug!(id = %shelter.id, "shelter registered");
    insert_submitted(controller, shelter.clone());
    handler.borrow_mut().reset();
    Ok(shelter)
}

/// Add a resource locally and return the `new_resource` event to publish.
pub fn submit_resource<S: MapSurface>(
    controller: &mut SyncController<S>,
    handler: &mut SubmissionHandler,
    form: ResourceForm,
    now: DateTime<Utc>,
) -> Result<OutboundEvent, SubmitError> {
    let resource = handler.resource_from_form(form, now)?;
    if let Err(error) = controller.insert_local(resource.clone()) {
        warn!(%error, "new resource could not be drawn");
    }
    Ok(OutboundEvent::NewResource(resource))
}

/// Change a known resource's status, redraw it, and return the `update_resource` event.
pub fn update_resource_status<S: MapSurface>(
    controller: &mut SyncController<S>,
    id: &EntityId,
    status: &str,
) -> Result<OutboundEvent, SubmitError> {
    let status = ResourceStatus::parse(status).ok_or_else(|| SubmitError::InvalidField {
        field: "status",
        reason: format!("'{status}' is not one of operational, limited, unavailable"),
    })?;
    let Some(mut resource) = controller.store().find::<Resource>(id).cloned() else {
        return Err(SubmitError::InvalidField {
            field: "resource",
            reason: format!("unknown resource {id}"),
        });
    };
    resource.status = status;
    if let Err(error) = controller.insert_local(resource.clone()) {
        warn!(%error, "updated resource could not be drawn");
    }
    Ok(OutboundEvent::UpdateResource(resource))
}

/// Compose an emergency broadcast, show it locally, and return the `broadcast` event.
pub fn compose_broadcast<S: MapSurface>(
    controller: &mut SyncController<S>,
    handler: &mut SubmissionHandler,
    form: BroadcastForm,
    now: DateTime<Utc>,
) -> Result<OutboundEvent, SubmitError> {
    let broadcast = handler.broadcast_from_form(form, now)?;
    if let Err(error) = controller.insert_local(broadcast.clone()) {
        warn!(%error, "broadcast could not be drawn");
    }
    Ok(OutboundEvent::Broadcast(broadcast))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::api::fake::FakeApi;
    use crate::entity::EntityKind;
    use crate::error::ApiError;
    use crate::render::{NO_RESOURCES_HTML, TemplateSet};
    use crate::surface::memory::MemorySurface;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn controller() -> RefCell<SyncController<MemorySurface>> {
        RefCell::new(SyncController::new(
            MemorySurface::default(),
            TemplateSet::default(),
        ))
    }

    fn fire_form() -> IncidentForm<&'static str> {
        IncidentForm {
            kind: IncidentType::Fire,
            description: "  Smoke from warehouse ".into(),
            urgency: Urgency::High,
            image: Some("photo.jpg"),
            audio: None,
        }
    }

    fn here() -> GeoPoint {
        GeoPoint::new(51.5, -0.1).unwrap()
    }

    #[test]
    fn no_location_means_no_request() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        let api = FakeApi::default();

        let err = block_on(submit_incident(&sync, &handler, &api, fire_form(), now())).unwrap_err();
        assert_eq!(err, SubmitError::NoLocation);
        assert_eq!(err.to_string(), "Please select a location on the map.");

        let err = block_on(submit_shelter(&sync, &handler, &api, &ShelterForm::default(), now()))
            .unwrap_err();
        assert_eq!(err, SubmitError::NoLocation);
        assert_eq!(api.requests.get(), 0);
    }

    #[test]
    fn successful_report_is_inserted_with_server_id() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        handler.borrow_mut().select_location(here());
        let api = FakeApi::default();
        api.created.borrow_mut().push_back(Ok(json!({
            "id": "9f1c", "type": "fire", "urgency": "high", "latitude": 51.5, "longitude": -0.1,
            "description": "Smoke from warehouse", "image_path": "uploads/9f1c_photo.jpg",
            "verification_count": 0, "reported_at": "2024-05-01T12:00:00"
        })));

        let incident = block_on(submit_incident(&sync, &handler, &api, fire_form(), now())).unwrap();

        assert_eq!(incident.id.as_str(), "9f1c");
        let reports = api.reports.borrow();
        assert_eq!(reports[0].description, "Smoke from warehouse");
        assert_eq!(reports[0].image, Some("photo.jpg"));
        assert!(sync.borrow().registry().contains(EntityKind::Incident, &"9f1c".into()));
        assert!(handler.borrow().selected_location().is_none());
    }

    #[test]
    fn response_without_entity_uses_fallback_id() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        handler.borrow_mut().select_location(here());
        let api = FakeApi::default();
        api.created.borrow_mut().push_back(Ok(json!({"status": "ok"})));

        let incident = block_on(submit_incident(&sync, &handler, &api, fire_form(), now())).unwrap();

        assert!(incident.id.is_local());
        assert_eq!(incident.latitude, 51.5);
        assert_eq!(sync.borrow().store().incidents().len(), 1);
    }

    #[test]
    fn failed_report_preserves_form_state() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        handler.borrow_mut().select_location(here());
        let api = FakeApi::default();
        api.created
            .borrow_mut()
            .push_back(Err(ApiError::Status(413)));

        let err = block_on(submit_incident(&sync, &handler, &api, fire_form(), now())).unwrap_err();

        assert_eq!(err, SubmitError::Api(ApiError::Status(413)));
        assert_eq!(handler.borrow().selected_location(), Some(here()));
        assert_eq!(sync.borrow().store().incidents().len(), 0);
        assert_eq!(sync.borrow().surface().marker_count(), 0);
    }

    #[test]
    fn shelter_carries_pending_tags() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        {
            let mut handler = handler.borrow_mut();
            handler.select_location(here());
            handler.add_shelter_tag(" Blankets ", 5).unwrap();
        }
        let api = FakeApi::default();
        api.created.borrow_mut().push_back(Ok(json!({"id": 12, "message": "Shelter added"})));
        let form = ShelterForm {
            name: "Community hall".into(),
            capacity: "40".into(),
            ..ShelterForm::default()
        };

        let shelter = block_on(submit_shelter(&sync, &handler, &api, &form, now())).unwrap();

        assert_eq!(shelter.id.as_str(), "12");
        assert_eq!(api.shelter_bodies.borrow()[0].resources.len(), 1);
        let sync = sync.borrow();
        let handle = sync
            .registry()
            .handle(EntityKind::Shelter, &"12".into())
            .unwrap();
        let (_, popup, _) = sync.surface().marker(handle).unwrap();
        assert!(popup.contains("Blankets (5)"));
        assert!(handler.borrow().pending_tags().is_empty());
    }

    #[test]
    fn shelter_without_tags_shows_placeholder() {
        let sync = controller();
        let handler = RefCell::new(SubmissionHandler::new());
        handler.borrow_mut().select_location(here());
        let api = FakeApi::default();
        api.created.borrow_mut().push_back(Ok(json!({"id": 3})));
        let form = ShelterForm {
            name: "School gym".into(),
            ..ShelterForm::default()
        };

        block_on(submit_shelter(&sync, &handler, &api, &form, now())).unwrap();

        let sync = sync.borrow();
        let handle = sync
            .registry()
            .handle(EntityKind::Shelter, &"3".into())
            .unwrap();
        let (_, popup, _) = sync.surface().marker(handle).unwrap();
        assert!(popup.contains(NO_RESOURCES_HTML));
    }

    #[test]
    fn tag_validation_and_removal() {
        let mut handler = SubmissionHandler::new();
        assert!(handler.add_shelter_tag("   ", 3).is_err());
        assert!(handler.add_shelter_tag("Water", 0).is_err());

        let id = handler.add_shelter_tag("Water", 10).unwrap().id.clone().unwrap();
        handler.add_shelter_tag("Cots", 4).unwrap();
        assert!(handler.remove_shelter_tag(&id));
        assert!(!handler.remove_shelter_tag(&id));
        assert_eq!(handler.pending_tags_html(), r#"<span class="resource-tag">Cots (4)</span>"#);
    }

    #[test]
    fn local_ids_are_unique() {
        let mut handler = SubmissionHandler::new();
        let first = handler.next_local_id(now());
        let second = handler.next_local_id(now());
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("local-1714564800000-"));
    }

    #[test]
    fn resource_is_published_and_shown() {
        let mut sync = SyncController::new(MemorySurface::default(), TemplateSet::default());
        let mut handler = SubmissionHandler::new();
        let form = ResourceForm {
            kind: ResourceType::Water,
            name: "Tanker".into(),
            description: String::new(),
            capacity: "2000".into(),
            contact: "555-0199".into(),
            status: ResourceStatus::Operational,
            placement: PlacementChoice::Current(here()),
            location_name: "ignored".into(),
        };

        let event = submit_resource(&mut sync, &mut handler, form, now()).unwrap();

        let OutboundEvent::NewResource(resource) = &event else {
            panic!("expected new_resource");
        };
        assert_eq!(resource.location.as_deref(), Some("51.5000, -0.1000"));
        assert!(resource.id.is_local());
        assert!(sync.registry().contains(EntityKind::Resource, &resource.id));

        let updated = update_resource_status(&mut sync, &resource.id, "Limited").unwrap();
        let OutboundEvent::UpdateResource(updated) = updated else {
            panic!("expected update_resource");
        };
        assert_eq!(updated.status, ResourceStatus::Limited);
        assert!(update_resource_status(&mut sync, &resource.id, "available").is_err());
    }

    #[test]
    fn broadcast_validates_custom_location() {
        let mut sync = SyncController::new(MemorySurface::default(), TemplateSet::default());
        let mut handler = SubmissionHandler::new();
        let bad = BroadcastForm {
            message: "Evacuate".into(),
            radius_km: "3".into(),
            placement: PlacementChoice::Custom {
                latitude: "abc".into(),
                longitude: "1".into(),
            },
        };
        assert!(compose_broadcast(&mut sync, &mut handler, bad, now()).is_err());

        let good = BroadcastForm {
            message: "Evacuate".into(),
            radius_km: String::new(),
            placement: PlacementChoice::Custom {
                latitude: "51.5".into(),
                longitude: "-0.1".into(),
            },
        };
        let OutboundEvent::Broadcast(broadcast) =
            compose_broadcast(&mut sync, &mut handler, good, now()).unwrap()
        else {
            panic!("expected broadcast");
        };
        assert_eq!(broadcast.sender.as_deref(), Some(DEFAULT_BROADCAST_SENDER));
        assert_eq!(broadcast.radius, DEFAULT_BROADCAST_RADIUS_KM);
        assert_eq!(sync.broadcasts().count(), 1);
    }
}

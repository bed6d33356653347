use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::alert::{Broadcast, SosAlert};
use crate::api::{DashboardApi, IncidentQuery};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{ApiError, PlaceError, StoreError, SyncError};
use crate::events::{InboundEvent, OutboundEvent};
use crate::geo::GeoPoint;
use crate::icons::USER_LOCATION_ICON;
use crate::incident::Incident;
use crate::registry::MarkerRegistry;
use crate::render::{TemplateSet, with_verification_count};
use crate::resource::{Resource, ResourceType};
use crate::shelter::Shelter;
use crate::store::{EntityStore, Stored};
use crate::surface::{LayerHandle, MapSurface};

pub const USER_LOCATION_POPUP: &str = "Your Location";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Result of applying one bulk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    pub stored: usize,
    pub placed: usize,
    /// Entities kept in the store but not drawn (bad coordinates or filtered out).
    pub skipped: usize,
}

/// What a live event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    /// Verification count rewritten in an existing popup.
    Patched { incident_id: EntityId, count: u32 },
    /// Entity upserted; `marker` is `None` when it could not be drawn.
    Upserted {
        kind: EntityKind,
        id: EntityId,
        marker: Option<LayerHandle>,
    },
    /// Event referred to something this client does not hold.
    Ignored,
}

/// Which endpoint a load cycle pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    Incidents(IncidentQuery),
    Resources,
    Shelters,
}

impl LoadRequest {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Incidents(_) => EntityKind::Incident,
            Self::Resources => EntityKind::Resource,
            Self::Shelters => EntityKind::Shelter,
        }
    }
}

/// Keeps the entity store, the marker registry and the map surface in step.
///
/// Everything runs on one thread; async callers hold the controller in a
/// `RefCell` and must never keep a borrow across an `.await`.
pub struct SyncController<S> {
    surface: S,
    store: EntityStore,
    registry: MarkerRegistry,
    templates: TemplateSet,
    states: HashMap<EntityKind, LoadState>,
    resource_filter: BTreeSet<ResourceType>,
    user_marker: Option<LayerHandle>,
    user_location: Option<GeoPoint>,
}

impl<S: MapSurface> SyncController<S> {
    pub fn new(surface: S, templates: TemplateSet) -> Self {
        Self {
            surface,
            store: EntityStore::new(),
            registry: MarkerRegistry::new(),
            templates,
            states: HashMap::new(),
            resource_filter: BTreeSet::new(),
            user_marker: None,
            user_location: None,
        }
    }

    pub fn state(&self, kind: EntityKind) -> LoadState {
        self.states.get(&kind).copied().unwrap_or_default()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn user_location(&self) -> Option<GeoPoint> {
        self.user_location
    }

    pub fn resource_filter(&self) -> &BTreeSet<ResourceType> {
        &self.resource_filter
    }

    fn set_state(&mut self, kind: EntityKind, state: LoadState) {
        let previous = self.states.insert(kind, state).unwrap_or_default();
        if previous != state {
            debug!(%kind, ?previous, ?state, "load state changed");
        }
    }

    pub fn begin_load(&mut self, kind: EntityKind) {
        self.set_state(kind, LoadState::Loading);
    }

    /// Replace a whole kind from a bulk payload and redraw its markers.
    ///
    /// A malformed payload leaves the previous entities and markers in place.
    pub fn on_bulk_loaded<E: Stored>(
        &mut self,
        payload: serde_json::Value,
    ) -> Result<BulkOutcome, StoreError> {
        let stored = match self.store.replace_all_json::<E>(payload) {
            Ok(stored) => stored,
            Err(e) => return Err(self.reject_bulk(E::KIND, e)),
        };

        self.registry.clear(E::KIND, &mut self.surface);
        let mut outcome = BulkOutcome {
            stored,
            ..BulkOutcome::default()
        };
        for entity in self.store.all::<E>() {
            if !self.is_visible(entity) {
                outcome.skipped += 1;
                continue;
            }
            match self.registry.place(&mut self.surface, &self.templates, entity) {
                Ok(_) => outcome.placed += 1,
                Err(_) => outcome.skipped += 1,
            }
        }

        self.set_state(E::KIND, LoadState::Loaded);
        info!(
            kind = %E::KIND,
            stored = outcome.stored,
            placed = outcome.placed,
            skipped = outcome.skipped,
            "bulk load applied"
        );
        Ok(outcome)
    }

    fn reject_bulk(&mut self, kind: EntityKind, error: StoreError) -> StoreError {
        warn!(%kind, %error, "rejected bulk payload, keeping previous entities");
        self.set_state(kind, LoadState::Error);
        error
    }

    /// Record a failed fetch. Existing markers and entities stay as they were.
    pub fn on_load_failed(&mut self, kind: EntityKind, error: &ApiError) {
        warn!(%kind, %error, "failed to load entities");
        self.set_state(kind, LoadState::Error);
    }

    pub fn on_live_event(&mut self, event: InboundEvent) -> LiveOutcome {
        match event {
            InboundEvent::IncidentVerified(update) => {
                let Some(count) = update.verification_count else {
                    warn!(incident_id = %update.incident_id, "verification event without a count");
                    return LiveOutcome::Ignored;
                };
                self.apply_verification(&update.incident_id, count)
            }
            InboundEvent::NewIncident(incident) => self.apply_live(incident),
            InboundEvent::NewResource(resource) => self.apply_live(resource),
            InboundEvent::NewShelter(shelter) | InboundEvent::ShelterUpdated(shelter) => {
                self.apply_live(shelter)
            }
            InboundEvent::SosAlert(alert) => self.apply_live(alert),
            InboundEvent::EmergencyBroadcast(broadcast) => self.apply_live(broadcast),
        }
    }

    fn apply_verification(&mut self, id: &EntityId, count: u32) -> LiveOutcome {
        let Some(incident) = self.store.find_mut::<Incident>(id) else {
            debug!(incident_id = %id, "verification for unknown incident ignored");
            return LiveOutcome::Ignored;
        };
        incident.record_verification(count);
        let count = incident.verification_count;
        self.registry
            .patch_popup(EntityKind::Incident, id, &mut self.surface, |content| {
                with_verification_count(content, count)
            });
        LiveOutcome::Patched {
            incident_id: id.clone(),
            count,
        }
    }

    fn apply_live<E: Stored>(&mut self, entity: E) -> LiveOutcome {
        let id = entity.id().clone();
        let marker = self.upsert_and_place(entity).ok().flatten();
        LiveOutcome::Upserted {
            kind: E::KIND,
            id,
            marker,
        }
    }

    /// Insert an entity this client just created. It is never reconciled
    /// with the server beyond later pushes or bulk loads.
    pub fn insert_local<E: Stored>(&mut self, entity: E) -> Result<Option<LayerHandle>, PlaceError> {
        debug!(kind = %E::KIND, id = %entity.id(), "optimistic insert");
        self.upsert_and_place(entity)
    }

    /// `Ok(None)` when the entity is stored but hidden by the resource filter.
    fn upsert_and_place<E: Stored>(&mut self, entity: E) -> Result<Option<LayerHandle>, PlaceError> {
        let id = entity.id().clone();
        self.store.upsert(entity);
        let Some(stored) = self.store.find::<E>(&id) else {
            return Ok(None);
        };
        if !self.is_visible(stored) {
            self.registry.remove(E::KIND, &id, &mut self.surface);
            return Ok(None);
        }
        self.registry
            .place(&mut self.surface, &self.templates, stored)
            .map(Some)
    }

    fn is_visible<E: Entity>(&self, entity: &E) -> bool {
        E::KIND != EntityKind::Resource
            || self.resource_filter.is_empty()
            || self
                .resource_filter
                .contains(&ResourceType::from_wire(entity.category()))
    }

    /// Show only resources of the given types; an empty selection shows all.
    ///
    /// Touches markers only, the store keeps every resource. Returns how
    /// many markers were taken off the map.
    pub fn apply_resource_filter(&mut self, types: impl IntoIterator<Item = ResourceType>) -> usize {
        self.resource_filter = types.into_iter().collect();
        let filter = &self.resource_filter;
        let store = &self.store;
        let removed = self
            .registry
            .retain(EntityKind::Resource, &mut self.surface, |id| {
                store.find::<Resource>(id).is_some_and(|resource| {
                    filter.is_empty() || filter.contains(&resource.kind)
                })
            });

        let mut restored = 0;
        for resource in self.store.all::<Resource>() {
            if self.registry.contains(EntityKind::Resource, &resource.id) || !self.is_visible(resource) {
                continue;
            }
            if self
                .registry
                .place(&mut self.surface, &self.templates, resource)
                .is_ok()
            {
                restored += 1;
            }
        }
        debug!(removed, restored, "resource filter applied");
        removed
    }

    /// Pan to an entity's marker and open its popup.
    pub fn focus(&mut self, kind: EntityKind, id: &EntityId, zoom: f64) -> bool {
        self.registry.focus(kind, id, &mut self.surface, zoom)
    }

    /// Forget every entity and entity marker ahead of a full reload.
    ///
    /// The user's own marker and the resource filter survive.
    pub fn reset(&mut self) {
        for kind in EntityKind::ALL {
            self.registry.clear(kind, &mut self.surface);
        }
        self.store.clear_all();
        self.states.clear();
        debug!("entity state reset");
    }

    /// Center on the user's position and drop the "you are here" marker.
    ///
    /// Returns the location event to send on the live channel.
    pub fn show_user_location(&mut self, at: GeoPoint, zoom: f64) -> OutboundEvent {
        if let Some(previous) = self.user_marker.take() {
            self.surface.remove_layer(previous);
        }
        self.surface.set_view(at, zoom);
        let marker = self
            .surface
            .add_marker(at, USER_LOCATION_ICON, USER_LOCATION_POPUP);
        self.surface.open_popup(marker);
        self.user_marker = Some(marker);
        self.user_location = Some(at);
        OutboundEvent::UpdateLocation(at)
    }

    pub fn incidents(&self) -> impl Iterator<Item = &Incident> {
        self.store.all::<Incident>()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.store.all::<Resource>()
    }

    pub fn shelters(&self) -> impl Iterator<Item = &Shelter> {
        self.store.all::<Shelter>()
    }

    pub fn sos_alerts(&self) -> impl Iterator<Item = &SosAlert> {
        self.store.all::<SosAlert>()
    }

    pub fn broadcasts(&self) -> impl Iterator<Item = &Broadcast> {
        self.store.all::<Broadcast>()
    }
}

/// Run one Loading cycle for `request`.
///
/// Responses are applied in arrival order with no versioning, so a slow
/// response can overwrite newer live updates.
pub async fn refresh<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    api: &A,
    request: LoadRequest,
    now: DateTime<Utc>,
) -> Result<BulkOutcome, SyncError> {
    let kind = request.kind();
    controller.borrow_mut().begin_load(kind);

    let response = match request {
        LoadRequest::Incidents(query) => api.fetch_incidents(&query.path(now)).await,
        LoadRequest::Resources => api.fetch_resources().await,
        LoadRequest::Shelters => api.fetch_shelters().await,
    };
    let payload = match response {
        Ok(payload) => payload,
        Err(e) => {
            controller.borrow_mut().on_load_failed(kind, &e);
            return Err(e.into());
        }
    };

    let mut controller = controller.borrow_mut();
    let outcome = match request {
        LoadRequest::Incidents(_) => controller.on_bulk_loaded::<Incident>(payload),
        LoadRequest::Resources => controller.on_bulk_loaded::<Resource>(payload),
        LoadRequest::Shelters => controller.on_bulk_loaded::<Shelter>(payload),
    }?;
    Ok(outcome)
}

/// Initial page load: every kind with a bulk endpoint, failures logged and skipped.
pub async fn load_all<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    api: &A,
    query: IncidentQuery,
    now: DateTime<Utc>,
) -> Vec<(EntityKind, Result<BulkOutcome, SyncError>)> {
    let mut results = Vec::with_capacity(3);
    for request in [
        LoadRequest::Incidents(query),
        LoadRequest::Resources,
        LoadRequest::Shelters,
    ] {
        let result = refresh(controller, api, request, now).await;
        results.push((request.kind(), result));
    }
    results
}

/// Explicit full reload: drop everything held locally, then load every kind again.
pub async fn reload<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    api: &A,
    query: IncidentQuery,
    now: DateTime<Utc>,
) -> Vec<(EntityKind, Result<BulkOutcome, SyncError>)> {
    controller.borrow_mut().reset();
    load_all(controller, api, query, now).await
}

/// Startup after geolocation settles. A position, if any, is shown first; the
/// data load runs either way.
pub async fn bootstrap<S: MapSurface, A: DashboardApi>(
    controller: &RefCell<SyncController<S>>,
    api: &A,
    position: Option<GeoPoint>,
    user_zoom: f64,
    now: DateTime<Utc>,
) -> Option<OutboundEvent> {
    let location_event = match position {
        Some(at) => Some(controller.borrow_mut().show_user_location(at, user_zoom)),
        None => {
            debug!("no user position, keeping default view");
            None
        }
    };
    load_all(controller, api, IncidentQuery::default(), now).await;
    location_event
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use futures::executor::block_on;
    use serde_json::json;

    use std::cell::Cell;

    use super::*;
    use crate::api::fake::FakeApi;
    use crate::api::{IncidentReport, NewShelter};
    use crate::events::VerificationUpdate;
    use crate::surface::memory::MemorySurface;

    /// Answers resource loads and records the controller's state at that moment.
    struct WatchingApi<'a> {
        sync: &'a RefCell<SyncController<MemorySurface>>,
        seen: Cell<Option<LoadState>>,
    }

    impl DashboardApi for WatchingApi<'_> {
        type Attachment = ();

        async fn fetch_incidents(&self, _path: &str) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Status(404))
        }

        async fn fetch_resources(&self) -> Result<serde_json::Value, ApiError> {
            self.seen.set(Some(self.sync.borrow().state(EntityKind::Resource)));
            Ok(resources_json())
        }

        async fn fetch_shelters(&self) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Status(404))
        }

        async fn create_incident(&self, _report: IncidentReport<()>) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Status(405))
        }

        async fn create_shelter(&self, _shelter: &NewShelter) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Status(405))
        }

        async fn verify_incident(&self, _id: &EntityId) -> Result<serde_json::Value, ApiError> {
            Err(ApiError::Status(405))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn controller() -> SyncController<MemorySurface> {
        SyncController::new(MemorySurface::default(), TemplateSet::default())
    }

    fn incidents_json() -> serde_json::Value {
        json!([
            {"id": "a", "type": "fire", "urgency": "high", "latitude": 51.5, "longitude": -0.1,
             "verification_count": 2, "description": "Warehouse"},
            {"id": "b", "type": "flood", "urgency": "low", "latitude": 51.6, "longitude": -0.2},
        ])
    }

    fn resources_json() -> serde_json::Value {
        json!([
            {"id": "r1", "type": "water", "name": "Well", "latitude": 1, "longitude": 1},
            {"id": "r2", "type": "food", "name": "Kitchen", "latitude": 2, "longitude": 2},
            {"id": "r3", "type": "hospital", "name": "St Mary", "latitude": 3, "longitude": 3},
        ])
    }

    #[test]
    fn bulk_load_places_one_marker_per_valid_entity() {
        let mut sync = controller();
        let payload = json!([
            {"id": "a", "type": "fire", "latitude": 1, "longitude": 1},
            {"id": "b", "type": "fire", "latitude": 200, "longitude": 1},
            {"id": "c", "type": "fire", "latitude": "2.5", "longitude": "3.5"},
        ]);

        let outcome = sync.on_bulk_loaded::<Incident>(payload).unwrap();

        assert_eq!(
            outcome,
            BulkOutcome {
                stored: 3,
                placed: 2,
                skipped: 1
            }
        );
        assert_eq!(sync.registry().len(EntityKind::Incident), 2);
        assert_eq!(sync.surface().marker_count(), 2);
        assert_eq!(sync.state(EntityKind::Incident), LoadState::Loaded);
    }

    #[test]
    fn reload_replaces_previous_markers() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();
        sync.on_bulk_loaded::<Incident>(json!([
            {"id": "z", "type": "medical", "latitude": 1, "longitude": 1}
        ]))
        .unwrap();

        let ids: Vec<_> = sync.registry().ids(EntityKind::Incident).cloned().collect();
        assert_eq!(ids, vec![EntityId::from("z")]);
        assert_eq!(sync.surface().marker_count(), 1);
        assert_eq!(sync.surface().halo_count(), 0);
    }

    #[test]
    fn malformed_bulk_keeps_previous_state() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();

        let err = sync
            .on_bulk_loaded::<Incident>(json!({"error": "boom"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));

        let dupes = json!([
            {"id": "x", "latitude": 1, "longitude": 1},
            {"id": "x", "latitude": 2, "longitude": 2},
        ]);
        assert!(matches!(
            sync.on_bulk_loaded::<Incident>(dupes),
            Err(StoreError::DuplicateId { .. })
        ));

        assert_eq!(sync.store().incidents().len(), 2);
        assert_eq!(sync.registry().len(EntityKind::Incident), 2);
        assert_eq!(sync.state(EntityKind::Incident), LoadState::Error);
    }

    #[test]
    fn verification_patches_popup_in_place() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();
        let id = EntityId::from("a");
        let handle = sync.registry().handle(EntityKind::Incident, &id).unwrap();
        sync.focus(EntityKind::Incident, &id, 16.0);
        let added_before = sync.surface().markers_added;

        let outcome = sync.on_live_event(InboundEvent::IncidentVerified(VerificationUpdate {
            incident_id: id.clone(),
            verification_count: Some(5),
        }));

        assert_eq!(
            outcome,
            LiveOutcome::Patched {
                incident_id: id.clone(),
                count: 5
            }
        );
        let (at, popup, open) = sync.surface().marker(handle).unwrap();
        assert!(popup.contains("Verified by:</strong> 5 users"));
        assert!(open);
        assert_eq!(at, GeoPoint::new(51.5, -0.1).unwrap());
        assert_eq!(sync.surface().markers_added, added_before);
        assert_eq!(
            sync.store().find::<Incident>(&id).unwrap().verification_count,
            5
        );
    }

    #[test]
    fn verification_for_unknown_incident_is_a_no_op() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();
        let before = sync.surface().layers.clone();

        let outcome = sync.on_live_event(InboundEvent::IncidentVerified(VerificationUpdate {
            incident_id: "missing".into(),
            verification_count: Some(9),
        }));

        assert_eq!(outcome, LiveOutcome::Ignored);
        assert_eq!(sync.surface().layers, before);
    }

    #[test]
    fn live_push_upserts_without_touching_others() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();
        let other = sync
            .registry()
            .handle(EntityKind::Incident, &"b".into())
            .unwrap();

        let incoming: Incident = serde_json::from_value(json!({
            "id": "c", "type": "collapse", "latitude": 51.7, "longitude": -0.3
        }))
        .unwrap();
        let outcome = sync.on_live_event(InboundEvent::NewIncident(incoming));

        assert!(matches!(
            outcome,
            LiveOutcome::Upserted { marker: Some(_), .. }
        ));
        assert_eq!(sync.registry().len(EntityKind::Incident), 3);
        assert_eq!(
            sync.registry().handle(EntityKind::Incident, &"b".into()),
            Some(other)
        );
    }

    #[test]
    fn live_push_with_new_coordinates_moves_the_marker() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();

        let moved: Incident = serde_json::from_value(json!({
            "id": "a", "type": "fire", "urgency": "high", "latitude": 10, "longitude": 10
        }))
        .unwrap();
        let outcome = sync.on_live_event(InboundEvent::NewIncident(moved));

        let LiveOutcome::Upserted {
            marker: Some(handle),
            ..
        } = &outcome
        else {
            panic!("expected a placed marker, got {outcome:?}");
        };
        let handle = *handle;
        let id = EntityId::from("a");
        let placed = sync.registry().get(EntityKind::Incident, &id).unwrap();
        let here = GeoPoint::new(10.0, 10.0).unwrap();
        assert_eq!(placed.marker, handle);
        assert_eq!(placed.at, here);
        assert_eq!(sync.registry().len(EntityKind::Incident), 2);
        assert_eq!(sync.surface().marker_count(), 2);
        assert_eq!(sync.surface().halo_count(), 1);
        assert_eq!(sync.surface().marker(handle).unwrap().0, here);
        assert_eq!(sync.store().incidents().len(), 2);
    }

    #[test]
    fn sos_and_broadcasts_arrive_only_live() {
        let mut sync = controller();
        let alert: SosAlert = serde_json::from_value(json!({
            "id": "s1", "user": "ana", "latitude": 10, "longitude": 10, "time": "2024-05-01T10:15:00"
        }))
        .unwrap();
        let broadcast: Broadcast = serde_json::from_value(json!({
            "id": "b1", "message": "Evacuate", "radius": 2, "latitude": 10, "longitude": 10
        }))
        .unwrap();

        sync.on_live_event(InboundEvent::SosAlert(alert));
        sync.on_live_event(InboundEvent::EmergencyBroadcast(broadcast));

        assert_eq!(sync.sos_alerts().count(), 1);
        assert_eq!(sync.broadcasts().count(), 1);
        assert_eq!(sync.surface().marker_count(), 2);
        assert_eq!(sync.surface().halo_count(), 1);
    }

    #[test]
    fn resource_filter_only_touches_markers() {
        let mut sync = controller();
        sync.on_bulk_loaded::<Resource>(resources_json()).unwrap();

        let removed = sync.apply_resource_filter([ResourceType::Water, ResourceType::Food]);

        assert_eq!(removed, 1);
        assert_eq!(sync.registry().len(EntityKind::Resource), 2);
        assert!(!sync.registry().contains(EntityKind::Resource, &"r3".into()));
        assert_eq!(sync.store().resources().len(), 3);

        let removed = sync.apply_resource_filter(Vec::<ResourceType>::new());
        assert_eq!(removed, 0);
        assert_eq!(sync.registry().len(EntityKind::Resource), 3);
    }

    #[test]
    fn filtered_out_push_is_stored_but_hidden() {
        let mut sync = controller();
        sync.apply_resource_filter([ResourceType::Water]);
        let hospital: Resource = serde_json::from_value(json!({
            "id": "r9", "type": "hospital", "name": "Field hospital", "latitude": 1, "longitude": 1
        }))
        .unwrap();

        let outcome = sync.on_live_event(InboundEvent::NewResource(hospital));

        assert!(matches!(outcome, LiveOutcome::Upserted { marker: None, .. }));
        assert_eq!(sync.store().resources().len(), 1);
        assert!(sync.registry().is_empty(EntityKind::Resource));
    }

    #[test]
    fn state_is_loading_while_request_is_in_flight() {
        let sync = RefCell::new(controller());
        assert_eq!(sync.borrow().state(EntityKind::Resource), LoadState::Idle);
        let api = WatchingApi {
            sync: &sync,
            seen: Cell::new(None),
        };

        block_on(refresh(&sync, &api, LoadRequest::Resources, now())).unwrap();

        assert_eq!(api.seen.get(), Some(LoadState::Loading));
        assert_eq!(sync.borrow().state(EntityKind::Resource), LoadState::Loaded);
    }

    #[test]
    fn reset_drops_entities_and_markers_but_keeps_user_marker() {
        let mut sync = controller();
        sync.show_user_location(GeoPoint::new(40.0, -3.7).unwrap(), 13.0);
        sync.on_bulk_loaded::<Incident>(incidents_json()).unwrap();
        sync.on_bulk_loaded::<Resource>(resources_json()).unwrap();

        sync.reset();

        assert_eq!(sync.store().incidents().len(), 0);
        assert_eq!(sync.store().resources().len(), 0);
        assert!(sync.registry().is_empty(EntityKind::Incident));
        assert!(sync.registry().is_empty(EntityKind::Resource));
        assert_eq!(sync.surface().marker_count(), 1);
        assert_eq!(sync.surface().halo_count(), 0);
        assert_eq!(sync.state(EntityKind::Incident), LoadState::Idle);
    }

    #[test]
    fn reload_starts_from_an_empty_store() {
        let sync = RefCell::new(controller());
        sync.borrow_mut()
            .on_bulk_loaded::<Incident>(incidents_json())
            .unwrap();
        let api = FakeApi::default();
        api.incidents.borrow_mut().push_back(Ok(json!([
            {"id": "z", "type": "medical", "latitude": 1, "longitude": 1}
        ])));
        api.resources
            .borrow_mut()
            .push_back(Err(ApiError::Status(503)));
        api.shelters.borrow_mut().push_back(Ok(json!([])));

        let results = block_on(reload(&sync, &api, IncidentQuery::default(), now()));

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 1);
        let sync = sync.borrow();
        let ids: Vec<_> = sync.incidents().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![EntityId::from("z")]);
        assert_eq!(sync.state(EntityKind::Resource), LoadState::Error);
        assert_eq!(sync.surface().marker_count(), 1);
    }

    #[test]
    fn refresh_failure_keeps_markers_and_sets_error() {
        let sync = RefCell::new(controller());
        let api = FakeApi::default();
        api.incidents.borrow_mut().push_back(Ok(incidents_json()));
        api.incidents
            .borrow_mut()
            .push_back(Err(ApiError::Status(500)));

        let query = IncidentQuery::default();
        block_on(refresh(&sync, &api, LoadRequest::Incidents(query), now())).unwrap();
        let err = block_on(refresh(&sync, &api, LoadRequest::Incidents(query), now())).unwrap_err();

        assert_eq!(err, SyncError::Api(ApiError::Status(500)));
        let sync = sync.borrow();
        assert_eq!(sync.state(EntityKind::Incident), LoadState::Error);
        assert_eq!(sync.registry().len(EntityKind::Incident), 2);
        assert_eq!(sync.store().incidents().len(), 2);
    }

    #[test]
    fn filtered_refresh_sends_query() {
        let sync = RefCell::new(controller());
        let api = FakeApi::default();
        api.incidents.borrow_mut().push_back(Ok(json!([])));
        let query = IncidentQuery::from_form("fire", "high", "");

        block_on(refresh(&sync, &api, LoadRequest::Incidents(query), now())).unwrap();

        assert_eq!(
            api.paths.borrow().as_slice(),
            ["/api/incidents?type=fire&urgency=high"]
        );
    }

    #[test]
    fn bootstrap_without_position_still_loads() {
        let sync = RefCell::new(controller());
        let api = FakeApi::default();
        api.incidents.borrow_mut().push_back(Ok(incidents_json()));
        api.resources.borrow_mut().push_back(Ok(resources_json()));
        api.shelters
            .borrow_mut()
            .push_back(Err(ApiError::Transport("offline".into())));

        let event = block_on(bootstrap(&sync, &api, None, 13.0, now()));

        assert!(event.is_none());
        assert_eq!(api.requests.get(), 3);
        let sync = sync.borrow();
        assert_eq!(sync.state(EntityKind::Incident), LoadState::Loaded);
        assert_eq!(sync.state(EntityKind::Resource), LoadState::Loaded);
        assert_eq!(sync.state(EntityKind::Shelter), LoadState::Error);
        assert!(sync.surface().view.is_none());
    }

    #[test]
    fn bootstrap_with_position_centers_and_reports_location() {
        let sync = RefCell::new(controller());
        let api = FakeApi::default();
        let here = GeoPoint::new(40.0, -3.7).unwrap();

        let event = block_on(bootstrap(&sync, &api, Some(here), 13.0, now()));

        assert_eq!(event, Some(OutboundEvent::UpdateLocation(here)));
        let sync = sync.borrow();
        assert_eq!(sync.surface().view, Some((here, 13.0)));
        assert_eq!(sync.user_location(), Some(here));
        assert_eq!(sync.surface().marker_count(), 1);
    }
}

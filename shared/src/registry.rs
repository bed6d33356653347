use std::collections::HashMap;

use tracing::warn;

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::PlaceError;
use crate::geo::GeoPoint;
use crate::render::TemplateSet;
use crate::surface::{LayerHandle, MapSurface};

/// Layers drawn for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedMarker {
    pub marker: LayerHandle,
    pub halo: Option<LayerHandle>,
    pub at: GeoPoint,
}

/// The single lookup path from (kind, id) to what is drawn on the map.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    kinds: HashMap<EntityKind, HashMap<EntityId, PlacedMarker>>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `entity`, replacing any marker already registered for its id.
    ///
    /// Entities with invalid coordinates are skipped and any stale marker for them removed.
    pub fn place<E: Entity, S: MapSurface>(
        &mut self,
        surface: &mut S,
        templates: &TemplateSet,
        entity: &E,
    ) -> Result<LayerHandle, PlaceError> {
        let id = entity.id();
        let Some(at) = entity.position() else {
            let (latitude, longitude) = entity.coordinates();
            warn!(kind = %E::KIND, %id, latitude, longitude, "skipping entity with invalid coordinates");
            self.remove(E::KIND, id, surface);
            return Err(PlaceError::InvalidCoordinates {
                kind: E::KIND,
                id: id.clone(),
                latitude,
                longitude,
            });
        };

        let popup = templates.render_popup(entity)?;
        self.remove(E::KIND, id, surface);

        let halo = entity.halo().map(|halo| surface.add_halo(at, halo));
        let marker = surface.add_marker(at, entity.icon(), &popup);
        self.kinds
            .entry(E::KIND)
            .or_default()
            .insert(id.clone(), PlacedMarker { marker, halo, at });
        Ok(marker)
    }

    /// Remove every marker of `kind` from the map and the registry.
    pub fn clear<S: MapSurface>(&mut self, kind: EntityKind, surface: &mut S) {
        let Some(markers) = self.kinds.get_mut(&kind) else {
            return;
        };
        for (_, placed) in markers.drain() {
            detach(surface, placed);
        }
    }

    pub fn remove<S: MapSurface>(&mut self, kind: EntityKind, id: &EntityId, surface: &mut S) -> bool {
        let removed = self
            .kinds
            .get_mut(&kind)
            .and_then(|markers| markers.remove(id));
        match removed {
            Some(placed) => {
                detach(surface, placed);
                true
            }
            None => false,
        }
    }

    /// Rewrite the popup text of an existing marker without re-creating it.
    ///
    /// Returns `false` when nothing is registered for the id.
    pub fn patch_popup<S: MapSurface>(
        &self,
        kind: EntityKind,
        id: &EntityId,
        surface: &mut S,
        mutator: impl FnOnce(&str) -> String,
    ) -> bool {
        let Some(placed) = self.get(kind, id) else {
            return false;
        };
        let current = surface.popup_content(placed.marker).unwrap_or_default();
        let updated = mutator(&current);
        if updated != current {
            surface.set_popup_content(placed.marker, &updated);
        }
        true
    }

    /// Drop markers whose id fails `keep`. Returns how many were removed.
    pub fn retain<S: MapSurface>(
        &mut self,
        kind: EntityKind,
        surface: &mut S,
        mut keep: impl FnMut(&EntityId) -> bool,
    ) -> usize {
        let Some(markers) = self.kinds.get_mut(&kind) else {
            return 0;
        };
        let doomed: Vec<EntityId> = markers.keys().filter(|id| !keep(*id)).cloned().collect();
        for id in &doomed {
            if let Some(placed) = markers.remove(id) {
                detach(surface, placed);
            }
        }
        doomed.len()
    }

    /// Center the map on a marker and open its popup.
    pub fn focus<S: MapSurface>(
        &self,
        kind: EntityKind,
        id: &EntityId,
        surface: &mut S,
        zoom: f64,
    ) -> bool {
        let Some(placed) = self.get(kind, id) else {
            return false;
        };
        surface.set_view(placed.at, zoom);
        surface.open_popup(placed.marker);
        true
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<&PlacedMarker> {
        self.kinds.get(&kind).and_then(|markers| markers.get(id))
    }

    pub fn handle(&self, kind: EntityKind, id: &EntityId) -> Option<LayerHandle> {
        self.get(kind, id).map(|placed| placed.marker)
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.get(kind, id).is_some()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.kinds.get(&kind).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.len(kind) == 0
    }

    pub fn ids(&self, kind: EntityKind) -> impl Iterator<Item = &EntityId> {
        self.kinds.get(&kind).into_iter().flat_map(HashMap::keys)
    }
}

fn detach<S: MapSurface>(surface: &mut S, placed: PlacedMarker) {
    surface.remove_layer(placed.marker);
    if let Some(halo) = placed.halo {
        surface.remove_layer(halo);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::incident::Incident;
    use crate::render::with_verification_count;
    use crate::shelter::Shelter;
    use crate::surface::memory::MemorySurface;

    fn incident(id: &str, lat: f64, lng: f64, urgency: &str) -> Incident {
        serde_json::from_value(json!({
            "id": id,
            "type": "fire",
            "urgency": urgency,
            "latitude": lat,
            "longitude": lng,
            "verification_count": 1,
        }))
        .unwrap()
    }

    #[test]
    fn place_is_idempotent_per_id() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();

        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "low"))
            .unwrap();
        let handle = registry
            .place(&mut surface, &templates, &incident("a", 2.0, 3.0, "low"))
            .unwrap();

        assert_eq!(registry.len(EntityKind::Incident), 1);
        assert_eq!(surface.marker_count(), 1);
        let (at, _, _) = surface.marker(handle).unwrap();
        assert_eq!(at, GeoPoint::new(2.0, 3.0).unwrap());
    }

    #[test]
    fn halo_follows_its_marker() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();

        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "high"))
            .unwrap();
        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "high"))
            .unwrap();
        assert_eq!(surface.halo_count(), 1);

        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "low"))
            .unwrap();
        assert_eq!(surface.halo_count(), 0);
    }

    #[test]
    fn invalid_coordinates_are_not_plotted() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();

        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "low"))
            .unwrap();
        let err = registry
            .place(&mut surface, &templates, &incident("a", f64::NAN, 1.0, "low"))
            .unwrap_err();

        assert!(matches!(err, PlaceError::InvalidCoordinates { .. }));
        assert!(!registry.contains(EntityKind::Incident, &"a".into()));
        assert_eq!(surface.marker_count(), 0);
    }

    #[test]
    fn clear_only_touches_one_kind() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();
        let shelter: Shelter =
            serde_json::from_value(json!({"id": 1, "latitude": 5, "longitude": 5})).unwrap();

        registry
            .place(&mut surface, &templates, &incident("a", 1.0, 1.0, "high"))
            .unwrap();
        registry.place(&mut surface, &templates, &shelter).unwrap();

        registry.clear(EntityKind::Incident, &mut surface);

        assert!(registry.is_empty(EntityKind::Incident));
        assert_eq!(registry.len(EntityKind::Shelter), 1);
        assert_eq!(surface.marker_count(), 1);
        assert_eq!(surface.halo_count(), 1);
    }

    #[test]
    fn patch_popup_keeps_position_and_open_state() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();

        let handle = registry
            .place(&mut surface, &templates, &incident("a", 4.0, 5.0, "low"))
            .unwrap();
        surface.open_popup(handle);
        let added_before = surface.markers_added;

        let patched = registry.patch_popup(EntityKind::Incident, &"a".into(), &mut surface, |html| {
            with_verification_count(html, 9)
        });

        assert!(patched);
        assert_eq!(surface.markers_added, added_before);
        let (at, popup, open) = surface.marker(handle).unwrap();
        assert_eq!(at, GeoPoint::new(4.0, 5.0).unwrap());
        assert!(open);
        assert!(popup.contains("Verified by:</strong> 9 users"));
    }

    #[test]
    fn patch_popup_leaves_closed_popup_closed() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();

        let handle = registry
            .place(&mut surface, &templates, &incident("a", 4.0, 5.0, "low"))
            .unwrap();

        assert!(registry.patch_popup(EntityKind::Incident, &"a".into(), &mut surface, |html| {
            with_verification_count(html, 3)
        }));

        let (at, popup, open) = surface.marker(handle).unwrap();
        assert_eq!(at, GeoPoint::new(4.0, 5.0).unwrap());
        assert!(!open);
        assert!(popup.contains("Verified by:</strong> 3 users"));
    }

    #[test]
    fn patch_popup_for_unknown_id_is_noop() {
        let mut surface = MemorySurface::default();
        let registry = MarkerRegistry::new();
        let patched =
            registry.patch_popup(EntityKind::Incident, &"ghost".into(), &mut surface, |_| {
                unreachable!("mutator must not run")
            });
        assert!(!patched);
    }

    #[test]
    fn focus_pans_and_opens() {
        let mut surface = MemorySurface::default();
        let mut registry = MarkerRegistry::new();
        let templates = TemplateSet::default();
        let handle = registry
            .place(&mut surface, &templates, &incident("a", 4.0, 5.0, "low"))
            .unwrap();

        assert!(registry.focus(EntityKind::Incident, &"a".into(), &mut surface, 16.0));
        assert_eq!(surface.view, Some((GeoPoint::new(4.0, 5.0).unwrap(), 16.0)));
        assert!(surface.marker(handle).unwrap().2);
    }
}

use std::collections::HashMap;

use crate::alert::{Broadcast, SosAlert};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::StoreError;
use crate::incident::Incident;
use crate::resource::Resource;
use crate::shelter::Shelter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Entities of one kind, keyed by id, iterated in arrival order.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    by_id: HashMap<EntityId, E>,
    order: Vec<EntityId>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut E> {
        self.by_id.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Swap in a whole new set. Fails without touching the old set on duplicate ids.
    pub fn replace_all(&mut self, entities: Vec<E>) -> Result<(), StoreError> {
        let mut by_id = HashMap::with_capacity(entities.len());
        let mut order = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = entity.id().clone();
            if by_id.contains_key(&id) {
                return Err(StoreError::DuplicateId { kind: E::KIND, id });
            }
            order.push(id.clone());
            by_id.insert(id, entity);
        }
        self.by_id = by_id;
        self.order = order;
        Ok(())
    }

    pub fn upsert(&mut self, entity: E) -> Upsert {
        match self.by_id.get_mut(entity.id()) {
            Some(existing) => {
                existing.merge_from(entity);
                Upsert::Updated
            }
            None => {
                let id = entity.id().clone();
                self.order.push(id.clone());
                self.by_id.insert(id, entity);
                Upsert::Inserted
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.order.clear();
    }
}

/// Decode a bulk payload into entities, all or nothing.
pub fn decode_list<E: Entity>(payload: serde_json::Value) -> Result<Vec<E>, StoreError> {
    serde_json::from_value(payload).map_err(|e| StoreError::Malformed {
        kind: E::KIND,
        message: e.to_string(),
    })
}

/// Entity types that have a slot in [`EntityStore`].
pub trait Stored: Entity + 'static {
    fn collection(store: &EntityStore) -> &Collection<Self>;
    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self>;
}

/// Every entity the dashboard currently knows about.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    incidents: Collection<Incident>,
    resources: Collection<Resource>,
    shelters: Collection<Shelter>,
    sos_alerts: Collection<SosAlert>,
    broadcasts: Collection<Broadcast>,
}

macro_rules! stored {
    ($ty:ty, $field:ident) => {
        impl Stored for $ty {
            fn collection(store: &EntityStore) -> &Collection<Self> {
                &store.$field
            }

            fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
                &mut store.$field
            }
        }
    };
}

stored!(Incident, incidents);
stored!(Resource, resources);
stored!(Shelter, shelters);
stored!(SosAlert, sos_alerts);
stored!(Broadcast, broadcasts);

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all<E: Stored>(&mut self, entities: Vec<E>) -> Result<(), StoreError> {
        E::collection_mut(self).replace_all(entities)
    }

    /// Decode and swap in a bulk payload; the previous set survives any error.
    pub fn replace_all_json<E: Stored>(
        &mut self,
        payload: serde_json::Value,
    ) -> Result<usize, StoreError> {
        let entities = decode_list::<E>(payload)?;
        let count = entities.len();
        self.replace_all(entities)?;
        Ok(count)
    }

    pub fn upsert<E: Stored>(&mut self, entity: E) -> Upsert {
        E::collection_mut(self).upsert(entity)
    }

    pub fn find<E: Stored>(&self, id: &EntityId) -> Option<&E> {
        E::collection(self).get(id)
    }

    pub fn find_mut<E: Stored>(&mut self, id: &EntityId) -> Option<&mut E> {
        E::collection_mut(self).get_mut(id)
    }

    pub fn all<E: Stored>(&self) -> impl Iterator<Item = &E> {
        E::collection(self).iter()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Incident => self.incidents.len(),
            EntityKind::Resource => self.resources.len(),
            EntityKind::Shelter => self.shelters.len(),
            EntityKind::Sos => self.sos_alerts.len(),
            EntityKind::Broadcast => self.broadcasts.len(),
        }
    }

    pub fn incidents(&self) -> &Collection<Incident> {
        &self.incidents
    }

    pub fn resources(&self) -> &Collection<Resource> {
        &self.resources
    }

    pub fn shelters(&self) -> &Collection<Shelter> {
        &self.shelters
    }

    pub fn sos_alerts(&self) -> &Collection<SosAlert> {
        &self.sos_alerts
    }

    pub fn broadcasts(&self) -> &Collection<Broadcast> {
        &self.broadcasts
    }

    /// Drop everything; only used for an explicit full reload.
    pub fn clear_all(&mut self) {
        self.incidents.clear();
        self.resources.clear();
        self.shelters.clear();
        self.sos_alerts.clear();
        self.broadcasts.clear();
    }
}

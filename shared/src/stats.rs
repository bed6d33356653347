use std::collections::BTreeMap;

use serde::Serialize;

use crate::incident::{IncidentType, Urgency};
use crate::resource::ResourceType;
use crate::store::EntityStore;

/// Tallies shown on the statistics panel.
///
/// Every known type and urgency is present, so empty categories render as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub incidents_by_type: BTreeMap<IncidentType, usize>,
    pub incidents_by_urgency: BTreeMap<Urgency, usize>,
    pub resources_by_type: BTreeMap<ResourceType, usize>,
    pub total_incidents: usize,
    pub total_resources: usize,
    pub total_shelters: usize,
    pub active_sos: usize,
    pub broadcasts: usize,
}

fn zeroed<K: Ord + Copy>(keys: &[K]) -> BTreeMap<K, usize> {
    keys.iter().map(|key| (*key, 0)).collect()
}

impl DashboardStats {
    pub fn from_store(store: &EntityStore) -> Self {
        let mut incidents_by_type = zeroed(IncidentType::ALL);
        let mut incidents_by_urgency = zeroed(Urgency::ALL);
        for incident in store.incidents().iter() {
            *incidents_by_type.entry(incident.kind).or_default() += 1;
            *incidents_by_urgency.entry(incident.urgency).or_default() += 1;
        }

        let mut resources_by_type = zeroed(ResourceType::ALL);
        for resource in store.resources().iter() {
            *resources_by_type.entry(resource.kind).or_default() += 1;
        }

        Self {
            incidents_by_type,
            incidents_by_urgency,
            resources_by_type,
            total_incidents: store.incidents().len(),
            total_resources: store.resources().len(),
            total_shelters: store.shelters().len(),
            active_sos: store.sos_alerts().len(),
            broadcasts: store.broadcasts().len(),
        }
    }

    /// Share of incidents at `urgency`, as a whole percentage.
    pub fn urgency_percent(&self, urgency: Urgency) -> u32 {
        if self.total_incidents == 0 {
            return 0;
        }
        let count = self.incidents_by_urgency.get(&urgency).copied().unwrap_or(0);
        ((count as f64 / self.total_incidents as f64) * 100.0).round() as u32
    }
}

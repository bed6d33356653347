use crate::geo::GeoPoint;
use crate::icons::{Halo, MarkerIcon};

/// Opaque id of a layer (marker or circle) living on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub u32);

/// Drawing backend for markers; the browser client implements this on top of Leaflet.
///
/// Handles are only meaningful to the surface that issued them.
pub trait MapSurface {
    fn add_marker(&mut self, at: GeoPoint, icon: MarkerIcon, popup_html: &str) -> LayerHandle;

    fn add_halo(&mut self, at: GeoPoint, halo: Halo) -> LayerHandle;

    /// Remove a marker or halo. Unknown handles are ignored.
    fn remove_layer(&mut self, handle: LayerHandle);

    fn popup_content(&self, marker: LayerHandle) -> Option<String>;

    /// Replace popup text in place, keeping the popup's open/closed state.
    fn set_popup_content(&mut self, marker: LayerHandle, html: &str);

    fn open_popup(&mut self, marker: LayerHandle);

    fn set_view(&mut self, center: GeoPoint, zoom: f64);
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Layer {
        Marker {
            at: GeoPoint,
            icon: MarkerIcon,
            popup: String,
            open: bool,
        },
        Halo {
            at: GeoPoint,
            halo: Halo,
        },
    }

    /// In-memory surface that records what would be on screen.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySurface {
        next: u32,
        pub layers: BTreeMap<LayerHandle, Layer>,
        pub view: Option<(GeoPoint, f64)>,
        pub markers_added: usize,
    }

    impl MemorySurface {
        pub(crate) fn marker_count(&self) -> usize {
            self.layers
                .values()
                .filter(|layer| matches!(layer, Layer::Marker { .. }))
                .count()
        }

        pub(crate) fn halo_count(&self) -> usize {
            self.layers
                .values()
                .filter(|layer| matches!(layer, Layer::Halo { .. }))
                .count()
        }

        pub(crate) fn marker(&self, handle: LayerHandle) -> Option<(GeoPoint, &str, bool)> {
            match self.layers.get(&handle)? {
                Layer::Marker {
                    at, popup, open, ..
                } => Some((*at, popup.as_str(), *open)),
                Layer::Halo { .. } => None,
            }
        }

        fn issue(&mut self, layer: Layer) -> LayerHandle {
            self.next += 1;
            let handle = LayerHandle(self.next);
            self.layers.insert(handle, layer);
            handle
        }
    }

    impl MapSurface for MemorySurface {
        fn add_marker(&mut self, at: GeoPoint, icon: MarkerIcon, popup_html: &str) -> LayerHandle {
            self.markers_added += 1;
            self.issue(Layer::Marker {
                at,
                icon,
                popup: popup_html.to_string(),
                open: false,
            })
        }

        fn add_halo(&mut self, at: GeoPoint, halo: Halo) -> LayerHandle {
            self.issue(Layer::Halo { at, halo })
        }

        fn remove_layer(&mut self, handle: LayerHandle) {
            self.layers.remove(&handle);
        }

        fn popup_content(&self, marker: LayerHandle) -> Option<String> {
            self.marker(marker).map(|(_, popup, _)| popup.to_string())
        }

        fn set_popup_content(&mut self, marker: LayerHandle, html: &str) {
            if let Some(Layer::Marker { popup, .. }) = self.layers.get_mut(&marker) {
                *popup = html.to_string();
            }
        }

        fn open_popup(&mut self, marker: LayerHandle) {
            for (handle, layer) in &mut self.layers {
                if let Layer::Marker { open, .. } = layer {
                    *open = *handle == marker;
                }
            }
        }

        fn set_view(&mut self, center: GeoPoint, zoom: f64) {
            self.view = Some((center, zoom));
        }
    }
}

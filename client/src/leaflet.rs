use std::cell::RefCell;
use std::collections::HashMap;

use js_sys::{Array, Function, Reflect};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;

use relief_shared::config::TILE_ATTRIBUTION;
use relief_shared::{GeoPoint, Halo, LayerHandle, MapSurface, MarkerIcon};

fn get(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
}

/// Call `target[method](...args)` with `this` bound to `target`.
fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let func = get(target, method)?.dyn_into::<Function>()?;
    let array = args.iter().cloned().collect::<Array>();
    func.apply(target, &array)
}

fn leaflet() -> Result<JsValue, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let l = get(window.as_ref(), "L")?;
    if l.is_undefined() {
        return Err(JsValue::from_str("Leaflet is not loaded"));
    }
    Ok(l)
}

fn lat_lng(at: GeoPoint) -> JsValue {
    let pair = Array::new();
    pair.push(&JsValue::from_f64(at.latitude));
    pair.push(&JsValue::from_f64(at.longitude));
    pair.into()
}

fn options<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageIconOptions {
    icon_url: &'static str,
    icon_size: [u32; 2],
    icon_anchor: [u32; 2],
    popup_anchor: [i32; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DivIconOptions {
    class_name: &'static str,
    html: &'static str,
    icon_size: [u32; 2],
    icon_anchor: [u32; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CircleOptions {
    radius: f64,
    color: &'static str,
    fill_color: &'static str,
    fill_opacity: f64,
    weight: u32,
}

#[derive(Serialize)]
struct TileOptions {
    attribution: &'static str,
    #[serde(rename = "maxZoom")]
    max_zoom: u32,
}

fn icon(l: &JsValue, icon: MarkerIcon) -> Result<JsValue, JsValue> {
    match icon {
        MarkerIcon::Image {
            url,
            size,
            anchor,
            popup_anchor,
        } => call(
            l,
            "icon",
            &[options(&ImageIconOptions {
                icon_url: url,
                icon_size: [size.0, size.1],
                icon_anchor: [anchor.0, anchor.1],
                popup_anchor: [popup_anchor.0, popup_anchor.1],
            })?],
        ),
        MarkerIcon::Html {
            class_name,
            html,
            size,
            anchor,
        } => call(
            l,
            "divIcon",
            &[options(&DivIconOptions {
                class_name,
                html,
                icon_size: [size.0, size.1],
                icon_anchor: [anchor.0, anchor.1],
            })?],
        ),
    }
}

struct MapClickBinding {
    map: JsValue,
    handler: Closure<dyn Fn(JsValue)>,
}

thread_local! {
    static MAP_CLICK_BINDING: RefCell<Option<MapClickBinding>> = const { RefCell::new(None) };
}

/// Leaflet map behind the [`MapSurface`] seam.
///
/// Layers are kept here so handles stay plain integers on the Rust side.
pub(crate) struct LeafletSurface {
    l: JsValue,
    map: JsValue,
    layers: HashMap<LayerHandle, JsValue>,
    next: u32,
}

impl LeafletSurface {
    /// Create the map inside the element with `container_id`, with an OSM tile layer.
    pub(crate) fn mount(
        container_id: &str,
        center: GeoPoint,
        zoom: f64,
        tile_url: &str,
    ) -> Result<Self, JsValue> {
        let l = leaflet()?;
        let map = call(&l, "map", &[JsValue::from_str(container_id)])?;
        call(&map, "setView", &[lat_lng(center), JsValue::from_f64(zoom)])?;
        let tiles = call(
            &l,
            "tileLayer",
            &[
                JsValue::from_str(tile_url),
                options(&TileOptions {
                    attribution: TILE_ATTRIBUTION,
                    max_zoom: 19,
                })?,
            ],
        )?;
        call(&tiles, "addTo", &[map.clone()])?;
        Ok(Self {
            l,
            map,
            layers: HashMap::new(),
            next: 0,
        })
    }

    fn issue(&mut self, layer: JsValue) -> LayerHandle {
        self.next += 1;
        let handle = LayerHandle(self.next);
        self.layers.insert(handle, layer);
        handle
    }

    fn try_add_marker(&self, at: GeoPoint, marker_icon: MarkerIcon, popup_html: &str) -> Result<JsValue, JsValue> {
        let opts = js_sys::Object::new();
        Reflect::set(&opts, &JsValue::from_str("icon"), &icon(&self.l, marker_icon)?)?;
        let marker = call(&self.l, "marker", &[lat_lng(at), opts.into()])?;
        call(&marker, "bindPopup", &[JsValue::from_str(popup_html)])?;
        call(&marker, "addTo", &[self.map.clone()])?;
        Ok(marker)
    }

    fn try_add_halo(&self, at: GeoPoint, halo: Halo) -> Result<JsValue, JsValue> {
        let circle = call(
            &self.l,
            "circle",
            &[
                lat_lng(at),
                options(&CircleOptions {
                    radius: halo.radius_m,
                    color: halo.color,
                    fill_color: halo.color,
                    fill_opacity: halo.fill_opacity,
                    weight: 1,
                })?,
            ],
        )?;
        call(&circle, "addTo", &[self.map.clone()])?;
        Ok(circle)
    }

    /// Route map clicks to `on_click`. Replaces any previous handler.
    pub(crate) fn on_click(&self, on_click: impl Fn(GeoPoint) + 'static) {
        unbind_click();
        let handler = Closure::<dyn Fn(JsValue)>::new(move |event: JsValue| {
            let Ok(latlng) = get(&event, "latlng") else {
                return;
            };
            let lat = get(&latlng, "lat").ok().and_then(|v| v.as_f64());
            let lng = get(&latlng, "lng").ok().and_then(|v| v.as_f64());
            if let (Some(lat), Some(lng)) = (lat, lng)
                && let Some(point) = GeoPoint::new(lat, lng)
            {
                on_click(point);
            }
        });
        if call(
            &self.map,
            "on",
            &[JsValue::from_str("click"), handler.as_ref().clone()],
        )
        .is_err()
        {
            return;
        }
        MAP_CLICK_BINDING.with(|slot| {
            *slot.borrow_mut() = Some(MapClickBinding {
                map: self.map.clone(),
                handler,
            });
        });
    }
}

pub(crate) fn unbind_click() {
    MAP_CLICK_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = call(
                &old.map,
                "off",
                &[JsValue::from_str("click"), old.handler.as_ref().clone()],
            );
        }
    });
}

fn report(action: &str, error: JsValue) {
    tracing::warn!(action, error = ?error, "leaflet call failed");
}

impl MapSurface for LeafletSurface {
    fn add_marker(&mut self, at: GeoPoint, icon: MarkerIcon, popup_html: &str) -> LayerHandle {
        let layer = self
            .try_add_marker(at, icon, popup_html)
            .unwrap_or_else(|e| {
                report("add marker", e);
                JsValue::UNDEFINED
            });
        self.issue(layer)
    }

    fn add_halo(&mut self, at: GeoPoint, halo: Halo) -> LayerHandle {
        let layer = self.try_add_halo(at, halo).unwrap_or_else(|e| {
            report("add halo", e);
            JsValue::UNDEFINED
        });
        self.issue(layer)
    }

    fn remove_layer(&mut self, handle: LayerHandle) {
        let Some(layer) = self.layers.remove(&handle) else {
            return;
        };
        if layer.is_undefined() {
            return;
        }
        if let Err(e) = call(&self.map, "removeLayer", &[layer]) {
            report("remove layer", e);
        }
    }

    fn popup_content(&self, marker: LayerHandle) -> Option<String> {
        let layer = self.layers.get(&marker)?;
        let popup = call(layer, "getPopup", &[]).ok()?;
        call(&popup, "getContent", &[]).ok()?.as_string()
    }

    fn set_popup_content(&mut self, marker: LayerHandle, html: &str) {
        let Some(layer) = self.layers.get(&marker) else {
            return;
        };
        if let Err(e) = call(layer, "setPopupContent", &[JsValue::from_str(html)]) {
            report("set popup content", e);
        }
    }

    fn open_popup(&mut self, marker: LayerHandle) {
        let Some(layer) = self.layers.get(&marker) else {
            return;
        };
        if let Err(e) = call(layer, "openPopup", &[]) {
            report("open popup", e);
        }
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) {
        if let Err(e) = call(&self.map, "setView", &[lat_lng(center), JsValue::from_f64(zoom)]) {
            report("set view", e);
        }
    }
}

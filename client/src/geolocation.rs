use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

use relief_shared::GeoPoint;

fn number(target: &JsValue, key: &str) -> Option<f64> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
}

/// One-shot device position. Denied permission, timeouts and missing support
/// all come back as `Err` with the browser's message.
pub(crate) async fn current_position() -> Result<GeoPoint, String> {
    let window = web_sys::window().ok_or("no window")?;
    let geolocation = window
        .navigator()
        .geolocation()
        .map_err(|_| "geolocation unsupported".to_string())?;

    let promise = Promise::new(&mut |resolve: Function, reject: Function| {
        if let Err(e) = geolocation.get_current_position_with_error_callback(&resolve, Some(&reject)) {
            let _ = reject.call1(&JsValue::NULL, &e);
        }
    });
    let position = JsFuture::from(promise).await.map_err(|e| {
        Reflect::get(&e, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
            .unwrap_or_else(|| "position unavailable".to_string())
    })?;

    let coords = Reflect::get(&position, &JsValue::from_str("coords"))
        .map_err(|_| "position without coords".to_string())?;
    match (number(&coords, "latitude"), number(&coords, "longitude")) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng).ok_or_else(|| format!("invalid position {lat}, {lng}")),
        _ => Err("position without coords".to_string()),
    }
}

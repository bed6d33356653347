mod api;
mod app;
mod channel;
mod geolocation;
mod leaflet;
mod logging;
mod panels;
mod recorder;

use leptos::mount::mount_to;
use leptos::prelude::*;
use std::any::Any;
use std::cell::RefCell;
use wasm_bindgen::JsCast;

use relief_shared::DashboardConfig;

use app::App;

thread_local! {
    static APP_MOUNT_HANDLE: RefCell<Option<Box<dyn Any>>> = RefCell::new(None);
}

/// Overrides live in `localStorage` as plain strings under the `relief.*` keys.
fn load_config() -> DashboardConfig {
    use gloo_storage::Storage;

    let storage = gloo_storage::LocalStorage::raw();
    DashboardConfig::from_lookup(|key| storage.get_item(key).ok().flatten())
}

fn main() {
    console_error_panic_hook::set_once();
    let config = load_config();
    logging::init(&config.log_level);

    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let mount_target = document
        .get_element_by_id("app")
        .and_then(|node| node.dyn_into::<web_sys::HtmlElement>().ok())
        .or_else(|| document.body());
    let Some(target) = mount_target else {
        return;
    };

    tracing::info!(api_base = %config.api_base, channel = %config.channel_path, "starting dashboard");
    APP_MOUNT_HANDLE.with(move |slot| {
        // Drop any earlier mount so its effects stop touching the map.
        let _old = slot.borrow_mut().take();
        let handle = mount_to(target, move || view! { <App config /> });
        *slot.borrow_mut() = Some(Box::new(handle));
    });
}

use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use relief_shared::geo::parse_point;
use relief_shared::render::directions_url;
use relief_shared::sync::{self, SyncController};
use relief_shared::{
    DashboardApi, DashboardConfig, EntityId, EntityKind, GeoPoint, OutboundEvent,
    SubmissionHandler, TemplateSet,
};

use crate::api::HttpApi;
use crate::channel::{self, ConnectionStatus};
use crate::geolocation;
use crate::leaflet::{self, LeafletSurface};
use crate::panels::{
    BroadcastPanel, DashboardLists, FilterPanel, ReportForm, ResourcePanel, ShelterPanel,
    StatsPanel,
};
use crate::recorder;

pub(crate) const MAP_CONTAINER_ID: &str = "map";

pub(crate) type Controller = Rc<RefCell<SyncController<LeafletSurface>>>;

/// Everything that only exists once the map has mounted.
#[derive(Clone)]
pub(crate) struct Dashboard {
    pub controller: Controller,
    pub handler: Rc<RefCell<SubmissionHandler>>,
    pub api: Rc<HttpApi>,
}

#[derive(Clone, Copy)]
pub(crate) struct DashboardSlot(pub StoredValue<Option<Dashboard>, LocalStorage>);

impl DashboardSlot {
    pub(crate) fn get(self) -> Option<Dashboard> {
        self.0.get_value()
    }
}

/// Bumped after every controller mutation so derived views recompute.
#[derive(Clone, Copy)]
pub(crate) struct Revision(pub RwSignal<u64>);

impl Revision {
    pub(crate) fn bump(self) {
        self.0.update(|n| *n = n.wrapping_add(1));
    }
}

#[derive(Clone, Copy)]
pub(crate) struct SelectedLocation(pub RwSignal<Option<GeoPoint>>);
#[derive(Clone, Copy)]
pub(crate) struct UserPosition(pub RwSignal<Option<GeoPoint>>);
#[derive(Clone, Copy)]
pub(crate) struct Notice(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Config(pub StoredValue<DashboardConfig>);

const NOTICE_TIMEOUT_MS: u32 = 8_000;

impl Notice {
    /// Show `message` until dismissed or until it times out, whichever is first.
    pub(crate) fn show(self, message: impl Into<String>) {
        let message = message.into();
        self.0.set(Some(message.clone()));
        spawn_local(async move {
            gloo_timers::future::TimeoutFuture::new(NOTICE_TIMEOUT_MS).await;
            if self.0.get_untracked().as_deref() == Some(message.as_str()) {
                self.0.set(None);
            }
        });
    }
}

struct PopupClickBinding {
    document: web_sys::Document,
    _handler: Closure<dyn Fn(web_sys::MouseEvent)>,
}

thread_local! {
    static POPUP_CLICK_BINDING: RefCell<Option<PopupClickBinding>> = const { RefCell::new(None) };
}

fn unbind_popup_clicks() {
    POPUP_CLICK_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = old.document.remove_event_listener_with_callback(
                "click",
                old._handler.as_ref().unchecked_ref(),
            );
        }
    });
}

/// Popup markup from `<template>` elements on the page, over the built-in defaults.
fn page_templates() -> TemplateSet {
    let mut templates = TemplateSet::default();
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return templates;
    };
    for kind in EntityKind::ALL {
        if let Some(el) = document.get_element_by_id(kind.popup_template()) {
            let markup = el.inner_html();
            if !markup.trim().is_empty() {
                templates.insert(kind.popup_template(), markup);
            }
        }
    }
    templates
}

fn verify(dashboard: Dashboard, id: EntityId, notice: Notice) {
    spawn_local(async move {
        if let Err(error) = dashboard.api.verify_incident(&id).await {
            tracing::warn!(%id, %error, "verification failed");
            notice.show("Could not verify incident. Please try again.");
        }
    });
}

fn open_directions(target: GeoPoint, origin: Option<GeoPoint>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let url = directions_url(origin, target);
    if window.open_with_url_and_target(&url, "_blank").is_err() {
        tracing::warn!(%url, "could not open directions");
    }
}

/// Popups are plain HTML owned by Leaflet, so their buttons are handled by one
/// document-level listener.
fn bind_popup_clicks(slot: DashboardSlot, user_position: UserPosition, notice: Notice) {
    unbind_popup_clicks();
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    let handler = Closure::<dyn Fn(web_sys::MouseEvent)>::new(move |e: web_sys::MouseEvent| {
        let Some(target) = e
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
        else {
            return;
        };
        if let Ok(Some(button)) = target.closest(".verify-button") {
            e.prevent_default();
            let Some(id) = button.get_attribute("data-id").filter(|id| !id.is_empty()) else {
                return;
            };
            if let Some(dashboard) = slot.get() {
                verify(dashboard, EntityId::new(id), notice);
            }
        } else if let Ok(Some(button)) = target.closest(".directions-button") {
            e.prevent_default();
            let lat = button.get_attribute("data-lat").unwrap_or_default();
            let lng = button.get_attribute("data-lng").unwrap_or_default();
            match parse_point(&lat, &lng) {
                Some(at) => open_directions(at, user_position.0.get_untracked()),
                None => notice.show("This location has no valid coordinates."),
            }
        }
    });

    if document
        .add_event_listener_with_callback("click", handler.as_ref().unchecked_ref())
        .is_ok()
    {
        POPUP_CLICK_BINDING.with(|slot| {
            *slot.borrow_mut() = Some(PopupClickBinding {
                document: document.clone(),
                _handler: handler,
            });
        });
    }
}

/// Mount the map and wire everything that needs it. Returns `None` if Leaflet
/// could not start.
fn start_dashboard(config: &DashboardConfig, selected: SelectedLocation) -> Option<Dashboard> {
    let surface = match LeafletSurface::mount(
        MAP_CONTAINER_ID,
        config.default_center,
        config.default_zoom,
        &config.tile_url,
    ) {
        Ok(surface) => surface,
        Err(error) => {
            tracing::error!(error = ?error, "map failed to start");
            return None;
        }
    };

    let handler = Rc::new(RefCell::new(SubmissionHandler::new()));
    let clicks = Rc::clone(&handler);
    surface.on_click(move |at| {
        clicks.borrow_mut().select_location(at);
        selected.0.set(Some(at));
    });

    let controller = Rc::new(RefCell::new(SyncController::new(surface, page_templates())));
    let dashboard = Dashboard {
        controller,
        handler,
        api: Rc::new(HttpApi::new(config.clone())),
    };
    Some(dashboard)
}

/// Root application component. Provides dashboard state via context.
#[component]
pub fn App(config: DashboardConfig) -> impl IntoView {
    let slot = DashboardSlot(StoredValue::new_local(None));
    let revision = Revision(RwSignal::new(0));
    let selected = SelectedLocation(RwSignal::new(None));
    let user_position = UserPosition(RwSignal::new(None));
    let notice = Notice(RwSignal::new(None));
    let connection: RwSignal<ConnectionStatus> = RwSignal::new(ConnectionStatus::Connecting);
    let stored_config = Config(StoredValue::new(config));

    provide_context(slot);
    provide_context(revision);
    provide_context(selected);
    provide_context(user_position);
    provide_context(notice);
    provide_context(connection);
    provide_context(stored_config);

    // Map, live channel and first load, once the container exists.
    Effect::new(move || {
        if slot.get().is_some() {
            return;
        }
        let config = stored_config.0.get_value();
        let Some(dashboard) = start_dashboard(&config, selected) else {
            notice.show("The map could not be loaded.");
            return;
        };
        slot.0.set_value(Some(dashboard.clone()));
        revision.bump();

        channel::connect(
            &config.channel_path,
            Rc::clone(&dashboard.controller),
            revision.0,
            connection,
        );
        bind_popup_clicks(slot, user_position, notice);

        spawn_local(async move {
            let position = match geolocation::current_position().await {
                Ok(at) => Some(at),
                Err(error) => {
                    tracing::warn!(%error, "geolocation unavailable, using default view");
                    None
                }
            };
            let location_event = sync::bootstrap(
                &*dashboard.controller,
                dashboard.api.as_ref(),
                position,
                config.user_zoom,
                chrono::Utc::now(),
            )
            .await;
            if let Some(OutboundEvent::UpdateLocation(at)) = location_event {
                user_position.0.set(Some(at));
            }
            revision.bump();
        });

        on_cleanup(|| {
            channel::disconnect();
            leaflet::unbind_click();
            unbind_popup_clicks();
            recorder::cancel();
        });
    });

    // Publish the user's position once the channel is up.
    Effect::new(move || {
        if connection.get() != ConnectionStatus::Live {
            return;
        }
        if let Some(at) = user_position.0.get() {
            channel::send(&OutboundEvent::UpdateLocation(at));
        }
    });

    view! {
        <div class="dashboard">
            <header class="dashboard-header">
                <h1>"Relief Map"</h1>
                <ConnectionBadge />
            </header>
            <NoticeBanner />
            <div class="dashboard-body">
                <div id=MAP_CONTAINER_ID class="map-container"></div>
                <aside id="side-panel" class="side-panel">
                    <FilterPanel />
                    <ReportForm />
                    <ShelterPanel />
                    <ResourcePanel />
                    <BroadcastPanel />
                    <DashboardLists />
                    <StatsPanel />
                </aside>
            </div>
        </div>
    }
}

#[component]
fn ConnectionBadge() -> impl IntoView {
    let connection: RwSignal<ConnectionStatus> = expect_context();

    view! {
        <span
            class="connection-badge"
            class:live=move || connection.get() == ConnectionStatus::Live
        >
            {move || match connection.get() {
                ConnectionStatus::Connecting => "Connecting",
                ConnectionStatus::Live => "Live",
                ConnectionStatus::Closed => "Offline",
            }}
        </span>
    }
}

/// Blocking notices (validation failures, failed submissions) with a dismiss button.
#[component]
fn NoticeBanner() -> impl IntoView {
    let Notice(notice) = expect_context();

    move || {
        notice.get().map(|message| {
            view! {
                <div class="notice" role="alert">
                    <span>{message}</span>
                    <button class="btn small" on:click=move |_| notice.set(None)>"Dismiss"</button>
                </div>
            }
        })
    }
}

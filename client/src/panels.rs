use std::collections::BTreeSet;

use chrono::Utc;
use leptos::ev::{MouseEvent, SubmitEvent};
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::Blob;

use relief_shared::render::{
    broadcast_list_item, capitalize, incident_list_item, resource_list_item, sos_list_item,
    type_label,
};
use relief_shared::submit::{
    self, BroadcastForm, IncidentForm, NO_LOCATION_LABEL, PlacementChoice, ResourceForm,
};
use relief_shared::sync::{LoadRequest, LoadState, refresh, reload};
use relief_shared::{
    DashboardStats, EntityId, EntityKind, GeoPoint, IncidentQuery, IncidentType, ResourceStatus,
    ResourceType, Shelter, ShelterResourceTag, ShelterStatus, SubmitError, TimeWindow, Urgency,
};

use crate::app::{Config, DashboardSlot, Notice, Revision, SelectedLocation, UserPosition};
use crate::channel;
use crate::recorder;

fn input_value(signal: RwSignal<String>) -> impl Fn(leptos::ev::Event) + Copy + 'static {
    move |e| signal.set(event_target_value(&e))
}

/// Validation problems are shown as-is; anything else gets a generic retry message.
fn submit_notice(error: &SubmitError, what: &str) -> String {
    match error {
        SubmitError::NoLocation | SubmitError::InvalidField { .. } => error.to_string(),
        _ => format!("Failed to submit {what}. Please try again."),
    }
}

fn placement(
    use_current: bool,
    user_position: Option<GeoPoint>,
    latitude: String,
    longitude: String,
) -> Option<PlacementChoice> {
    if use_current {
        user_position.map(PlacementChoice::Current)
    } else {
        Some(PlacementChoice::Custom {
            latitude,
            longitude,
        })
    }
}

const CURRENT_LOCATION_MISSING: &str =
    "Your current location is not available. Enter coordinates instead.";

fn closest_id(e: &MouseEvent) -> Option<EntityId> {
    let target = e.target()?.dyn_into::<web_sys::Element>().ok()?;
    let item = target.closest("[data-id]").ok()??;
    item.get_attribute("data-id")
        .filter(|id| !id.is_empty())
        .map(EntityId::new)
}

/// Server-side incident filters plus the client-side resource type filter.
#[component]
pub(crate) fn FilterPanel() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let revision: Revision = expect_context();
    let notice: Notice = expect_context();

    let kind = RwSignal::new(String::from("all"));
    let urgency = RwSignal::new(String::from("all"));
    let window = RwSignal::new(String::from("all"));
    let shown_types: RwSignal<BTreeSet<ResourceType>> = RwSignal::new(BTreeSet::new());

    let on_apply = move |_: MouseEvent| {
        let Some(dashboard) = slot.get() else {
            return;
        };
        let query = IncidentQuery::from_form(
            &kind.get_untracked(),
            &urgency.get_untracked(),
            &window.get_untracked(),
        );
        spawn_local(async move {
            let result = refresh(
                &*dashboard.controller,
                dashboard.api.as_ref(),
                LoadRequest::Incidents(query),
                Utc::now(),
            )
            .await;
            if let Err(error) = result {
                tracing::warn!(%error, "filtered incident load failed");
                notice.show("Could not load incidents. Showing the last known list.");
            }
            revision.bump();
        });
    };

    let on_reload = move |_: MouseEvent| {
        let Some(dashboard) = slot.get() else {
            return;
        };
        let query = IncidentQuery::from_form(
            &kind.get_untracked(),
            &urgency.get_untracked(),
            &window.get_untracked(),
        );
        spawn_local(async move {
            let results = reload(
                &*dashboard.controller,
                dashboard.api.as_ref(),
                query,
                Utc::now(),
            )
            .await;
            revision.bump();
            let failed = results.iter().filter(|(_, result)| result.is_err()).count();
            if failed > 0 {
                tracing::warn!(failed, "full reload incomplete");
                notice.show("Some data could not be reloaded.");
            }
        });
    };

    let apply_types = move |types: BTreeSet<ResourceType>| {
        if let Some(dashboard) = slot.get() {
            let removed = dashboard
                .controller
                .borrow_mut()
                .apply_resource_filter(types.iter().copied());
            tracing::debug!(removed, "resource filter applied");
            revision.bump();
        }
        shown_types.set(types);
    };

    let type_options = IncidentType::ALL
        .iter()
        .map(|k| view! { <option value=k.as_str()>{type_label(k.as_str())}</option> })
        .collect_view();
    let urgency_options = Urgency::ALL
        .iter()
        .map(|u| view! { <option value=u.as_str()>{capitalize(u.as_str())}</option> })
        .collect_view();
    let window_options = TimeWindow::ALL
        .iter()
        .map(|w| {
            let label = match w.hours() {
                1 => "Last hour".to_string(),
                hours => format!("Last {hours} hours"),
            };
            view! { <option value=w.as_str()>{label}</option> }
        })
        .collect_view();

    let resource_toggles = ResourceType::ALL
        .iter()
        .copied()
        .map(|resource_type| {
            let on_change = move |e: leptos::ev::Event| {
                let checked = e
                    .target()
                    .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                    .is_some_and(|input| input.checked());
                let mut types = shown_types.get_untracked();
                if checked {
                    types.insert(resource_type);
                } else {
                    types.remove(&resource_type);
                }
                apply_types(types);
            };
            view! {
                <label class="filter-option">
                    <input
                        type="checkbox"
                        prop:checked=move || shown_types.get().contains(&resource_type)
                        on:change=on_change
                    />
                    {type_label(resource_type.as_str())}
                </label>
            }
        })
        .collect_view();

    view! {
        <section class="panel filter-panel">
            <h3>"Filter incidents"</h3>
            <select on:change=input_value(kind)>
                <option value="all">"All types"</option>
                {type_options}
            </select>
            <select on:change=input_value(urgency)>
                <option value="all">"All urgencies"</option>
                {urgency_options}
            </select>
            <select on:change=input_value(window)>
                <option value="all">"Any time"</option>
                {window_options}
            </select>
            <button class="btn" on:click=on_apply>"Apply filters"</button>
            <button class="btn small" on:click=on_reload>"Reload all"</button>

            <h3>"Resource types"</h3>
            <p class="hint">"Only checked types are shown. Leave all unchecked to show everything."</p>
            {resource_toggles}
            <button class="btn small" on:click=move |_| apply_types(BTreeSet::new())>"Show all"</button>
        </section>
    }
}

/// Incident report with optional photo and voice note.
#[component]
pub(crate) fn ReportForm() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let revision: Revision = expect_context();
    let notice: Notice = expect_context();
    let SelectedLocation(selected) = expect_context();

    let kind = RwSignal::new(IncidentType::default());
    let urgency = RwSignal::new(Urgency::default());
    let description = RwSignal::new(String::new());
    let recording = RwSignal::new(false);
    let has_audio = RwSignal::new(false);
    let submitting = RwSignal::new(false);
    let audio: StoredValue<Option<Blob>, LocalStorage> = StoredValue::new_local(None);
    let image_ref = NodeRef::<leptos::html::Input>::new();

    let on_start = move |_: MouseEvent| {
        spawn_local(async move {
            match recorder::start().await {
                Ok(()) => recording.set(true),
                Err(error) => {
                    tracing::warn!(%error, "recording unavailable");
                    notice.show(format!("Could not access microphone: {error}"));
                }
            }
        });
    };

    let on_stop = move |_: MouseEvent| {
        spawn_local(async move {
            recording.set(false);
            match recorder::stop().await {
                Ok(blob) => {
                    audio.set_value(Some(blob));
                    has_audio.set(true);
                }
                Err(error) => tracing::warn!(%error, "recording lost"),
            }
        });
    };

    let on_submit = move |e: SubmitEvent| {
        e.prevent_default();
        let Some(dashboard) = slot.get() else {
            return;
        };
        let image = image_ref
            .get_untracked()
            .and_then(|input| input.files())
            .and_then(|files| files.get(0))
            .map(Blob::from);
        let form = IncidentForm {
            kind: kind.get_untracked(),
            description: description.get_untracked(),
            urgency: urgency.get_untracked(),
            image,
            audio: audio.get_value(),
        };
        submitting.set(true);
        spawn_local(async move {
            let result = submit::submit_incident(
                &*dashboard.controller,
                &*dashboard.handler,
                dashboard.api.as_ref(),
                form,
                Utc::now(),
            )
            .await;
            submitting.set(false);
            match result {
                Ok(_) => {
                    revision.bump();
                    selected.set(None);
                    description.set(String::new());
                    audio.set_value(None);
                    has_audio.set(false);
                    if let Some(input) = image_ref.get_untracked() {
                        input.set_value("");
                    }
                    notice.show("Incident reported. Thank you.");
                }
                Err(error) => notice.show(submit_notice(&error, "report")),
            }
        });
    };

    let type_options = IncidentType::ALL
        .iter()
        .map(|k| view! { <option value=k.as_str() selected=move || kind.get() == *k>{type_label(k.as_str())}</option> })
        .collect_view();
    let urgency_options = Urgency::ALL
        .iter()
        .map(|u| view! { <option value=u.as_str() selected=move || urgency.get() == *u>{capitalize(u.as_str())}</option> })
        .collect_view();

    view! {
        <section class="panel report-panel">
            <h3>"Report an incident"</h3>
            <form id="incident-form" on:submit=on_submit>
                <select on:change=move |e| kind.set(IncidentType::from_wire(&event_target_value(&e)))>
                    {type_options}
                </select>
                <textarea
                    placeholder="What is happening?"
                    prop:value=move || description.get()
                    on:input=input_value(description)
                ></textarea>
                <select on:change=move |e| urgency.set(Urgency::from_wire(&event_target_value(&e)))>
                    {urgency_options}
                </select>
                <input type="file" accept="image/*" node_ref=image_ref />
                <div class="recording">
                    <button type="button" class="btn small" disabled=move || recording.get() on:click=on_start>
                        "Record"
                    </button>
                    <button type="button" class="btn small" disabled=move || !recording.get() on:click=on_stop>
                        "Stop"
                    </button>
                    <span>{move || if recording.get() { "Recording..." } else if has_audio.get() { "Voice note attached" } else { "" }}</span>
                </div>
                <p class="selected-location">
                    {move || selected.get().map(|at| at.label()).unwrap_or_else(|| NO_LOCATION_LABEL.to_string())}
                </p>
                <button
                    type="submit"
                    class="btn primary"
                    disabled=move || selected.get().is_none() || submitting.get()
                >
                    "Submit report"
                </button>
            </form>
        </section>
    }
}

/// Shelter registration with its supply tags and a confirmation card.
#[component]
pub(crate) fn ShelterPanel() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let revision: Revision = expect_context();
    let notice: Notice = expect_context();
    let SelectedLocation(selected) = expect_context();

    let name = RwSignal::new(String::new());
    let description = RwSignal::new(String::new());
    let capacity = RwSignal::new(String::new());
    let contact = RwSignal::new(String::new());
    let status = RwSignal::new(ShelterStatus::default());
    let tag_name = RwSignal::new(String::new());
    let tag_quantity = RwSignal::new(String::from("1"));
    let tags: RwSignal<Vec<ShelterResourceTag>> = RwSignal::new(Vec::new());
    let confirmation: RwSignal<Option<Shelter>> = RwSignal::new(None);

    let sync_tags = move || {
        if let Some(dashboard) = slot.get() {
            tags.set(dashboard.handler.borrow().pending_tags().to_vec());
        }
    };

    let on_add_tag = move |_: MouseEvent| {
        let Some(dashboard) = slot.get() else {
            return;
        };
        let Ok(quantity) = tag_quantity.get_untracked().trim().parse::<u32>() else {
            notice.show("Quantity must be a whole number.");
            return;
        };
        let added = dashboard
            .handler
            .borrow_mut()
            .add_shelter_tag(&tag_name.get_untracked(), quantity)
            .map(|_| ());
        match added {
            Ok(()) => {
                tag_name.set(String::new());
                tag_quantity.set(String::from("1"));
                sync_tags();
            }
            Err(error) => notice.show(error.to_string()),
        }
    };

    let on_submit = move |e: SubmitEvent| {
        e.prevent_default();
        let Some(dashboard) = slot.get() else {
            return;
        };
        let form = submit::ShelterForm {
            name: name.get_untracked(),
            description: description.get_untracked(),
            capacity: capacity.get_untracked(),
            contact: contact.get_untracked(),
            status: status.get_untracked(),
        };
        spawn_local(async move {
            let result = submit::submit_shelter(
                &*dashboard.controller,
                &*dashboard.handler,
                dashboard.api.as_ref(),
                &form,
                Utc::now(),
            )
            .await;
            match result {
                Ok(shelter) => {
                    revision.bump();
                    selected.set(None);
                    for field in [name, description, capacity, contact] {
                        field.set(String::new());
                    }
                    sync_tags();
                    confirmation.set(Some(shelter));
                }
                Err(error) => notice.show(submit_notice(&error, "shelter")),
            }
        });
    };

    let status_options = ShelterStatus::ALL
        .iter()
        .map(|s| view! { <option value=s.as_str() selected=move || status.get() == *s>{capitalize(s.as_str())}</option> })
        .collect_view();

    let tag_list = move || {
        tags.get()
            .into_iter()
            .map(|tag| {
                let id = tag.id.clone();
                let label = match tag.quantity {
                    Some(quantity) => format!("{} ({quantity})", tag.name),
                    None => tag.name.clone(),
                };
                let on_remove = move |_: MouseEvent| {
                    if let (Some(dashboard), Some(id)) = (slot.get(), id.as_ref()) {
                        dashboard.handler.borrow_mut().remove_shelter_tag(id);
                        sync_tags();
                    }
                };
                view! {
                    <li class="resource-tag">
                        {label}
                        <button type="button" class="btn tiny" on:click=on_remove>"x"</button>
                    </li>
                }
            })
            .collect_view()
    };

    let confirmation_card = move || {
        confirmation.get().map(|shelter| {
            let capacity = shelter
                .capacity
                .map(|c| c.to_string())
                .unwrap_or_else(|| relief_shared::resource::UNKNOWN.to_string());
            view! {
                <div id="shelter-confirmation" class="confirmation">
                    <ul>
                        <li><strong>"Name: "</strong>{shelter.name.clone()}</li>
                        <li><strong>"Capacity: "</strong>{capacity}</li>
                        <li><strong>"Status: "</strong>{capitalize(shelter.status.as_str())}</li>
                        <li><strong>"Location: "</strong>{format!("Lat: {:.6}, Lng: {:.6}", shelter.latitude, shelter.longitude)}</li>
                        <li><strong>"ID: "</strong>{shelter.id.to_string()}</li>
                    </ul>
                    <button type="button" class="btn small" on:click=move |_| confirmation.set(None)>"Close"</button>
                </div>
            }
        })
    };

    view! {
        <section class="panel shelter-panel">
            <h3>"Register a shelter"</h3>
            <form id="shelter-form" on:submit=on_submit>
                <input type="text" placeholder="Name" prop:value=move || name.get() on:input=input_value(name) />
                <textarea placeholder="Description" prop:value=move || description.get() on:input=input_value(description)></textarea>
                <input type="number" min="0" placeholder="Capacity" prop:value=move || capacity.get() on:input=input_value(capacity) />
                <input type="text" placeholder="Contact" prop:value=move || contact.get() on:input=input_value(contact) />
                <select on:change=move |e| status.set(ShelterStatus::from_wire(&event_target_value(&e)))>
                    {status_options}
                </select>
                <div class="tag-entry">
                    <input type="text" placeholder="Supply" prop:value=move || tag_name.get() on:input=input_value(tag_name) />
                    <input type="number" min="1" prop:value=move || tag_quantity.get() on:input=input_value(tag_quantity) />
                    <button type="button" class="btn small" on:click=on_add_tag>"Add"</button>
                </div>
                <ul id="resources-list" class="resource-tags">{tag_list}</ul>
                <p class="selected-location">
                    {move || selected.get().map(|at| at.label()).unwrap_or_else(|| NO_LOCATION_LABEL.to_string())}
                </p>
                <button type="submit" class="btn primary" disabled=move || selected.get().is_none()>
                    "Add shelter"
                </button>
            </form>
            {confirmation_card}
        </section>
    }
}

/// New resources and status changes, both published on the live channel.
#[component]
pub(crate) fn ResourcePanel() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let Revision(revision) = expect_context();
    let notice: Notice = expect_context();
    let UserPosition(user_position) = expect_context();

    let kind = RwSignal::new(ResourceType::default());
    let name = RwSignal::new(String::new());
    let description = RwSignal::new(String::new());
    let capacity = RwSignal::new(String::new());
    let contact = RwSignal::new(String::new());
    let status = RwSignal::new(ResourceStatus::default());
    let use_current = RwSignal::new(true);
    let latitude = RwSignal::new(String::new());
    let longitude = RwSignal::new(String::new());
    let location_name = RwSignal::new(String::new());
    let update_target = RwSignal::new(String::new());
    let update_status = RwSignal::new(String::from(ResourceStatus::Operational.as_str()));

    let on_submit = move |e: SubmitEvent| {
        e.prevent_default();
        let Some(dashboard) = slot.get() else {
            return;
        };
        let Some(placement) = placement(
            use_current.get_untracked(),
            user_position.get_untracked(),
            latitude.get_untracked(),
            longitude.get_untracked(),
        ) else {
            notice.show(CURRENT_LOCATION_MISSING);
            return;
        };
        let form = ResourceForm {
            kind: kind.get_untracked(),
            name: name.get_untracked(),
            description: description.get_untracked(),
            capacity: capacity.get_untracked(),
            contact: contact.get_untracked(),
            status: status.get_untracked(),
            placement,
            location_name: location_name.get_untracked(),
        };
        let result = {
            let mut controller = dashboard.controller.borrow_mut();
            let mut handler = dashboard.handler.borrow_mut();
            submit::submit_resource(&mut *controller, &mut *handler, form, Utc::now())
        };
        match result {
            Ok(event) => {
                channel::send(&event);
                revision.update(|n| *n = n.wrapping_add(1));
                for field in [name, description, capacity, contact, latitude, longitude, location_name] {
                    field.set(String::new());
                }
                notice.show("Resource added.");
            }
            Err(error) => notice.show(submit_notice(&error, "resource")),
        }
    };

    let on_update = move |_: MouseEvent| {
        let Some(dashboard) = slot.get() else {
            return;
        };
        let id = EntityId::new(update_target.get_untracked());
        if id.is_empty() {
            notice.show("Choose a resource to update.");
            return;
        }
        let result = submit::update_resource_status(
            &mut *dashboard.controller.borrow_mut(),
            &id,
            &update_status.get_untracked(),
        );
        match result {
            Ok(event) => {
                channel::send(&event);
                revision.update(|n| *n = n.wrapping_add(1));
                notice.show(format!("Resource status updated to {}.", update_status.get_untracked()));
            }
            Err(error) => notice.show(error.to_string()),
        }
    };

    let known_resources = move || {
        revision.get();
        let Some(dashboard) = slot.get() else {
            return Vec::new();
        };
        let controller = dashboard.controller.borrow();
        controller
            .resources()
            .map(|r| (r.id.to_string(), r.name.clone()))
            .collect::<Vec<_>>()
    };

    let type_options = ResourceType::ALL
        .iter()
        .map(|k| view! { <option value=k.as_str() selected=move || kind.get() == *k>{type_label(k.as_str())}</option> })
        .collect_view();
    let status_options = ResourceStatus::ALL
        .iter()
        .map(|s| view! { <option value=s.as_str() selected=move || status.get() == *s>{capitalize(s.as_str())}</option> })
        .collect_view();
    let update_options = ResourceStatus::ALL
        .iter()
        .map(|s| view! { <option value=s.as_str()>{capitalize(s.as_str())}</option> })
        .collect_view();

    view! {
        <section class="panel resource-panel">
            <h3>"Add a resource"</h3>
            <form id="resource-form" on:submit=on_submit>
                <select on:change=move |e| kind.set(ResourceType::from_wire(&event_target_value(&e)))>
                    {type_options}
                </select>
                <input type="text" placeholder="Name" prop:value=move || name.get() on:input=input_value(name) />
                <textarea placeholder="Description" prop:value=move || description.get() on:input=input_value(description)></textarea>
                <input type="number" min="0" placeholder="Capacity" prop:value=move || capacity.get() on:input=input_value(capacity) />
                <input type="text" placeholder="Contact" prop:value=move || contact.get() on:input=input_value(contact) />
                <select on:change=move |e| status.set(ResourceStatus::from_wire(&event_target_value(&e)))>
                    {status_options}
                </select>
                <PlacementFields use_current latitude longitude />
                <Show when=move || !use_current.get()>
                    <input type="text" placeholder="Location name" prop:value=move || location_name.get() on:input=input_value(location_name) />
                </Show>
                <button type="submit" class="btn primary">"Add resource"</button>
            </form>

            <h3>"Update status"</h3>
            <select on:change=input_value(update_target)>
                <option value="">"Choose a resource"</option>
                {move || known_resources()
                    .into_iter()
                    .map(|(id, name)| view! { <option value=id>{name}</option> })
                    .collect_view()}
            </select>
            <select on:change=input_value(update_status)>{update_options}</select>
            <button class="btn small" on:click=on_update>"Update"</button>
        </section>
    }
}

#[component]
fn PlacementFields(
    use_current: RwSignal<bool>,
    latitude: RwSignal<String>,
    longitude: RwSignal<String>,
) -> impl IntoView {
    view! {
        <label class="filter-option">
            <input
                type="checkbox"
                prop:checked=move || use_current.get()
                on:change=move |e| {
                    let checked = e
                        .target()
                        .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                        .is_some_and(|input| input.checked());
                    use_current.set(checked);
                }
            />
            "Use my current location"
        </label>
        <Show when=move || !use_current.get()>
            <input type="text" placeholder="Latitude" prop:value=move || latitude.get() on:input=input_value(latitude) />
            <input type="text" placeholder="Longitude" prop:value=move || longitude.get() on:input=input_value(longitude) />
        </Show>
    }
}

/// Emergency broadcast composer.
#[component]
pub(crate) fn BroadcastPanel() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let revision: Revision = expect_context();
    let notice: Notice = expect_context();
    let UserPosition(user_position) = expect_context();

    let message = RwSignal::new(String::new());
    let radius = RwSignal::new(String::new());
    let use_current = RwSignal::new(true);
    let latitude = RwSignal::new(String::new());
    let longitude = RwSignal::new(String::new());

    let on_submit = move |e: SubmitEvent| {
        e.prevent_default();
        let Some(dashboard) = slot.get() else {
            return;
        };
        let Some(placement) = placement(
            use_current.get_untracked(),
            user_position.get_untracked(),
            latitude.get_untracked(),
            longitude.get_untracked(),
        ) else {
            notice.show(CURRENT_LOCATION_MISSING);
            return;
        };
        let form = BroadcastForm {
            message: message.get_untracked(),
            radius_km: radius.get_untracked(),
            placement,
        };
        let result = {
            let mut controller = dashboard.controller.borrow_mut();
            let mut handler = dashboard.handler.borrow_mut();
            submit::compose_broadcast(&mut *controller, &mut *handler, form, Utc::now())
        };
        match result {
            Ok(event) => {
                channel::send(&event);
                revision.bump();
                for field in [message, radius, latitude, longitude] {
                    field.set(String::new());
                }
                notice.show("Broadcast sent.");
            }
            Err(error) => notice.show(submit_notice(&error, "broadcast")),
        }
    };

    view! {
        <section class="panel broadcast-panel">
            <h3>"Emergency broadcast"</h3>
            <form id="broadcast-form" on:submit=on_submit>
                <textarea placeholder="Message" prop:value=move || message.get() on:input=input_value(message)></textarea>
                <input type="number" min="1" placeholder="Radius (km), default 5" prop:value=move || radius.get() on:input=input_value(radius) />
                <PlacementFields use_current latitude longitude />
                <button type="submit" class="btn primary">"Send broadcast"</button>
            </form>
        </section>
    }
}

fn load_error(state: LoadState, what: &'static str) -> Option<String> {
    (state == LoadState::Error).then(|| format!("Could not load {what}."))
}

/// Recent incidents, resources, SOS alerts and broadcasts. Clicking an
/// incident or resource focuses its marker.
#[component]
pub(crate) fn DashboardLists() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let Revision(revision) = expect_context();
    let Config(config) = expect_context();

    let lists = Memo::new(move |_| {
        revision.get();
        let dashboard = slot.get()?;
        let controller = dashboard.controller.borrow();
        let incidents: String = controller.incidents().map(incident_list_item).collect();
        let resources: String = controller.resources().map(resource_list_item).collect();
        let sos: String = controller.sos_alerts().map(sos_list_item).collect();
        let broadcasts: String = controller.broadcasts().map(broadcast_list_item).collect();
        let errors = [
            load_error(controller.state(EntityKind::Incident), "incidents"),
            load_error(controller.state(EntityKind::Resource), "resources"),
            load_error(controller.state(EntityKind::Shelter), "shelters"),
        ];
        Some((incidents, resources, sos, broadcasts, errors))
    });

    let focus = move |kind: EntityKind| {
        move |e: MouseEvent| {
            let (Some(id), Some(dashboard)) = (closest_id(&e), slot.get()) else {
                return;
            };
            let zoom = config.with_value(|c| c.focus_zoom);
            if !dashboard.controller.borrow_mut().focus(kind, &id, zoom) {
                tracing::debug!(%id, kind = kind.as_str(), "nothing to focus");
            }
        }
    };

    let section = move |index: usize| {
        move || {
            lists
                .get()
                .map(|(incidents, resources, sos, broadcasts, _)| match index {
                    0 => incidents,
                    1 => resources,
                    2 => sos,
                    _ => broadcasts,
                })
                .unwrap_or_default()
        }
    };

    let errors = move || {
        lists
            .get()
            .map(|(.., errors)| errors.into_iter().flatten().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|message| view! { <p class="load-error">{message}</p> })
            .collect_view()
    };

    view! {
        <section class="panel dashboard-lists">
            {errors}
            <h3>"Recent incidents"</h3>
            <div id="recent-incidents" class="list" on:click=focus(EntityKind::Incident) inner_html=section(0)></div>
            <h3>"Resources"</h3>
            <div id="resource-list" class="list" on:click=focus(EntityKind::Resource) inner_html=section(1)></div>
            <h3>"Active SOS"</h3>
            <div id="active-sos" class="list" inner_html=section(2)></div>
            <h3>"Recent broadcasts"</h3>
            <div id="recent-broadcasts" class="list" inner_html=section(3)></div>
        </section>
    }
}

fn count_rows<K: Copy + 'static>(
    rows: Vec<(K, usize)>,
    label: impl Fn(K) -> String + 'static,
) -> impl IntoView {
    rows.into_iter()
        .map(|(key, count)| {
            view! {
                <li><span>{label(key)}</span><span class="count">{count}</span></li>
            }
        })
        .collect_view()
}

#[component]
pub(crate) fn StatsPanel() -> impl IntoView {
    let slot: DashboardSlot = expect_context();
    let Revision(revision) = expect_context();

    let stats = Memo::new(move |_| {
        revision.get();
        let dashboard = slot.get()?;
        let controller = dashboard.controller.borrow();
        Some(DashboardStats::from_store(controller.store()))
    });

    move || {
        let stats = stats.get()?;
        let by_type: Vec<_> = stats.incidents_by_type.iter().map(|(k, v)| (*k, *v)).collect();
        let by_resource: Vec<_> = stats.resources_by_type.iter().map(|(k, v)| (*k, *v)).collect();
        let urgency_bars = Urgency::ALL
            .iter()
            .map(|urgency| {
                let percent = stats.urgency_percent(*urgency);
                let count = stats.incidents_by_urgency.get(urgency).copied().unwrap_or(0);
                view! {
                    <li class=format!("urgency-{urgency}")>
                        <span>{capitalize(urgency.as_str())}</span>
                        <span class="bar" style=format!("width: {percent}%;")></span>
                        <span class="count">{count}</span>
                    </li>
                }
            })
            .collect_view();

        Some(view! {
            <section id="statistics-panel" class="panel stats-panel">
                <h3>"Statistics"</h3>
                <ul class="totals">
                    <li>"Incidents: "{stats.total_incidents}</li>
                    <li>"Resources: "{stats.total_resources}</li>
                    <li>"Shelters: "{stats.total_shelters}</li>
                    <li>"Active SOS: "{stats.active_sos}</li>
                    <li>"Broadcasts: "{stats.broadcasts}</li>
                </ul>
                <h4>"Incidents by type"</h4>
                <ul>{count_rows(by_type, |k: IncidentType| type_label(k.as_str()))}</ul>
                <h4>"Incidents by urgency"</h4>
                <ul>{urgency_bars}</ul>
                <h4>"Resources by type"</h4>
                <ul>{count_rows(by_resource, |k: ResourceType| type_label(k.as_str()))}</ul>
            </section>
        })
    }
}

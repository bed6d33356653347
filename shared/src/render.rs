use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};

use crate::alert::{Broadcast, DEFAULT_BROADCAST_SENDER, SosAlert};
use crate::entity::{Entity, EntityKind, Fields};
use crate::error::RenderError;
use crate::geo::GeoPoint;
use crate::icons::{incident_glyph, resource_glyph};
use crate::incident::Incident;
use crate::resource::Resource;
use crate::shelter::ShelterResourceTag;
use crate::templates;

pub const NO_RESOURCES_HTML: &str = r#"<p class="no-resources">No resources available</p>"#;
const VERIFIED_PREFIX: &str = "Verified by:</strong> ";
const VERIFIED_SUFFIX: &str = " users";

/// Popup templates keyed by DOM template id.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        let mut set = Self::empty();
        for (kind, markup) in [
            (EntityKind::Incident, templates::INCIDENT_POPUP),
            (EntityKind::Resource, templates::RESOURCE_POPUP),
            (EntityKind::Shelter, templates::SHELTER_POPUP),
            (EntityKind::Sos, templates::SOS_POPUP),
            (EntityKind::Broadcast, templates::BROADCAST_POPUP),
        ] {
            set.insert(kind.popup_template(), markup);
        }
        set
    }
}

impl TemplateSet {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Add or override a template.
    pub fn insert(&mut self, id: impl Into<String>, markup: impl Into<String>) {
        self.templates.insert(id.into(), markup.into());
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.templates.get(id).map(String::as_str)
    }

    pub fn render<E: Entity>(&self, template_id: &str, entity: &E) -> Result<String, RenderError> {
        let template = self
            .get(template_id)
            .ok_or_else(|| RenderError::UnknownTemplate(template_id.to_string()))?;
        Ok(substitute(template, &entity.popup_fields()))
    }

    pub fn render_popup<E: Entity>(&self, entity: &E) -> Result<String, RenderError> {
        self.render(E::KIND.popup_template(), entity)
    }
}

/// Replace every `{name}` whose name has a field; everything else is copied verbatim.
pub fn substitute(template: &str, fields: &Fields) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let matched = after
            .find('}')
            .and_then(|close| lookup(fields, &after[..close]).map(|value| (value, close)));

        match matched {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    fields
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.as_str())
}

/// Upper-case the first character.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human label for a wire type: `flood` → `Flood`, `first-aid` → `First aid`.
pub fn type_label(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return "Unknown".to_string();
    }
    capitalize(&raw.replace('-', " "))
}

/// The value, unless it is missing or blank.
pub fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

enum Stamp {
    /// Carried an offset; shown in the viewer's zone.
    Zoned(DateTime<FixedOffset>),
    /// Server wall-clock time, shown as written.
    Naive(NaiveDateTime),
}

fn parse_timestamp(raw: &str) -> Option<Stamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Stamp::Zoned(dt));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(Stamp::Naive)
}

fn format_in<Tz>(raw: Option<&str>, pattern: &str, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return "Unknown".to_string();
    };
    match parse_timestamp(raw) {
        Some(Stamp::Zoned(dt)) => dt.with_timezone(zone).format(pattern).to_string(),
        Some(Stamp::Naive(dt)) => dt.format(pattern).to_string(),
        None => escape_html(raw),
    }
}

/// `2024-05-01 10:15` in local time, or the raw text when it is not a recognizable timestamp.
pub fn format_timestamp(raw: Option<&str>) -> String {
    format_in(raw, "%Y-%m-%d %H:%M", &Local)
}

/// `10:15` in local time.
pub fn format_clock(raw: Option<&str>) -> String {
    format_in(raw, "%H:%M", &Local)
}

pub fn shelter_tags_html(tags: &[ShelterResourceTag]) -> String {
    if tags.is_empty() {
        return NO_RESOURCES_HTML.to_string();
    }
    let mut html = String::new();
    for tag in tags {
        let quantity = tag.quantity.unwrap_or(0);
        let _ = write!(
            html,
            r#"<span class="resource-tag">{} ({quantity})</span>"#,
            escape_html(&tag.name)
        );
    }
    html
}

/// Rewrite the `Verified by: N users` line of rendered popup markup.
///
/// Content without that line is returned unchanged.
pub fn with_verification_count(content: &str, count: u32) -> String {
    let Some(start) = content.find(VERIFIED_PREFIX) else {
        return content.to_string();
    };
    let digits_start = start + VERIFIED_PREFIX.len();
    let digits_len = content[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    let digits_end = digits_start + digits_len;
    if digits_len == 0 || !content[digits_end..].starts_with(VERIFIED_SUFFIX) {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len() + 4);
    out.push_str(&content[..digits_start]);
    let _ = write!(out, "{count}");
    out.push_str(&content[digits_end..]);
    out
}

/// Google Maps driving directions; without an origin the browser's location is used.
pub fn directions_url(origin: Option<GeoPoint>, target: GeoPoint) -> String {
    match origin {
        Some(origin) => format!(
            "https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}&travelmode=driving",
            origin.latitude, origin.longitude, target.latitude, target.longitude
        ),
        None => format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}&travelmode=driving",
            target.latitude, target.longitude
        ),
    }
}

fn location_label(latitude: f64, longitude: f64) -> String {
    GeoPoint::new(latitude, longitude)
        .map(|point| format!("{:.4}, {:.4}", point.latitude, point.longitude))
        .unwrap_or_else(|| "Unknown location".to_string())
}

pub fn incident_list_item(incident: &Incident) -> String {
    format!(
        r#"<div class="incident-item urgency-{urgency}" data-id="{id}">
<div class="incident-icon"><i class="{glyph} urgency-{urgency}"></i></div>
<div class="incident-details">
<h4>{label}</h4>
<p>{description}</p>
<div class="meta-data"><span><i class="fas fa-map-marker-alt"></i> {location}</span><span><i class="far fa-clock"></i> {time}</span></div>
</div>
</div>"#,
        urgency = incident.urgency,
        id = escape_html(incident.id.as_str()),
        glyph = incident_glyph(incident.kind),
        label = type_label(incident.kind.as_str()),
        description = escape_html(incident.description_or_default()),
        location = location_label(incident.latitude, incident.longitude),
        time = format_clock(incident.reported_at.as_deref()),
    )
}

pub fn resource_list_item(resource: &Resource) -> String {
    let location = resource
        .location
        .as_deref()
        .map(escape_html)
        .unwrap_or_else(|| location_label(resource.latitude, resource.longitude));
    format!(
        r#"<div class="resource-item status-{status}" data-id="{id}">
<div class="resource-icon"><i class="{glyph} status-{status}"></i></div>
<div class="resource-details">
<h4>{name}</h4>
<p>{description}</p>
<div class="meta-data"><span><i class="fas fa-map-marker-alt"></i> {location}</span><span><i class="fas fa-users"></i> Capacity: {capacity}</span></div>
</div>
</div>"#,
        status = resource.status,
        id = escape_html(resource.id.as_str()),
        glyph = resource_glyph(resource.kind),
        name = escape_html(&resource.name),
        description = escape_html(or_default(
            resource.description.as_deref(),
            crate::incident::NO_DESCRIPTION
        )),
        capacity = resource
            .capacity
            .map(|capacity| capacity.to_string())
            .unwrap_or_else(|| crate::resource::UNKNOWN.to_string()),
    )
}

pub fn sos_list_item(alert: &SosAlert) -> String {
    format!(
        r#"<div class="sos-item" data-id="{id}">
<div class="sos-icon"><i class="fas fa-exclamation-triangle"></i></div>
<div class="sos-details">
<h4>SOS Alert</h4>
<p>User: {user}</p>
<div class="meta-data"><span><i class="fas fa-map-marker-alt"></i> {location}</span><span><i class="far fa-clock"></i> {time}</span></div>
</div>
</div>"#,
        id = escape_html(alert.id.as_str()),
        user = escape_html(or_default(alert.user.as_deref(), "Unknown user")),
        location = location_label(alert.latitude, alert.longitude),
        time = format_clock(alert.time.as_deref()),
    )
}

pub fn broadcast_list_item(broadcast: &Broadcast) -> String {
    format!(
        r#"<div class="broadcast-item" data-id="{id}">
<div class="broadcast-icon"><i class="fas fa-broadcast-tower"></i></div>
<div class="broadcast-details">
<h4>Emergency Broadcast</h4>
<p>{message}</p>
<div class="meta-data"><span><i class="fas fa-user"></i> {sender}</span><span><i class="fas fa-broadcast-tower"></i> {radius}km radius</span><span><i class="far fa-clock"></i> {time}</span></div>
</div>
</div>"#,
        id = escape_html(broadcast.id.as_str()),
        message = escape_html(&broadcast.message),
        sender = escape_html(or_default(
            broadcast.sender.as_deref(),
            DEFAULT_BROADCAST_SENDER
        )),
        radius = broadcast.radius,
        time = format_clock(broadcast.time.as_deref()),
    )
}

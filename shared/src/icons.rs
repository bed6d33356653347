use crate::incident::{IncidentType, Urgency};
use crate::resource::ResourceType;
use crate::shelter::ShelterStatus;

/// How a marker pin is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerIcon {
    /// Raster pin served from `/static/img`.
    Image {
        url: &'static str,
        size: (u32, u32),
        anchor: (u32, u32),
        popup_anchor: (i32, i32),
    },
    /// Inline HTML pin (font icon inside a styled div).
    Html {
        class_name: &'static str,
        html: &'static str,
        size: (u32, u32),
        anchor: (u32, u32),
    },
}

/// Translucent circle drawn underneath a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Halo {
    pub radius_m: f64,
    pub color: &'static str,
    pub fill_opacity: f64,
}

pub const URGENT_PULSE_RADIUS_M: f64 = 200.0;
pub const SHELTER_STATUS_RADIUS_M: f64 = 100.0;

const fn pin(url: &'static str) -> MarkerIcon {
    MarkerIcon::Image {
        url,
        size: (32, 32),
        anchor: (16, 32),
        popup_anchor: (0, -32),
    }
}

pub const SOS_ICON: MarkerIcon = MarkerIcon::Image {
    url: "/static/img/sos.png",
    size: (38, 38),
    anchor: (19, 38),
    popup_anchor: (0, -38),
};

pub const SHELTER_ICON: MarkerIcon = MarkerIcon::Html {
    class_name: "custom-div-icon",
    html: r#"<div class="marker-pin shelter-pin"><i class="fas fa-home"></i></div>"#,
    size: (30, 42),
    anchor: (15, 42),
};

pub const BROADCAST_ICON: MarkerIcon = pin("/static/img/broadcast.png");

pub const USER_LOCATION_ICON: MarkerIcon = MarkerIcon::Image {
    url: "/static/img/user-location.png",
    size: (24, 24),
    anchor: (12, 12),
    popup_anchor: (0, -12),
};

pub const fn incident_icon(kind: IncidentType) -> MarkerIcon {
    match kind {
        IncidentType::Flood => pin("/static/img/flood.png"),
        IncidentType::Fire => pin("/static/img/fire.png"),
        IncidentType::Collapse => pin("/static/img/collapse.png"),
        IncidentType::Roadblock => pin("/static/img/roadblock.png"),
        IncidentType::Medical => pin("/static/img/medical.png"),
        IncidentType::Other => pin("/static/img/other.png"),
    }
}

pub const fn resource_icon(kind: ResourceType) -> MarkerIcon {
    match kind {
        ResourceType::Hospital => pin("/static/img/hospital.png"),
        ResourceType::Food => pin("/static/img/food.png"),
        ResourceType::Water => pin("/static/img/water.png"),
        ResourceType::Volunteer => pin("/static/img/volunteer.png"),
        ResourceType::Shelter => SHELTER_ICON,
        ResourceType::Other => pin("/static/img/other.png"),
    }
}

pub const fn urgency_halo(urgency: Urgency) -> Option<Halo> {
    match urgency {
        Urgency::High => Some(Halo {
            radius_m: URGENT_PULSE_RADIUS_M,
            color: "#e74c3c",
            fill_opacity: 0.2,
        }),
        Urgency::Medium | Urgency::Low => None,
    }
}

pub const fn shelter_halo(status: ShelterStatus) -> Halo {
    let color = match status {
        ShelterStatus::Operational => "#2ecc71",
        ShelterStatus::Limited => "#f39c12",
        ShelterStatus::Full => "#e74c3c",
    };
    Halo {
        radius_m: SHELTER_STATUS_RADIUS_M,
        color,
        fill_opacity: 0.2,
    }
}

/// Coverage area of a broadcast; `radius_km` is assumed positive.
pub fn broadcast_halo(radius_km: f64) -> Halo {
    Halo {
        radius_m: radius_km * 1000.0,
        color: "#3498db",
        fill_opacity: 0.1,
    }
}

/// Font Awesome class for an incident row in the dashboard list.
pub const fn incident_glyph(kind: IncidentType) -> &'static str {
    match kind {
        IncidentType::Fire => "fas fa-fire",
        IncidentType::Flood => "fas fa-water",
        IncidentType::Collapse => "fas fa-building",
        IncidentType::Roadblock => "fas fa-road",
        IncidentType::Medical => "fas fa-first-aid",
        IncidentType::Other => "fas fa-exclamation-triangle",
    }
}

pub const fn resource_glyph(kind: ResourceType) -> &'static str {
    match kind {
        ResourceType::Shelter => "fas fa-home",
        ResourceType::Hospital => "fas fa-hospital",
        ResourceType::Food => "fas fa-utensils",
        ResourceType::Water => "fas fa-tint",
        ResourceType::Volunteer => "fas fa-hands-helping",
        ResourceType::Other => "fas fa-box-open",
    }
}

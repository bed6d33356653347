use crate::geo::GeoPoint;

pub const DEFAULT_API_BASE: &str = "";
pub const DEFAULT_CHANNEL_PATH: &str = "/ws";
pub const DEFAULT_CENTER_LAT: f64 = 51.505;
pub const DEFAULT_CENTER_LNG: f64 = -0.09;
pub const DEFAULT_ZOOM: f64 = 13.0;
pub const DEFAULT_USER_ZOOM: f64 = 13.0;
pub const DEFAULT_FOCUS_ZOOM: f64 = 16.0;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";
const MAX_ZOOM: f64 = 19.0;

pub const KEY_API_BASE: &str = "relief.api_base";
pub const KEY_CHANNEL_PATH: &str = "relief.channel_path";
pub const KEY_TILE_URL: &str = "relief.tile_url";
pub const KEY_CENTER_LAT: &str = "relief.center_lat";
pub const KEY_CENTER_LNG: &str = "relief.center_lng";
pub const KEY_ZOOM: &str = "relief.zoom";
pub const KEY_USER_ZOOM: &str = "relief.user_zoom";
pub const KEY_FOCUS_ZOOM: &str = "relief.focus_zoom";
pub const KEY_LOG_LEVEL: &str = "relief.log_level";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Prefix for REST paths; empty means same origin.
    pub api_base: String,
    pub channel_path: String,
    pub tile_url: String,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    pub user_zoom: f64,
    pub focus_zoom: f64,
    pub log_level: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            tile_url: DEFAULT_TILE_URL.to_string(),
            default_center: default_center(),
            default_zoom: DEFAULT_ZOOM,
            user_zoom: DEFAULT_USER_ZOOM,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_center() -> GeoPoint {
    GeoPoint {
        latitude: DEFAULT_CENTER_LAT,
        longitude: DEFAULT_CENTER_LNG,
    }
}

fn zoom(value: Option<String>, default: f64) -> f64 {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| (0.0..=MAX_ZOOM).contains(value))
        .unwrap_or(default)
}

fn text(value: Option<String>, default: &str) -> String {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl DashboardConfig {
    /// Build from string overrides; anything missing or invalid keeps its default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let center = match (lookup(KEY_CENTER_LAT), lookup(KEY_CENTER_LNG)) {
            (Some(lat), Some(lng)) => crate::geo::parse_point(&lat, &lng),
            _ => None,
        };
        let log_level = lookup(KEY_LOG_LEVEL)
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| LOG_LEVELS.contains(&value.as_str()))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Self {
            api_base: lookup(KEY_API_BASE)
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            channel_path: text(lookup(KEY_CHANNEL_PATH), DEFAULT_CHANNEL_PATH),
            tile_url: text(lookup(KEY_TILE_URL), DEFAULT_TILE_URL),
            default_center: center.unwrap_or_else(default_center),
            default_zoom: zoom(lookup(KEY_ZOOM), DEFAULT_ZOOM),
            user_zoom: zoom(lookup(KEY_USER_ZOOM), DEFAULT_USER_ZOOM),
            focus_zoom: zoom(lookup(KEY_FOCUS_ZOOM), DEFAULT_FOCUS_ZOOM),
            log_level,
        }
    }

    /// Absolute or same-origin URL for an API path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }
}

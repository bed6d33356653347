use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::entity::{EntityId, wire_enum};
use crate::error::ApiError;
use crate::geo::GeoPoint;
use crate::incident::{IncidentType, Urgency};
use crate::shelter::{ShelterResourceTag, ShelterStatus};

pub const INCIDENTS_PATH: &str = "/api/incidents";
pub const RESOURCES_PATH: &str = "/api/resources";
pub const SHELTERS_PATH: &str = "/api/shelters";

/// File name the recorded voice note is uploaded under.
pub const AUDIO_FILE_NAME: &str = "report-audio.webm";

wire_enum! {
    pub enum TimeWindow (default = Last24Hours) {
        LastHour => "1h",
        Last6Hours => "6h",
        Last24Hours => "24h",
    }
}

impl TimeWindow {
    pub const fn hours(self) -> i64 {
        match self {
            Self::LastHour => 1,
            Self::Last6Hours => 6,
            Self::Last24Hours => 24,
        }
    }

    /// Earliest report time still inside the window.
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.hours())
    }
}

/// Server-side incident filter. `None` fields mean "all".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    pub kind: Option<IncidentType>,
    pub urgency: Option<Urgency>,
    pub window: Option<TimeWindow>,
}

impl IncidentQuery {
    /// Parse the filter panel's raw select values. `""`, `"all"` and
    /// anything unrecognised clear a field.
    pub fn from_form(kind: &str, urgency: &str, window: &str) -> Self {
        Self {
            kind: IncidentType::parse(kind),
            urgency: Urgency::parse(urgency),
            window: TimeWindow::parse(window),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.urgency.is_none() && self.window.is_none()
    }

    /// `?type=..&urgency=..&time_from=..` with only the selected parameters, or `""`.
    pub fn to_query_string(&self, now: DateTime<Utc>) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(kind) = self.kind {
            params.push(format!("type={kind}"));
        }
        if let Some(urgency) = self.urgency {
            params.push(format!("urgency={urgency}"));
        }
        if let Some(window) = self.window {
            let from = window.start(now).to_rfc3339_opts(SecondsFormat::Secs, true);
            params.push(format!("time_from={from}"));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }

    pub fn path(&self, now: DateTime<Utc>) -> String {
        format!("{INCIDENTS_PATH}{}", self.to_query_string(now))
    }
}

/// Multipart incident report. `A` is the platform's file handle type.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentReport<A> {
    pub kind: IncidentType,
    pub description: String,
    pub location: GeoPoint,
    pub urgency: Urgency,
    pub image: Option<A>,
    pub audio: Option<A>,
}

impl<A> IncidentReport<A> {
    /// Text parts of the multipart body, in submission order.
    pub fn text_parts(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.kind.as_str().to_string()),
            ("description", self.description.clone()),
            ("latitude", self.location.latitude.to_string()),
            ("longitude", self.location.longitude.to_string()),
            ("urgency", self.urgency.as_str().to_string()),
        ]
    }
}

/// JSON body of `POST /api/shelters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewShelter {
    pub name: String,
    pub description: String,
    pub capacity: Option<u32>,
    pub contact: String,
    pub status: ShelterStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub resources: Vec<ShelterResourceTag>,
}

/// HTTP seam of the dashboard. Responses are returned as raw JSON so that
/// decoding, and its failure modes, stay with the caller.
#[allow(async_fn_in_trait)]
pub trait DashboardApi {
    /// Browser file/blob handle carried by multipart uploads.
    type Attachment;

    /// `path` already includes any query string.
    async fn fetch_incidents(&self, path: &str) -> Result<serde_json::Value, ApiError>;

    async fn fetch_resources(&self) -> Result<serde_json::Value, ApiError>;

    async fn fetch_shelters(&self) -> Result<serde_json::Value, ApiError>;

    async fn create_incident(
        &self,
        report: IncidentReport<Self::Attachment>,
    ) -> Result<serde_json::Value, ApiError>;

    async fn create_shelter(&self, shelter: &NewShelter) -> Result<serde_json::Value, ApiError>;

    /// Ask the server to count one more verification. The new count comes
    /// back to every client as an `incident_verified` push.
    async fn verify_incident(&self, id: &EntityId) -> Result<serde_json::Value, ApiError>;
}

pub fn verify_path(id: &EntityId) -> String {
    format!("{INCIDENTS_PATH}/{id}/verify")
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_filter_has_no_query() {
        let query = IncidentQuery::from_form("all", "", "all");
        assert!(query.is_empty());
        assert_eq!(query.path(noon()), "/api/incidents");
    }

    #[test]
    fn query_contains_only_selected_parameters() {
        let query = IncidentQuery::from_form("fire", "all", "6h");
        assert_eq!(
            query.to_query_string(noon()),
            "?type=fire&time_from=2024-05-01T06:00:00Z"
        );

        let urgency_only = IncidentQuery {
            urgency: Some(Urgency::High),
            ..IncidentQuery::default()
        };
        assert_eq!(urgency_only.to_query_string(noon()), "?urgency=high");
    }

    #[test]
    fn unrecognised_select_values_are_left_out() {
        let query = IncidentQuery::from_form("wildfire", "extreme", "3d");
        assert!(query.is_empty());
        assert_eq!(query.path(noon()), "/api/incidents");

        let query = IncidentQuery::from_form(" Flood ", "bogus", "");
        assert_eq!(query.to_query_string(noon()), "?type=flood");
    }

    #[test]
    fn verify_path_embeds_id() {
        assert_eq!(verify_path(&"9f1c".into()), "/api/incidents/9f1c/verify");
    }

    #[test]
    fn report_parts_follow_form_order() {
        let report = IncidentReport::<()> {
            kind: IncidentType::Flood,
            description: "Road under water".into(),
            location: GeoPoint::new(51.5, -0.1).unwrap(),
            urgency: Urgency::Low,
            image: None,
            audio: None,
        };
        let names: Vec<_> = report.text_parts().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["type", "description", "latitude", "longitude", "urgency"]);
    }
}

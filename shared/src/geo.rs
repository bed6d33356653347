use serde::{Deserialize, Deserializer, Serialize};

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` unless both values are finite and inside WGS84 bounds.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// `Lat: 51.505000, Lng: -0.090000`
    pub fn label(&self) -> String {
        format!("Lat: {:.6}, Lng: {:.6}", self.latitude, self.longitude)
    }
}

/// Parse a user-typed coordinate pair; blank or unparseable input is `None`.
pub fn parse_point(latitude: &str, longitude: &str) -> Option<GeoPoint> {
    let latitude = latitude.trim().parse::<f64>().ok()?;
    let longitude = longitude.trim().parse::<f64>().ok()?;
    GeoPoint::new(latitude, longitude)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Decode a coordinate that may arrive as a number or a numeric string.
///
/// Anything unparseable becomes NaN so the entity is still stored but never plotted.
pub fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = Option::<NumberOrText>::deserialize(deserializer).unwrap_or(None);
    Ok(match raw {
        Some(NumberOrText::Number(value)) => value,
        Some(NumberOrText::Text(text)) => text.trim().parse().unwrap_or(f64::NAN),
        None => f64::NAN,
    })
}

/// Decode an optional non-negative count (capacity, quantity, radius) from a number or string.
pub fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<NumberOrText>::deserialize(deserializer).unwrap_or(None);
    Ok(match raw {
        Some(NumberOrText::Number(value)) if value.is_finite() && value >= 0.0 => {
            Some(value.round() as u32)
        }
        Some(NumberOrText::Text(text)) => text.trim().parse::<u32>().ok(),
        _ => None,
    })
}

pub(crate) fn nan() -> f64 {
    f64::NAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "lenient_coordinate", default = "nan")]
        lat: f64,
        #[serde(deserialize_with = "lenient_count", default)]
        capacity: Option<u32>,
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::new(51.5, -0.09).is_some());
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, -180.5).is_none());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_none());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn coordinates_decode_from_numbers_and_strings() {
        let probe: Probe = serde_json::from_str(r#"{"lat": "51.25", "capacity": "40"}"#).unwrap();
        assert_eq!(probe.lat, 51.25);
        assert_eq!(probe.capacity, Some(40));

        let probe: Probe = serde_json::from_str(r#"{"lat": 12.5, "capacity": 7}"#).unwrap();
        assert_eq!(probe.lat, 12.5);
        assert_eq!(probe.capacity, Some(7));
    }

    #[test]
    fn garbage_coordinates_become_nan() {
        let probe: Probe = serde_json::from_str(r#"{"lat": "north"}"#).unwrap();
        assert!(probe.lat.is_nan());
        assert_eq!(probe.capacity, None);

        let probe: Probe = serde_json::from_str(r#"{"lat": null, "capacity": "lots"}"#).unwrap();
        assert!(probe.lat.is_nan());
        assert_eq!(probe.capacity, None);
    }

    #[test]
    fn parses_typed_pairs() {
        assert_eq!(
            parse_point(" 40.0 ", "-74.5"),
            Some(GeoPoint {
                latitude: 40.0,
                longitude: -74.5
            })
        );
        assert_eq!(parse_point("", "1"), None);
    }

    #[test]
    fn label_uses_six_decimals() {
        let point = GeoPoint::new(51.505, -0.09).unwrap();
        assert_eq!(point.label(), "Lat: 51.505000, Lng: -0.090000");
    }
}

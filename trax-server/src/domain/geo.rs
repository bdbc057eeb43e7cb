//! Route shapes and vehicle positions.

use serde::{Deserialize, Serialize};

use super::time::ServiceDate;

/// One point of a route shape, as in the schedule's shape table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    pub lat: f64,
    pub lon: f64,

    /// Position of the point along the shape.
    pub sequence: u32,

    #[serde(default)]
    pub dist_traveled: Option<f64>,
}

/// A vehicle position report from the real-time feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub vehicle_id: String,

    #[serde(default)]
    pub trip_id: Option<String>,

    /// Service date of the trip the vehicle reports, when given.
    #[serde(default)]
    pub start_date: Option<ServiceDate>,

    #[serde(default)]
    pub lat: Option<f64>,

    #[serde(default)]
    pub lon: Option<f64>,

    #[serde(default)]
    pub bearing: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_position_defaults() {
        let vp: VehiclePosition = serde_json::from_str(r#"{"vehicle_id": "IMU100"}"#).unwrap();
        assert_eq!(vp.trip_id, None);
        assert_eq!(vp.start_date, None);
        assert_eq!(vp.bearing, None);

        let vp: VehiclePosition =
            serde_json::from_str(r#"{"vehicle_id": "IMU100", "trip_id": "t1", "start_date": "20240315"}"#)
                .unwrap();
        assert_eq!(vp.start_date, Some(ServiceDate::parse("20240315").unwrap()));
    }

    #[test]
    fn shape_point_distance_is_optional() {
        let pt: ShapePoint =
            serde_json::from_str(r#"{"shape_id": "s1", "lat": -27.46, "lon": 153.02, "sequence": 3}"#)
                .unwrap();
        assert_eq!(pt.sequence, 3);
        assert_eq!(pt.dist_traveled, None);
    }
}

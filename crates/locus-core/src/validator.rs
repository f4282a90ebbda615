//! Shape validation and normalization.
//!
//! Pure; no I/O. Used on both the drain path and the backup-replay path, so
//! a record rejected once is rejected the same way forever: there is no
//! hidden state a replay could see differently.

use crate::types::{
    GpsRecord, MobileRecord, RawGpsRecord, RawMobileRecord, Record, RejectionReason,
};
use chrono::{DateTime, Utc};

pub type ValidationResult = Result<Record, RejectionReason>;

const LAT_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
const LNG_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Validate and normalize a single raw GPS queue entry.
pub fn validate_gps(raw_json: &str) -> ValidationResult {
    let raw: RawGpsRecord =
        serde_json::from_str(raw_json).map_err(|_| RejectionReason::MalformedJson)?;

    if raw.device_id.trim().is_empty() {
        return Err(RejectionReason::EmptyIdentifier);
    }
    if !LAT_RANGE.contains(&raw.lat) {
        return Err(RejectionReason::OutOfRangeLat);
    }
    if !LNG_RANGE.contains(&raw.lng) {
        return Err(RejectionReason::OutOfRangeLng);
    }
    let timestamp = parse_utc_timestamp(&raw.timestamp)?;

    Ok(Record::Gps(GpsRecord {
        device_id: raw.device_id,
        lat: raw.lat,
        lng: raw.lng,
        timestamp,
    }))
}

/// Validate and normalize a single raw mobile-inspector queue entry.
pub fn validate_mobile(raw_json: &str) -> ValidationResult {
    let raw: RawMobileRecord =
        serde_json::from_str(raw_json).map_err(|_| RejectionReason::MalformedJson)?;

    if raw.user_id.trim().is_empty() {
        return Err(RejectionReason::EmptyIdentifier);
    }
    if !LAT_RANGE.contains(&raw.lat) {
        return Err(RejectionReason::OutOfRangeLat);
    }
    if !LNG_RANGE.contains(&raw.lng) {
        return Err(RejectionReason::OutOfRangeLng);
    }
    let timestamp = parse_utc_timestamp(&raw.timestamp)?;

    Ok(Record::Mobile(MobileRecord {
        user_id: raw.user_id,
        lat: raw.lat,
        lng: raw.lng,
        timestamp,
        name: raw.name,
        email: raw.email,
    }))
}

fn parse_utc_timestamp(raw: &str) -> Result<DateTime<Utc>, RejectionReason> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RejectionReason::UnparseableTimestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_gps_json() -> String {
        r#"{"deviceId":"A","lat":-12.0464,"lng":-77.0428,"timestamp":"2024-01-15T10:30:00Z","speed":12.3}"#.to_string()
    }

    fn valid_mobile_json() -> String {
        r#"{"userId":"U1","lat":10.0,"lng":20.0,"timestamp":"2024-01-15T10:30:00Z","name":"A","email":"a@b.com"}"#.to_string()
    }

    #[test]
    fn accepts_valid_gps_and_strips_unknown_fields() {
        let record = validate_gps(&valid_gps_json()).unwrap();
        match record {
            Record::Gps(r) => {
                assert_eq!(r.device_id, "A");
                assert_eq!(r.lat, -12.0464);
            }
            _ => panic!("expected gps record"),
        }
        // The normalized record, when re-serialized, must not carry `speed`.
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("speed"));
    }

    #[test]
    fn accepts_valid_mobile() {
        let record = validate_mobile(&valid_mobile_json()).unwrap();
        assert_eq!(record.family(), crate::types::Family::Mobile);
    }

    #[test]
    fn rejects_malformed_json() {
        assert_eq!(validate_gps("not json"), Err(RejectionReason::MalformedJson));
        assert_eq!(
            validate_gps(r#"{"deviceId":"A"}"#),
            Err(RejectionReason::MalformedJson)
        );
    }

    #[test]
    fn rejects_out_of_range_lat() {
        let json = r#"{"deviceId":"A","lat":999,"lng":0,"timestamp":"2024-01-15T10:30:00Z"}"#;
        assert_eq!(validate_gps(json), Err(RejectionReason::OutOfRangeLat));
    }

    #[test]
    fn rejects_out_of_range_lng() {
        let json = r#"{"deviceId":"A","lat":0,"lng":-181,"timestamp":"2024-01-15T10:30:00Z"}"#;
        assert_eq!(validate_gps(json), Err(RejectionReason::OutOfRangeLng));
    }

    #[test]
    fn rejects_empty_identifier() {
        let json = r#"{"deviceId":"","lat":0,"lng":0,"timestamp":"2024-01-15T10:30:00Z"}"#;
        assert_eq!(validate_gps(json), Err(RejectionReason::EmptyIdentifier));
    }

    #[test]
    fn rejects_unparseable_timestamp() {
        let json = r#"{"deviceId":"A","lat":0,"lng":0,"timestamp":"not-a-date"}"#;
        assert_eq!(
            validate_gps(json),
            Err(RejectionReason::UnparseableTimestamp)
        );
    }

    #[test]
    fn boundary_lat_lng_are_valid() {
        let json = r#"{"deviceId":"A","lat":90,"lng":-180,"timestamp":"2024-01-15T10:30:00Z"}"#;
        assert!(validate_gps(json).is_ok());
        let json = r#"{"deviceId":"A","lat":-90,"lng":180,"timestamp":"2024-01-15T10:30:00Z"}"#;
        assert!(validate_gps(json).is_ok());
    }
}

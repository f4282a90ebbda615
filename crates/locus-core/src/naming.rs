//! Blob and backup-file naming conventions.

use crate::types::Family;
use chrono::{DateTime, Utc};

/// `{familyPrefix}/{YYYY-MM-DDTHH-mm-ss.sssZ}_{processingId}.json`
pub fn blob_name(prefix: &str, uploaded_at: DateTime<Utc>, processing_id: &str) -> String {
    let stamp = uploaded_at.format("%Y-%m-%dT%H-%M-%S%.3fZ");
    format!("{prefix}/{stamp}_{processing_id}.json")
}

/// `backup_{family}_{YYYYMMDD_HHmmss}_{id}.json`
pub fn backup_file_name(family: Family, created_at: DateTime<Utc>, backup_id: u64) -> String {
    let stamp = created_at.format("%Y%m%d_%H%M%S");
    format!("backup_{}_{}_{}.json", family.as_str(), stamp, backup_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blob_name_matches_spec_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let name = blob_name("gps-data", ts, "abc123");
        assert_eq!(name, "gps-data/2024-01-15T10-30-00.000Z_abc123.json");
    }

    #[test]
    fn backup_file_name_matches_spec_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let name = backup_file_name(Family::Gps, ts, 42);
        assert_eq!(name, "backup_gps_20240115_103000_42.json");
    }
}

//! NDJSON encoding. Pure, no I/O.

use crate::types::Record;

/// Serialize each record to a JSON line, newline-separated. No trailing
/// newline is emitted.
pub fn encode_records(records: &[Record]) -> Result<String, serde_json::Error> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    Ok(lines.join("\n"))
}

/// Parse an NDJSON body back into records of a known family. Used by tests
/// to verify the round-trip property.
pub fn decode_records(body: &str) -> Result<Vec<Record>, serde_json::Error> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Family, GpsRecord};
    use chrono::Utc;

    fn sample_records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::Gps(GpsRecord {
                    device_id: format!("D{i}"),
                    lat: 1.0,
                    lng: 2.0,
                    timestamp: Utc::now(),
                })
            })
            .collect()
    }

    #[test]
    fn round_trip_preserves_order_and_content() {
        let records = sample_records(5);
        let encoded = encode_records(&records).unwrap();
        assert_eq!(encoded.lines().count(), 5);
        let decoded = decode_records(&encoded).unwrap();
        assert_eq!(decoded, records);
        assert_eq!(decoded[0].family(), Family::Gps);
    }

    #[test]
    fn empty_batch_encodes_to_empty_string() {
        let encoded = encode_records(&[]).unwrap();
        assert_eq!(encoded, "");
    }

    #[test]
    fn trailing_newline_is_tolerated_on_decode() {
        let records = sample_records(2);
        let mut encoded = encode_records(&records).unwrap();
        encoded.push('\n');
        let decoded = decode_records(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::payload::{AlertLabel, DecodedReading};
use crate::utils::parse_epoch_seconds;

/// Body of a Sigfox data callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRecord {
    #[serde(default, deserialize_with = "text_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub station: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub rssi: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub seq: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "text_or_number")]
    pub message_type: Option<String>,
}

// Sigfox templates send rssi/seq/time either quoted or bare
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

/// A callback ready to be appended to the store
#[derive(Debug, Clone)]
pub struct NewReading {
    pub record: InboundRecord,
    pub decoded: DecodedReading,
    pub alerts: Vec<AlertLabel>,
    pub received_at: OffsetDateTime,
}

impl NewReading {
    pub fn new(record: InboundRecord, decoded: DecodedReading, alerts: Vec<AlertLabel>) -> Self {
        NewReading {
            record,
            decoded,
            alerts,
            received_at: OffsetDateTime::now_utc(),
        }
    }

    /// Attach the store-assigned id
    pub fn into_stored(self, id: i64) -> StoredReading {
        let device_time = self.record.time.as_deref().and_then(parse_epoch_seconds);
        StoredReading {
            id,
            device: self.record.id,
            time: self.record.time,
            device_time,
            station: self.record.station,
            data: self.record.data,
            rssi: self.record.rssi,
            seq: self.record.seq,
            message_type: self.record.message_type,
            received_at: self.received_at,
            decoded: self.decoded,
            alerts: self.alerts,
        }
    }
}

/// A persisted callback with its decoded values, as served to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReading {
    pub id: i64,
    pub device: Option<String>,
    pub time: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub device_time: Option<OffsetDateTime>,
    pub station: Option<String>,
    pub data: Option<String>,
    pub rssi: Option<String>,
    pub seq: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    pub decoded: DecodedReading,
    pub alerts: Vec<AlertLabel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_callback_accepts_numbers_and_strings() {
        let record: InboundRecord = serde_json::from_str(
            r#"{"id":"1A2B3C","time":1718000000,"station":"0F4E","data":"00FA028F",
                "rssi":-112.5,"seq":"42","type":"data"}"#,
        )
        .unwrap();
        assert_eq!(record.id.as_deref(), Some("1A2B3C"));
        assert_eq!(record.time.as_deref(), Some("1718000000"));
        assert_eq!(record.rssi.as_deref(), Some("-112.5"));
        assert_eq!(record.seq.as_deref(), Some("42"));
        assert_eq!(record.message_type.as_deref(), Some("data"));
    }

    #[test]
    fn missing_and_null_fields_are_absent() {
        let record: InboundRecord = serde_json::from_str(r#"{"id":"1A2B3C","data":null}"#).unwrap();
        assert_eq!(record.data, None);
        assert_eq!(record.station, None);
    }

    #[test]
    fn stored_reading_resolves_device_time() {
        let record = InboundRecord {
            id: Some("1A2B3C".into()),
            time: Some("1718000000".into()),
            ..Default::default()
        };
        let stored = NewReading::new(record, DecodedReading::default(), vec![]).into_stored(7);
        assert_eq!(stored.id, 7);
        assert_eq!(stored.device_time.map(|t| t.unix_timestamp()), Some(1_718_000_000));

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["device"], "1A2B3C");
        assert_eq!(json["device_time"], "2024-06-10T06:13:20Z");
        assert!(json["type"].is_null());
        assert_eq!(json["decoded"]["latitude"], 19.432608);
    }
}

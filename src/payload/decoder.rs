/// Sigfox payload decoding into structured sensor readings
use log::{debug, warn};
use serde::ser::{Serialize, SerializeStruct, Serializer};

// Fixed-point scale of each field (raw integer / scale = value)
pub const TEMPERATURE_SCALE: f64 = 10.0;
pub const HUMIDITY_SCALE: f64 = 10.0;
pub const BATTERY_SCALE: f64 = 1000.0;
pub const COORDINATE_SCALE: f64 = 1_000_000.0;

// Location reported when the payload carries no coordinates
pub const FALLBACK_LATITUDE: f64 = 19.432608;
pub const FALLBACK_LONGITUDE: f64 = -99.133209;

/// Failure while turning the cleaned hex string into bytes
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid hex payload: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Sensor values decoded from one payload.
///
/// Fields fill strictly in byte order, so a later field is only `Some`
/// when every earlier field is `Some` as well.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodedReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DecodedReading {
    pub fn latitude_or_fallback(&self) -> f64 {
        self.latitude.unwrap_or(FALLBACK_LATITUDE)
    }

    pub fn longitude_or_fallback(&self) -> f64 {
        self.longitude.unwrap_or(FALLBACK_LONGITUDE)
    }

    /// True when the payload was long enough to carry every field
    pub fn is_complete(&self) -> bool {
        self.longitude.is_some()
    }

    /// True when no field could be decoded
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
    }
}

// JSON form always carries a location; `location_fallback` tells the
// consumer whether it came from the payload.
impl Serialize for DecodedReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DecodedReading", 6)?;
        state.serialize_field("temperature", &self.temperature)?;
        state.serialize_field("humidity", &self.humidity)?;
        state.serialize_field("battery", &self.battery)?;
        state.serialize_field("latitude", &self.latitude_or_fallback())?;
        state.serialize_field("longitude", &self.longitude_or_fallback())?;
        state.serialize_field(
            "location_fallback",
            &(self.latitude.is_none() || self.longitude.is_none()),
        )?;
        state.end()
    }
}

/// Decode a raw Sigfox payload, recovering from any failure.
///
/// Never fails: a payload that cannot be parsed yields a reading with
/// every field absent (and therefore the fallback location).
/// Use [`try_decode`] to tell malformed input apart from short input.
pub fn decode(raw: &str) -> DecodedReading {
    match try_decode(raw) {
        Ok(reading) => reading,
        Err(e) => {
            warn!("Error decoding payload {:?}: {}", raw, e);
            DecodedReading::default()
        }
    }
}

/// Decode a raw Sigfox payload into a [`DecodedReading`]
///
/// The payload is a single big-endian record without per-field tags:
/// - Bytes 0-1: Temperature (signed 16-bit, 0.1 resolution)
/// - Bytes 2-3: Humidity (unsigned 16-bit, 0.1 resolution)
/// - Bytes 4-5: Battery (unsigned 16-bit, 0.001 resolution)
/// - Bytes 6-9: Latitude (signed 32-bit, 0.000001 resolution)
/// - Bytes 10-13: Longitude (signed 32-bit, 0.000001 resolution)
///
/// Every character that is not a hex digit is dropped first, so payloads
/// that arrive wrapped in quotes or JSON punctuation still decode. A field
/// is decoded only when all of its bytes are present; the first missing
/// field ends decoding.
///
/// # Arguments
/// * `raw` - Payload string as received in the callback
///
/// # Returns
/// The decoded reading, or an error if the cleaned payload is not valid hex
pub fn try_decode(raw: &str) -> Result<DecodedReading, DecodeError> {
    let cleaned: String = raw.chars().filter(char::is_ascii_hexdigit).collect();
    if cleaned.len() != raw.len() {
        debug!(
            "Stripped {} non-hex characters from payload",
            raw.chars().count() - cleaned.len()
        );
    }

    // A trailing half byte can never complete a field
    let usable = cleaned.len() - cleaned.len() % 2;
    let bytes = hex::decode(&cleaned[..usable])?;

    let mut reading = DecodedReading::default();

    let Some(temperature) = be_field::<2>(&bytes, 0) else {
        return Ok(reading);
    };
    reading.temperature = Some(i16::from_be_bytes(temperature) as f64 / TEMPERATURE_SCALE);

    let Some(humidity) = be_field::<2>(&bytes, 2) else {
        return Ok(reading);
    };
    reading.humidity = Some(u16::from_be_bytes(humidity) as f64 / HUMIDITY_SCALE);

    let Some(battery) = be_field::<2>(&bytes, 4) else {
        return Ok(reading);
    };
    reading.battery = Some(u16::from_be_bytes(battery) as f64 / BATTERY_SCALE);

    let Some(latitude) = be_field::<4>(&bytes, 6) else {
        return Ok(reading);
    };
    reading.latitude = Some(i32::from_be_bytes(latitude) as f64 / COORDINATE_SCALE);

    let Some(longitude) = be_field::<4>(&bytes, 10) else {
        return Ok(reading);
    };
    reading.longitude = Some(i32::from_be_bytes(longitude) as f64 / COORDINATE_SCALE);

    Ok(reading)
}

/// Take `N` bytes at `offset`, or `None` if the payload ends first
fn be_field<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes.get(offset..offset + N)?.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PAYLOAD: &str = "00FA028F0E10012884A0FA1758E7";

    #[test]
    fn empty_payload_has_no_fields_and_fallback_location() {
        let reading = decode("");
        assert_eq!(reading, DecodedReading::default());
        assert!(reading.is_empty());
        assert_eq!(reading.latitude_or_fallback(), 19.432608);
        assert_eq!(reading.longitude_or_fallback(), -99.133209);
    }

    #[test]
    fn temperature_is_signed() {
        let reading = decode("FFFF");
        assert_eq!(reading.temperature, Some(-0.1));
        assert_eq!(reading.humidity, None);
    }

    #[test]
    fn humidity_is_unsigned() {
        let reading = decode("00000BB8");
        assert_eq!(reading.temperature, Some(0.0));
        assert_eq!(reading.humidity, Some(300.0));
        assert_eq!(reading.battery, None);

        let reading = decode("0000FFFF");
        assert_eq!(reading.humidity, Some(6553.5));
    }

    #[test]
    fn full_payload_decodes_every_field() {
        let reading = decode(FULL_PAYLOAD);
        assert_eq!(reading.temperature, Some(25.0));
        assert_eq!(reading.humidity, Some(65.5));
        assert_eq!(reading.battery, Some(3.6));
        assert_eq!(reading.latitude, Some(19.432608));
        assert_eq!(reading.longitude, Some(-99.133209));
        assert!(reading.is_complete());
    }

    #[test]
    fn negative_values_and_lowercase_hex() {
        let reading = decode("ff0b028f0e10fdfb33ec09034550");
        assert_eq!(reading.temperature, Some(-24.5));
        assert_eq!(reading.latitude, Some(-33.86882));
        assert_eq!(reading.longitude, Some(151.209296));
    }

    #[test]
    fn fields_stop_at_first_incomplete_one() {
        // Battery present, latitude needs 20 characters
        let reading = decode(&FULL_PAYLOAD[..19]);
        assert_eq!(reading.battery, Some(3.6));
        assert_eq!(reading.latitude, None);
        assert_eq!(reading.longitude, None);

        // Latitude present, longitude cut short
        let reading = decode(&FULL_PAYLOAD[..27]);
        assert_eq!(reading.latitude, Some(19.432608));
        assert_eq!(reading.longitude, None);
        assert_eq!(reading.longitude_or_fallback(), FALLBACK_LONGITUDE);
        assert!(!reading.is_complete());
    }

    #[test]
    fn field_presence_is_monotonic_for_every_prefix() {
        for len in 0..=FULL_PAYLOAD.len() {
            let reading = decode(&FULL_PAYLOAD[..len]);
            if reading.humidity.is_some() {
                assert!(reading.temperature.is_some(), "len {len}");
            }
            if reading.battery.is_some() {
                assert!(reading.humidity.is_some(), "len {len}");
            }
            if reading.latitude.is_some() {
                assert!(reading.battery.is_some(), "len {len}");
            }
            if reading.longitude.is_some() {
                assert!(reading.latitude.is_some(), "len {len}");
            }
        }
    }

    #[test]
    fn extra_bytes_are_ignored() {
        let padded = format!("{FULL_PAYLOAD}DEADBEEF");
        assert_eq!(decode(&padded), decode(FULL_PAYLOAD));
    }

    #[test]
    fn non_hex_characters_are_stripped() {
        assert_eq!(decode("zz11").temperature, None);
        assert_eq!(decode("\"00FA 028F\"").humidity, Some(65.5));
        assert_eq!(decode("\"FFFF\"").temperature, Some(-0.1));
    }

    #[test]
    fn short_input_is_not_an_error() {
        let reading = try_decode("0A").expect("short input decodes");
        assert!(reading.is_empty());
    }

    #[test]
    fn decode_is_deterministic_and_total() {
        let long = "A5".repeat(10_000);
        let inputs = ["", "xyz", "ÿÿÿÿ", "💡00FA", long.as_str(), FULL_PAYLOAD];
        for input in inputs {
            assert_eq!(decode(input), decode(input));
        }
        assert_eq!(decode("💡00FA").temperature, Some(25.0));
    }

    #[test]
    fn serialized_reading_carries_resolved_location() {
        let json = serde_json::to_value(decode("00FA")).unwrap();
        assert_eq!(json["temperature"], 25.0);
        assert!(json["humidity"].is_null());
        assert_eq!(json["latitude"], 19.432608);
        assert_eq!(json["longitude"], -99.133209);
        assert_eq!(json["location_fallback"], true);

        let json = serde_json::to_value(decode(FULL_PAYLOAD)).unwrap();
        assert_eq!(json["location_fallback"], false);
    }
}

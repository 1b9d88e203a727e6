//! Sensor reading payload codec
//!
//! Readings travel as a flat JSON object:
//!
//! ```json
//! {"tvoc":300,"temperature":24.5,"humidity":55.2,"eco2":900,"aqi":4}
//! ```
//!
//! Decoding is tolerant: any field that is absent, null or of the wrong type
//! comes back as the [`UNSET`] sentinel instead of failing the whole message.
//! Only syntactically broken documents and non-object documents are errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Sentinel for integer fields that were missing from a payload
pub const UNSET: i32 = -1;

/// Sentinel for float fields that were missing from a payload
pub const UNSET_FLOAT: f64 = -1.0;

/// One sampling of the room node's sensors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Total volatile organic compounds, ppb
    pub tvoc: i32,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Equivalent CO2, ppm
    pub eco2: i32,
    /// Air quality index, 1 (excellent) to 5 (unhealthy); anything else is unknown
    pub aqi: i32,
}

/// Decoded payload, each field possibly holding its sentinel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    pub tvoc: i32,
    pub temperature: f64,
    pub humidity: f64,
    pub eco2: i32,
    pub aqi: i32,
}

impl Payload {
    /// Payload with every field unset
    pub fn unset() -> Self {
        Self {
            tvoc: UNSET,
            temperature: UNSET_FLOAT,
            humidity: UNSET_FLOAT,
            eco2: UNSET,
            aqi: UNSET,
        }
    }

    pub fn tvoc(&self) -> Option<i32> {
        known(self.tvoc)
    }

    pub fn eco2(&self) -> Option<i32> {
        known(self.eco2)
    }

    pub fn aqi(&self) -> Option<i32> {
        known(self.aqi)
    }

    pub fn temperature(&self) -> Option<f64> {
        (self.temperature != UNSET_FLOAT).then_some(self.temperature)
    }

    pub fn humidity(&self) -> Option<f64> {
        (self.humidity != UNSET_FLOAT).then_some(self.humidity)
    }

    /// Whether any field fell back to its sentinel
    pub fn is_partial(&self) -> bool {
        self.tvoc().is_none()
            || self.eco2().is_none()
            || self.aqi().is_none()
            || self.temperature().is_none()
            || self.humidity().is_none()
    }
}

fn known(value: i32) -> Option<i32> {
    (value != UNSET).then_some(value)
}

impl From<Reading> for Payload {
    fn from(reading: Reading) -> Self {
        Self {
            tvoc: reading.tvoc,
            temperature: reading.temperature,
            humidity: reading.humidity,
            eco2: reading.eco2,
            aqi: reading.aqi,
        }
    }
}

/// Payload decoding errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// Upper bound on the length of an encoded reading in bytes
///
/// Key names and punctuation take 51 bytes, each integer at most 11 and
/// each float at most 24 in serde_json's shortest form.
pub const MAX_ENCODED_READING_LEN: usize = 160;

/// Serialize a reading, every field present, keys in wire order
pub fn encode(reading: &Reading) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(reading)
}

/// Parse a payload, substituting sentinels for missing or mistyped fields
pub fn decode(bytes: &[u8]) -> Result<Payload, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    Ok(Payload {
        tvoc: int_field(object, "tvoc"),
        temperature: float_field(object, "temperature"),
        humidity: float_field(object, "humidity"),
        eco2: int_field(object, "eco2"),
        aqi: int_field(object, "aqi"),
    })
}

fn int_field(object: &Map<String, Value>, key: &str) -> i32 {
    object
        .get(key)
        .and_then(|value| {
            value.as_i64().or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        })
        .and_then(|value| i32::try_from(value).ok())
        .unwrap_or(UNSET)
}

fn float_field(object: &Map<String, Value>, key: &str) -> f64 {
    object
        .get(key)
        .and_then(Value::as_f64)
        .unwrap_or(UNSET_FLOAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_reading() -> Reading {
        Reading {
            tvoc: 300,
            temperature: 24.5,
            humidity: 55.2,
            eco2: 900,
            aqi: 4,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= f64::EPSILON * a.abs().max(1.0) * 4.0
    }

    proptest! {
        #[test]
        fn decode_recovers_encoded_fields(
            tvoc in 0i32..65_000,
            eco2 in 400i32..65_000,
            aqi in 1i32..=5,
            temperature in -40.0f64..85.0,
            humidity in 0.0f64..100.0,
        ) {
            let reading = Reading { tvoc, temperature, humidity, eco2, aqi };
            let bytes = encode(&reading).unwrap();
            let payload = decode(&bytes).unwrap();

            prop_assert_eq!(payload.tvoc, tvoc);
            prop_assert_eq!(payload.eco2, eco2);
            prop_assert_eq!(payload.aqi, aqi);
            prop_assert!(close(payload.temperature, temperature));
            prop_assert!(close(payload.humidity, humidity));
        }

        #[test]
        fn encoded_reading_fits_length_bound(
            tvoc in any::<i32>(),
            eco2 in any::<i32>(),
            aqi in any::<i32>(),
            temperature in any::<f64>(),
            humidity in any::<f64>(),
        ) {
            let reading = Reading { tvoc, temperature, humidity, eco2, aqi };
            prop_assert!(encode(&reading).unwrap().len() <= MAX_ENCODED_READING_LEN);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = decode(&bytes);
        }
    }

    #[test]
    fn test_encode_wire_format() {
        let bytes = encode(&sample_reading()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"{"tvoc":300,"temperature":24.5,"humidity":55.2,"eco2":900,"aqi":4}"#
        );
    }

    #[test]
    fn test_decode_full_payload() {
        let payload = decode(
            br#"{"tvoc":300,"temperature":24.5,"humidity":55.2,"eco2":900,"aqi":4}"#,
        )
        .unwrap();
        assert_eq!(payload, Payload::from(sample_reading()));
        assert!(!payload.is_partial());
    }

    #[test]
    fn test_missing_fields_decode_to_sentinel() {
        let payload = decode(br#"{"tvoc":50}"#).unwrap();
        assert_eq!(payload.tvoc(), Some(50));
        assert_eq!(payload.eco2, UNSET);
        assert_eq!(payload.aqi, UNSET);
        assert_eq!(payload.temperature, UNSET_FLOAT);
        assert_eq!(payload.humidity, UNSET_FLOAT);
        assert!(payload.is_partial());

        assert_eq!(decode(b"{}").unwrap(), Payload::unset());
    }

    #[test]
    fn test_mistyped_fields_decode_to_sentinel() {
        let payload =
            decode(br#"{"tvoc":"high","temperature":null,"eco2":[800],"aqi":true}"#).unwrap();
        assert_eq!(payload, Payload::unset());
    }

    #[test]
    fn test_integer_fields_accept_floats() {
        let payload = decode(br#"{"tvoc":300.9,"eco2":799.99,"aqi":3.0}"#).unwrap();
        assert_eq!(payload.tvoc, 300);
        assert_eq!(payload.eco2, 799);
        assert_eq!(payload.aqi, 3);
    }

    #[test]
    fn test_out_of_range_integers_are_unset() {
        let payload = decode(br#"{"tvoc":9999999999,"eco2":-9999999999.5}"#).unwrap();
        assert_eq!(payload.tvoc, UNSET);
        assert_eq!(payload.eco2, UNSET);
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let payload = decode(
            br#"{"tvoc":1.25,"temperature":27.1,"humidity":44.0,"timestamp":"2025-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(payload.tvoc, 1);
        assert_eq!(payload.temperature(), Some(27.1));
        assert_eq!(payload.humidity(), Some(44.0));
        assert_eq!(payload.aqi(), None);
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(decode(b"{not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b""), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            decode(&[0xff, 0xfe, 0x7b]),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(decode(b"[1,2,3]"), Err(DecodeError::NotAnObject));
        assert_eq!(decode(b"42"), Err(DecodeError::NotAnObject));
        assert_eq!(decode(b"\"tvoc\""), Err(DecodeError::NotAnObject));
    }

    #[test]
    fn test_non_finite_floats_encode_as_null() {
        let reading = Reading {
            temperature: f64::NAN,
            ..sample_reading()
        };
        let payload = decode(&encode(&reading).unwrap()).unwrap();
        assert_eq!(payload.temperature(), None);
        assert_eq!(payload.tvoc(), Some(300));
    }
}

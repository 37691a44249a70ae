//! Tire reading payload decoding.
//!
//! Sensors notify a small fixed-layout payload. The layout lives in a
//! [`PayloadSchema`] (offset table and clamp ranges) so firmware revisions
//! only need a new schema value.

use bytes::Buf;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Primitive encoding of one payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldKind {
    /// Unsigned byte.
    U8,
    /// Unsigned 16-bit little-endian.
    U16Le,
    /// Signed 16-bit little-endian.
    I16Le,
}

impl FieldKind {
    /// Number of bytes the field occupies.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16Le | Self::I16Le => 2,
        }
    }
}

/// Location and scaling of one payload field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldSpec {
    /// Byte offset into the payload.
    pub offset: usize,
    /// Encoding.
    pub kind: FieldKind,
    /// Raw value is divided by this to get engineering units.
    pub divisor: f64,
}

impl FieldSpec {
    /// Create a field spec.
    pub const fn new(offset: usize, kind: FieldKind, divisor: f64) -> Self {
        Self {
            offset,
            kind,
            divisor,
        }
    }

    /// Last byte (exclusive) the field needs.
    pub fn end(&self) -> usize {
        self.offset + self.kind.size()
    }

    /// Read the raw value, or `None` if the payload is too short.
    pub fn read_raw(&self, data: &[u8]) -> Option<f64> {
        let mut buf = data.get(self.offset..self.end())?;
        let raw = match self.kind {
            FieldKind::U8 => f64::from(buf.get_u8()),
            FieldKind::U16Le => f64::from(buf.get_u16_le()),
            FieldKind::I16Le => f64::from(buf.get_i16_le()),
        };
        Some(raw)
    }

    /// Read and scale the value.
    pub fn read(&self, data: &[u8]) -> Option<f64> {
        self.read_raw(data).map(|raw| raw / self.divisor)
    }
}

/// Inclusive range a decoded value is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClampRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ClampRange {
    /// Create a new range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into the range.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// A decoded tire reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TireReading {
    /// Pressure in PSI.
    pub pressure_psi: f64,
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f64,
    /// Battery level in percent, when the sensor reports it.
    pub battery_level: Option<u8>,
    /// When the reading was decoded.
    pub timestamp: DateTime<Utc>,
}

impl TireReading {
    /// Decode a payload with the current sensor schema.
    pub fn parse(data: &[u8]) -> Option<Self> {
        PayloadSchema::V1.decode(data)
    }

    /// Timestamp as milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Binary layout of a tire sensor notification.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PayloadSchema {
    /// Schema version.
    pub version: u8,
    /// Payloads shorter than this are rejected.
    pub min_len: usize,
    /// Pressure field (PSI after scaling).
    pub pressure: FieldSpec,
    /// Temperature field (°C after scaling).
    pub temperature: FieldSpec,
    /// Optional battery field (percent).
    pub battery: Option<FieldSpec>,
    /// Pressure clamp.
    pub pressure_range: ClampRange,
    /// Temperature clamp.
    pub temperature_range: ClampRange,
    /// Battery clamp.
    pub battery_range: ClampRange,
}

impl PayloadSchema {
    /// Version 1 layout:
    ///
    /// - Bytes 0-1: pressure, u16 little-endian, PSI × 10
    /// - Bytes 2-3: temperature, u16 little-endian, °C × 10
    /// - Byte 4: battery percent, optional
    pub const V1: Self = Self {
        version: 1,
        min_len: 4,
        pressure: FieldSpec::new(0, FieldKind::U16Le, 10.0),
        temperature: FieldSpec::new(2, FieldKind::U16Le, 10.0),
        battery: Some(FieldSpec::new(4, FieldKind::U8, 1.0)),
        pressure_range: ClampRange::new(0.0, 150.0),
        temperature_range: ClampRange::new(-40.0, 100.0),
        battery_range: ClampRange::new(0.0, 100.0),
    };

    /// Decode a payload, stamping it with the current time.
    pub fn decode(&self, data: &[u8]) -> Option<TireReading> {
        self.decode_at(data, Utc::now())
    }

    /// Decode a payload with an explicit timestamp.
    ///
    /// Returns `None` for payloads shorter than `min_len` or missing a
    /// required field. The battery is only reported when the payload carries
    /// its byte.
    pub fn decode_at(&self, data: &[u8], timestamp: DateTime<Utc>) -> Option<TireReading> {
        if data.len() < self.min_len {
            debug!(
                "Tire payload too short: {} bytes (need {})",
                data.len(),
                self.min_len
            );
            return None;
        }

        let pressure = self.pressure.read(data)?;
        let temperature = self.temperature.read(data)?;
        let battery_level = self
            .battery
            .and_then(|field| field.read(data))
            .map(|level| self.battery_range.clamp(level).round() as u8);

        Some(TireReading {
            pressure_psi: self.pressure_range.clamp(pressure),
            temperature_celsius: self.temperature_range.clamp(temperature),
            battery_level,
            timestamp,
        })
    }
}

impl Default for PayloadSchema {
    fn default() -> Self {
        Self::V1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_four_byte_payload() {
        let reading = TireReading::parse(&[0x0A, 0x01, 0x00, 0x01]).unwrap();
        assert!((reading.pressure_psi - 26.6).abs() < 1e-9);
        assert!((reading.temperature_celsius - 25.6).abs() < 1e-9);
        assert_eq!(reading.battery_level, None);
    }

    #[test]
    fn test_parse_with_battery() {
        // 32.5 PSI, 21.0 °C, 87 %
        let reading = TireReading::parse(&[0x45, 0x01, 0xD2, 0x00, 87]).unwrap();
        assert!((reading.pressure_psi - 32.5).abs() < 1e-9);
        assert!((reading.temperature_celsius - 21.0).abs() < 1e-9);
        assert_eq!(reading.battery_level, Some(87));
    }

    #[test]
    fn test_short_payload_rejected() {
        assert!(TireReading::parse(&[0x0A, 0x01, 0x00]).is_none());
        assert!(TireReading::parse(&[]).is_none());
    }

    #[test]
    fn test_pressure_clamped() {
        // raw 20000 -> 2000 PSI
        let raw = 20000u16.to_le_bytes();
        let reading = TireReading::parse(&[raw[0], raw[1], 0x00, 0x00]).unwrap();
        assert_eq!(reading.pressure_psi, 150.0);
    }

    #[test]
    fn test_battery_clamped() {
        let reading = TireReading::parse(&[0, 0, 0, 0, 250]).unwrap();
        assert_eq!(reading.battery_level, Some(100));
    }

    #[test]
    fn test_signed_temperature_schema_clamps_low() {
        let schema = PayloadSchema {
            version: 2,
            temperature: FieldSpec::new(2, FieldKind::I16Le, 10.0),
            ..PayloadSchema::V1
        };
        // raw -9990 -> -999.0 °C
        let raw = (-9990i16).to_le_bytes();
        let reading = schema.decode(&[0x2C, 0x01, raw[0], raw[1]]).unwrap();
        assert_eq!(reading.temperature_celsius, -40.0);
        assert!((reading.pressure_psi - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_range() {
        let range = ClampRange::new(-40.0, 100.0);
        assert_eq!(range.clamp(-999.0), -40.0);
        assert_eq!(range.clamp(2000.0), 100.0);
        assert_eq!(range.clamp(12.5), 12.5);
    }

    #[test]
    fn test_decode_at_keeps_timestamp() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let reading = PayloadSchema::V1
            .decode_at(&[0x2C, 0x01, 0xC8, 0x00], at)
            .unwrap();
        assert_eq!(reading.timestamp_millis(), 1_700_000_000_000);
    }

    proptest! {
        #[test]
        fn prop_decoded_values_within_ranges(data in proptest::collection::vec(any::<u8>(), 4..16)) {
            let reading = TireReading::parse(&data).unwrap();
            prop_assert!((0.0..=150.0).contains(&reading.pressure_psi));
            prop_assert!((-40.0..=100.0).contains(&reading.temperature_celsius));
            if let Some(level) = reading.battery_level {
                prop_assert!(level <= 100);
            }
        }

        #[test]
        fn prop_short_payloads_never_decode(data in proptest::collection::vec(any::<u8>(), 0..4)) {
            prop_assert!(TireReading::parse(&data).is_none());
        }
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::ConversionError, telegram::Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HvacOperationMode {
    Auto,
    Comfort,
    Standby,
    Night,
    FrostProtection,
}

impl HvacOperationMode {
    pub const ALL: [HvacOperationMode; 5] = [
        Self::Auto,
        Self::Comfort,
        Self::Standby,
        Self::Night,
        Self::FrostProtection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Comfort => "COMFORT",
            Self::Standby => "STANDBY",
            Self::Night => "NIGHT",
            Self::FrostProtection => "FROST_PROTECTION",
        }
    }
}

impl fmt::Display for HvacOperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HvacOperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == upper)
            .ok_or_else(|| format!("unknown operation mode '{s}'"))
    }
}

pub trait DptCodec {
    type Value: Copy + PartialEq + fmt::Debug + Send;

    const NAME: &'static str;

    fn from_payload(payload: &Payload) -> Result<Self::Value, ConversionError>;

    fn to_payload(value: Self::Value) -> Result<Payload, ConversionError>;
}

fn array_payload(payload: &Payload, expected: usize) -> Result<&[u8], ConversionError> {
    match payload {
        Payload::Binary(_) => Err(ConversionError::ExpectedArray),
        Payload::Array(bytes) if bytes.len() != expected => Err(ConversionError::PayloadLength {
            expected,
            actual: bytes.len(),
        }),
        Payload::Array(bytes) => Ok(bytes),
    }
}

// DPT 20.102
#[derive(Debug, Clone, Copy)]
pub struct DptHvacMode;

impl DptCodec for DptHvacMode {
    type Value = HvacOperationMode;

    const NAME: &'static str = "DPT 20.102";

    fn from_payload(payload: &Payload) -> Result<Self::Value, ConversionError> {
        let raw = array_payload(payload, 1)?[0];
        match raw {
            0 => Ok(HvacOperationMode::Auto),
            1 => Ok(HvacOperationMode::Comfort),
            2 => Ok(HvacOperationMode::Standby),
            3 => Ok(HvacOperationMode::Night),
            4 => Ok(HvacOperationMode::FrostProtection),
            other => Err(ConversionError::UnknownHvacMode(other)),
        }
    }

    fn to_payload(value: Self::Value) -> Result<Payload, ConversionError> {
        let raw = match value {
            HvacOperationMode::Auto => 0,
            HvacOperationMode::Comfort => 1,
            HvacOperationMode::Standby => 2,
            HvacOperationMode::Night => 3,
            HvacOperationMode::FrostProtection => 4,
        };
        Ok(Payload::Array(vec![raw]))
    }
}

// Highest set mode bit wins on decode. Auto has no representation.
#[derive(Debug, Clone, Copy)]
pub struct DptControllerStatus;

impl DptCodec for DptControllerStatus {
    type Value = HvacOperationMode;

    const NAME: &'static str = "controller status";

    fn from_payload(payload: &Payload) -> Result<Self::Value, ConversionError> {
        let raw = array_payload(payload, 1)?[0];
        if raw & 0x08 != 0 {
            Ok(HvacOperationMode::FrostProtection)
        } else if raw & 0x04 != 0 {
            Ok(HvacOperationMode::Night)
        } else if raw & 0x02 != 0 {
            Ok(HvacOperationMode::Standby)
        } else if raw & 0x01 != 0 {
            Ok(HvacOperationMode::Comfort)
        } else {
            Err(ConversionError::UnknownControllerStatus(raw))
        }
    }

    fn to_payload(value: Self::Value) -> Result<Payload, ConversionError> {
        let raw = match value {
            HvacOperationMode::Auto => {
                return Err(ConversionError::UnsupportedControllerStatus(value))
            }
            HvacOperationMode::Comfort => 0x21,
            HvacOperationMode::Standby => 0x22,
            HvacOperationMode::Night => 0x24,
            HvacOperationMode::FrostProtection => 0x28,
        };
        Ok(Payload::Array(vec![raw]))
    }
}

// DPT 9.001
#[derive(Debug, Clone, Copy)]
pub struct DptTemperature;

pub const TEMPERATURE_MIN: f32 = -273.0;
pub const TEMPERATURE_MAX: f32 = 670_760.0;

impl DptCodec for DptTemperature {
    type Value = f32;

    const NAME: &'static str = "DPT 9.001";

    fn from_payload(payload: &Payload) -> Result<Self::Value, ConversionError> {
        let bytes = array_payload(payload, 2)?;
        let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
        let exponent = (raw >> 11) & 0x0f;
        let mut mantissa = i32::from(raw & 0x07ff);
        if raw & 0x8000 != 0 {
            mantissa -= 2048;
        }
        Ok((mantissa << exponent) as f32 / 100.0)
    }

    fn to_payload(value: Self::Value) -> Result<Payload, ConversionError> {
        if !value.is_finite() || !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&value) {
            return Err(ConversionError::OutOfRange {
                dpt: Self::NAME,
                value: f64::from(value),
            });
        }

        let mut scaled = f64::from(value) * 100.0;
        let mut exponent: u16 = 0;
        let mut mantissa = scaled.round() as i32;
        while !(-2048..=2047).contains(&mantissa) {
            scaled /= 2.0;
            exponent += 1;
            mantissa = scaled.round() as i32;
        }

        let sign: u16 = if mantissa < 0 { 0x8000 } else { 0 };
        let raw = sign | (exponent << 11) | (mantissa & 0x07ff) as u16;
        Ok(Payload::Array(raw.to_be_bytes().to_vec()))
    }
}

// DPT 6.010
#[derive(Debug, Clone, Copy)]
pub struct DptValue1Count;

impl DptCodec for DptValue1Count {
    type Value = i8;

    const NAME: &'static str = "DPT 6.010";

    fn from_payload(payload: &Payload) -> Result<Self::Value, ConversionError> {
        let raw = array_payload(payload, 1)?[0];
        Ok(i8::from_be_bytes([raw]))
    }

    fn to_payload(value: Self::Value) -> Result<Payload, ConversionError> {
        Ok(Payload::Array(value.to_be_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hvac_mode_codes() {
        for (code, mode) in HvacOperationMode::ALL.into_iter().enumerate() {
            let payload = DptHvacMode::to_payload(mode).unwrap();
            assert_eq!(payload, Payload::Array(vec![code as u8]));
            assert_eq!(DptHvacMode::from_payload(&payload).unwrap(), mode);
        }

        assert_eq!(
            DptHvacMode::from_payload(&Payload::Array(vec![0x05])),
            Err(ConversionError::UnknownHvacMode(0x05))
        );
        assert_eq!(
            DptHvacMode::from_payload(&Payload::Binary(1)),
            Err(ConversionError::ExpectedArray)
        );
        assert_eq!(
            DptHvacMode::from_payload(&Payload::Array(vec![1, 2])),
            Err(ConversionError::PayloadLength {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn controller_status_bits() {
        assert_eq!(
            DptControllerStatus::to_payload(HvacOperationMode::Comfort).unwrap(),
            Payload::Array(vec![0x21])
        );
        assert_eq!(
            DptControllerStatus::to_payload(HvacOperationMode::FrostProtection).unwrap(),
            Payload::Array(vec![0x28])
        );
        assert_eq!(
            DptControllerStatus::to_payload(HvacOperationMode::Auto),
            Err(ConversionError::UnsupportedControllerStatus(
                HvacOperationMode::Auto
            ))
        );

        // Frost protection outranks every other bit.
        assert_eq!(
            DptControllerStatus::from_payload(&Payload::Array(vec![0x2f])).unwrap(),
            HvacOperationMode::FrostProtection
        );
        assert_eq!(
            DptControllerStatus::from_payload(&Payload::Array(vec![0x06])).unwrap(),
            HvacOperationMode::Night
        );
        assert_eq!(
            DptControllerStatus::from_payload(&Payload::Array(vec![0x23])).unwrap(),
            HvacOperationMode::Standby
        );
        assert_eq!(
            DptControllerStatus::from_payload(&Payload::Array(vec![0x21])).unwrap(),
            HvacOperationMode::Comfort
        );
        assert_eq!(
            DptControllerStatus::from_payload(&Payload::Array(vec![0x20])),
            Err(ConversionError::UnknownControllerStatus(0x20))
        );
    }

    #[test]
    fn temperature_known_encodings() {
        assert_eq!(
            DptTemperature::to_payload(21.0).unwrap(),
            Payload::Array(vec![0x0c, 0x1a])
        );
        assert_eq!(
            DptTemperature::to_payload(0.0).unwrap(),
            Payload::Array(vec![0x00, 0x00])
        );
        assert_eq!(
            DptTemperature::to_payload(-1.0).unwrap(),
            Payload::Array(vec![0x87, 0x9c])
        );

        assert_eq!(
            DptTemperature::from_payload(&Payload::Array(vec![0x0c, 0x1a])).unwrap(),
            21.0
        );
        assert_eq!(
            DptTemperature::from_payload(&Payload::Array(vec![0x87, 0x9c])).unwrap(),
            -1.0
        );
        assert_eq!(
            DptTemperature::from_payload(&Payload::Array(vec![0x0c, 0x01])).unwrap(),
            20.5
        );
    }

    #[test]
    fn temperature_limits() {
        assert_eq!(
            DptTemperature::to_payload(670_760.0).unwrap(),
            Payload::Array(vec![0x7f, 0xff])
        );
        assert!(matches!(
            DptTemperature::to_payload(-274.0),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            DptTemperature::to_payload(f32::NAN),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert_eq!(
            DptTemperature::from_payload(&Payload::Array(vec![0x0c])),
            Err(ConversionError::PayloadLength {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn value_1_count_is_signed() {
        assert_eq!(
            DptValue1Count::to_payload(-3).unwrap(),
            Payload::Array(vec![0xfd])
        );
        assert_eq!(
            DptValue1Count::from_payload(&Payload::Array(vec![0xfd])).unwrap(),
            -3
        );
        assert_eq!(
            DptValue1Count::from_payload(&Payload::Array(vec![0x7f])).unwrap(),
            127
        );
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!(
            "frost_protection".parse::<HvacOperationMode>().unwrap(),
            HvacOperationMode::FrostProtection
        );
        assert!("turbo".parse::<HvacOperationMode>().is_err());
    }
}

use thiserror::Error;

use crate::{address::GroupAddress, dpt::HvacOperationMode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty group address")]
    Empty,
    #[error("invalid group address '{0}'")]
    Malformed(String),
    #[error("group address part '{part}' out of range (max {max})")]
    OutOfRange { part: &'static str, max: u16 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("expected array payload, got binary")]
    ExpectedArray,
    #[error("expected binary payload, got array")]
    ExpectedBinary,
    #[error("expected {expected} byte payload, got {actual}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("unknown HVAC mode code {0:#04x}")]
    UnknownHvacMode(u8),
    #[error("controller status {0:#04x} carries no operation mode")]
    UnknownControllerStatus(u8),
    #[error("{0} cannot be encoded as controller status")]
    UnsupportedControllerStatus(HvacOperationMode),
    #[error("value {value} out of range for {dpt}")]
    OutOfRange { dpt: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("transport closed")]
    Closed,
    #[error("transport rejected telegram: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClimateError {
    #[error("could not parse telegram for {address}: {source}")]
    CouldNotParseTelegram {
        address: GroupAddress,
        #[source]
        source: ConversionError,
    },
    #[error("could not encode value: {0}")]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid climate configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

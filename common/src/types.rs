use serde::Serialize;

use crate::{climate::Climate, dpt::HvacOperationMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateStatus {
    pub name: String,
    #[serde(rename = "currentTemp")]
    pub temperature: Option<f32>,
    #[serde(rename = "targetTemp")]
    pub target_temperature: Option<f32>,
    pub setpoint: Option<f32>,
    #[serde(rename = "setpointShift")]
    pub setpoint_shift: Option<i8>,
    #[serde(rename = "comfortTemp")]
    pub target_temperature_comfort: Option<f32>,
    #[serde(rename = "supportsOperationMode")]
    pub supports_operation_mode: bool,
    #[serde(rename = "operationMode")]
    pub operation_mode: HvacOperationMode,
    #[serde(rename = "supportedOperationModes")]
    pub supported_operation_modes: Vec<HvacOperationMode>,
}

impl Climate {
    pub fn status(&self) -> ClimateStatus {
        ClimateStatus {
            name: self.name().to_string(),
            temperature: self.temperature(),
            target_temperature: self.target_temperature(),
            setpoint: self.setpoint(),
            setpoint_shift: self.setpoint_shift(),
            target_temperature_comfort: self.target_temperature_comfort(),
            supports_operation_mode: self.supports_operation_mode(),
            operation_mode: self.operation_mode(),
            supported_operation_modes: self.get_supported_operation_modes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ClimateConfig, error::SendError, telegram::Telegram};

    #[test]
    fn status_serializes_mode_names() {
        let config = ClimateConfig {
            operation_mode_comfort_address: Some("1/1/5".parse().unwrap()),
            ..ClimateConfig::default()
        };
        let climate = Climate::from_config(
            "Office",
            &config,
            |_telegram: Telegram| Ok::<(), SendError>(()),
            || {},
        );

        let json = serde_json::to_value(climate.status()).unwrap();

        assert_eq!(json["name"], "Office");
        assert_eq!(json["currentTemp"], serde_json::Value::Null);
        assert_eq!(json["operationMode"], "STANDBY");
        assert_eq!(
            json["supportedOperationModes"],
            serde_json::json!(["COMFORT", "STANDBY"])
        );
    }
}

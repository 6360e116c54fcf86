use serde::{Deserialize, Serialize};

use crate::{address::GroupAddress, error::ConfigError};

pub const DEFAULT_SETPOINT_SHIFT_STEP: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClimateConfig {
    pub temperature_address: Option<GroupAddress>,
    pub target_temperature_address: Option<GroupAddress>,
    pub setpoint_address: Option<GroupAddress>,
    pub setpoint_shift_address: Option<GroupAddress>,
    pub setpoint_shift_state_address: Option<GroupAddress>,
    pub operation_mode_address: Option<GroupAddress>,
    pub operation_mode_state_address: Option<GroupAddress>,
    pub operation_mode_protection_address: Option<GroupAddress>,
    pub operation_mode_night_address: Option<GroupAddress>,
    pub operation_mode_comfort_address: Option<GroupAddress>,
    pub controller_status_address: Option<GroupAddress>,
    pub controller_status_state_address: Option<GroupAddress>,
    // kelvin per shift count
    pub setpoint_shift_step: f32,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            temperature_address: None,
            target_temperature_address: None,
            setpoint_address: None,
            setpoint_shift_address: None,
            setpoint_shift_state_address: None,
            operation_mode_address: None,
            operation_mode_state_address: None,
            operation_mode_protection_address: None,
            operation_mode_night_address: None,
            operation_mode_comfort_address: None,
            controller_status_address: None,
            controller_status_state_address: None,
            setpoint_shift_step: DEFAULT_SETPOINT_SHIFT_STEP,
        }
    }
}

impl ClimateConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        if !self.setpoint_shift_step.is_finite() || self.setpoint_shift_step <= 0.0 {
            self.setpoint_shift_step = DEFAULT_SETPOINT_SHIFT_STEP;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "climate-controller-rust".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub climate: ClimateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_topic_prefix() -> String {
    "knx".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            http_port: default_http_port(),
            topic_prefix: default_topic_prefix(),
            devices: Vec::new(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        let trimmed = self.topic_prefix.trim_matches('/');
        self.topic_prefix = if trimmed.is_empty() {
            default_topic_prefix()
        } else {
            trimmed.to_string()
        };

        for device in &mut self.devices {
            device.climate.sanitize();
        }
    }
}

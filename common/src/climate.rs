use std::fmt;

use tracing::{debug, warn};

use crate::{
    address::GroupAddress,
    config::ClimateConfig,
    dpt::{DptCodec, DptControllerStatus, DptHvacMode, DptValue1Count, HvacOperationMode},
    error::{ClimateError, ConversionError},
    remote_value::{ProcessOutcome, RemoteValue1Count, RemoteValueTemp},
    telegram::{Payload, Telegram, TelegramSink},
};

// Runs while the device is borrowed; hand the event off, do not block.
pub type UpdateCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    SetpointUnknown,
    SetpointShiftUnknown,
    SetpointShiftNotWritable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Unsupported,
    PreconditionFailed(Precondition),
    Applied { telegrams_sent: usize, changed: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct OperationModeAddresses {
    operation_mode: Option<GroupAddress>,
    operation_mode_state: Option<GroupAddress>,
    protection: Option<GroupAddress>,
    night: Option<GroupAddress>,
    comfort: Option<GroupAddress>,
    controller_status: Option<GroupAddress>,
    controller_status_state: Option<GroupAddress>,
}

impl OperationModeAddresses {
    fn from_config(config: &ClimateConfig) -> Self {
        Self {
            operation_mode: config.operation_mode_address,
            operation_mode_state: config.operation_mode_state_address,
            protection: config.operation_mode_protection_address,
            night: config.operation_mode_night_address,
            comfort: config.operation_mode_comfort_address,
            controller_status: config.controller_status_address,
            controller_status_state: config.controller_status_state_address,
        }
    }

    fn all(&self) -> [Option<GroupAddress>; 7] {
        [
            self.operation_mode,
            self.operation_mode_state,
            self.protection,
            self.night,
            self.comfort,
            self.controller_status,
            self.controller_status_state,
        ]
    }

    fn any(&self) -> bool {
        self.all().iter().any(Option::is_some)
    }

    fn contains(&self, address: GroupAddress) -> bool {
        self.all().contains(&Some(address))
    }

    fn is_operation_mode(&self, address: GroupAddress) -> bool {
        self.operation_mode == Some(address) || self.operation_mode_state == Some(address)
    }

    fn is_controller_status(&self, address: GroupAddress) -> bool {
        self.controller_status == Some(address) || self.controller_status_state == Some(address)
    }
}

pub struct Climate {
    name: String,
    temperature: RemoteValueTemp,
    target_temperature: RemoteValueTemp,
    setpoint: RemoteValueTemp,
    setpoint_shift: RemoteValue1Count,
    mode_addresses: OperationModeAddresses,
    supports_operation_mode: bool,
    operation_mode: HvacOperationMode,
    setpoint_shift_step: f32,
    sink: Box<dyn TelegramSink>,
    on_update: UpdateCallback,
}

impl Climate {
    pub fn from_config(
        name: impl Into<String>,
        config: &ClimateConfig,
        sink: impl TelegramSink + 'static,
        on_update: impl FnMut() + Send + 'static,
    ) -> Self {
        let mut config = config.clone();
        config.sanitize();

        let mode_addresses = OperationModeAddresses::from_config(&config);
        Self {
            name: name.into(),
            temperature: RemoteValueTemp::new(config.temperature_address, None),
            target_temperature: RemoteValueTemp::new(config.target_temperature_address, None),
            setpoint: RemoteValueTemp::new(config.setpoint_address, None),
            setpoint_shift: RemoteValue1Count::new(
                config.setpoint_shift_address,
                config.setpoint_shift_state_address,
            ),
            supports_operation_mode: mode_addresses.any(),
            mode_addresses,
            operation_mode: HvacOperationMode::Standby,
            setpoint_shift_step: config.setpoint_shift_step,
            sink: Box::new(sink),
            on_update: Box::new(on_update),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature.value()
    }

    pub fn target_temperature(&self) -> Option<f32> {
        self.target_temperature.value()
    }

    pub fn setpoint(&self) -> Option<f32> {
        self.setpoint.value()
    }

    pub fn setpoint_shift(&self) -> Option<i8> {
        self.setpoint_shift.value()
    }

    pub fn supports_operation_mode(&self) -> bool {
        self.supports_operation_mode
    }

    pub fn operation_mode(&self) -> HvacOperationMode {
        self.operation_mode
    }

    pub fn has_group_address(&self, address: GroupAddress) -> bool {
        self.temperature.has_group_address(address)
            || self.target_temperature.has_group_address(address)
            || self.setpoint.has_group_address(address)
            || self.setpoint_shift.has_group_address(address)
            || self.mode_addresses.contains(address)
    }

    pub fn target_temperature_comfort(&self) -> Option<f32> {
        let setpoint = self.setpoint.value()?;
        let shift = self.setpoint_shift.value()?;
        Some(setpoint + self.setpoint_shift_step * f32::from(shift))
    }

    pub fn set_target_temperature_comfort(
        &mut self,
        target: f32,
    ) -> Result<CommandOutcome, ClimateError> {
        let Some(setpoint) = self.setpoint.value() else {
            warn!(device = %self.name, "setpoint temperature not known, cannot set comfort target");
            return Ok(CommandOutcome::PreconditionFailed(
                Precondition::SetpointUnknown,
            ));
        };
        if !self.setpoint_shift.initialized() {
            warn!(device = %self.name, "setpoint shift not known, cannot set comfort target");
            return Ok(CommandOutcome::PreconditionFailed(
                Precondition::SetpointShiftUnknown,
            ));
        }
        if !self.setpoint_shift.is_writable() {
            warn!(device = %self.name, "setpoint shift has no write address");
            return Ok(CommandOutcome::PreconditionFailed(
                Precondition::SetpointShiftNotWritable,
            ));
        }

        let steps = ((target - setpoint) / self.setpoint_shift_step).round();
        if !steps.is_finite() || !(f32::from(i8::MIN)..=f32::from(i8::MAX)).contains(&steps) {
            return Err(ConversionError::OutOfRange {
                dpt: DptValue1Count::NAME,
                value: f64::from(steps),
            }
            .into());
        }

        let outcome = self.setpoint_shift.set(steps as i8, self.sink.as_mut())?;
        if outcome.changed {
            self.after_update();
        }
        Ok(CommandOutcome::Applied {
            telegrams_sent: usize::from(outcome.sent),
            changed: outcome.changed,
        })
    }

    /// The recorded mode is the commanded one; transport failures do not
    /// roll it back. A mode that some configured address cannot encode is
    /// rejected before anything is sent.
    pub fn set_operation_mode(
        &mut self,
        mode: HvacOperationMode,
    ) -> Result<CommandOutcome, ClimateError> {
        if !self.supports_operation_mode {
            return Ok(CommandOutcome::Unsupported);
        }

        let telegrams = self.operation_mode_telegrams(mode).map_err(|err| {
            warn!(device = %self.name, "cannot send operation mode {mode}: {err}");
            ClimateError::from(err)
        })?;

        let mut telegrams_sent = 0;
        for telegram in telegrams {
            if self.send(telegram) {
                telegrams_sent += 1;
            }
        }

        let changed = self.set_internal_operation_mode(mode);
        Ok(CommandOutcome::Applied {
            telegrams_sent,
            changed,
        })
    }

    fn operation_mode_telegrams(
        &self,
        mode: HvacOperationMode,
    ) -> Result<Vec<Telegram>, ConversionError> {
        let addresses = &self.mode_addresses;
        let mut telegrams = Vec::with_capacity(5);

        if let Some(address) = addresses.operation_mode {
            telegrams.push(Telegram::new(address, DptHvacMode::to_payload(mode)?));
        }
        let flags = [
            (addresses.protection, HvacOperationMode::FrostProtection),
            (addresses.night, HvacOperationMode::Night),
            (addresses.comfort, HvacOperationMode::Comfort),
        ];
        for (address, flag_mode) in flags {
            if let Some(address) = address {
                telegrams.push(Telegram::new(address, Payload::from_bool(mode == flag_mode)));
            }
        }
        if let Some(address) = addresses.controller_status {
            telegrams.push(Telegram::new(
                address,
                DptControllerStatus::to_payload(mode)?,
            ));
        }

        Ok(telegrams)
    }

    pub fn get_supported_operation_modes(&self) -> Vec<HvacOperationMode> {
        if !self.supports_operation_mode {
            return Vec::new();
        }

        let addresses = &self.mode_addresses;
        if addresses.operation_mode.is_some() || addresses.controller_status.is_some() {
            return HvacOperationMode::ALL.to_vec();
        }

        let mut modes = Vec::new();
        if addresses.comfort.is_some() {
            modes.push(HvacOperationMode::Comfort);
        }
        modes.push(HvacOperationMode::Standby);
        if addresses.night.is_some() {
            modes.push(HvacOperationMode::Night);
        }
        if addresses.protection.is_some() {
            modes.push(HvacOperationMode::FrostProtection);
        }
        modes
    }

    // Split protection/night/comfort flags are write-only.
    pub fn process(&mut self, telegram: &Telegram) -> Result<usize, ClimateError> {
        let address = telegram.group_address;
        let parse_error = |source| ClimateError::CouldNotParseTelegram { address, source };
        let mut notifications = 0;

        if self.supports_operation_mode {
            let decoded = if self.mode_addresses.is_operation_mode(address) {
                Some(DptHvacMode::from_payload(&telegram.payload))
            } else if self.mode_addresses.is_controller_status(address) {
                Some(DptControllerStatus::from_payload(&telegram.payload))
            } else {
                None
            };
            if let Some(decoded) = decoded {
                let mode = decoded.map_err(parse_error)?;
                debug!(device = %self.name, "operation mode {mode} from {address}");
                if self.set_internal_operation_mode(mode) {
                    notifications += 1;
                }
            }
        }

        let outcome = self.temperature.process(telegram).map_err(parse_error)?;
        notifications += self.notify_on_change(outcome);
        let outcome = self
            .target_temperature
            .process(telegram)
            .map_err(parse_error)?;
        notifications += self.notify_on_change(outcome);
        let outcome = self.setpoint.process(telegram).map_err(parse_error)?;
        notifications += self.notify_on_change(outcome);
        let outcome = self.setpoint_shift.process(telegram).map_err(parse_error)?;
        notifications += self.notify_on_change(outcome);

        Ok(notifications)
    }

    pub fn state_addresses(&self) -> Vec<GroupAddress> {
        let mut addresses: Vec<GroupAddress> = [
            self.temperature.state_address(),
            self.target_temperature.state_address(),
            self.setpoint.state_address(),
            self.setpoint_shift.state_address(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if self.supports_operation_mode {
            let modes = &self.mode_addresses;
            addresses.extend(modes.operation_mode_state.or(modes.operation_mode));
            addresses.extend(modes.controller_status_state.or(modes.controller_status));
        }
        addresses
    }

    fn send(&mut self, telegram: Telegram) -> bool {
        let address = telegram.group_address;
        match self.sink.send(telegram) {
            Ok(()) => true,
            Err(err) => {
                warn!(device = %self.name, "sending to {address} failed: {err}");
                false
            }
        }
    }

    fn set_internal_operation_mode(&mut self, mode: HvacOperationMode) -> bool {
        if mode == self.operation_mode {
            return false;
        }
        self.operation_mode = mode;
        self.after_update();
        true
    }

    fn notify_on_change(&mut self, outcome: ProcessOutcome) -> usize {
        if outcome == ProcessOutcome::Changed {
            self.after_update();
            1
        } else {
            0
        }
    }

    fn after_update(&mut self) {
        (self.on_update)();
    }
}

fn display_opt(address: Option<GroupAddress>) -> String {
    address
        .map(|address| address.to_string())
        .unwrap_or_else(|| "None".to_string())
}

impl fmt::Display for Climate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Climate name=\"{}\" temperature=\"{}\" target_temperature=\"{}\" \
             setpoint=\"{}\" setpoint_shift=\"{}\" operation_mode=\"{}\" \
             operation_mode_address=\"{}\" operation_mode_state_address=\"{}\" \
             controller_status_address=\"{}\" controller_status_state_address=\"{}\" />",
            self.name,
            self.temperature.describe(),
            self.target_temperature.describe(),
            self.setpoint.describe(),
            self.setpoint_shift.describe(),
            self.operation_mode,
            display_opt(self.mode_addresses.operation_mode),
            display_opt(self.mode_addresses.operation_mode_state),
            display_opt(self.mode_addresses.controller_status),
            display_opt(self.mode_addresses.controller_status_state),
        )
    }
}

impl fmt::Debug for Climate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Climate")
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("target_temperature", &self.target_temperature)
            .field("setpoint", &self.setpoint)
            .field("setpoint_shift", &self.setpoint_shift)
            .field("mode_addresses", &self.mode_addresses)
            .field("supports_operation_mode", &self.supports_operation_mode)
            .field("operation_mode", &self.operation_mode)
            .field("setpoint_shift_step", &self.setpoint_shift_step)
            .finish_non_exhaustive()
    }
}

pub mod address;
pub mod climate;
pub mod config;
pub mod dpt;
pub mod error;
pub mod remote_value;
pub mod telegram;
pub mod topics;
pub mod types;

pub use address::GroupAddress;
pub use climate::{Climate, CommandOutcome, Precondition, UpdateCallback};
pub use config::{BrokerConfig, ClimateConfig, ControllerConfig, DeviceConfig};
pub use dpt::{DptCodec, HvacOperationMode};
pub use error::{AddressError, ClimateError, ConfigError, ConversionError, SendError};
pub use remote_value::{ProcessOutcome, RemoteValue, RemoteValue1Count, RemoteValueTemp};
pub use telegram::{Payload, Telegram, TelegramSink};
pub use topics::*;
pub use types::ClimateStatus;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{address::GroupAddress, error::SendError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Binary(u8),
    Array(Vec<u8>),
}

impl Payload {
    pub fn from_bool(value: bool) -> Self {
        Self::Binary(u8::from(value))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(value) => write!(f, "binary({value})"),
            Self::Array(bytes) => {
                write!(f, "array(")?;
                for (index, byte) in bytes.iter().enumerate() {
                    if index > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telegram {
    #[serde(rename = "address")]
    pub group_address: GroupAddress,
    pub payload: Payload,
}

impl Telegram {
    pub fn new(group_address: GroupAddress, payload: Payload) -> Self {
        Self {
            group_address,
            payload,
        }
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Telegram {} {}>", self.group_address, self.payload)
    }
}

/// `send` must not block on bus acknowledgement. Errors it can report
/// synchronously are logged by the caller; the remaining sends of the same
/// command are still attempted.
pub trait TelegramSink: Send {
    fn send(&mut self, telegram: Telegram) -> Result<(), SendError>;
}

impl<F> TelegramSink for F
where
    F: FnMut(Telegram) -> Result<(), SendError> + Send,
{
    fn send(&mut self, telegram: Telegram) -> Result<(), SendError> {
        self(telegram)
    }
}

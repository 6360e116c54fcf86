use std::{fmt, marker::PhantomData};

use tracing::warn;

use crate::{
    address::GroupAddress,
    dpt::{DptCodec, DptTemperature, DptValue1Count},
    error::ConversionError,
    telegram::{Telegram, TelegramSink},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Ignored,
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub sent: bool,
    pub changed: bool,
}

pub struct RemoteValue<C: DptCodec> {
    group_address: Option<GroupAddress>,
    group_address_state: Option<GroupAddress>,
    value: Option<C::Value>,
    _codec: PhantomData<C>,
}

pub type RemoteValueTemp = RemoteValue<DptTemperature>;
pub type RemoteValue1Count = RemoteValue<DptValue1Count>;

impl<C: DptCodec> RemoteValue<C> {
    pub fn new(
        group_address: Option<GroupAddress>,
        group_address_state: Option<GroupAddress>,
    ) -> Self {
        Self {
            group_address,
            group_address_state,
            value: None,
            _codec: PhantomData,
        }
    }

    pub fn group_address(&self) -> Option<GroupAddress> {
        self.group_address
    }

    pub fn group_address_state(&self) -> Option<GroupAddress> {
        self.group_address_state
    }

    pub fn is_configured(&self) -> bool {
        self.group_address.is_some() || self.group_address_state.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.group_address.is_some()
    }

    pub fn initialized(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<C::Value> {
        self.value
    }

    pub fn has_group_address(&self, address: GroupAddress) -> bool {
        self.group_address == Some(address) || self.group_address_state == Some(address)
    }

    pub fn state_address(&self) -> Option<GroupAddress> {
        self.group_address_state.or(self.group_address)
    }

    pub fn process(&mut self, telegram: &Telegram) -> Result<ProcessOutcome, ConversionError> {
        if !self.has_group_address(telegram.group_address) {
            return Ok(ProcessOutcome::Ignored);
        }
        let value = C::from_payload(&telegram.payload)?;
        Ok(self.store(value))
    }

    /// The commanded value is stored even when the transport reports a
    /// failure. Without a write address nothing is sent or stored.
    pub fn set(
        &mut self,
        value: C::Value,
        sink: &mut dyn TelegramSink,
    ) -> Result<WriteOutcome, ConversionError> {
        let Some(address) = self.group_address else {
            warn!("no write address bound, dropping {} value {value:?}", C::NAME);
            return Ok(WriteOutcome {
                sent: false,
                changed: false,
            });
        };

        let payload = C::to_payload(value)?;
        let sent = match sink.send(Telegram::new(address, payload)) {
            Ok(()) => true,
            Err(err) => {
                warn!("sending {} value to {address} failed: {err}", C::NAME);
                false
            }
        };
        Ok(WriteOutcome {
            sent,
            changed: self.store(value) == ProcessOutcome::Changed,
        })
    }

    fn store(&mut self, value: C::Value) -> ProcessOutcome {
        if self.value == Some(value) {
            ProcessOutcome::Unchanged
        } else {
            self.value = Some(value);
            ProcessOutcome::Changed
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} (state {}) = {:?}",
            display_opt(self.group_address),
            display_opt(self.group_address_state),
            self.value
        )
    }
}

fn display_opt(address: Option<GroupAddress>) -> String {
    address
        .map(|address| address.to_string())
        .unwrap_or_else(|| "None".to_string())
}

impl<C: DptCodec> fmt::Debug for RemoteValue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteValue")
            .field("dpt", &C::NAME)
            .field("group_address", &self.group_address)
            .field("group_address_state", &self.group_address_state)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{error::SendError, telegram::Payload};

    fn ga(text: &str) -> GroupAddress {
        text.parse().unwrap()
    }

    #[test]
    fn unconfigured_value_owns_nothing() {
        let mut value = RemoteValueTemp::new(None, None);
        assert!(!value.is_configured());
        assert!(!value.has_group_address(ga("1/2/3")));
        assert_eq!(value.state_address(), None);

        let telegram = Telegram::new(ga("1/2/3"), Payload::Array(vec![0x0c, 0x1a]));
        assert_eq!(value.process(&telegram).unwrap(), ProcessOutcome::Ignored);
        assert!(!value.initialized());
    }

    #[test]
    fn state_address_preferred_over_write_address() {
        let both = RemoteValue1Count::new(Some(ga("1/0/1")), Some(ga("1/0/2")));
        assert_eq!(both.state_address(), Some(ga("1/0/2")));

        let write_only = RemoteValue1Count::new(Some(ga("1/0/1")), None);
        assert_eq!(write_only.state_address(), Some(ga("1/0/1")));
    }

    #[test]
    fn process_reports_change_once() {
        let mut value = RemoteValueTemp::new(Some(ga("1/2/3")), None);
        let telegram = Telegram::new(ga("1/2/3"), Payload::Array(vec![0x0c, 0x1a]));

        assert_eq!(value.process(&telegram).unwrap(), ProcessOutcome::Changed);
        assert_eq!(value.value(), Some(21.0));
        assert_eq!(value.process(&telegram).unwrap(), ProcessOutcome::Unchanged);
    }

    #[test]
    fn process_accepts_state_address() {
        let mut value = RemoteValue1Count::new(Some(ga("1/0/1")), Some(ga("1/0/2")));
        let telegram = Telegram::new(ga("1/0/2"), Payload::Array(vec![0x02]));
        assert_eq!(value.process(&telegram).unwrap(), ProcessOutcome::Changed);
        assert_eq!(value.value(), Some(2));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let mut value = RemoteValueTemp::new(Some(ga("1/2/3")), None);
        let telegram = Telegram::new(ga("1/2/3"), Payload::Binary(1));
        assert_eq!(
            value.process(&telegram),
            Err(ConversionError::ExpectedArray)
        );
        assert!(!value.initialized());
    }

    #[test]
    fn set_sends_on_write_address() {
        let mut sent = Vec::new();
        let mut sink = |telegram: Telegram| {
            sent.push(telegram);
            Ok::<(), SendError>(())
        };

        let mut value = RemoteValue1Count::new(Some(ga("1/0/1")), Some(ga("1/0/2")));
        assert_eq!(
            value.set(4, &mut sink).unwrap(),
            WriteOutcome {
                sent: true,
                changed: true
            }
        );
        assert_eq!(
            value.set(4, &mut sink).unwrap(),
            WriteOutcome {
                sent: true,
                changed: false
            }
        );
        assert_eq!(value.value(), Some(4));

        assert_eq!(
            sent,
            vec![
                Telegram::new(ga("1/0/1"), Payload::Array(vec![0x04])),
                Telegram::new(ga("1/0/1"), Payload::Array(vec![0x04])),
            ]
        );
    }

    #[test]
    fn set_without_write_address_is_dropped() {
        let mut calls = 0;
        let mut sink = |_telegram: Telegram| {
            calls += 1;
            Ok::<(), SendError>(())
        };

        let mut value = RemoteValue1Count::new(None, Some(ga("1/0/2")));
        assert_eq!(
            value.set(4, &mut sink).unwrap(),
            WriteOutcome {
                sent: false,
                changed: false
            }
        );
        assert!(!value.initialized());
        assert_eq!(calls, 0);
    }

    #[test]
    fn failed_send_still_stores_commanded_value() {
        let mut sink = |_telegram: Telegram| Err::<(), SendError>(SendError::Closed);

        let mut value = RemoteValue1Count::new(Some(ga("1/0/1")), None);
        assert_eq!(
            value.set(-2, &mut sink).unwrap(),
            WriteOutcome {
                sent: false,
                changed: true
            }
        );
        assert_eq!(value.value(), Some(-2));
    }
}

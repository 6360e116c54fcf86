use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawAddress", into = "String")]
pub struct GroupAddress(u16);

const MAIN_MAX: u16 = 31;
const MIDDLE_MAX: u16 = 7;
const SUB_MAX_3LEVEL: u16 = 255;
const SUB_MAX_2LEVEL: u16 = 2047;

impl GroupAddress {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self, AddressError> {
        let main = check_part("main", u16::from(main), MAIN_MAX)?;
        let middle = check_part("middle", u16::from(middle), MIDDLE_MAX)?;
        Ok(Self((main << 11) | (middle << 8) | u16::from(sub)))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn main(self) -> u8 {
        ((self.0 >> 11) & 0x1f) as u8
    }

    pub fn middle(self) -> u8 {
        ((self.0 >> 8) & 0x07) as u8
    }

    pub fn sub(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

fn check_part(part: &'static str, value: u16, max: u16) -> Result<u16, AddressError> {
    if value > max {
        Err(AddressError::OutOfRange { part, max })
    } else {
        Ok(value)
    }
}

fn parse_part(text: &str, whole: &str) -> Result<u16, AddressError> {
    text.trim()
        .parse::<u16>()
        .map_err(|_| AddressError::Malformed(whole.to_string()))
}

impl FromStr for GroupAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        match parts.as_slice() {
            [raw] => Ok(Self(parse_part(raw, s)?)),
            [main, sub] => {
                let main = check_part("main", parse_part(main, s)?, MAIN_MAX)?;
                let sub = check_part("sub", parse_part(sub, s)?, SUB_MAX_2LEVEL)?;
                Ok(Self((main << 11) | sub))
            }
            [main, middle, sub] => {
                let main = check_part("main", parse_part(main, s)?, MAIN_MAX)?;
                let middle = check_part("middle", parse_part(middle, s)?, MIDDLE_MAX)?;
                let sub = check_part("sub", parse_part(sub, s)?, SUB_MAX_3LEVEL)?;
                Ok(Self((main << 11) | (middle << 8) | sub))
            }
            _ => Err(AddressError::Malformed(s.to_string())),
        }
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.main(), self.middle(), self.sub())
    }
}

impl From<GroupAddress> for String {
    fn from(address: GroupAddress) -> Self {
        address.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Text(String),
    Number(u16),
}

impl TryFrom<RawAddress> for GroupAddress {
    type Error = AddressError;

    fn try_from(raw: RawAddress) -> Result<Self, Self::Error> {
        match raw {
            RawAddress::Text(text) => text.parse(),
            RawAddress::Number(value) => Ok(Self(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_level() {
        let address: GroupAddress = "1/2/3".parse().unwrap();
        assert_eq!(address.raw(), (1 << 11) | (2 << 8) | 3);
        assert_eq!(address.to_string(), "1/2/3");
    }

    #[test]
    fn parses_two_level_and_integer() {
        let two_level: GroupAddress = "1/515".parse().unwrap();
        assert_eq!(two_level.to_string(), "1/2/3");

        let integer: GroupAddress = "2563".parse().unwrap();
        assert_eq!(integer, two_level);
    }

    #[test]
    fn rejects_out_of_range_parts() {
        assert_eq!(
            "32/0/0".parse::<GroupAddress>(),
            Err(AddressError::OutOfRange {
                part: "main",
                max: 31
            })
        );
        assert_eq!(
            "1/8/0".parse::<GroupAddress>(),
            Err(AddressError::OutOfRange {
                part: "middle",
                max: 7
            })
        );
        assert!(matches!(
            "1/2/256".parse::<GroupAddress>(),
            Err(AddressError::OutOfRange { part: "sub", .. })
        ));
        assert!(matches!(
            "1/2/3/4".parse::<GroupAddress>(),
            Err(AddressError::Malformed(_))
        ));
        assert_eq!("".parse::<GroupAddress>(), Err(AddressError::Empty));
    }

    #[test]
    fn deserializes_text_or_number() {
        let from_text: GroupAddress = serde_json::from_str("\"1/2/3\"").unwrap();
        let from_number: GroupAddress = serde_json::from_str("2563").unwrap();
        assert_eq!(from_text, from_number);
        assert_eq!(serde_json::to_string(&from_text).unwrap(), "\"1/2/3\"");
        assert!(serde_json::from_str::<GroupAddress>("\"a/b\"").is_err());
    }
}

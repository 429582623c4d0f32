use core::fmt::{Debug, Display, Formatter};
use std::convert::TryFrom;
use std::str::FromStr;
use crate::error::AuthzError;

// Values are compared as integers, so two GUIDs parsed from strings which
// only differ in letter case are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub fn from_values(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    // Decodes the 16-byte wire representation used in ACEs and in
    // schemaIDGUID/objectGUID attributes (first three fields little-endian).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthzError> {
        if bytes.len() != 16 {
            return Err(AuthzError::InvalidGuidBytes(bytes.to_vec()));
        }
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..16]);
        Ok(Self::from_values(
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            u16::from_le_bytes([bytes[4], bytes[5]]),
            u16::from_le_bytes([bytes[6], bytes[7]]),
            data4))
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..16].copy_from_slice(&self.data4);
        out
    }
}

impl TryFrom<&str> for Guid {
    type Error = AuthzError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let invalid = || AuthzError::InvalidGuidString(s.to_owned());
        let trimmed = s.trim();
        let hex = match (trimmed.strip_prefix('{'), trimmed.strip_suffix('}')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => return Err(invalid()),
        };
        let groups: Vec<&str> = hex.split('-').collect();
        if groups.len() != 5 ||
                [8, 4, 4, 4, 12].iter().zip(groups.iter()).any(|(len, g)| g.len() != *len || !g.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err(invalid());
        }
        let data1 = u32::from_str_radix(groups[0], 16).map_err(|_| invalid())?;
        let data2 = u16::from_str_radix(groups[1], 16).map_err(|_| invalid())?;
        let data3 = u16::from_str_radix(groups[2], 16).map_err(|_| invalid())?;
        let tail = format!("{}{}", groups[3], groups[4]);
        let mut data4 = [0u8; 8];
        for (i, byte) in data4.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&tail[2 * i..2 * i + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self::from_values(data1, data2, data3, data4))
    }
}

impl FromStr for Guid {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let data1 = self.data1.to_be_bytes();
        let data2 = self.data2.to_be_bytes();
        let data3 = self.data3.to_be_bytes();
        write!(f, "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            data1[0], data1[1], data1[2], data1[3],
            data2[0], data2[1],
            data3[0], data3[1],
            self.data4[0], self.data4[1], self.data4[2], self.data4[3], self.data4[4], self.data4[5], self.data4[6], self.data4[7]
        )
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}

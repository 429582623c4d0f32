use core::fmt::{Debug, Display, Formatter};
use std::convert::TryFrom;
use std::str::FromStr;
use crate::error::AuthzError;

const SID_REVISION: u8 = 1;
const SID_HEADER_SIZE: usize = 8;
const SID_MAX_SUB_AUTHORITIES: usize = 15;
const SECURITY_NT_AUTHORITY: u64 = 5;
const SECURITY_NT_NON_UNIQUE: u32 = 21;

#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Sid {
    bytes: Vec<u8>,
}

impl Sid {
    pub fn from_bytes(slice: &[u8]) -> Result<Self, AuthzError> {
        let (sid, expected_size) = Self::parse_prefix(slice)?;
        if expected_size != slice.len() {
            return Err(AuthzError::UnexpectedSidSize { bytes: slice.to_vec(), expected_size });
        }
        Ok(sid)
    }

    // Parses the SID at the start of the slice, and returns it along with the
    // number of bytes it spans. Used when a SID is embedded in a larger structure.
    pub(crate) fn parse_prefix(slice: &[u8]) -> Result<(Self, usize), AuthzError> {
        if slice.len() < SID_HEADER_SIZE || slice[0] != SID_REVISION {
            return Err(AuthzError::InvalidSidBytes(slice.to_vec()));
        }
        let sub_auth_count = slice[1] as usize;
        if sub_auth_count > SID_MAX_SUB_AUTHORITIES {
            return Err(AuthzError::InvalidSidBytes(slice.to_vec()));
        }
        let expected_size = SID_HEADER_SIZE + 4 * sub_auth_count;
        if slice.len() < expected_size {
            return Err(AuthzError::UnexpectedSidSize { bytes: slice.to_vec(), expected_size });
        }
        Ok((Sid { bytes: slice[..expected_size].to_vec() }, expected_size))
    }

    pub fn from_parts(authority: u64, sub_authorities: &[u32]) -> Result<Self, AuthzError> {
        if sub_authorities.len() > SID_MAX_SUB_AUTHORITIES || authority >= (1u64 << 48) {
            return Err(AuthzError::InvalidSidString(format!("authority {} with {} sub-authorities", authority, sub_authorities.len())));
        }
        let mut bytes = Vec::with_capacity(SID_HEADER_SIZE + 4 * sub_authorities.len());
        bytes.push(SID_REVISION);
        bytes.push(sub_authorities.len() as u8);
        bytes.extend_from_slice(&authority.to_be_bytes()[2..]);
        for sub_authority in sub_authorities {
            bytes.extend_from_slice(&sub_authority.to_le_bytes());
        }
        Ok(Sid { bytes })
    }

    pub fn get_identifier_authority(&self) -> u64 {
        self.bytes[2..8].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    pub fn get_sub_authorities(&self) -> Vec<u32> {
        self.bytes[SID_HEADER_SIZE..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn get_rid(&self) -> Option<u32> {
        self.get_sub_authorities().last().copied()
    }

    // Returns true if and only if the SID starts with S-1-5-21-X-Y-Z
    pub fn is_domain_specific(&self) -> bool {
        let sub_auths = self.get_sub_authorities();
        self.get_identifier_authority() == SECURITY_NT_AUTHORITY &&
            sub_auths.len() >= 4 &&
            sub_auths[0] == SECURITY_NT_NON_UNIQUE
    }

    pub fn with_rid(&self, rid: u32) -> Result<Self, AuthzError> {
        let mut sub_auths = self.get_sub_authorities();
        sub_auths.push(rid);
        Self::from_parts(self.get_identifier_authority(), &sub_auths)
    }

    // Returns the domain part of a domain-specific SID (everything but its RID)
    pub fn get_domain(&self) -> Option<Self> {
        if !self.is_domain_specific() {
            return None;
        }
        let sub_auths = self.get_sub_authorities();
        Self::from_parts(self.get_identifier_authority(), &sub_auths[..sub_auths.len() - 1]).ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl TryFrom<&str> for Sid {
    type Error = AuthzError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let invalid = || AuthzError::InvalidSidString(s.to_owned());
        let mut parts = s.split('-');
        match parts.next() {
            Some(prefix) if prefix.eq_ignore_ascii_case("S") => (),
            _ => return Err(invalid()),
        }
        if parts.next() != Some("1") {
            return Err(invalid());
        }
        let authority = match parts.next() {
            Some(a) if a.starts_with("0x") || a.starts_with("0X") => u64::from_str_radix(&a[2..], 16).map_err(|_| invalid())?,
            Some(a) => a.parse::<u64>().map_err(|_| invalid())?,
            None => return Err(invalid()),
        };
        let sub_authorities = parts
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<u32>, AuthzError>>()?;
        Self::from_parts(authority, &sub_authorities).map_err(|_| invalid())
    }
}

impl FromStr for Sid {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let authority = self.get_identifier_authority();
        if authority < (1u64 << 32) {
            write!(f, "S-{}-{}", self.bytes[0], authority)?;
        } else {
            write!(f, "S-{}-0x{:012X}", self.bytes[0], authority)?;
        }
        for sub_authority in self.get_sub_authorities() {
            write!(f, "-{}", sub_authority)?;
        }
        Ok(())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_string())
    }
}

use core::fmt::{Display, Formatter};
use std::str::FromStr;
use serde::Serialize;
use ldapdir::split_dn;
use crate::error::AdmcError;

const LINK_PREFIX: &str = "[LDAP://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GplinkOption {
    Disabled,
    Enforced,
}

impl GplinkOption {
    pub fn bit(self) -> u32 {
        match self {
            Self::Disabled => 0x1,
            Self::Enforced => 0x2,
        }
    }
}

impl FromStr for GplinkOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(Self::Disabled),
            "enforced" => Ok(Self::Enforced),
            _ => Err(format!("unknown link option \"{}\"", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GplinkEntry {
    pub reference: String,
    pub options: u32,
}

impl GplinkEntry {
    pub fn has_option(&self, option: GplinkOption) -> bool {
        (self.options & option.bit()) != 0
    }
}

/// Ordered list of group policy links, as stored in a gPLink attribute:
/// `[LDAP://<policy DN>;<options>]` repeated without separator. The first
/// link has the lowest precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gplink {
    entries: Vec<GplinkEntry>,
}

// DNs compare case-insensitively, and whitespace around RDNs is irrelevant
fn normalize_reference(reference: &str) -> String {
    split_dn(reference).join(",").to_lowercase()
}

// Windows writes links as "cn={GUID},cn=policies,cn=system,DC=..."
fn canonical_reference(reference: &str) -> String {
    let rdns = split_dn(reference);
    if rdns.is_empty() {
        return reference.to_owned();
    }
    rdns.iter()
        .enumerate()
        .map(|(i, rdn)| match rdn.split_once('=') {
            Some((attr, value)) if attr.trim().eq_ignore_ascii_case("cn") => {
                if i == 0 {
                    format!("cn={}", value)
                } else {
                    format!("cn={}", value.to_lowercase())
                }
            },
            _ => rdn.to_string(),
        })
        .collect::<Vec<String>>()
        .join(",")
}

impl Gplink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a gPLink value. The `LDAP://` scheme is accepted in any case
    /// and options may have leading zeros: both are written back in their
    /// usual form (`[LDAP://...;2]`), so such values do not round-trip
    /// byte for byte. Options must be plain decimal digits.
    pub fn parse(value: &str) -> Result<Self, AdmcError> {
        let malformed = |reason: &str| AdmcError::MalformedGplink { value: value.to_owned(), reason: reason.to_owned() };
        let mut entries = Vec::new();
        let mut rest = value;
        while !rest.is_empty() {
            match rest.get(..LINK_PREFIX.len()) {
                Some(prefix) if prefix.eq_ignore_ascii_case(LINK_PREFIX) => (),
                _ => return Err(malformed("expected [LDAP://")),
            }
            let body = &rest[LINK_PREFIX.len()..];
            let end = body.find(']').ok_or_else(|| malformed("unterminated link"))?;
            let (reference, options) = body[..end].rsplit_once(';').ok_or_else(|| malformed("missing link options"))?;
            if reference.is_empty() {
                return Err(malformed("empty policy reference"));
            }
            if options.is_empty() || !options.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("link options are not a number"));
            }
            let options = options.parse::<u32>().map_err(|_| malformed("link options are out of range"))?;
            entries.push(GplinkEntry {
                reference: reference.to_owned(),
                options,
            });
            rest = &body[end + 1..];
        }
        Ok(Self { entries })
    }

    fn position(&self, reference: &str) -> Option<usize> {
        let wanted = normalize_reference(reference);
        self.entries.iter().position(|e| normalize_reference(&e.reference) == wanted)
    }

    pub fn entries(&self) -> impl Iterator<Item = &GplinkEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.position(reference).is_some()
    }

    pub fn add(&mut self, reference: &str) {
        if reference.trim().is_empty() {
            log::warn!("Ignoring empty policy reference");
            return;
        }
        if self.contains(reference) {
            return;
        }
        self.entries.push(GplinkEntry {
            reference: canonical_reference(reference),
            options: 0,
        });
    }

    pub fn remove(&mut self, reference: &str) {
        if let Some(i) = self.position(reference) {
            self.entries.remove(i);
        }
    }

    pub fn move_up(&mut self, reference: &str) {
        match self.position(reference) {
            Some(i) if i > 0 => self.entries.swap(i - 1, i),
            _ => (),
        }
    }

    pub fn move_down(&mut self, reference: &str) {
        match self.position(reference) {
            Some(i) if i + 1 < self.entries.len() => self.entries.swap(i, i + 1),
            _ => (),
        }
    }

    pub fn get_option(&self, reference: &str, option: GplinkOption) -> bool {
        self.position(reference)
            .map(|i| self.entries[i].has_option(option))
            .unwrap_or(false)
    }

    pub fn set_option(&mut self, reference: &str, option: GplinkOption, value: bool) {
        if let Some(i) = self.position(reference) {
            let entry = &mut self.entries[i];
            if value {
                entry.options |= option.bit();
            } else {
                entry.options &= !option.bit();
            }
        }
    }

    // Malformed values are never equal to anything
    pub fn equals(&self, other: &str) -> bool {
        match Self::parse(other) {
            Ok(other) => other == *self,
            Err(_) => false,
        }
    }
}

impl Display for Gplink {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for entry in &self.entries {
            write!(f, "{}{};{}]", LINK_PREFIX, entry.reference, entry.options)?;
        }
        Ok(())
    }
}

impl FromStr for Gplink {
    type Err = AdmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

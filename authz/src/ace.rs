use core::fmt::{Display, Formatter};
use crate::error::AuthzError;
use crate::utils::{read_u16, read_u32, write_u16, pad_to_dword};
use crate::{Guid, Sid};

pub const ACCESS_ALLOWED_ACE_TYPE: u8 = 0x00;
pub const ACCESS_DENIED_ACE_TYPE: u8 = 0x01;
pub const ACCESS_ALLOWED_OBJECT_ACE_TYPE: u8 = 0x05;
pub const ACCESS_DENIED_OBJECT_ACE_TYPE: u8 = 0x06;

pub const OBJECT_INHERIT_ACE: u8 = 0x01;
pub const CONTAINER_INHERIT_ACE: u8 = 0x02;
pub const NO_PROPAGATE_INHERIT_ACE: u8 = 0x04;
pub const INHERIT_ONLY_ACE: u8 = 0x08;
pub const INHERITED_ACE: u8 = 0x10;

const ACE_OBJECT_TYPE_PRESENT: u32 = 0x1;
const ACE_INHERITED_OBJECT_TYPE_PRESENT: u32 = 0x2;
const ACE_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ace {
    pub flags: u8,
    pub type_specific: AceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AceType {
    AccessAllowed {
        trustee: Sid,
        mask: u32,
    },
    AccessDenied {
        trustee: Sid,
        mask: u32,
    },
    AccessAllowedObject {
        trustee: Sid,
        mask: u32,
        object_type: Option<Guid>,
        inherited_object_type: Option<Guid>,
    },
    AccessDeniedObject {
        trustee: Sid,
        mask: u32,
        object_type: Option<Guid>,
        inherited_object_type: Option<Guid>,
    },
    // Audit, callback and other ACE types are kept as opaque bodies (without
    // their header) so that they are written back untouched.
    Unsupported {
        ace_type: u8,
        bytes: Vec<u8>,
    },
}

impl Ace {
    pub fn new(flags: u8, type_specific: AceType) -> Self {
        Self { flags, type_specific }
    }

    pub fn allow(trustee: Sid, mask: u32) -> Self {
        Self::new(0, AceType::AccessAllowed { trustee, mask })
    }

    pub fn deny(trustee: Sid, mask: u32) -> Self {
        Self::new(0, AceType::AccessDenied { trustee, mask })
    }

    pub fn allow_object(trustee: Sid, mask: u32, object_type: Guid) -> Self {
        Self::new(0, AceType::AccessAllowedObject { trustee, mask, object_type: Some(object_type), inherited_object_type: None })
    }

    pub fn deny_object(trustee: Sid, mask: u32, object_type: Guid) -> Self {
        Self::new(0, AceType::AccessDeniedObject { trustee, mask, object_type: Some(object_type), inherited_object_type: None })
    }

    // Parses exactly one ACE: the slice must span the size announced in its header.
    pub fn from_bytes(slice: &[u8]) -> Result<Self, AuthzError> {
        let size = read_u16(slice, 2).ok_or_else(|| AuthzError::TruncatedAce { bytes: slice.to_vec(), ace_type: slice.first().copied().unwrap_or(0) })? as usize;
        if size < ACE_HEADER_SIZE || size != slice.len() {
            return Err(AuthzError::UnexpectedAceSize { bytes: slice.to_vec(), ace_index: 0, expected_size: size });
        }
        let ace_type = slice[0];
        let flags = slice[1];
        let body = &slice[ACE_HEADER_SIZE..];
        let truncated = || AuthzError::TruncatedAce { bytes: slice.to_vec(), ace_type };

        let type_specific = match ace_type {
            ACCESS_ALLOWED_ACE_TYPE | ACCESS_DENIED_ACE_TYPE => {
                let mask = read_u32(body, 0).ok_or_else(truncated)?;
                let (trustee, _) = Sid::parse_prefix(&body[4..])?;
                if ace_type == ACCESS_ALLOWED_ACE_TYPE {
                    AceType::AccessAllowed { trustee, mask }
                } else {
                    AceType::AccessDenied { trustee, mask }
                }
            },
            ACCESS_ALLOWED_OBJECT_ACE_TYPE | ACCESS_DENIED_OBJECT_ACE_TYPE => {
                let mask = read_u32(body, 0).ok_or_else(truncated)?;
                let object_flags = read_u32(body, 4).ok_or_else(truncated)?;
                let mut offset = 8;
                let mut read_guid = |present: bool| -> Result<Option<Guid>, AuthzError> {
                    if !present {
                        return Ok(None);
                    }
                    let bytes = body.get(offset..offset + 16).ok_or_else(truncated)?;
                    offset += 16;
                    Ok(Some(Guid::from_bytes(bytes)?))
                };
                let object_type = read_guid(object_flags & ACE_OBJECT_TYPE_PRESENT != 0)?;
                let inherited_object_type = read_guid(object_flags & ACE_INHERITED_OBJECT_TYPE_PRESENT != 0)?;
                let sid_bytes = body.get(offset..).ok_or_else(truncated)?;
                let (trustee, _) = Sid::parse_prefix(sid_bytes)?;
                if ace_type == ACCESS_ALLOWED_OBJECT_ACE_TYPE {
                    AceType::AccessAllowedObject { trustee, mask, object_type, inherited_object_type }
                } else {
                    AceType::AccessDeniedObject { trustee, mask, object_type, inherited_object_type }
                }
            },
            _ => {
                log::debug!("Keeping ACE of unsupported type {} as opaque bytes", ace_type);
                AceType::Unsupported { ace_type, bytes: body.to_vec() }
            },
        };
        Ok(Self { flags, type_specific })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthzError> {
        let mut out = vec![self.get_type(), self.flags, 0, 0];
        match &self.type_specific {
            AceType::AccessAllowed { trustee, mask } | AceType::AccessDenied { trustee, mask } => {
                out.extend_from_slice(&mask.to_le_bytes());
                out.extend_from_slice(trustee.as_bytes());
            },
            AceType::AccessAllowedObject { trustee, mask, object_type, inherited_object_type } |
            AceType::AccessDeniedObject { trustee, mask, object_type, inherited_object_type } => {
                let mut object_flags = 0;
                if object_type.is_some() {
                    object_flags |= ACE_OBJECT_TYPE_PRESENT;
                }
                if inherited_object_type.is_some() {
                    object_flags |= ACE_INHERITED_OBJECT_TYPE_PRESENT;
                }
                out.extend_from_slice(&mask.to_le_bytes());
                out.extend_from_slice(&object_flags.to_le_bytes());
                for guid in [object_type, inherited_object_type].into_iter().flatten() {
                    out.extend_from_slice(&guid.to_bytes());
                }
                out.extend_from_slice(trustee.as_bytes());
            },
            AceType::Unsupported { bytes, .. } => {
                out.extend_from_slice(bytes);
            },
        }
        pad_to_dword(&mut out);
        let size = u16::try_from(out.len())
            .map_err(|_| AuthzError::AceTooLarge { ace_type: self.get_type(), size: out.len() })?;
        write_u16(&mut out, 2, size);
        Ok(out)
    }

    pub fn get_type(&self) -> u8 {
        match &self.type_specific {
            AceType::AccessAllowed { .. } => ACCESS_ALLOWED_ACE_TYPE,
            AceType::AccessDenied { .. } => ACCESS_DENIED_ACE_TYPE,
            AceType::AccessAllowedObject { .. } => ACCESS_ALLOWED_OBJECT_ACE_TYPE,
            AceType::AccessDeniedObject { .. } => ACCESS_DENIED_OBJECT_ACE_TYPE,
            AceType::Unsupported { ace_type, .. } => *ace_type,
        }
    }

    pub fn get_trustee(&self) -> Option<&Sid> {
        match &self.type_specific {
            AceType::AccessAllowed { trustee, .. } |
            AceType::AccessDenied { trustee, .. } |
            AceType::AccessAllowedObject { trustee, .. } |
            AceType::AccessDeniedObject { trustee, .. } => Some(trustee),
            AceType::Unsupported { .. } => None,
        }
    }

    pub fn get_mask(&self) -> Option<u32> {
        match &self.type_specific {
            AceType::AccessAllowed { mask, .. } |
            AceType::AccessDenied { mask, .. } |
            AceType::AccessAllowedObject { mask, .. } |
            AceType::AccessDeniedObject { mask, .. } => Some(*mask),
            AceType::Unsupported { .. } => None,
        }
    }

    pub fn get_object_type(&self) -> Option<&Guid> {
        match &self.type_specific {
            AceType::AccessAllowedObject { object_type, .. } |
            AceType::AccessDeniedObject { object_type, .. } => object_type.as_ref(),
            _ => None,
        }
    }

    pub fn get_inherited_object_type(&self) -> Option<&Guid> {
        match &self.type_specific {
            AceType::AccessAllowedObject { inherited_object_type, .. } |
            AceType::AccessDeniedObject { inherited_object_type, .. } => inherited_object_type.as_ref(),
            _ => None,
        }
    }

    /// Same rights with other inheritance flags, restricted to descendants of
    /// class `inherited_object_type` if any. A plain ACE becomes an object ACE
    /// without object type when it needs one.
    pub fn with_inheritance(&self, flags: u8, inherited_object_type: Option<Guid>) -> Self {
        let type_specific = match (&self.type_specific, inherited_object_type) {
            (AceType::AccessAllowed { trustee, mask }, Some(guid)) => AceType::AccessAllowedObject {
                trustee: trustee.clone(),
                mask: *mask,
                object_type: None,
                inherited_object_type: Some(guid),
            },
            (AceType::AccessDenied { trustee, mask }, Some(guid)) => AceType::AccessDeniedObject {
                trustee: trustee.clone(),
                mask: *mask,
                object_type: None,
                inherited_object_type: Some(guid),
            },
            (AceType::AccessAllowedObject { trustee, mask, object_type, .. }, inherited_object_type) => AceType::AccessAllowedObject {
                trustee: trustee.clone(),
                mask: *mask,
                object_type: *object_type,
                inherited_object_type,
            },
            (AceType::AccessDeniedObject { trustee, mask, object_type, .. }, inherited_object_type) => AceType::AccessDeniedObject {
                trustee: trustee.clone(),
                mask: *mask,
                object_type: *object_type,
                inherited_object_type,
            },
            (other, _) => other.clone(),
        };
        Self { flags, type_specific }
    }

    // Returns a copy of this ACE with another access mask (same type, flags and object types)
    pub fn with_mask(&self, new_mask: u32) -> Self {
        let mut res = self.clone();
        match &mut res.type_specific {
            AceType::AccessAllowed { mask, .. } |
            AceType::AccessDenied { mask, .. } |
            AceType::AccessAllowedObject { mask, .. } |
            AceType::AccessDeniedObject { mask, .. } => *mask = new_mask,
            AceType::Unsupported { .. } => (),
        }
        res
    }

    pub fn grants_access(&self) -> bool {
        matches!(self.type_specific, AceType::AccessAllowed { .. } | AceType::AccessAllowedObject { .. })
    }

    pub fn denies_access(&self) -> bool {
        matches!(self.type_specific, AceType::AccessDenied { .. } | AceType::AccessDeniedObject { .. })
    }

    pub fn is_object_specific(&self) -> bool {
        matches!(self.type_specific, AceType::AccessAllowedObject { .. } | AceType::AccessDeniedObject { .. })
    }

    pub fn is_inherited(&self) -> bool {
        (self.flags & INHERITED_ACE) != 0
    }

    pub fn is_inherit_only(&self) -> bool {
        (self.flags & INHERIT_ONLY_ACE) != 0
    }
}

impl Display for Ace {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match &self.type_specific {
            AceType::Unsupported { ace_type, bytes } => write!(f, "unsupported ACE type {} ({} bytes)", ace_type, bytes.len()),
            _ => {
                let verb = if self.grants_access() { "Allow" } else { "Deny" };
                if let Some(trustee) = self.get_trustee() {
                    write!(f, "{} {} mask 0x{:X}", verb, trustee, self.get_mask().unwrap_or(0))?;
                }
                if let Some(guid) = self.get_object_type() {
                    write!(f, " on {}", guid)?;
                }
                if self.is_inherited() {
                    f.write_str(" (inherited)")?;
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    fn everyone() -> Sid {
        Sid::try_from("S-1-1-0").unwrap()
    }

    #[test]
    fn plain_ace_layout() {
        let ace = Ace::allow(everyone(), 0x0002_0094);
        let bytes = ace.to_bytes().unwrap();
        assert_eq!(bytes, vec![
            0x00, 0x00, 0x14, 0x00,
            0x94, 0x00, 0x02, 0x00,
            0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(Ace::from_bytes(&bytes).unwrap(), ace);
    }

    #[test]
    fn object_ace_carries_its_guid() {
        let guid = Guid::try_from("ab721a53-1e2f-11d0-9819-00aa0040529b").unwrap();
        let ace = Ace::deny_object(everyone(), 0x100, guid);
        let bytes = ace.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 4 + 16 + 12);
        assert_eq!(bytes[0], ACCESS_DENIED_OBJECT_ACE_TYPE);
        let parsed = Ace::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.get_object_type(), Some(&guid));
        assert!(!parsed.grants_access());
        assert!(parsed.is_object_specific());
    }

    #[test]
    fn unsupported_ace_is_kept_verbatim() {
        // SYSTEM_AUDIT_ACE_TYPE with an arbitrary body
        let bytes = vec![0x02, 0xC0, 0x0C, 0x00, 0xFF, 0x01, 0x0F, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let ace = Ace::from_bytes(&bytes).unwrap();
        assert_eq!(ace.get_type(), 0x02);
        assert_eq!(ace.get_trustee(), None);
        assert_eq!(ace.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_truncated() {
        let bytes = Ace::allow(everyone(), 1).to_bytes().unwrap();
        assert!(Ace::from_bytes(&bytes[..10]).is_err());
        let mut bad_size = bytes.clone();
        bad_size[2] = 0x40;
        assert!(matches!(Ace::from_bytes(&bad_size), Err(AuthzError::UnexpectedAceSize { .. })));
    }

    #[test]
    fn with_mask_keeps_type_and_flags() {
        let mut ace = Ace::deny(everyone(), 0x30);
        ace.flags = CONTAINER_INHERIT_ACE;
        let residual = ace.with_mask(0x20);
        assert_eq!(residual.get_mask(), Some(0x20));
        assert_eq!(residual.flags, CONTAINER_INHERIT_ACE);
        assert!(residual.denies_access());
    }
}

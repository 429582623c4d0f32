use crate::error::AuthzError;
use crate::utils::{read_u16, read_u32, write_u16, write_u32};
use crate::{Ace, Acl, Sid};

pub const SE_DACL_PRESENT: u16 = 0x0004;
pub const SE_SACL_PRESENT: u16 = 0x0010;
pub const SE_SELF_RELATIVE: u16 = 0x8000;

const SD_REVISION: u8 = 1;
const SD_HEADER_SIZE: usize = 20;

/// Self-relative security descriptor, as stored in nTSecurityDescriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    pub control: u16,
    pub owner: Option<Sid>,
    pub group: Option<Sid>,
    pub sacl: Option<Acl>,
    pub dacl: Option<Acl>,
}

impl SecurityDescriptor {
    pub fn from_bytes(slice: &[u8]) -> Result<Self, AuthzError> {
        if slice.len() < SD_HEADER_SIZE || slice[0] != SD_REVISION {
            return Err(AuthzError::InvalidSecurityDescriptor { bytes: slice.to_vec() });
        }
        let control = read_u16(slice, 2).unwrap_or(0);
        if (control & SE_SELF_RELATIVE) == 0 {
            return Err(AuthzError::NotSelfRelative { bytes: slice.to_vec() });
        }
        let offsets = [
            read_u32(slice, 4).unwrap_or(0) as usize,
            read_u32(slice, 8).unwrap_or(0) as usize,
            read_u32(slice, 12).unwrap_or(0) as usize,
            read_u32(slice, 16).unwrap_or(0) as usize,
        ];

        let owner = Self::parse_sid(slice, offsets[0], "owner")?;
        let group = Self::parse_sid(slice, offsets[1], "group")?;
        let sacl = if (control & SE_SACL_PRESENT) != 0 {
            Self::parse_acl(slice, offsets[2], "SACL")?
        } else {
            None
        };
        let dacl = if (control & SE_DACL_PRESENT) != 0 {
            Self::parse_acl(slice, offsets[3], "DACL")?
        } else {
            None
        };

        Ok(Self { control, owner, group, sacl, dacl })
    }

    fn parse_sid(slice: &[u8], offset: usize, what: &'static str) -> Result<Option<Sid>, AuthzError> {
        if offset == 0 {
            return Ok(None);
        }
        if offset < SD_HEADER_SIZE || offset >= slice.len() {
            return Err(AuthzError::OffsetOutOfBounds { bytes: slice.to_vec(), what, offset });
        }
        let (sid, _) = Sid::parse_prefix(&slice[offset..])?;
        Ok(Some(sid))
    }

    // A present ACL with a null offset is a NULL DACL/SACL, which we represent as None
    fn parse_acl(slice: &[u8], offset: usize, what: &'static str) -> Result<Option<Acl>, AuthzError> {
        if offset == 0 {
            return Ok(None);
        }
        if offset < SD_HEADER_SIZE {
            return Err(AuthzError::OffsetOutOfBounds { bytes: slice.to_vec(), what, offset });
        }
        let size = read_u16(slice, offset + 2)
            .ok_or_else(|| AuthzError::OffsetOutOfBounds { bytes: slice.to_vec(), what, offset })? as usize;
        let end = offset.checked_add(size)
            .filter(|end| *end <= slice.len())
            .ok_or_else(|| AuthzError::OffsetOutOfBounds { bytes: slice.to_vec(), what, offset })?;
        Ok(Some(Acl::parse(&slice[offset..end])?))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthzError> {
        let mut control = self.control | SE_SELF_RELATIVE;
        if self.sacl.is_some() {
            control |= SE_SACL_PRESENT;
        }
        if self.dacl.is_some() {
            control |= SE_DACL_PRESENT;
        }

        let mut out = vec![0u8; SD_HEADER_SIZE];
        out[0] = SD_REVISION;
        write_u16(&mut out, 2, control);

        let append = |out: &mut Vec<u8>, header_offset: usize, bytes: Option<Vec<u8>>| {
            if let Some(bytes) = bytes {
                let offset = out.len() as u32;
                write_u32(out, header_offset, offset);
                out.extend_from_slice(&bytes);
            }
        };
        append(&mut out, 12, self.sacl.as_ref().map(Acl::to_bytes).transpose()?);
        append(&mut out, 16, self.dacl.as_ref().map(Acl::to_bytes).transpose()?);
        append(&mut out, 4, self.owner.as_ref().map(|s| s.as_bytes().to_vec()));
        append(&mut out, 8, self.group.as_ref().map(|s| s.as_bytes().to_vec()));
        Ok(out)
    }

    pub fn dacl_aces(&self) -> &[Ace] {
        match &self.dacl {
            Some(acl) => acl.aces.as_slice(),
            None => &[],
        }
    }

    // Every trustee referenced in the DACL, in order of first appearance
    pub fn get_trustees(&self) -> Vec<Sid> {
        let mut res: Vec<Sid> = Vec::new();
        for trustee in self.dacl_aces().iter().filter_map(Ace::get_trustee) {
            if !res.contains(trustee) {
                res.push(trustee.clone());
            }
        }
        res
    }
}

use core::fmt::{Display, Formatter};
use std::cmp::Ordering;
use crate::error::AuthzError;
use crate::utils::{read_u16, write_u16};
use crate::Ace;

pub const ACL_REVISION: u8 = 2;
pub const ACL_REVISION_DS: u8 = 4;
const ACL_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub revision: u8,
    pub aces: Vec<Ace>,
}

impl Acl {
    pub fn new(aces: Vec<Ace>) -> Self {
        let revision = if aces.iter().any(|a| a.is_object_specific()) { ACL_REVISION_DS } else { ACL_REVISION };
        Self { revision, aces }
    }

    pub fn parse(slice: &[u8]) -> Result<Self, AuthzError> {
        let expected_size = read_u16(slice, 2).ok_or_else(|| AuthzError::UnexpectedAclSize { bytes: slice.to_vec(), expected_size: ACL_HEADER_SIZE })? as usize;
        if expected_size != slice.len() || expected_size < ACL_HEADER_SIZE {
            return Err(AuthzError::UnexpectedAclSize { bytes: slice.to_vec(), expected_size });
        }
        let revision = slice[0];
        if revision != ACL_REVISION && revision != ACL_REVISION_DS {
            return Err(AuthzError::InvalidAclRevision { bytes: slice.to_vec(), revision });
        }
        let ace_count = read_u16(slice, 4).unwrap_or(0);

        let mut aces = Vec::with_capacity(ace_count as usize);
        let mut offset = ACL_HEADER_SIZE;
        for ace_index in 0..u32::from(ace_count) {
            let ace_size = match read_u16(slice, offset + 2) {
                Some(s) => s as usize,
                None => return Err(AuthzError::UnexpectedAceSize { bytes: slice.to_vec(), ace_index, expected_size: 4 }),
            };
            if ace_size < 4 || offset + ace_size > slice.len() {
                return Err(AuthzError::UnexpectedAceSize { bytes: slice.to_vec(), ace_index, expected_size: ace_size });
            }
            let ace = Ace::from_bytes(&slice[offset..offset + ace_size]).map_err(|e| match e {
                AuthzError::UnexpectedAceSize { expected_size, .. } => AuthzError::UnexpectedAceSize { bytes: slice.to_vec(), ace_index, expected_size },
                other => other,
            })?;
            aces.push(ace);
            offset += ace_size;
        }
        Ok(Self { revision, aces })
    }

    /// Fails when the ACL is too large for the 16-bit size and count of its header.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthzError> {
        let revision = if self.aces.iter().any(|a| a.is_object_specific()) {
            ACL_REVISION_DS
        } else {
            self.revision
        };
        let mut out = vec![revision, 0, 0, 0, 0, 0, 0, 0];
        for ace in &self.aces {
            out.extend_from_slice(&ace.to_bytes()?);
        }
        let too_large = || AuthzError::AclTooLarge { size: out.len(), ace_count: self.aces.len() };
        let size = u16::try_from(out.len()).map_err(|_| too_large())?;
        let count = u16::try_from(self.aces.len()).map_err(|_| too_large())?;
        write_u16(&mut out, 2, size);
        write_u16(&mut out, 4, count);
        Ok(out)
    }

    /// Orders the ACEs in the ACL according to the preferred order:
    /// 1. All explicit ACEs are placed in a group before any inherited ACEs.
    /// 2. Within the group of explicit ACEs, access-denied ACEs are placed before access-allowed ACEs.
    /// 3. Inherited ACEs keep their relative order, since we do not know which
    ///    ancestor each one comes from.
    pub fn order_aces(&mut self) {
        self.aces.sort_by(Self::sort_aces_by);
    }

    pub fn is_canonical(&self) -> bool {
        self.aces.windows(2).all(|w| Self::sort_aces_by(&w[0], &w[1]) != Ordering::Greater)
    }

    // Returns the first ACE which breaks canonical ordering, if any
    pub fn get_non_canonical_ace(&self) -> Option<&Ace> {
        self.aces.windows(2)
            .find(|w| Self::sort_aces_by(&w[0], &w[1]) == Ordering::Greater)
            .map(|w| &w[1])
    }

    fn sort_aces_by(a: &Ace, b: &Ace) -> Ordering {
        let a_inherited = a.is_inherited();
        let b_inherited = b.is_inherited();
        if a_inherited != b_inherited {
            return a_inherited.cmp(&b_inherited);
        }
        if a_inherited {
            return Ordering::Equal;
        }
        // sort is stable: anything which neither allows nor denies stays put relative to its peers
        Self::explicit_rank(a).cmp(&Self::explicit_rank(b))
    }

    fn explicit_rank(ace: &Ace) -> u8 {
        if ace.denies_access() {
            0
        } else if ace.grants_access() {
            1
        } else {
            2
        }
    }
}

impl Display for Acl {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "ACL(revision={}, {} ACEs)", self.revision, self.aces.len())?;
        for ace in &self.aces {
            write!(f, "\n  {}", ace)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ace::INHERITED_ACE;
    use crate::{Guid, Sid};
    use std::convert::TryFrom;

    fn everyone() -> Sid {
        Sid::try_from("S-1-1-0").unwrap()
    }

    #[test]
    fn parse_back_what_we_write() {
        let guid = Guid::try_from("bf967aba-0de6-11d0-a285-00aa003049e2").unwrap();
        let acl = Acl::new(vec![
            Ace::deny(everyone(), 0x40),
            Ace::allow_object(everyone(), 0x10, guid),
        ]);
        let bytes = acl.to_bytes().unwrap();
        assert_eq!(bytes[0], ACL_REVISION_DS);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]) as usize, bytes.len());
        assert_eq!(Acl::parse(&bytes).unwrap(), acl);
    }

    #[test]
    fn empty_acl() {
        let bytes = Acl::new(vec![]).to_bytes().unwrap();
        assert_eq!(bytes, vec![ACL_REVISION, 0, 8, 0, 0, 0, 0, 0]);
        assert!(Acl::parse(&bytes).unwrap().aces.is_empty());
    }

    #[test]
    fn rejects_ace_out_of_bounds() {
        let mut bytes = Acl::new(vec![Ace::allow(everyone(), 1)]).to_bytes().unwrap();
        // announce a second ACE which is not there
        bytes[4] = 2;
        assert!(matches!(Acl::parse(&bytes), Err(AuthzError::UnexpectedAceSize { ace_index: 1, .. })));
        assert!(matches!(Acl::parse(&bytes[..bytes.len() - 1]), Err(AuthzError::UnexpectedAclSize { .. })));
    }

    #[test]
    fn rejects_unknown_revision() {
        let mut bytes = Acl::new(vec![Ace::allow(everyone(), 1)]).to_bytes().unwrap();
        bytes[0] = 3;
        assert!(matches!(Acl::parse(&bytes), Err(AuthzError::InvalidAclRevision { revision: 3, .. })));
        bytes[0] = ACL_REVISION_DS;
        assert!(Acl::parse(&bytes).is_ok());
    }

    #[test]
    fn refuses_to_truncate_size() {
        // 2500 ACEs of 20 bytes do not fit in a 16-bit size
        let acl = Acl::new(vec![Ace::allow(everyone(), 1); 2500]);
        assert!(matches!(acl.to_bytes(), Err(AuthzError::AclTooLarge { ace_count: 2500, .. })));
        let acl = Acl::new(vec![Ace::allow(everyone(), 1); 3000 / 20]);
        let bytes = acl.to_bytes().unwrap();
        assert_eq!(Acl::parse(&bytes).unwrap(), acl);
    }

    #[test]
    fn sort_aces() {
        let explicit_deny_first = Ace::deny(everyone(), 1);
        let explicit_allow_second = Ace::allow(everyone(), 1);
        let inherited_last_1 = Ace::new(INHERITED_ACE, Ace::allow(everyone(), 2).type_specific);
        let inherited_last_2 = Ace::new(INHERITED_ACE, Ace::deny(everyone(), 2).type_specific);
        let acl = Acl::new(vec![
            inherited_last_1.clone(),
            explicit_allow_second.clone(),
            explicit_deny_first.clone(),
            inherited_last_2.clone(),
        ]);
        assert!(!acl.is_canonical());
        assert_eq!(acl.get_non_canonical_ace(), Some(&explicit_allow_second));

        let mut sorted = acl.clone();
        sorted.order_aces();
        assert!(sorted.is_canonical());
        assert_eq!(sorted.aces, vec![
            explicit_deny_first,
            explicit_allow_second,
            inherited_last_1,
            inherited_last_2,
        ]);
    }
}

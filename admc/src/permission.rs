use core::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;
use serde::Serialize;
use authz::rights::{
    ADS_RIGHT_ACTRL_DS_LIST, ADS_RIGHT_DELETE, ADS_RIGHT_DS_CONTROL_ACCESS, ADS_RIGHT_DS_CREATE_CHILD,
    ADS_RIGHT_DS_DELETE_CHILD, ADS_RIGHT_DS_DELETE_TREE, ADS_RIGHT_DS_FULL_CONTROL, ADS_RIGHT_DS_READ_PROP,
    ADS_RIGHT_DS_SELF, ADS_RIGHT_DS_WRITE_PROP, ADS_RIGHT_READ_CONTROL,
};
use crate::error::AdmcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AcePermission {
    FullControl,
    Read,
    Write,
    Delete,
    DeleteSubtree,
    CreateChild,
    DeleteChild,
    AllowedToAuthenticate,
    ChangePassword,
    ReceiveAs,
    ResetPassword,
    SendAs,
    ReadAccountRestrictions,
    WriteAccountRestrictions,
    ReadGeneralInfo,
    WriteGeneralInfo,
    ReadGroupMembership,
    ReadLogonInfo,
    WriteLogonInfo,
    ReadPersonalInfo,
    WritePersonalInfo,
    ReadPhoneAndMailOptions,
    WritePhoneAndMailOptions,
    ReadPrivateInfo,
    WritePrivateInfo,
    ReadPublicInfo,
    WritePublicInfo,
    ReadRemoteAccessInfo,
    WriteRemoteAccessInfo,
    ReadTerminalServerLicenseServer,
    WriteTerminalServerLicenseServer,
    ReadWebInfo,
    WriteWebInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PermissionState {
    None,
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AceColumn {
    Allowed,
    Denied,
}

impl AceColumn {
    pub fn opposite(self) -> Self {
        match self {
            Self::Allowed => Self::Denied,
            Self::Denied => Self::Allowed,
        }
    }

    pub fn state(self) -> PermissionState {
        match self {
            Self::Allowed => PermissionState::Allowed,
            Self::Denied => PermissionState::Denied,
        }
    }
}

impl FromStr for AceColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allowed" | "allow" => Ok(Self::Allowed),
            "denied" | "deny" => Ok(Self::Denied),
            _ => Err(format!("unknown column \"{}\"", s)),
        }
    }
}

impl Display for PermissionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::None => "",
            Self::Allowed => "Allowed",
            Self::Denied => "Denied",
        })
    }
}

const ALL_PERMISSIONS: [AcePermission; 33] = [
    AcePermission::FullControl,
    AcePermission::Read,
    AcePermission::Write,
    AcePermission::Delete,
    AcePermission::DeleteSubtree,
    AcePermission::CreateChild,
    AcePermission::DeleteChild,
    AcePermission::AllowedToAuthenticate,
    AcePermission::ChangePassword,
    AcePermission::ReceiveAs,
    AcePermission::ResetPassword,
    AcePermission::SendAs,
    AcePermission::ReadAccountRestrictions,
    AcePermission::WriteAccountRestrictions,
    AcePermission::ReadGeneralInfo,
    AcePermission::WriteGeneralInfo,
    AcePermission::ReadGroupMembership,
    AcePermission::ReadLogonInfo,
    AcePermission::WriteLogonInfo,
    AcePermission::ReadPersonalInfo,
    AcePermission::WritePersonalInfo,
    AcePermission::ReadPhoneAndMailOptions,
    AcePermission::WritePhoneAndMailOptions,
    AcePermission::ReadPrivateInfo,
    AcePermission::WritePrivateInfo,
    AcePermission::ReadPublicInfo,
    AcePermission::WritePublicInfo,
    AcePermission::ReadRemoteAccessInfo,
    AcePermission::WriteRemoteAccessInfo,
    AcePermission::ReadTerminalServerLicenseServer,
    AcePermission::WriteTerminalServerLicenseServer,
    AcePermission::ReadWebInfo,
    AcePermission::WriteWebInfo,
];

impl AcePermission {
    /// Every permission, in display order.
    pub fn all() -> &'static [AcePermission] {
        &ALL_PERMISSIONS
    }

    pub fn mask(self) -> u32 {
        match self {
            Self::FullControl => ADS_RIGHT_DS_FULL_CONTROL,
            Self::Read => ADS_RIGHT_READ_CONTROL | ADS_RIGHT_ACTRL_DS_LIST | ADS_RIGHT_DS_READ_PROP,
            Self::Write => ADS_RIGHT_DS_SELF | ADS_RIGHT_DS_WRITE_PROP,
            Self::Delete => ADS_RIGHT_DELETE,
            Self::DeleteSubtree => ADS_RIGHT_DS_DELETE_TREE,
            Self::CreateChild => ADS_RIGHT_DS_CREATE_CHILD,
            Self::DeleteChild => ADS_RIGHT_DS_DELETE_CHILD,
            Self::AllowedToAuthenticate
            | Self::ChangePassword
            | Self::ReceiveAs
            | Self::ResetPassword
            | Self::SendAs => ADS_RIGHT_DS_CONTROL_ACCESS,
            Self::ReadAccountRestrictions
            | Self::ReadGeneralInfo
            | Self::ReadGroupMembership
            | Self::ReadLogonInfo
            | Self::ReadPersonalInfo
            | Self::ReadPhoneAndMailOptions
            | Self::ReadPrivateInfo
            | Self::ReadPublicInfo
            | Self::ReadRemoteAccessInfo
            | Self::ReadTerminalServerLicenseServer
            | Self::ReadWebInfo => ADS_RIGHT_DS_READ_PROP,
            Self::WriteAccountRestrictions
            | Self::WriteGeneralInfo
            | Self::WriteLogonInfo
            | Self::WritePersonalInfo
            | Self::WritePhoneAndMailOptions
            | Self::WritePrivateInfo
            | Self::WritePublicInfo
            | Self::WriteRemoteAccessInfo
            | Self::WriteTerminalServerLicenseServer
            | Self::WriteWebInfo => ADS_RIGHT_DS_WRITE_PROP,
        }
    }

    /// CN of the controlAccessRight object (extended right or property set)
    /// an object ACE must target for this permission, if any.
    pub fn right_cn(self) -> Option<&'static str> {
        match self {
            Self::FullControl
            | Self::Read
            | Self::Write
            | Self::Delete
            | Self::DeleteSubtree
            | Self::CreateChild
            | Self::DeleteChild => None,
            Self::AllowedToAuthenticate => Some("Allowed-To-Authenticate"),
            Self::ChangePassword => Some("User-Change-Password"),
            Self::ReceiveAs => Some("Receive-As"),
            Self::ResetPassword => Some("User-Force-Change-Password"),
            Self::SendAs => Some("Send-As"),
            Self::ReadAccountRestrictions | Self::WriteAccountRestrictions => Some("User-Account-Restrictions"),
            Self::ReadGeneralInfo | Self::WriteGeneralInfo => Some("General-Information"),
            Self::ReadGroupMembership => Some("Membership"),
            Self::ReadLogonInfo | Self::WriteLogonInfo => Some("User-Logon"),
            Self::ReadPersonalInfo | Self::WritePersonalInfo => Some("Personal-Information"),
            Self::ReadPhoneAndMailOptions | Self::WritePhoneAndMailOptions => Some("Email-Information"),
            Self::ReadPrivateInfo | Self::WritePrivateInfo => Some("Private-Information"),
            Self::ReadPublicInfo | Self::WritePublicInfo => Some("Public-Information"),
            Self::ReadRemoteAccessInfo | Self::WriteRemoteAccessInfo => Some("RAS-Information"),
            Self::ReadTerminalServerLicenseServer | Self::WriteTerminalServerLicenseServer => Some("Terminal-Server-License-Server"),
            Self::ReadWebInfo | Self::WriteWebInfo => Some("Web-Information"),
        }
    }

    pub fn is_object_specific(self) -> bool {
        self.right_cn().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FullControl => "FullControl",
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Delete => "Delete",
            Self::DeleteSubtree => "DeleteSubtree",
            Self::CreateChild => "CreateChild",
            Self::DeleteChild => "DeleteChild",
            Self::AllowedToAuthenticate => "AllowedToAuthenticate",
            Self::ChangePassword => "ChangePassword",
            Self::ReceiveAs => "ReceiveAs",
            Self::ResetPassword => "ResetPassword",
            Self::SendAs => "SendAs",
            Self::ReadAccountRestrictions => "ReadAccountRestrictions",
            Self::WriteAccountRestrictions => "WriteAccountRestrictions",
            Self::ReadGeneralInfo => "ReadGeneralInfo",
            Self::WriteGeneralInfo => "WriteGeneralInfo",
            Self::ReadGroupMembership => "ReadGroupMembership",
            Self::ReadLogonInfo => "ReadLogonInfo",
            Self::WriteLogonInfo => "WriteLogonInfo",
            Self::ReadPersonalInfo => "ReadPersonalInfo",
            Self::WritePersonalInfo => "WritePersonalInfo",
            Self::ReadPhoneAndMailOptions => "ReadPhoneAndMailOptions",
            Self::WritePhoneAndMailOptions => "WritePhoneAndMailOptions",
            Self::ReadPrivateInfo => "ReadPrivateInfo",
            Self::WritePrivateInfo => "WritePrivateInfo",
            Self::ReadPublicInfo => "ReadPublicInfo",
            Self::WritePublicInfo => "WritePublicInfo",
            Self::ReadRemoteAccessInfo => "ReadRemoteAccessInfo",
            Self::WriteRemoteAccessInfo => "WriteRemoteAccessInfo",
            Self::ReadTerminalServerLicenseServer => "ReadTerminalServerLicenseServer",
            Self::WriteTerminalServerLicenseServer => "WriteTerminalServerLicenseServer",
            Self::ReadWebInfo => "ReadWebInfo",
            Self::WriteWebInfo => "WriteWebInfo",
        }
    }

    pub fn is_read_prop(self) -> bool {
        read_prop_permissions().contains(&self)
    }

    pub fn is_write_prop(self) -> bool {
        write_prop_permissions().contains(&self)
    }

    // Permissions whose checked state depends on this one agreeing with them
    pub fn ancestors(self) -> Vec<AcePermission> {
        let mut res = vec![AcePermission::FullControl];
        if self.is_read_prop() {
            res.push(AcePermission::Read);
        } else if self.is_write_prop() {
            res.push(AcePermission::Write);
        }
        res
    }
}

impl Display for AcePermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AcePermission {
    type Err = AdmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PERMISSIONS.iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| AdmcError::UnknownPermission(s.to_owned()))
    }
}

fn permissions_with_mask(mask: u32) -> Vec<AcePermission> {
    ALL_PERMISSIONS.iter().copied().filter(|p| p.mask() == mask).collect()
}

/// Permissions implied by Read: those which grant exactly the read property right.
pub fn read_prop_permissions() -> &'static [AcePermission] {
    static SET: OnceLock<Vec<AcePermission>> = OnceLock::new();
    SET.get_or_init(|| permissions_with_mask(ADS_RIGHT_DS_READ_PROP))
}

/// Permissions implied by Write: those which grant exactly the write property right.
pub fn write_prop_permissions() -> &'static [AcePermission] {
    static SET: OnceLock<Vec<AcePermission>> = OnceLock::new();
    SET.get_or_init(|| permissions_with_mask(ADS_RIGHT_DS_WRITE_PROP))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsets_are_derived_from_masks() {
        assert_eq!(read_prop_permissions().len(), 11);
        assert_eq!(write_prop_permissions().len(), 10);
        assert!(AcePermission::ReadGroupMembership.is_read_prop());
        assert!(!AcePermission::Read.is_read_prop());
        assert!(!AcePermission::Write.is_write_prop());
        assert!(read_prop_permissions().iter().all(|p| p.name().starts_with("Read")));
        assert!(write_prop_permissions().iter().all(|p| p.name().starts_with("Write")));
    }

    #[test]
    fn ancestors() {
        assert_eq!(AcePermission::ReadWebInfo.ancestors(), vec![AcePermission::FullControl, AcePermission::Read]);
        assert_eq!(AcePermission::WriteWebInfo.ancestors(), vec![AcePermission::FullControl, AcePermission::Write]);
        assert_eq!(AcePermission::SendAs.ancestors(), vec![AcePermission::FullControl]);
        assert_eq!(AcePermission::Read.ancestors(), vec![AcePermission::FullControl]);
    }

    #[test]
    fn full_control_covers_every_mask() {
        for p in AcePermission::all() {
            assert_eq!(p.mask() & ADS_RIGHT_DS_FULL_CONTROL, p.mask(), "{}", p);
        }
    }

    #[test]
    fn object_specific_permissions_have_single_bit_masks() {
        for p in AcePermission::all().iter().filter(|p| p.is_object_specific()) {
            assert_eq!(p.mask().count_ones(), 1, "{}", p);
        }
    }

    #[test]
    fn names_parse_back() {
        assert_eq!(AcePermission::all().len(), 33);
        for p in AcePermission::all() {
            assert_eq!(p.to_string().parse::<AcePermission>().unwrap(), *p);
        }
        assert_eq!("fullcontrol".parse::<AcePermission>().unwrap(), AcePermission::FullControl);
        assert!("Everything".parse::<AcePermission>().is_err());
        assert_eq!("deny".parse::<AceColumn>().unwrap(), AceColumn::Denied);
    }
}

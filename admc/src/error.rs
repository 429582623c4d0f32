use thiserror::Error;
use authz::{AuthzError, Sid};
use ldapdir::LdapError;

#[derive(Debug, Error)]
pub enum AdmcError {
    #[error(transparent)]
    Ldap(#[from] LdapError),
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error("malformed gPLink value \"{value}\" ({reason})")]
    MalformedGplink {
        value: String,
        reason: String,
    },
    #[error("malformed gPOptions value \"{0}\"")]
    MalformedGpoptions(String),
    #[error("no schema right GUID known for \"{right}\", cannot encode {permission}")]
    UnresolvedRight {
        permission: String,
        right: String,
    },
    #[error("object {dn} has no nTSecurityDescriptor")]
    MissingSecurityDescriptor {
        dn: String,
    },
    #[error("unknown permission \"{0}\"")]
    UnknownPermission(String),
    #[error("trustee {0} is not part of this security descriptor")]
    UnknownTrustee(Sid),
    #[error("unable to read or write snapshot file {path}: {reason}")]
    SnapshotFile {
        path: String,
        reason: String,
    },
    #[error("unable to write output: {0}")]
    Output(String),
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LdapError {
    #[error("object \"{dn}\" does not exist")]
    NoSuchObject {
        dn: String,
    },
    #[error("unexpected object \"{dn}\" collision")]
    RequiredObjectCollision {
        dn: String,
    },
    #[error("object \"{dn}\" not found, cannot proceed")]
    RequiredObjectMissing {
        dn: String,
    },
    #[error("required attribute \"{name}\" missing on {dn}")]
    RequiredAttributeMissing {
        dn: String,
        name: String,
    },
    #[error("unexpected value collision for {name} on {dn} ({val1} / {val2})")]
    AttributeValuesCollision {
        dn: String,
        name: String,
        val1: String,
        val2: String,
    },
    #[error("invalid search filter \"{filter}\" ({reason})")]
    InvalidFilter {
        filter: String,
        reason: String,
    },
    #[error("directory refused to replace {name} on {dn}")]
    WriteRejected {
        dn: String,
        name: String,
    },
    #[error("invalid directory snapshot ({0})")]
    InvalidSnapshot(String),
}

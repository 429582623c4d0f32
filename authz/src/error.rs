use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("invalid security descriptor {bytes:?}")]
    InvalidSecurityDescriptor {
        bytes: Vec<u8>,
    },
    #[error("security descriptor is not self-relative {bytes:?}")]
    NotSelfRelative {
        bytes: Vec<u8>,
    },
    #[error("{what} offset {offset} is out of bounds from security descriptor {bytes:?}")]
    OffsetOutOfBounds {
        bytes: Vec<u8>,
        what: &'static str,
        offset: usize,
    },
    #[error("invalid SID {0:?}")]
    InvalidSidBytes(Vec<u8>),
    #[error("invalid SID string \"{0}\"")]
    InvalidSidString(String),
    #[error("SID {bytes:?} is {} bytes long, expected {expected_size}", .bytes.len())]
    UnexpectedSidSize {
        bytes: Vec<u8>,
        expected_size: usize,
    },
    #[error("invalid GUID {0:?}")]
    InvalidGuidBytes(Vec<u8>),
    #[error("invalid GUID string \"{0}\"")]
    InvalidGuidString(String),
    #[error("ACL {bytes:?} is {} bytes long, expected {expected_size}", .bytes.len())]
    UnexpectedAclSize {
        bytes: Vec<u8>,
        expected_size: usize,
    },
    #[error("ACL revision {revision} is not supported {bytes:?}")]
    InvalidAclRevision {
        bytes: Vec<u8>,
        revision: u8,
    },
    #[error("ACL of {ace_count} ACEs needs {size} bytes, more than its header can describe")]
    AclTooLarge {
        size: usize,
        ace_count: usize,
    },
    #[error("ACE of type {ace_type} needs {size} bytes, more than its header can describe")]
    AceTooLarge {
        ace_type: u8,
        size: usize,
    },
    #[error("ACE #{ace_index} of {expected_size} bytes is out of bounds from ACL {bytes:?}")]
    UnexpectedAceSize {
        bytes: Vec<u8>,
        ace_index: u32,
        expected_size: usize,
    },
    #[error("ACE of type {ace_type} is too short to hold its fields {bytes:?}")]
    TruncatedAce {
        bytes: Vec<u8>,
        ace_type: u8,
    },
}

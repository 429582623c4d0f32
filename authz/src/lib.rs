mod error;
mod security_descriptor;
mod acl;
mod ace;
mod sid;
mod guid;
mod utils;
pub mod rights;
#[cfg(feature = "serial")]
mod serial;

pub use error::AuthzError;
pub use security_descriptor::{SecurityDescriptor, SE_DACL_PRESENT, SE_SACL_PRESENT, SE_SELF_RELATIVE};
pub use acl::{Acl, ACL_REVISION, ACL_REVISION_DS};
pub use ace::{Ace, AceType, INHERITED_ACE, INHERIT_ONLY_ACE, CONTAINER_INHERIT_ACE, OBJECT_INHERIT_ACE, NO_PROPAGATE_INHERIT_ACE};
pub use sid::Sid;
pub use guid::Guid;

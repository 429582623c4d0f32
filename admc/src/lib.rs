pub mod error;
pub mod gplink;
pub mod permission;
pub mod schema;
pub mod security;
pub mod policy;
pub mod trustee;

pub use error::AdmcError;
pub use gplink::{Gplink, GplinkEntry, GplinkOption};
pub use permission::{AceColumn, AcePermission, PermissionState};
pub use schema::Schema;
pub use security::{PermissionTable, SecurityModel};
pub use policy::PolicyLink;

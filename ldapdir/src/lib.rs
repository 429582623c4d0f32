mod error;
mod search;
mod filter;
mod directory;
mod memory;
mod utils;

pub use error::LdapError;
pub use search::{LdapEntry, SearchScope};
pub use filter::{LdapFilter, escape_filter_value, escape_filter_bytes};
pub use directory::Directory;
pub use memory::MemoryDirectory;
pub use utils::{get_attr_strs, get_attr_str, get_attr_bytes, split_dn, get_rdn_value};

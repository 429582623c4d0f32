use crate::error::LdapError;
use crate::search::{LdapEntry, SearchScope};

/// What the administration core needs from a directory: searching, reading
/// attributes, and replacing attribute values.
pub trait Directory {
    fn search(&self, base: &str, scope: SearchScope, filter: Option<&str>, only_attributes: Option<&[&str]>) -> Result<Vec<LdapEntry>, LdapError>;

    /// Replaces every value of an attribute. An empty list removes the attribute.
    fn replace_attribute(&mut self, dn: &str, name: &str, values: Vec<Vec<u8>>) -> Result<(), LdapError>;

    fn get_default_naming_context(&self) -> &str;

    fn get_configuration_naming_context(&self) -> &str;

    fn get_schema_naming_context(&self) -> &str;

    fn get_entry(&self, dn: &str, only_attributes: Option<&[&str]>) -> Result<LdapEntry, LdapError> {
        let mut res = self.search(dn, SearchScope::Base, None, only_attributes)?;
        match res.len() {
            0 => Err(LdapError::RequiredObjectMissing { dn: dn.to_owned() }),
            1 => Ok(res.remove(0)),
            _ => Err(LdapError::RequiredObjectCollision { dn: dn.to_owned() }),
        }
    }

    // First value of the attribute, if the object has it
    fn get_attribute(&self, dn: &str, name: &str) -> Result<Option<Vec<u8>>, LdapError> {
        let entry = self.get_entry(dn, Some(&[name]))?;
        Ok(entry.get_first(name).map(|v| v.to_vec()))
    }

    fn replace_attribute_str(&mut self, dn: &str, name: &str, value: &str) -> Result<(), LdapError> {
        let values = if value.is_empty() {
            vec![]
        } else {
            vec![value.as_bytes().to_vec()]
        };
        self.replace_attribute(dn, name, values)
    }
}

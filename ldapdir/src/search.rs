use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapEntry {
    pub dn: String,
    // Attribute names are lowercase, so that lookups can be performed quickly using hashmaps
    pub attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl LdapEntry {
    pub fn new(dn: &str) -> Self {
        Self {
            dn: dn.to_owned(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_str(self, name: &str, value: &str) -> Self {
        self.with_bytes(name, value.as_bytes())
    }

    pub fn with_bytes(mut self, name: &str, value: &[u8]) -> Self {
        self.attrs.entry(name.to_lowercase()).or_default().push(value.to_vec());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Vec<Vec<u8>>> {
        self.attrs.get(&name.to_lowercase())
    }

    pub fn get_first(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(|vals| vals.first()).map(|v| v.as_slice())
    }

    // Keeps only the requested attributes. "*" or no list at all means every attribute.
    pub(crate) fn project(&self, only_attributes: Option<&[&str]>) -> Self {
        match only_attributes {
            Some(names) if !names.contains(&"*") => {
                let wanted: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
                Self {
                    dn: self.dn.clone(),
                    attrs: self.attrs.iter()
                        .filter(|(name, _)| wanted.contains(name))
                        .map(|(name, vals)| (name.clone(), vals.clone()))
                        .collect(),
                }
            },
            _ => self.clone(),
        }
    }
}

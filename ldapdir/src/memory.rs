use std::collections::{BTreeMap, HashMap, HashSet};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use crate::directory::Directory;
use crate::error::LdapError;
use crate::filter::LdapFilter;
use crate::search::{LdapEntry, SearchScope};
use crate::utils::split_dn;

/// A directory held entirely in memory, keyed by case-insensitive DN.
/// It can be loaded from and saved to a JSON snapshot, and can be told to
/// reject writes so that callers' failure paths can be exercised.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    default_naming_context: String,
    configuration_naming_context: String,
    schema_naming_context: String,
    entries: BTreeMap<String, LdapEntry>,
    read_only: bool,
    rejected_dns: HashSet<String>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    default_naming_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    configuration_naming_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_naming_context: Option<String>,
    #[serde(default)]
    objects: Vec<SnapshotObject>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotObject {
    dn: String,
    #[serde(default)]
    attributes: BTreeMap<String, Vec<SnapshotValue>>,
}

// Values which are printable UTF-8 are stored as plain strings, anything else as base64
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SnapshotValue {
    Text(String),
    Binary { base64: String },
}

impl SnapshotValue {
    fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) if !s.chars().any(char::is_control) => Self::Text(s.to_owned()),
            _ => Self::Binary { base64: STANDARD.encode(bytes) },
        }
    }

    fn into_bytes(self, dn: &str, name: &str) -> Result<Vec<u8>, LdapError> {
        match self {
            Self::Text(s) => Ok(s.into_bytes()),
            Self::Binary { base64 } => STANDARD.decode(base64.as_bytes())
                .map_err(|e| LdapError::InvalidSnapshot(format!("attribute {} of {} is not valid base64: {}", name, dn, e))),
        }
    }
}

fn dn_key(dn: &str) -> String {
    split_dn(dn).join(",").to_lowercase()
}

impl MemoryDirectory {
    pub fn new(default_naming_context: &str) -> Self {
        let configuration_naming_context = format!("CN=Configuration,{}", default_naming_context);
        let schema_naming_context = format!("CN=Schema,{}", configuration_naming_context);
        Self::with_naming_contexts(default_naming_context, &configuration_naming_context, &schema_naming_context)
    }

    pub fn with_naming_contexts(default_naming_context: &str, configuration_naming_context: &str, schema_naming_context: &str) -> Self {
        Self {
            default_naming_context: default_naming_context.to_owned(),
            configuration_naming_context: configuration_naming_context.to_owned(),
            schema_naming_context: schema_naming_context.to_owned(),
            entries: BTreeMap::new(),
            read_only: false,
            rejected_dns: HashSet::new(),
        }
    }

    /// Adds or replaces an object.
    pub fn insert(&mut self, entry: LdapEntry) {
        self.entries.insert(dn_key(&entry.dn), entry);
    }

    pub fn remove(&mut self, dn: &str) -> Option<LdapEntry> {
        self.entries.remove(&dn_key(dn))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn reject_writes_to(&mut self, dn: &str) {
        self.rejected_dns.insert(dn_key(dn));
    }

    pub fn from_json(json: &str) -> Result<Self, LdapError> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| LdapError::InvalidSnapshot(e.to_string()))?;
        let mut res = match (&snapshot.configuration_naming_context, &snapshot.schema_naming_context) {
            (Some(config), Some(schema)) => Self::with_naming_contexts(&snapshot.default_naming_context, config, schema),
            (Some(config), None) => Self::with_naming_contexts(&snapshot.default_naming_context, config, &format!("CN=Schema,{}", config)),
            _ => Self::new(&snapshot.default_naming_context),
        };
        for object in snapshot.objects {
            let mut attrs: HashMap<String, Vec<Vec<u8>>> = HashMap::new();
            for (name, values) in object.attributes {
                let name = name.to_lowercase();
                if attrs.contains_key(&name) {
                    return Err(LdapError::InvalidSnapshot(format!("attribute {} appears twice on {}", name, object.dn)));
                }
                let values = values.into_iter()
                    .map(|v| v.into_bytes(&object.dn, &name))
                    .collect::<Result<Vec<Vec<u8>>, LdapError>>()?;
                attrs.insert(name, values);
            }
            let key = dn_key(&object.dn);
            if res.entries.contains_key(&key) {
                return Err(LdapError::InvalidSnapshot(format!("object {} appears twice", object.dn)));
            }
            res.entries.insert(key, LdapEntry { dn: object.dn, attrs });
        }
        log::debug!("Loaded {} objects from directory snapshot", res.entries.len());
        Ok(res)
    }

    pub fn to_json(&self) -> Result<String, LdapError> {
        let snapshot = Snapshot {
            default_naming_context: self.default_naming_context.clone(),
            configuration_naming_context: Some(self.configuration_naming_context.clone()),
            schema_naming_context: Some(self.schema_naming_context.clone()),
            objects: self.entries.values().map(|entry| SnapshotObject {
                dn: entry.dn.clone(),
                attributes: entry.attrs.iter()
                    .map(|(name, vals)| (name.clone(), vals.iter().map(|v| SnapshotValue::from_bytes(v)).collect()))
                    .collect(),
            }).collect(),
        };
        serde_json::to_string_pretty(&snapshot).map_err(|e| LdapError::InvalidSnapshot(e.to_string()))
    }

    fn in_scope(base_key: &str, scope: SearchScope, key: &str) -> bool {
        match scope {
            SearchScope::Base => key == base_key,
            SearchScope::OneLevel => key.strip_suffix(base_key)
                .and_then(|prefix| prefix.strip_suffix(','))
                .map(|rdn| !rdn.is_empty() && split_dn(rdn).len() == 1)
                .unwrap_or(false),
            SearchScope::Subtree => key == base_key || key.ends_with(&format!(",{}", base_key)),
        }
    }
}

impl Directory for MemoryDirectory {
    fn search(&self, base: &str, scope: SearchScope, filter: Option<&str>, only_attributes: Option<&[&str]>) -> Result<Vec<LdapEntry>, LdapError> {
        let filter = filter.map(LdapFilter::parse).transpose()?;
        let base_key = dn_key(base);
        if !self.entries.contains_key(&base_key) {
            return Err(LdapError::NoSuchObject { dn: base.to_owned() });
        }
        let res: Vec<LdapEntry> = self.entries.iter()
            .filter(|(key, _)| Self::in_scope(&base_key, scope, key))
            .filter(|(_, entry)| filter.as_ref().map(|f| f.matches(entry)).unwrap_or(true))
            .map(|(_, entry)| entry.project(only_attributes))
            .collect();
        log::debug!("Search in {} ({:?}) returned {} entries", base, scope, res.len());
        Ok(res)
    }

    fn replace_attribute(&mut self, dn: &str, name: &str, values: Vec<Vec<u8>>) -> Result<(), LdapError> {
        let key = dn_key(dn);
        if self.read_only || self.rejected_dns.contains(&key) {
            log::warn!("Rejecting write of {} on {}", name, dn);
            return Err(LdapError::WriteRejected { dn: dn.to_owned(), name: name.to_owned() });
        }
        let entry = self.entries.get_mut(&key).ok_or_else(|| LdapError::NoSuchObject { dn: dn.to_owned() })?;
        if values.is_empty() {
            entry.attrs.remove(&name.to_lowercase());
        } else {
            entry.attrs.insert(name.to_lowercase(), values);
        }
        Ok(())
    }

    fn get_default_naming_context(&self) -> &str {
        &self.default_naming_context
    }

    fn get_configuration_naming_context(&self) -> &str {
        &self.configuration_naming_context
    }

    fn get_schema_naming_context(&self) -> &str {
        &self.schema_naming_context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDirectory {
        let mut dir = MemoryDirectory::new("DC=example,DC=com");
        dir.insert(LdapEntry::new("DC=example,DC=com").with_str("name", "example"));
        dir.insert(LdapEntry::new("OU=Workstations,DC=example,DC=com").with_str("name", "Workstations").with_str("objectClass", "organizationalUnit"));
        dir.insert(LdapEntry::new("OU=Laptops,OU=Workstations,DC=example,DC=com").with_str("name", "Laptops").with_str("objectClass", "organizationalUnit"));
        dir.insert(LdapEntry::new("CN=Alice,DC=example,DC=com").with_str("name", "Alice").with_bytes("objectSid", &[1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]));
        dir
    }

    #[test]
    fn search_scopes() {
        let dir = sample();
        assert_eq!(dir.search("dc=EXAMPLE,dc=com", SearchScope::Base, None, None).unwrap().len(), 1);
        let children = dir.search("DC=example,DC=com", SearchScope::OneLevel, None, None).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|e| e.dn != "OU=Laptops,OU=Workstations,DC=example,DC=com"));
        let ous = dir.search("DC=example,DC=com", SearchScope::Subtree, Some("(objectClass=organizationalUnit)"), Some(&["name"])).unwrap();
        assert_eq!(ous.len(), 2);
        assert!(ous.iter().all(|e| e.get("objectclass").is_none()));
        assert!(matches!(dir.search("OU=Missing,DC=example,DC=com", SearchScope::Base, None, None), Err(LdapError::NoSuchObject { .. })));
        assert!(matches!(dir.search("DC=example,DC=com", SearchScope::Base, Some("(broken"), None), Err(LdapError::InvalidFilter { .. })));
    }

    #[test]
    fn replace_and_delete() {
        let mut dir = sample();
        dir.replace_attribute_str("OU=Workstations,DC=example,DC=com", "gPLink", "[LDAP://cn=x;0]").unwrap();
        assert_eq!(dir.get_attribute("OU=Workstations,DC=example,DC=com", "gplink").unwrap(), Some(b"[LDAP://cn=x;0]".to_vec()));
        dir.replace_attribute_str("OU=Workstations,DC=example,DC=com", "gPLink", "").unwrap();
        assert_eq!(dir.get_attribute("OU=Workstations,DC=example,DC=com", "gplink").unwrap(), None);
        assert!(matches!(dir.replace_attribute_str("OU=Missing,DC=example,DC=com", "gPLink", "x"), Err(LdapError::NoSuchObject { .. })));
    }

    #[test]
    fn rejected_writes() {
        let mut dir = sample();
        dir.reject_writes_to("ou=workstations,dc=example,dc=com");
        assert!(matches!(dir.replace_attribute_str("OU=Workstations,DC=example,DC=com", "gPLink", "x"), Err(LdapError::WriteRejected { .. })));
        assert!(dir.replace_attribute_str("DC=example,DC=com", "gPLink", "x").is_ok());
        dir.set_read_only(true);
        assert!(matches!(dir.replace_attribute_str("DC=example,DC=com", "gPLink", "y"), Err(LdapError::WriteRejected { .. })));
        assert_eq!(dir.get_attribute("DC=example,DC=com", "gPLink").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn snapshot_keeps_binary_values() {
        let dir = sample();
        let json = dir.to_json().unwrap();
        assert!(json.contains("\"base64\""));
        let reloaded = MemoryDirectory::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), dir.len());
        assert_eq!(reloaded.get_schema_naming_context(), "CN=Schema,CN=Configuration,DC=example,DC=com");
        assert_eq!(
            reloaded.get_attribute("CN=Alice,DC=example,DC=com", "objectSid").unwrap(),
            Some(vec![1, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]),
        );
    }

    #[test]
    fn snapshot_errors() {
        assert!(matches!(MemoryDirectory::from_json("{"), Err(LdapError::InvalidSnapshot(_))));
        let bad_base64 = r#"{"default_naming_context": "DC=x", "objects": [{"dn": "DC=x", "attributes": {"objectSid": [{"base64": "!!"}]}}]}"#;
        assert!(matches!(MemoryDirectory::from_json(bad_base64), Err(LdapError::InvalidSnapshot(_))));
        let duplicate = r#"{"default_naming_context": "DC=x", "objects": [{"dn": "DC=x"}, {"dn": "dc=X"}]}"#;
        assert!(matches!(MemoryDirectory::from_json(duplicate), Err(LdapError::InvalidSnapshot(_))));
    }
}

use std::collections::HashMap;
use std::convert::TryFrom;
use authz::Guid;
use ldapdir::{get_attr_bytes, get_attr_str, Directory, LdapEntry, LdapError, SearchScope};
use crate::error::AdmcError;
use crate::permission::AcePermission;

// Well-known extended rights and property sets referenced by the permission
// table: (cn, rightsGuid, displayName). These never change across forests.
const BUILTIN_RIGHTS: [(&str, &str, &str); 16] = [
    ("Allowed-To-Authenticate", "68b1d179-0d15-4d4f-ab71-46152e79a7bc", "Allowed to Authenticate"),
    ("User-Change-Password", "ab721a53-1e2f-11d0-9819-00aa0040529b", "Change Password"),
    ("Receive-As", "ab721a56-1e2f-11d0-9819-00aa0040529b", "Receive As"),
    ("User-Force-Change-Password", "00299570-246d-11d0-a768-00aa006e0529", "Reset Password"),
    ("Send-As", "ab721a54-1e2f-11d0-9819-00aa0040529b", "Send As"),
    ("User-Account-Restrictions", "4c164200-20c0-11d0-a768-00aa006e0529", "Account Restrictions"),
    ("General-Information", "59ba2f42-79a2-11d0-9020-00c04fc2d3cf", "General Information"),
    ("Membership", "bc0ac240-79a9-11d0-9020-00c04fc2d4cf", "Group Membership"),
    ("User-Logon", "5f202010-79a5-11d0-9020-00c04fc2d4cf", "Logon Information"),
    ("Personal-Information", "77b5b886-944a-11d1-aebd-0000f80367c1", "Personal Information"),
    ("Email-Information", "e45795b2-9455-11d1-aebd-0000f80367c1", "Phone and Mail Options"),
    ("Private-Information", "91e647de-d96f-4b70-9557-d63ff4f3ccd8", "Private Information"),
    ("Public-Information", "e48d0154-bcf8-11d1-8702-00c04fb96050", "Public Information"),
    ("RAS-Information", "037088f8-0ae1-11d2-b422-00a0c968f939", "Remote Access Information"),
    ("Terminal-Server-License-Server", "5805bc62-bdc9-4428-a5e2-856a0f4c185e", "Terminal Server License Server"),
    ("Web-Information", "e45795b3-9455-11d1-aebd-0000f80367c1", "Web Information"),
];

#[derive(Debug, Clone, Default)]
pub struct Schema {
    // Mapping from lowercase controlAccessRight CN to rightsGuid
    right_guids: HashMap<String, Guid>,
    // Mapping from rightsGuid to display name
    right_names: HashMap<Guid, String>,
    // Mapping from attribute GUID to attribute name
    attribute_names: HashMap<Guid, String>,
}

impl Schema {
    pub fn builtin() -> Self {
        let mut res = Self::default();
        for (cn, guid, display_name) in BUILTIN_RIGHTS {
            match Guid::try_from(guid) {
                Ok(guid) => res.insert_right(cn, guid, display_name),
                Err(e) => log::error!("Skipping built-in right {}: {}", cn, e),
            }
        }
        res
    }

    fn insert_right(&mut self, cn: &str, guid: Guid, display_name: &str) {
        self.right_guids.insert(cn.to_lowercase(), guid);
        self.right_names.insert(guid, display_name.to_owned());
    }

    // Containers absent from the directory are not an error: we keep what we know
    fn search_or_empty(dir: &dyn Directory, base: &str, filter: &str, attributes: &[&str]) -> Result<Vec<LdapEntry>, LdapError> {
        match dir.search(base, SearchScope::Subtree, Some(filter), Some(attributes)) {
            Err(LdapError::NoSuchObject { dn }) => {
                log::info!("Container {} not found, using built-in schema information only", dn);
                Ok(vec![])
            },
            other => other,
        }
    }

    /// Built-in rights, completed with the controlAccessRight and attributeSchema
    /// objects found in the directory.
    pub fn query(dir: &dyn Directory) -> Result<Self, AdmcError> {
        let mut res = Self::builtin();

        let rights = Self::search_or_empty(dir, dir.get_configuration_naming_context(),
            "(&(objectClass=controlAccessRight)(rightsGuid=*))",
            &["cn", "rightsGuid", "displayName"])?;
        for entry in &rights {
            let (cn, guid_str) = match (get_attr_str(&[entry], &entry.dn, "cn"), get_attr_str(&[entry], &entry.dn, "rightsguid")) {
                (Ok(cn), Ok(guid_str)) => (cn, guid_str),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Ignoring right {}: {}", entry.dn, e);
                    continue;
                }
            };
            let guid = match Guid::try_from(guid_str.as_str()) {
                Ok(g) => g,
                Err(_) => {
                    log::warn!("Ignoring right {} with invalid rightsGuid {}", entry.dn, guid_str);
                    continue;
                }
            };
            let display_name = get_attr_str(&[entry], &entry.dn, "displayname").unwrap_or_else(|_| cn.clone());
            res.insert_right(&cn, guid, &display_name);
        }

        let attributes = Self::search_or_empty(dir, dir.get_schema_naming_context(),
            "(objectClass=attributeSchema)",
            &["schemaIDGUID", "lDAPDisplayName"])?;
        for entry in &attributes {
            let (name, bytes) = match (get_attr_str(&[entry], &entry.dn, "ldapdisplayname"), get_attr_bytes(&[entry], &entry.dn, "schemaidguid")) {
                (Ok(name), Ok(bytes)) => (name, bytes),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Ignoring attribute {}: {}", entry.dn, e);
                    continue;
                }
            };
            match Guid::from_bytes(&bytes) {
                Ok(guid) => {
                    res.attribute_names.insert(guid, name);
                },
                Err(_) => log::warn!("Ignoring attribute {} with invalid schemaIDGUID", entry.dn),
            }
        }

        log::debug!("Schema knows {} rights and {} attributes", res.right_guids.len(), res.attribute_names.len());
        Ok(res)
    }

    pub fn get_right_guid(&self, right_cn: &str) -> Option<Guid> {
        self.right_guids.get(&right_cn.to_lowercase()).copied()
    }

    pub fn get_permission_guid(&self, permission: AcePermission) -> Option<Guid> {
        permission.right_cn().and_then(|cn| self.get_right_guid(cn))
    }

    pub fn get_right_name(&self, guid: &Guid) -> Option<&str> {
        self.right_names.get(guid).map(|s| s.as_str())
    }

    pub fn get_attribute_name(&self, guid: &Guid) -> Option<&str> {
        self.attribute_names.get(guid).map(|s| s.as_str())
    }

    // Human-readable name for an ACE object type, falling back to the GUID itself
    pub fn describe_object_type(&self, guid: &Guid) -> String {
        self.get_right_name(guid)
            .or_else(|| self.get_attribute_name(guid))
            .map(|s| s.to_owned())
            .unwrap_or_else(|| guid.to_string())
    }
}

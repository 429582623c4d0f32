use std::str::FromStr;
use authz::Sid;
use ldapdir::{escape_filter_bytes, get_rdn_value, Directory, SearchScope};

// Principals which exist in every forest, with the name Windows displays for them
const WELL_KNOWN_TRUSTEES: [(&str, &str); 16] = [
    ("S-1-1-0", "Everyone"),
    ("S-1-3-0", "CREATOR OWNER"),
    ("S-1-3-1", "CREATOR GROUP"),
    ("S-1-5-7", "ANONYMOUS LOGON"),
    ("S-1-5-9", "ENTERPRISE DOMAIN CONTROLLERS"),
    ("S-1-5-10", "SELF"),
    ("S-1-5-11", "Authenticated Users"),
    ("S-1-5-18", "SYSTEM"),
    ("S-1-5-19", "LOCAL SERVICE"),
    ("S-1-5-20", "NETWORK SERVICE"),
    ("S-1-5-32-544", "Administrators"),
    ("S-1-5-32-545", "Users"),
    ("S-1-5-32-548", "Account Operators"),
    ("S-1-5-32-549", "Server Operators"),
    ("S-1-5-32-550", "Print Operators"),
    ("S-1-5-32-551", "Backup Operators"),
];

// Relative identifiers of accounts created in every domain
const WELL_KNOWN_DOMAIN_RIDS: [(u32, &str); 8] = [
    (500, "Administrator"),
    (502, "krbtgt"),
    (512, "Domain Admins"),
    (513, "Domain Users"),
    (515, "Domain Computers"),
    (516, "Domain Controllers"),
    (518, "Schema Admins"),
    (519, "Enterprise Admins"),
];

/// Trustees which can be added to a security descriptor without looking them up.
pub fn well_known_trustees() -> Vec<(Sid, &'static str)> {
    WELL_KNOWN_TRUSTEES.iter()
        .filter_map(|(sid, name)| Sid::from_str(sid).ok().map(|sid| (sid, *name)))
        .collect()
}

pub fn get_well_known_name(sid: &Sid) -> Option<&'static str> {
    let sid_str = sid.to_string();
    WELL_KNOWN_TRUSTEES.iter()
        .find(|(s, _)| *s == sid_str)
        .map(|(_, name)| *name)
}

fn get_domain_account_name(sid: &Sid) -> Option<&'static str> {
    if !sid.is_domain_specific() {
        return None;
    }
    let rid = sid.get_rid()?;
    WELL_KNOWN_DOMAIN_RIDS.iter()
        .find(|(r, _)| *r == rid)
        .map(|(_, name)| *name)
}

fn find_directory_name(dir: &dyn Directory, sid: &Sid) -> Option<String> {
    let filter = format!("(objectSid={})", escape_filter_bytes(sid.as_bytes()));
    let entries = match dir.search(dir.get_default_naming_context(), SearchScope::Subtree, Some(&filter), Some(&["name"][..])) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Unable to look up {} in the directory: {}", sid, e);
            return None;
        }
    };
    let entry = entries.first()?;
    if entries.len() > 1 {
        log::warn!("{} objects have objectSid {}, using {}", entries.len(), sid, entry.dn);
    }
    entry.get_first("name")
        .map(|v| String::from_utf8_lossy(v).to_string())
        .or_else(|| get_rdn_value(&entry.dn))
}

/// Display name of a trustee. Falls back to the SID string when nothing is known about it.
pub fn resolve_trustee_name(dir: &dyn Directory, sid: &Sid) -> String {
    if let Some(name) = get_well_known_name(sid) {
        return name.to_owned();
    }
    if let Some(name) = find_directory_name(dir, sid) {
        return name;
    }
    if let Some(name) = get_domain_account_name(sid) {
        return name.to_owned();
    }
    sid.to_string()
}

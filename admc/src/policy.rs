use serde::Serialize;
use ldapdir::{escape_filter_value, get_rdn_value, Directory, SearchScope};
use crate::error::AdmcError;
use crate::gplink::{Gplink, GplinkOption};

pub const ATTRIBUTE_GPLINK: &str = "gPLink";
pub const ATTRIBUTE_GPOPTIONS: &str = "gPOptions";

const GPOPTIONS_INHERIT: &str = "0";
const GPOPTIONS_BLOCK_INHERITANCE: &str = "1";

/// An object (domain, OU or site) linked to a given policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyLink {
    pub dn: String,
    pub name: String,
    pub enforced: bool,
    pub disabled: bool,
}

pub fn get_gplink(dir: &dyn Directory, dn: &str) -> Result<Gplink, AdmcError> {
    match dir.get_attribute(dn, ATTRIBUTE_GPLINK)? {
        Some(bytes) => Gplink::parse(&String::from_utf8_lossy(&bytes)),
        None => Ok(Gplink::new()),
    }
}

pub fn find_linked_objects(dir: &dyn Directory, base: &str, gpo_dn: &str) -> Result<Vec<PolicyLink>, AdmcError> {
    // Only the policy's own RDN value is searched for: stored DNs may differ in case
    // and in spacing around commas, which contains() below takes care of
    let needle = get_rdn_value(gpo_dn).unwrap_or_else(|| gpo_dn.trim().to_owned());
    let filter = format!("({}=*{}*)", ATTRIBUTE_GPLINK, escape_filter_value(&needle));
    let entries = dir.search(base, SearchScope::Subtree, Some(&filter), Some(&[ATTRIBUTE_GPLINK, "name"][..]))?;
    let mut res = Vec::new();
    for entry in entries {
        let gplink = match entry.get_first(ATTRIBUTE_GPLINK).map(|v| Gplink::parse(&String::from_utf8_lossy(v))) {
            Some(Ok(gplink)) => gplink,
            Some(Err(e)) => {
                log::warn!("Skipping {}: {}", entry.dn, e);
                continue;
            },
            None => continue,
        };
        // The substring filter also matches policies whose DN merely contains this one
        if !gplink.contains(gpo_dn) {
            continue;
        }
        let name = entry.get_first("name")
            .map(|v| String::from_utf8_lossy(v).to_string())
            .or_else(|| get_rdn_value(&entry.dn))
            .unwrap_or_else(|| entry.dn.clone());
        res.push(PolicyLink {
            enforced: gplink.get_option(gpo_dn, GplinkOption::Enforced),
            disabled: gplink.get_option(gpo_dn, GplinkOption::Disabled),
            dn: entry.dn,
            name,
        });
    }
    res.sort_by(|a, b| a.dn.to_lowercase().cmp(&b.dn.to_lowercase()));
    Ok(res)
}

// Reads the gPLink of target_dn, edits it, and writes it back if it changed
fn edit_gplink<F>(dir: &mut dyn Directory, target_dn: &str, edit: F) -> Result<bool, AdmcError>
    where F: FnOnce(&mut Gplink)
{
    let original = match dir.get_attribute(target_dn, ATTRIBUTE_GPLINK)? {
        Some(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        None => String::new(),
    };
    let mut gplink = Gplink::parse(&original)?;
    edit(&mut gplink);
    if gplink.equals(&original) {
        log::debug!("gPLink of {} unchanged", target_dn);
        return Ok(false);
    }
    let value = gplink.to_string();
    dir.replace_attribute_str(target_dn, ATTRIBUTE_GPLINK, &value)?;
    log::info!("Updated {} of {} to \"{}\"", ATTRIBUTE_GPLINK, target_dn, value);
    Ok(true)
}

pub fn link_gpo(dir: &mut dyn Directory, target_dn: &str, gpo_dn: &str) -> Result<bool, AdmcError> {
    edit_gplink(dir, target_dn, |g| g.add(gpo_dn))
}

pub fn unlink_gpo(dir: &mut dyn Directory, target_dn: &str, gpo_dn: &str) -> Result<bool, AdmcError> {
    edit_gplink(dir, target_dn, |g| g.remove(gpo_dn))
}

pub fn move_link_up(dir: &mut dyn Directory, target_dn: &str, gpo_dn: &str) -> Result<bool, AdmcError> {
    edit_gplink(dir, target_dn, |g| g.move_up(gpo_dn))
}

pub fn move_link_down(dir: &mut dyn Directory, target_dn: &str, gpo_dn: &str) -> Result<bool, AdmcError> {
    edit_gplink(dir, target_dn, |g| g.move_down(gpo_dn))
}

pub fn set_link_option(dir: &mut dyn Directory, target_dn: &str, gpo_dn: &str, option: GplinkOption, value: bool) -> Result<bool, AdmcError> {
    edit_gplink(dir, target_dn, |g| g.set_option(gpo_dn, option, value))
}

pub fn get_block_inheritance(dir: &dyn Directory, dn: &str) -> Result<bool, AdmcError> {
    let value = match dir.get_attribute(dn, ATTRIBUTE_GPOPTIONS)? {
        Some(bytes) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        None => return Ok(false),
    };
    match value.as_str() {
        GPOPTIONS_BLOCK_INHERITANCE => Ok(true),
        GPOPTIONS_INHERIT | "" => Ok(false),
        _ => Err(AdmcError::MalformedGpoptions(value)),
    }
}

pub fn set_block_inheritance(dir: &mut dyn Directory, dn: &str, block: bool) -> Result<bool, AdmcError> {
    let current = dir.get_attribute(dn, ATTRIBUTE_GPOPTIONS)?
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_owned());
    let wanted = if block { GPOPTIONS_BLOCK_INHERITANCE } else { GPOPTIONS_INHERIT };
    if current.as_deref() == Some(wanted) {
        return Ok(false);
    }
    dir.replace_attribute_str(dn, ATTRIBUTE_GPOPTIONS, wanted)?;
    log::info!("Set {} of {} to {}", ATTRIBUTE_GPOPTIONS, dn, wanted);
    Ok(true)
}

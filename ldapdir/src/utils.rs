use core::borrow::Borrow;
use crate::error::LdapError;
use crate::search::LdapEntry;

fn get_single_entry<'a, T: Borrow<LdapEntry>>(search_results: &'a [T], base: &str) -> Result<&'a LdapEntry, LdapError> {
    match search_results {
        [] => Err(LdapError::RequiredObjectMissing { dn: base.to_owned() }),
        [entry] => Ok(entry.borrow()),
        _ => Err(LdapError::RequiredObjectCollision { dn: base.to_owned() }),
    }
}

pub fn get_attr_strs<T: Borrow<LdapEntry>>(search_results: &[T], base: &str, attr_name: &str) -> Result<Vec<String>, LdapError> {
    let entry = get_single_entry(search_results, base)?;
    if let Some(vals) = entry.get(attr_name) {
        Ok(vals.iter().map(|v| String::from_utf8_lossy(v).to_string()).collect())
    } else {
        Err(LdapError::RequiredAttributeMissing { dn: base.to_owned(), name: attr_name.to_owned() })
    }
}

pub fn get_attr_str<T: Borrow<LdapEntry>>(search_results: &[T], base: &str, attr_name: &str) -> Result<String, LdapError> {
    let mut strs = get_attr_strs(search_results, base, attr_name)?;
    if let Some(s) = strs.pop() {
        if let Some(s2) = strs.pop() {
            return Err(LdapError::AttributeValuesCollision { dn: base.to_owned(), name: attr_name.to_owned(), val1: s, val2: s2 });
        }
        Ok(s)
    } else {
        Err(LdapError::RequiredAttributeMissing { dn: base.to_owned(), name: attr_name.to_owned() })
    }
}

pub fn get_attr_bytes<T: Borrow<LdapEntry>>(search_results: &[T], base: &str, attr_name: &str) -> Result<Vec<u8>, LdapError> {
    let entry = get_single_entry(search_results, base)?;
    match entry.get(attr_name).map(|v| v.as_slice()) {
        Some([val]) => Ok(val.clone()),
        Some([val1, val2, ..]) => Err(LdapError::AttributeValuesCollision {
            dn: base.to_owned(),
            name: attr_name.to_owned(),
            val1: format!("{:?}", val1),
            val2: format!("{:?}", val2),
        }),
        _ => Err(LdapError::RequiredAttributeMissing { dn: base.to_owned(), name: attr_name.to_owned() }),
    }
}

// Splits a DN into its RDNs, honouring backslash-escaped commas
pub fn split_dn(dn: &str) -> Vec<&str> {
    let mut res = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                res.push(dn[start..i].trim());
                start = i + 1;
            },
            _ => (),
        }
    }
    let last = dn[start..].trim();
    if !last.is_empty() || !res.is_empty() {
        res.push(last);
    }
    res
}

// Value of the first RDN, e.g. "Workstations" for "OU=Workstations,DC=example,DC=com"
pub fn get_rdn_value(dn: &str) -> Option<String> {
    let rdn = split_dn(dn).into_iter().next()?;
    let (_, value) = rdn.split_once('=')?;
    Some(value.trim().replace("\\,", ","))
}

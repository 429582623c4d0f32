use std::collections::{BTreeMap, HashMap};
use authz::{Ace, Acl, SecurityDescriptor, Sid, CONTAINER_INHERIT_ACE, NO_PROPAGATE_INHERIT_ACE, OBJECT_INHERIT_ACE, SE_DACL_PRESENT};
use ldapdir::Directory;
use crate::error::AdmcError;
use crate::permission::{read_prop_permissions, write_prop_permissions, AceColumn, AcePermission, PermissionState};
use crate::schema::Schema;

pub const ATTRIBUTE_SECURITY_DESCRIPTOR: &str = "nTSecurityDescriptor";

/// Allowed/denied state of every permission, for one trustee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    states: BTreeMap<AcePermission, PermissionState>,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionTable {
    pub fn new() -> Self {
        Self {
            states: AcePermission::all().iter().map(|p| (*p, PermissionState::None)).collect(),
        }
    }

    pub fn get(&self, permission: AcePermission) -> PermissionState {
        self.states.get(&permission).copied().unwrap_or(PermissionState::None)
    }

    pub fn set(&mut self, permission: AcePermission, state: PermissionState) {
        self.states.insert(permission, state);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AcePermission, PermissionState)> + '_ {
        self.states.iter().map(|(p, s)| (*p, *s))
    }

    pub fn is_empty(&self) -> bool {
        self.states.values().all(|s| *s == PermissionState::None)
    }

    fn set_checked(&mut self, permissions: &[AcePermission], column: AceColumn, checked: bool) {
        for p in permissions {
            let current = self.get(*p);
            if checked {
                self.set(*p, column.state());
            } else if current == column.state() {
                self.set(*p, PermissionState::None);
            }
        }
    }

    /// Returns the table obtained by (un)checking `permission` in `column`,
    /// along with every change this implies on related permissions.
    /// Never mutates `self`, so bulk updates cannot cascade into each other.
    pub fn toggled(&self, permission: AcePermission, column: AceColumn, checked: bool) -> Self {
        let mut res = self.clone();
        let opposite = column.opposite();

        res.set_checked(&[permission], column, checked);
        if checked {
            res.set_checked(&[permission], opposite, false);

            let children: &[AcePermission] = match permission {
                AcePermission::FullControl => AcePermission::all(),
                AcePermission::Read => read_prop_permissions(),
                AcePermission::Write => write_prop_permissions(),
                _ => &[],
            };
            res.set_checked(children, column, true);
        }

        // A parent only stays checked while all its children agree with it
        for ancestor in permission.ancestors() {
            if ancestor == permission {
                continue;
            }
            if checked {
                res.set_checked(&[ancestor], opposite, false);
            } else {
                res.set_checked(&[ancestor], column, false);
            }
        }
        res
    }

    /// Drops entries made redundant by a set parent permission.
    pub fn pruned(&self) -> Self {
        let mut res = self.clone();
        let redundant: Vec<AcePermission> = if self.get(AcePermission::FullControl) != PermissionState::None {
            AcePermission::all().iter().copied().filter(|p| *p != AcePermission::FullControl).collect()
        } else if self.get(AcePermission::Read) != PermissionState::None {
            read_prop_permissions().to_vec()
        } else if self.get(AcePermission::Write) != PermissionState::None {
            write_prop_permissions().to_vec()
        } else {
            vec![]
        };
        for p in redundant {
            res.set(p, PermissionState::None);
        }
        res
    }
}

pub fn toggle(table: &PermissionTable, permission: AcePermission, column: AceColumn, checked: bool) -> PermissionTable {
    table.toggled(permission, column, checked)
}

// Whether `ace` grants or denies (at least) `permission`
fn ace_matches(ace: &Ace, permission: AcePermission, schema: &Schema) -> bool {
    let mask = match ace.get_mask() {
        Some(m) => m,
        None => return false,
    };
    if (mask & permission.mask()) != permission.mask() {
        return false;
    }
    if ace.is_object_specific() {
        match (ace.get_object_type(), schema.get_permission_guid(permission)) {
            (Some(ace_guid), Some(right_guid)) => *ace_guid == right_guid,
            _ => false,
        }
    } else {
        true
    }
}

/// Permission states of `trustee` according to `aces`. When several ACEs
/// apply to the same permission, the last one wins.
pub fn decode_aces<'b>(aces: impl IntoIterator<Item = &'b Ace>, trustee: &Sid, schema: &Schema) -> PermissionTable {
    let mut table = PermissionTable::new();
    for ace in aces.into_iter().filter(|a| a.get_trustee() == Some(trustee)) {
        let state = if ace.grants_access() {
            PermissionState::Allowed
        } else if ace.denies_access() {
            PermissionState::Denied
        } else {
            continue;
        };
        for p in AcePermission::all() {
            if ace_matches(ace, *p, schema) {
                table.set(*p, state);
            }
        }
    }
    table
}

/// ACEs expressing `table` for `trustee`, one per non-empty entry left after pruning.
pub fn encode_table(trustee: &Sid, table: &PermissionTable, schema: &Schema) -> Result<Vec<Ace>, AdmcError> {
    let mut res = Vec::new();
    for (p, state) in table.pruned().iter() {
        let allow = match state {
            PermissionState::None => continue,
            PermissionState::Allowed => true,
            PermissionState::Denied => false,
        };
        let ace = if p.is_object_specific() {
            let guid = schema.get_permission_guid(p).ok_or_else(|| AdmcError::UnresolvedRight {
                permission: p.to_string(),
                right: p.right_cn().unwrap_or_default().to_owned(),
            })?;
            if allow {
                Ace::allow_object(trustee.clone(), p.mask(), guid)
            } else {
                Ace::deny_object(trustee.clone(), p.mask(), guid)
            }
        } else if allow {
            Ace::allow(trustee.clone(), p.mask())
        } else {
            Ace::deny(trustee.clone(), p.mask())
        };
        log::debug!("Encoded {} {} as {}", p, state, ace);
        res.push(ace);
    }
    Ok(res)
}

// Whether `new` only grants or denies rights that `old` already did, to the same trustee
fn covers(old: &Ace, new: &Ace) -> bool {
    let (old_mask, new_mask) = match (old.get_mask(), new.get_mask()) {
        (Some(o), Some(n)) => (o, n),
        _ => return false,
    };
    old.get_trustee() == new.get_trustee()
        && old.grants_access() == new.grants_access()
        && old.is_object_specific() == new.is_object_specific()
        && old.get_object_type() == new.get_object_type()
        && (old_mask & new_mask) == new_mask
}

// An ACE re-emitted in place of one it covers applies to the same descendants
fn inherit_scope(ace: Ace, replaced: &[&Ace]) -> Ace {
    match replaced.iter().rev().find(|old| covers(old, &ace)) {
        Some(old) => {
            let flags = old.flags & (OBJECT_INHERIT_ACE | CONTAINER_INHERIT_ACE | NO_PROPAGATE_INHERIT_ACE);
            ace.with_inheritance(flags, old.get_inherited_object_type().copied())
        },
        None => ace,
    }
}

/// Editing session over the DACL of one object.
pub struct SecurityModel<'a> {
    schema: &'a Schema,
    descriptor: SecurityDescriptor,
    trustees: Vec<Sid>,
    tables: HashMap<Sid, PermissionTable>,
    original: HashMap<Sid, PermissionTable>,
}

impl<'a> SecurityModel<'a> {
    pub fn from_descriptor(descriptor: SecurityDescriptor, schema: &'a Schema) -> Self {
        let trustees = descriptor.get_trustees();
        let tables: HashMap<Sid, PermissionTable> = trustees.iter()
            .map(|t| (t.clone(), decode_aces(descriptor.dacl_aces(), t, schema)))
            .collect();
        log::debug!("Loaded permissions of {} trustees from {} ACEs", trustees.len(), descriptor.dacl_aces().len());
        Self {
            schema,
            descriptor,
            trustees,
            original: tables.clone(),
            tables,
        }
    }

    pub fn from_bytes(bytes: &[u8], schema: &'a Schema) -> Result<Self, AdmcError> {
        Ok(Self::from_descriptor(SecurityDescriptor::from_bytes(bytes)?, schema))
    }

    pub fn load(dir: &dyn Directory, dn: &str, schema: &'a Schema) -> Result<Self, AdmcError> {
        match dir.get_attribute(dn, ATTRIBUTE_SECURITY_DESCRIPTOR)? {
            Some(bytes) => Self::from_bytes(&bytes, schema),
            None => Err(AdmcError::MissingSecurityDescriptor { dn: dn.to_owned() }),
        }
    }

    pub fn descriptor(&self) -> &SecurityDescriptor {
        &self.descriptor
    }

    pub fn trustees(&self) -> &[Sid] {
        &self.trustees
    }

    pub fn get_table(&self, trustee: &Sid) -> Option<&PermissionTable> {
        self.tables.get(trustee)
    }

    pub fn get_state(&self, trustee: &Sid, permission: AcePermission) -> PermissionState {
        self.tables.get(trustee).map(|t| t.get(permission)).unwrap_or(PermissionState::None)
    }

    pub fn toggle(&mut self, trustee: &Sid, permission: AcePermission, column: AceColumn, checked: bool) -> Result<(), AdmcError> {
        let table = self.tables.get(trustee).ok_or_else(|| AdmcError::UnknownTrustee(trustee.clone()))?;
        let new_table = table.toggled(permission, column, checked);
        self.tables.insert(trustee.clone(), new_table);
        Ok(())
    }

    pub fn add_trustee(&mut self, trustee: &Sid) {
        if self.tables.contains_key(trustee) {
            return;
        }
        self.trustees.push(trustee.clone());
        self.tables.insert(trustee.clone(), PermissionTable::new());
    }

    pub fn remove_trustee(&mut self, trustee: &Sid) -> bool {
        self.trustees.retain(|t| t != trustee);
        self.tables.remove(trustee).is_some()
    }

    pub fn is_modified(&self) -> bool {
        self.tables != self.original
    }

    fn is_trustee_modified(&self, trustee: &Sid) -> bool {
        self.tables.get(trustee) != self.original.get(trustee)
    }

    /// Explicit ACEs for the current state of `trustee`.
    pub fn generate_aces(&self, trustee: &Sid) -> Result<Vec<Ace>, AdmcError> {
        match self.tables.get(trustee) {
            Some(table) => encode_table(trustee, table, self.schema),
            None => Ok(vec![]),
        }
    }

    /// Descriptor with the DACL rebuilt from the current state. Trustees
    /// left untouched keep their ACEs as loaded.
    pub fn generate_descriptor(&self) -> Result<SecurityDescriptor, AdmcError> {
        let mut kept = Vec::new();
        let mut replaced: Vec<&Ace> = Vec::new();
        for ace in self.descriptor.dacl_aces() {
            let trustee = match ace.get_trustee() {
                Some(t) => t,
                None => {
                    kept.push(ace.clone());
                    continue;
                }
            };
            if ace.is_inherited() || ace.is_inherit_only() || !self.is_trustee_modified(trustee) {
                kept.push(ace.clone());
                continue;
            }
            let matched = AcePermission::all().iter()
                .filter(|p| ace_matches(ace, **p, self.schema))
                .fold(0u32, |acc, p| acc | p.mask());
            if matched == 0 {
                kept.push(ace.clone());
                continue;
            }
            replaced.push(ace);
            let residual = ace.get_mask().unwrap_or(0) & !matched;
            if residual != 0 {
                log::debug!("Keeping unmanaged rights 0x{:X} of {}", residual, ace);
                kept.push(ace.with_mask(residual));
            }
        }

        let mut acl = Acl::new(kept);
        acl.order_aces();
        let mut aces = acl.aces.clone();
        for trustee in self.trustees.iter().filter(|t| self.is_trustee_modified(t)) {
            // What inherited ACEs already grant needs no explicit ACE
            let baseline = decode_aces(acl.aces.iter(), trustee, self.schema);
            let wanted = match self.tables.get(trustee) {
                Some(table) => table.pruned(),
                None => continue,
            };
            let mut table = PermissionTable::new();
            for (p, state) in wanted.iter() {
                if state != baseline.get(p) {
                    table.set(p, state);
                }
            }
            for ace in encode_table(trustee, &table, self.schema)? {
                aces.push(inherit_scope(ace, &replaced));
            }
        }

        let mut dacl = Acl::new(aces);
        dacl.order_aces();
        let mut res = self.descriptor.clone();
        res.control |= SE_DACL_PRESENT;
        res.dacl = Some(dacl);
        Ok(res)
    }

    /// Writes the edited descriptor back to `dn`. On failure nothing changes
    /// in the session; on success the written descriptor becomes the new baseline.
    pub fn apply(&mut self, dir: &mut dyn Directory, dn: &str) -> Result<(), AdmcError> {
        let descriptor = self.generate_descriptor()?;
        dir.replace_attribute(dn, ATTRIBUTE_SECURITY_DESCRIPTOR, vec![descriptor.to_bytes()?])?;
        log::info!("Updated {} of {} ({} ACEs)", ATTRIBUTE_SECURITY_DESCRIPTOR, dn, descriptor.dacl_aces().len());

        let mut reloaded = Self::from_descriptor(descriptor, self.schema);
        // Keep trustees added during this session listed, even without ACEs
        for trustee in &self.trustees {
            if !reloaded.tables.contains_key(trustee) {
                reloaded.add_trustee(trustee);
                reloaded.original.insert(trustee.clone(), PermissionTable::new());
            }
        }
        *self = reloaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;
    use authz::{Guid, INHERITED_ACE, INHERIT_ONLY_ACE, CONTAINER_INHERIT_ACE};
    use authz::rights::{ADS_RIGHT_DS_CONTROL_ACCESS, ADS_RIGHT_DS_READ_PROP, ADS_RIGHT_WRITE_DAC};
    use ldapdir::{LdapEntry, MemoryDirectory};

    fn sid(s: &str) -> Sid {
        Sid::try_from(s).unwrap()
    }

    fn guid(s: &str) -> Guid {
        Guid::try_from(s).unwrap()
    }

    fn descriptor(aces: Vec<Ace>) -> SecurityDescriptor {
        SecurityDescriptor {
            control: authz::SE_SELF_RELATIVE | SE_DACL_PRESENT,
            owner: Some(sid("S-1-5-32-544")),
            group: Some(sid("S-1-5-18")),
            sacl: None,
            dacl: Some(Acl::new(aces)),
        }
    }

    const USER: &str = "S-1-5-21-1004336348-1177238915-682003330-1106";

    #[test]
    fn toggle_full_control() {
        let table = toggle(&PermissionTable::new(), AcePermission::FullControl, AceColumn::Allowed, true);
        assert!(table.iter().all(|(_, s)| s == PermissionState::Allowed));

        let table = toggle(&table, AcePermission::Read, AceColumn::Allowed, false);
        assert_eq!(table.get(AcePermission::FullControl), PermissionState::None);
        assert_eq!(table.get(AcePermission::Read), PermissionState::None);
        assert_eq!(table.get(AcePermission::Delete), PermissionState::Allowed);
        assert_eq!(table.get(AcePermission::ReadWebInfo), PermissionState::Allowed);
    }

    #[test]
    fn toggle_is_exclusive() {
        let table = toggle(&PermissionTable::new(), AcePermission::Read, AceColumn::Allowed, true);
        assert_eq!(table.get(AcePermission::ReadGroupMembership), PermissionState::Allowed);
        let table = toggle(&table, AcePermission::ReadGroupMembership, AceColumn::Denied, true);
        assert_eq!(table.get(AcePermission::ReadGroupMembership), PermissionState::Denied);
        assert_eq!(table.get(AcePermission::Read), PermissionState::None);
        assert_eq!(table.get(AcePermission::ReadWebInfo), PermissionState::Allowed);

        // Unchecking a column which is not checked changes nothing
        let same = toggle(&table, AcePermission::ReadGroupMembership, AceColumn::Allowed, false);
        assert_eq!(same, table);
    }

    #[test]
    fn prune_keeps_parents_only() {
        let table = toggle(&PermissionTable::new(), AcePermission::Write, AceColumn::Denied, true);
        let pruned = table.pruned();
        assert_eq!(pruned.get(AcePermission::Write), PermissionState::Denied);
        assert!(write_prop_permissions().iter().all(|p| pruned.get(*p) == PermissionState::None));

        let table = toggle(&PermissionTable::new(), AcePermission::FullControl, AceColumn::Allowed, true);
        let pruned = table.pruned();
        assert_eq!(pruned.iter().filter(|(_, s)| *s != PermissionState::None).count(), 1);
    }

    #[test]
    fn decode_last_ace_wins() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let sd = descriptor(vec![
            Ace::deny(user.clone(), ADS_RIGHT_DS_READ_PROP),
            Ace::allow(user.clone(), AcePermission::Read.mask()),
        ]);
        let model = SecurityModel::from_descriptor(sd, &schema);
        assert_eq!(model.get_state(&user, AcePermission::Read), PermissionState::Allowed);
        assert_eq!(model.get_state(&user, AcePermission::ReadWebInfo), PermissionState::Allowed);
        assert_eq!(model.get_state(&user, AcePermission::Delete), PermissionState::None);
        assert_eq!(model.get_state(&sid("S-1-1-0"), AcePermission::Read), PermissionState::None);
    }

    #[test]
    fn decode_object_ace_needs_matching_guid() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let change_password = schema.get_right_guid("User-Change-Password").unwrap();
        let sd = descriptor(vec![
            Ace::allow_object(user.clone(), ADS_RIGHT_DS_CONTROL_ACCESS, change_password),
            Ace::deny_object(user.clone(), ADS_RIGHT_DS_CONTROL_ACCESS, guid("00000000-0000-0000-0000-000000000001")),
        ]);
        let model = SecurityModel::from_descriptor(sd, &schema);
        assert_eq!(model.get_state(&user, AcePermission::ChangePassword), PermissionState::Allowed);
        assert_eq!(model.get_state(&user, AcePermission::ResetPassword), PermissionState::None);
        assert_eq!(model.get_state(&user, AcePermission::SendAs), PermissionState::None);
    }

    #[test]
    fn encode_needs_right_guids() {
        let user = sid(USER);
        let table = toggle(&PermissionTable::new(), AcePermission::SendAs, AceColumn::Allowed, true);
        assert!(matches!(encode_table(&user, &table, &Schema::default()), Err(AdmcError::UnresolvedRight { .. })));
        let aces = encode_table(&user, &table, &Schema::builtin()).unwrap();
        assert_eq!(aces, vec![Ace::allow_object(user, ADS_RIGHT_DS_CONTROL_ACCESS, guid("ab721a54-1e2f-11d0-9819-00aa0040529b"))]);
    }

    #[test]
    fn rebuild_preserves_unmanaged_aces() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let everyone = sid("S-1-1-0");
        let inherited = Ace::new(INHERITED_ACE, Ace::allow(user.clone(), AcePermission::Read.mask()).type_specific);
        let inherit_only = Ace::new(INHERIT_ONLY_ACE | CONTAINER_INHERIT_ACE, Ace::deny(user.clone(), AcePermission::Delete.mask()).type_specific);
        let sd = descriptor(vec![
            inherited.clone(),
            Ace::allow(user.clone(), AcePermission::CreateChild.mask() | ADS_RIGHT_WRITE_DAC),
            inherit_only.clone(),
            Ace::allow(everyone.clone(), AcePermission::Read.mask()),
        ]);
        let mut model = SecurityModel::from_descriptor(sd, &schema);
        assert!(!model.is_modified());
        model.toggle(&user, AcePermission::CreateChild, AceColumn::Allowed, false).unwrap();
        model.toggle(&user, AcePermission::SendAs, AceColumn::Denied, true).unwrap();
        assert!(model.is_modified());

        let new_sd = model.generate_descriptor().unwrap();
        let aces = new_sd.dacl_aces();
        let send_as = schema.get_right_guid("Send-As").unwrap();
        assert_eq!(aces, &[
            inherit_only,
            Ace::deny_object(user.clone(), ADS_RIGHT_DS_CONTROL_ACCESS, send_as),
            Ace::allow(user.clone(), ADS_RIGHT_WRITE_DAC),
            Ace::allow(everyone, AcePermission::Read.mask()),
            inherited,
        ]);
        assert_eq!(new_sd.owner, Some(sid("S-1-5-32-544")));
        assert_eq!(new_sd.group, Some(sid("S-1-5-18")));
    }

    #[test]
    fn rebuild_keeps_inheritance_of_replaced_aces() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let sd = descriptor(vec![
            Ace::new(CONTAINER_INHERIT_ACE, Ace::allow(user.clone(), AcePermission::Read.mask()).type_specific),
        ]);
        let mut model = SecurityModel::from_descriptor(sd, &schema);
        model.toggle(&user, AcePermission::Delete, AceColumn::Allowed, true).unwrap();

        let new_sd = model.generate_descriptor().unwrap();
        let aces = new_sd.dacl_aces();
        assert_eq!(aces.len(), 2);
        assert!(aces.contains(&Ace::new(CONTAINER_INHERIT_ACE, Ace::allow(user.clone(), AcePermission::Read.mask()).type_specific)));
        assert!(aces.contains(&Ace::allow(user.clone(), AcePermission::Delete.mask())));
    }

    #[test]
    fn rebuild_keeps_inherited_object_type() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let user_class = guid("bf967aba-0de6-11d0-a285-00aa003049e2");
        let reset_password = schema.get_permission_guid(AcePermission::ResetPassword).unwrap();
        let delegated = Ace::allow_object(user.clone(), ADS_RIGHT_DS_CONTROL_ACCESS, reset_password)
            .with_inheritance(CONTAINER_INHERIT_ACE, Some(user_class));
        let mut model = SecurityModel::from_descriptor(descriptor(vec![delegated.clone()]), &schema);
        assert_eq!(model.get_state(&user, AcePermission::ResetPassword), PermissionState::Allowed);
        model.toggle(&user, AcePermission::Delete, AceColumn::Allowed, true).unwrap();

        let new_sd = model.generate_descriptor().unwrap();
        let aces = new_sd.dacl_aces();
        assert_eq!(aces.len(), 2);
        assert!(aces.contains(&delegated));
        assert!(aces.contains(&Ace::allow(user.clone(), AcePermission::Delete.mask())));
        assert_eq!(delegated.get_inherited_object_type(), Some(&user_class));
    }

    #[test]
    fn oversized_dacl_is_not_written() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let dn = "CN=John,CN=Users,DC=example,DC=com";
        let original = descriptor(vec![]).to_bytes().unwrap();
        let mut dir = MemoryDirectory::new("DC=example,DC=com");
        dir.insert(LdapEntry::new(dn).with_bytes(ATTRIBUTE_SECURITY_DESCRIPTOR, &original));

        // 3300 ACEs of 20 bytes overflow the 16-bit ACL size
        let mut model = SecurityModel::from_descriptor(descriptor(vec![Ace::allow(sid("S-1-1-0"), ADS_RIGHT_WRITE_DAC); 3300]), &schema);
        model.add_trustee(&user);
        model.toggle(&user, AcePermission::Read, AceColumn::Allowed, true).unwrap();
        assert!(matches!(model.apply(&mut dir, dn), Err(AdmcError::Authz(authz::AuthzError::AclTooLarge { .. }))));
        assert!(model.is_modified());
        assert_eq!(dir.get_attribute(dn, ATTRIBUTE_SECURITY_DESCRIPTOR).unwrap(), Some(original));
    }

    #[test]
    fn removed_trustee_loses_its_aces() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let mut model = SecurityModel::from_descriptor(descriptor(vec![
            Ace::allow(user.clone(), AcePermission::FullControl.mask()),
            Ace::allow(sid("S-1-5-11"), AcePermission::Read.mask()),
        ]), &schema);
        assert!(model.remove_trustee(&user));
        assert!(!model.remove_trustee(&user));
        let new_sd = model.generate_descriptor().unwrap();
        assert_eq!(new_sd.get_trustees(), vec![sid("S-1-5-11")]);
    }

    #[test]
    fn apply_writes_and_rebaselines() {
        let schema = Schema::builtin();
        let user = sid(USER);
        let dn = "CN=John,CN=Users,DC=example,DC=com";
        let mut dir = MemoryDirectory::new("DC=example,DC=com");
        dir.insert(LdapEntry::new(dn).with_bytes(ATTRIBUTE_SECURITY_DESCRIPTOR, &descriptor(vec![]).to_bytes().unwrap()));

        let mut model = SecurityModel::load(&dir, dn, &schema).unwrap();
        assert!(model.trustees().is_empty());
        model.add_trustee(&user);
        model.toggle(&user, AcePermission::ResetPassword, AceColumn::Allowed, true).unwrap();

        dir.set_read_only(true);
        assert!(model.apply(&mut dir, dn).is_err());
        assert!(model.is_modified());
        assert_eq!(model.get_state(&user, AcePermission::ResetPassword), PermissionState::Allowed);

        dir.set_read_only(false);
        model.apply(&mut dir, dn).unwrap();
        assert!(!model.is_modified());

        let reloaded = SecurityModel::load(&dir, dn, &schema).unwrap();
        assert_eq!(reloaded.trustees(), &[user.clone()]);
        assert_eq!(reloaded.get_state(&user, AcePermission::ResetPassword), PermissionState::Allowed);
    }

    #[test]
    fn load_without_descriptor() {
        let schema = Schema::builtin();
        let mut dir = MemoryDirectory::new("DC=example,DC=com");
        dir.insert(LdapEntry::new("DC=example,DC=com"));
        assert!(matches!(SecurityModel::load(&dir, "DC=example,DC=com", &schema), Err(AdmcError::MissingSecurityDescriptor { .. })));
        assert!(SecurityModel::from_bytes(&[1, 2, 3], &schema).is_err());
    }

    #[test]
    fn unknown_trustee_cannot_be_toggled() {
        let schema = Schema::builtin();
        let mut model = SecurityModel::from_descriptor(descriptor(vec![]), &schema);
        assert!(matches!(model.toggle(&sid(USER), AcePermission::Read, AceColumn::Allowed, true), Err(AdmcError::UnknownTrustee(_))));
    }
}

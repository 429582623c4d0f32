use std::str::FromStr;
use admc::permission::{read_prop_permissions, write_prop_permissions};
use admc::security::{decode_aces, encode_table, toggle};
use admc::{AceColumn, AcePermission, PermissionState, PermissionTable, Schema};
use authz::{Ace, Guid, Sid};
use proptest::prelude::*;

fn arb_toggle() -> impl Strategy<Value = (AcePermission, AceColumn, bool)> {
    (0..AcePermission::all().len(), any::<bool>(), any::<bool>()).prop_map(|(i, allowed, checked)| {
        let column = if allowed { AceColumn::Allowed } else { AceColumn::Denied };
        (AcePermission::all()[i], column, checked)
    })
}

fn run_toggles(toggles: &[(AcePermission, AceColumn, bool)]) -> PermissionTable {
    toggles.iter().fold(PermissionTable::new(), |table, (p, column, checked)| toggle(&table, *p, *column, *checked))
}

fn trustee() -> Sid {
    Sid::from_str("S-1-5-21-1004336348-1177238915-682003330-1106").unwrap()
}

proptest! {
    #[test]
    fn parents_agree_with_children(toggles in prop::collection::vec(arb_toggle(), 0..24)) {
        let table = run_toggles(&toggles);
        let groups: [(AcePermission, &[AcePermission]); 3] = [
            (AcePermission::FullControl, AcePermission::all()),
            (AcePermission::Read, read_prop_permissions()),
            (AcePermission::Write, write_prop_permissions()),
        ];
        for (parent, children) in groups {
            let state = table.get(parent);
            if state != PermissionState::None {
                for child in children {
                    prop_assert_eq!(table.get(*child), state, "{} is set but {} is not", parent, child);
                }
            }
        }
    }

    #[test]
    fn encoded_tables_decode_back(toggles in prop::collection::vec(arb_toggle(), 0..24)) {
        let schema = Schema::builtin();
        let table = run_toggles(&toggles);
        let aces = encode_table(&trustee(), &table, &schema).unwrap();
        prop_assert_eq!(decode_aces(aces.iter(), &trustee(), &schema), table);
    }

    #[test]
    fn foreign_object_types_are_ignored(mask in any::<u32>(), data1 in any::<u32>(), allow in any::<bool>()) {
        let schema = Schema::builtin();
        let guid = Guid::from_values(data1, 0x1234, 0x5678, [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
        prop_assume!(AcePermission::all().iter().all(|p| schema.get_permission_guid(*p) != Some(guid)));
        let ace = if allow {
            Ace::allow_object(trustee(), mask, guid)
        } else {
            Ace::deny_object(trustee(), mask, guid)
        };
        prop_assert!(decode_aces([&ace], &trustee(), &schema).is_empty());
    }
}

#[test]
fn full_control_allows_everything() {
    let table = toggle(&PermissionTable::new(), AcePermission::FullControl, AceColumn::Allowed, true);
    for p in AcePermission::all() {
        assert_eq!(table.get(*p), PermissionState::Allowed, "{}", p);
    }
}

#[test]
fn unchecking_read_clears_full_control_only() {
    let table = toggle(&PermissionTable::new(), AcePermission::FullControl, AceColumn::Allowed, true);
    let table = toggle(&table, AcePermission::Read, AceColumn::Allowed, false);
    assert_eq!(table.get(AcePermission::FullControl), PermissionState::None);
    assert_eq!(table.get(AcePermission::Read), PermissionState::None);
    for p in AcePermission::all().iter().filter(|p| !p.is_read_prop() && !matches!(p, AcePermission::FullControl | AcePermission::Read)) {
        assert_eq!(table.get(*p), PermissionState::Allowed, "{}", p);
    }
}

#[test]
fn plain_ace_covers_object_permissions() {
    let schema = Schema::builtin();
    let ace = Ace::allow(trustee(), AcePermission::FullControl.mask());
    let table = decode_aces([&ace], &trustee(), &schema);
    assert!(AcePermission::all().iter().all(|p| table.get(*p) == PermissionState::Allowed));
}

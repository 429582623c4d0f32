use authz::{Ace, Acl, Guid, SecurityDescriptor, Sid, INHERITED_ACE, SE_DACL_PRESENT, SE_SELF_RELATIVE};
use proptest::prelude::*;

fn arb_sid() -> impl Strategy<Value = Sid> {
    (0u64..(1u64 << 48), prop::collection::vec(any::<u32>(), 0..=15))
        .prop_map(|(authority, sub_auths)| Sid::from_parts(authority, &sub_auths).unwrap())
}

fn arb_guid() -> impl Strategy<Value = Guid> {
    (any::<u32>(), any::<u16>(), any::<u16>(), any::<[u8; 8]>())
        .prop_map(|(a, b, c, d)| Guid::from_values(a, b, c, d))
}

fn arb_ace() -> impl Strategy<Value = Ace> {
    (arb_sid(), any::<u32>(), arb_guid(), 0u8..4, any::<bool>()).prop_map(|(sid, mask, guid, kind, inherited)| {
        let mut ace = match kind {
            0 => Ace::allow(sid, mask),
            1 => Ace::deny(sid, mask),
            2 => Ace::allow_object(sid, mask, guid),
            _ => Ace::deny_object(sid, mask, guid),
        };
        if inherited {
            ace.flags |= INHERITED_ACE;
        }
        ace
    })
}

proptest! {
    #[test]
    fn parsers_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Sid::from_bytes(&bytes);
        let _ = Guid::from_bytes(&bytes);
        let _ = Ace::from_bytes(&bytes);
        let _ = Acl::parse(&bytes);
        let _ = SecurityDescriptor::from_bytes(&bytes);
    }

    #[test]
    fn sid_strings_parse_back(sid in arb_sid()) {
        let parsed: Sid = sid.to_string().parse().unwrap();
        prop_assert_eq!(parsed, sid);
    }

    #[test]
    fn descriptors_parse_back(owner in arb_sid(), aces in prop::collection::vec(arb_ace(), 0..12)) {
        let sd = SecurityDescriptor {
            control: SE_SELF_RELATIVE | SE_DACL_PRESENT,
            owner: Some(owner),
            group: None,
            sacl: None,
            dacl: Some(Acl::new(aces)),
        };
        let parsed = SecurityDescriptor::from_bytes(&sd.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(parsed, sd);
    }

    #[test]
    fn ordering_keeps_every_ace(aces in prop::collection::vec(arb_ace(), 0..12)) {
        let mut acl = Acl::new(aces.clone());
        acl.order_aces();
        prop_assert!(acl.is_canonical());
        prop_assert_eq!(acl.aces.len(), aces.len());
        let inherited: Vec<&Ace> = aces.iter().filter(|a| a.is_inherited()).collect();
        let sorted_inherited: Vec<&Ace> = acl.aces.iter().filter(|a| a.is_inherited()).collect();
        prop_assert_eq!(inherited, sorted_inherited);
    }
}

//! Wire codec properties.

use bc_core::comms::{self, Payload};
use bc_core::world::{Message, UnitId};
use bc_test_utils::strategies::{arb_role_command, arb_tile_report, arb_unit_report};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_tile_reports_survive_the_wire(report in arb_tile_report()) {
        let raw = Payload::Tile(report).encode().expect("in range");
        prop_assert_eq!(Payload::decode(raw).expect("tagged"), Payload::Tile(report));
    }

    #[test]
    fn prop_unit_reports_survive_the_wire(report in arb_unit_report()) {
        let raw = Payload::Unit(report).encode().expect("in range");
        prop_assert_eq!(Payload::decode(raw).expect("tagged"), Payload::Unit(report));
    }

    #[test]
    fn prop_role_codes_never_collide_with_reports(
        role in arb_role_command(),
        tile in arb_tile_report(),
        unit in arb_unit_report(),
    ) {
        let role_raw = Payload::Role(role).encode().expect("sentinel");
        prop_assert_ne!(role_raw, Payload::Tile(tile).encode().expect("in range"));
        prop_assert_ne!(role_raw, Payload::Unit(unit).encode().expect("in range"));
    }

    #[test]
    fn prop_decode_never_panics(raw in any::<u32>()) {
        let _ = Payload::decode(raw);
    }

    #[test]
    fn prop_inbox_keeps_only_valid_payloads(
        raws in proptest::collection::vec(any::<u32>(), 0..16),
    ) {
        let messages: Vec<Message> = raws
            .iter()
            .map(|&payload| Message { sender: UnitId(1), round: 1, payload })
            .collect();
        let valid = raws.iter().filter(|&&raw| Payload::decode(raw).is_ok()).count();
        prop_assert_eq!(comms::decode_inbox(messages).len(), valid);
    }
}
